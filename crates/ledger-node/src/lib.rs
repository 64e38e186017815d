pub mod api;
pub mod config;
pub mod constants;
pub mod network;
pub mod scheduler;
