use std::sync::Arc;

use clap::Parser;
use ledger_core::coordinator::Coordinator;
use ledger_node::{
    api::{self, AppState},
    config::Args,
    network::HttpPeerNetwork,
    scheduler,
};
use ledger_storage::SledStore;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.coordinator_config();
    let store = Arc::new(SledStore::open(&args.data_dir)?);
    let network = HttpPeerNetwork::new(&config)?;
    let every = args.tick_interval();

    let app = api::router(AppState::new(store.clone(), &config));
    let coordinator = Coordinator::new(config.clone(), store.clone(), network);

    info!(
        miner = %config.miner_address,
        peers = config.peer_urls.len(),
        every_secs = every.as_secs(),
        "*** RUNNING MINER ***"
    );
    let (stop_tx, stop_rx) = watch::channel(false);
    let miner = tokio::spawn(scheduler::run(coordinator, every, stop_rx));

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!("ledger-node listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    let _ = stop_tx.send(true);
    miner.await?;
    store.close()?;
    Ok(())
}
