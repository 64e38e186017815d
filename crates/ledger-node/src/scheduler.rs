use std::time::Duration;

use ledger_core::coordinator::Coordinator;
use ledger_core::gateway::{NodeStore, PeerNetwork};
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Run a mining tick every `every` until `shutdown` flips or its sender is
/// dropped. A tick always runs to completion; shutdown is only observed
/// between ticks.
pub async fn run<S, N>(coordinator: Coordinator<S, N>, every: Duration, mut shutdown: watch::Receiver<bool>)
where
    S: NodeStore,
    N: PeerNetwork,
{
    let mut ticks = time::interval_at(Instant::now() + every, every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = shutdown.changed() => {
                info!("miner stopped");
                return;
            }
        }
        match coordinator.tick().await {
            Ok(outcome) => debug!(?outcome, "tick finished"),
            Err(err) => warn!(%err, "tick failed, retrying on the next one"),
        }
    }
}
