//! Bus observer feeding logs and metrics.

use bbs_tourney::{Bus, TournamentManager, net::errors::BusError};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::{logging, metrics};

/// Watch authoritative frames on the bus, logging lifecycle events and
/// keeping the tournament gauges current.
pub fn spawn_bus_monitor(bus: Arc<dyn Bus>, manager: Arc<TournamentManager>) -> JoinHandle<()> {
    let mut subscription = bus.subscribe();

    tokio::spawn(async move {
        loop {
            let message = match subscription.recv().await {
                Ok(message) => message,
                Err(BusError::Lagged(skipped)) => {
                    tracing::warn!("Bus monitor missed {} frames", skipped);
                    continue;
                }
                Err(e) => {
                    tracing::info!("Bus monitor stopping: {}", e);
                    break;
                }
            };

            logging::log_tournament_event(&message);
            if message.is_authoritative() {
                metrics::tournament_event(message.kind());
            }

            if matches!(
                message.kind(),
                "tournament-start" | "tournament-end" | "tournament-cancel"
            ) {
                metrics::active_tournaments(manager.active_tournament_count().await);
            }
        }
    })
}
