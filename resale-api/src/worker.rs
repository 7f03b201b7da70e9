use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::metrics::Metrics;
use resale_core::EventBus;

/// Feeds every published sale event into the Prometheus counters until
/// the bus closes.
pub fn start_metrics_worker(events: &EventBus, metrics: Metrics) -> JoinHandle<()> {
    let mut rx = events.subscribe();

    tokio::spawn(async move {
        info!("Metrics worker started, listening to sale events...");
        loop {
            match rx.recv().await {
                Ok(event) => metrics.record(&event),
                Err(RecvError::Lagged(skipped)) => warn!("Metrics worker lagged, {} event(s) not counted", skipped),
                Err(RecvError::Closed) => break,
            }
        }
        info!("Metrics worker stopped");
    })
}
