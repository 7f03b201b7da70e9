use resale_shared::models::events::SaleEvent;
use tokio::sync::broadcast;

/// In-process fan-out of sale events to SSE clients and the metrics worker.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SaleEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: SaleEvent) {
        let kind = event.kind();
        match self.tx.send(event) {
            Ok(receivers) => tracing::debug!("Published {} to {} subscriber(s)", kind, receivers),
            Err(_) => tracing::trace!("Dropped {}: no subscribers", kind),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
