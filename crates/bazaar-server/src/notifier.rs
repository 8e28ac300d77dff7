//! Sale notifications over a bounded channel

use bazaar_ledger::{Notifier, NotifyError, SaleEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Queues sale events for the background consumer without blocking
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: mpsc::Sender<SaleEvent>,
}

impl ChannelNotifier {
    /// Bounded channel of `capacity` events
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SaleEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: SaleEvent) -> Result<(), NotifyError> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(_) => NotifyError::Full,
            TrySendError::Closed(_) => NotifyError::Closed,
        })
    }
}

/// Log every event until all senders are gone; returns the number handled
pub fn spawn_consumer(mut rx: mpsc::Receiver<SaleEvent>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut handled = 0;
        while let Some(event) = rx.recv().await {
            tracing::info!(
                tenant = %event.tenant_id,
                order = %event.order_id,
                amount = %event.amount,
                customer = %event.customer_name,
                "new sale"
            );
            handled += 1;
        }
        tracing::debug!(handled, "sale notification consumer stopped");
        handled
    })
}
