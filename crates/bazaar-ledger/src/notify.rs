//! New-sale notification port

use bazaar_common::{OrderId, TenantId};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Notification delivery failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    /// Consumer is gone
    #[error("notifier closed")]
    Closed,
    /// Consumer is not keeping up
    #[error("notifier queue full")]
    Full,
}

/// A marketplace order reached a seller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleEvent {
    /// Seller
    pub tenant_id: TenantId,
    /// New order
    pub order_id: OrderId,
    /// Order total
    pub amount: Decimal,
    /// Buyer name
    pub customer_name: String,
}

/// Fire-and-forget sale notifications
pub trait Notifier: Send + Sync {
    /// Hand the event off without blocking
    fn notify(&self, event: SaleEvent) -> Result<(), NotifyError>;
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: SaleEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}
