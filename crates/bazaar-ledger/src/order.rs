//! Order model and status machine

use bazaar_common::{CustomerId, ListingId, MarketError, OrderId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Placed, awaiting the seller
    Pending,
    /// Being prepared
    Preparing,
    /// Waiting at the counter
    ReadyForPickup,
    /// Settled
    Paid,
    /// Handed to a carrier
    Shipped,
    /// Received by the buyer
    Delivered,
    /// Abandoned
    Cancelled,
}

impl OrderStatus {
    /// All variants
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending,
        Self::Preparing,
        Self::ReadyForPickup,
        Self::Paid,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Preparing => "PREPARING",
            Self::ReadyForPickup => "READY_FOR_PICKUP",
            Self::Paid => "PAID",
            Self::Shipped => "SHIPPED",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Statuses reachable from this one
    pub fn successors(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Preparing, ReadyForPickup, Paid, Shipped, Cancelled],
            Preparing => &[ReadyForPickup, Paid, Cancelled],
            ReadyForPickup => &[Paid, Shipped, Cancelled],
            Paid | Shipped => &[Delivered],
            Delivered | Cancelled => &[],
        }
    }

    /// Whether `next` may follow this status
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.successors().contains(&next)
    }

    /// No further transitions
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| MarketError::validation(format!("invalid order status: {s}")))
    }
}

/// How an order was settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash at the counter; the default for paid orders
    Cash,
    /// Card terminal
    Card,
    /// Bank transfer
    Transfer,
    /// Mobile payment
    MobilePayment,
}

impl PaymentMethod {
    /// All variants
    pub const ALL: [PaymentMethod; 4] = [Self::Cash, Self::Card, Self::Transfer, Self::MobilePayment];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "CASH",
            Self::Card => "CARD",
            Self::Transfer => "TRANSFER",
            Self::MobilePayment => "MOBILE_PAYMENT",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == wanted)
            .ok_or_else(|| MarketError::validation(format!("invalid payment method: {s}")))
    }
}

/// Requested quantity of one listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    /// Listing to buy
    pub listing_id: ListingId,
    /// Units
    pub quantity: u32,
}

/// Order input
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewOrder {
    /// Known customer of the tenant
    pub customer_id: Option<CustomerId>,
    /// Staff member ringing up the sale
    pub cashier: Option<String>,
    /// Requested lines
    pub lines: Vec<LineRequest>,
    /// Initial status, PENDING when absent
    pub status: Option<OrderStatus>,
    /// Settlement method
    pub payment_method: Option<PaymentMethod>,
}

/// Committed order line with the price pinned at order time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Sold listing
    pub listing_id: ListingId,
    /// Listing name at order time
    pub name: String,
    /// Units
    pub quantity: u32,
    /// Listing price at order time
    pub unit_price: Decimal,
    /// `unit_price * quantity`
    pub subtotal: Decimal,
}

/// Persisted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Order id
    pub id: OrderId,
    /// Selling tenant
    pub tenant_id: TenantId,
    /// Buyer, if known
    pub customer_id: Option<CustomerId>,
    /// Staff member, if any
    pub cashier: Option<String>,
    /// One line per listing
    pub lines: Vec<OrderLine>,
    /// Sum of line subtotals
    pub total_amount: Decimal,
    /// Current state
    pub status: OrderStatus,
    /// Settlement method
    pub payment_method: Option<PaymentMethod>,
    /// Placement time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Units per listing, in line order
    pub fn quantities(&self) -> Vec<(ListingId, u32)> {
        self.lines.iter().map(|l| (l.listing_id, l.quantity)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Shipped));
        assert!(Preparing.can_transition_to(Paid));
        assert!(!Preparing.can_transition_to(Shipped));
        assert!(ReadyForPickup.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Delivered));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Pending));
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
    }

    #[test]
    fn test_parsing_is_case_insensitive() {
        assert_eq!("ready_for_pickup".parse::<OrderStatus>().unwrap(), OrderStatus::ReadyForPickup);
        assert_eq!(" mobile_payment ".parse::<PaymentMethod>().unwrap(), PaymentMethod::MobilePayment);
        assert!(matches!("BITCOIN".parse::<PaymentMethod>(), Err(MarketError::Validation(_))));
        assert!(matches!("SHIPPING".parse::<OrderStatus>(), Err(MarketError::Validation(_))));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap(), "\"READY_FOR_PICKUP\"");
        assert_eq!(PaymentMethod::MobilePayment.to_string(), "MOBILE_PAYMENT");
    }
}
