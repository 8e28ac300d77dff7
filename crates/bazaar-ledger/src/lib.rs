//! Bazaar Ledger - Orders and stock
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           STOCK LEDGER                              │
//! │                                                                     │
//! │  POS order ──────┐                                                  │
//! │                  ├──► gate ──► reserve (all lines or none) ──► save │
//! │  marketplace ────┘                       │                          │
//! │  checkout                                └── save failed: give back │
//! │                                                                     │
//! │  purchase ──► validate every line ──► add stock, update cost        │
//! │                                                                     │
//! │  PENDING ─► PREPARING ─► READY_FOR_PICKUP ─► PAID ──────► DELIVERED │
//! │     │           │               │      └──► SHIPPED ──┘            │
//! │     └───────────┴───────────────┴──► CANCELLED                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock never goes negative: every reservation is a versioned
//! compare-and-swap over all touched listings at once.

#![warn(missing_docs)]

pub mod checkout;
pub mod customer;
pub mod notify;
pub mod order;
pub mod reports;
pub mod repository;
pub mod stock;

pub use checkout::MarketplaceCheckout;
pub use customer::{loyalty_points_for, Customer, CustomerContact};
pub use notify::{Notifier, NotifyError, NullNotifier, SaleEvent};
pub use order::{LineRequest, NewOrder, Order, OrderLine, OrderStatus, PaymentMethod};
pub use reports::{DailySalesSummary, Dashboard, PlatformActivity, SalesReports, TopSeller};
pub use repository::{CustomerRepository, InMemoryCustomerRepository, InMemoryOrderRepository, OrderRepository};
pub use stock::{LedgerOptions, PurchaseLine, PurchaseReceipt, StockLedger};
