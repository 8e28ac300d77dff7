//! Bazaar Billing - Tenant subscription lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      SUBSCRIPTION LIFECYCLE                          │
//! │                                                                     │
//! │   signup ──► FREE ◄────────── trial expired ─────────── TRIAL        │
//! │               │                                           │         │
//! │               └──── payment approved ──► PAID ◄───────────┘         │
//! │                                           │  ▲                      │
//! │                            end date passed │  │ payment approved     │
//! │                                           ▼  │                      │
//! │                                        PAST_DUE      SUSPENDED       │
//! │                                                    (admin only)     │
//! │                                                                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐               │
//! │  │     Gate     │  │   Sweeper    │  │   Payments   │               │
//! │  │ pure checks  │  │ daily sweeps │  │ approve/deny │               │
//! │  └──────────────┘  └──────────────┘  └──────────────┘               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod gate;
pub mod payments;
pub mod repository;
pub mod service;
pub mod stats;
pub mod sweeps;
pub mod tenant;

pub use gate::{Decision, SubscriptionGate};
pub use payments::{NewPayment, PaymentStatus, SubscriptionPayment};
pub use repository::{
    InMemoryPaymentRepository, InMemoryTenantRepository, PaymentRepository, TenantRepository,
};
pub use service::{ApprovedPayment, SubscriptionService};
pub use stats::SubscriptionStats;
pub use sweeps::{SubscriptionSweeper, SweepReport};
pub use tenant::{SignupPlan, SubscriptionStatus, Tenant, TenantProfile, SUBSCRIPTION_PERIOD_DAYS};
