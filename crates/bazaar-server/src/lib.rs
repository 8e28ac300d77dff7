//! Bazaar Server - Process wiring
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          BAZAAR SERVER                              │
//! │                                                                     │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐               │
//! │  │   Billing    │  │   Catalog    │  │    Ledger    │               │
//! │  │ subscriptions│  │ listings     │  │ orders/stock │               │
//! │  │ gate, sweeps │  │ public views │  │ checkout     │               │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘               │
//! │         └─────────────────┼─────────────────┘                       │
//! │                 in-memory repositories                              │
//! │                                                                     │
//! │  scheduler: startup sweep, daily sweep, limiter cleanup             │
//! │  notifier:  mpsc ──► consumer logs each sale                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod notifier;
pub mod scheduler;

pub use config::ServerConfig;
pub use notifier::ChannelNotifier;

use bazaar_access::{CredentialVerifier, LoginGuard, LoginRateLimiter};
use bazaar_billing::{
    InMemoryPaymentRepository, InMemoryTenantRepository, SubscriptionGate, SubscriptionService,
    SubscriptionStats, SubscriptionSweeper,
};
use bazaar_catalog::{
    CatalogAdmin, CatalogUnifier, InMemoryCatalogRepository, InMemoryListingRepository,
    InMemorySearchIndex, IndexPublisher, ListingService, PublicCatalog,
};
use bazaar_common::{Clock, MarketError, MarketResult, MessageCatalog, SharedConfig};
use bazaar_ledger::{
    InMemoryCustomerRepository, InMemoryOrderRepository, MarketplaceCheckout, Notifier,
    PlatformActivity, SalesReports, StockLedger,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Subscription figures plus marketplace activity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformStats {
    /// Tenants per status and recurring revenue
    pub subscriptions: SubscriptionStats,
    /// Sales since the reporting start
    pub activity: PlatformActivity,
    /// Start of the activity window
    pub since: DateTime<Utc>,
}

/// Every service of the marketplace over one set of stores
pub struct Marketplace {
    /// Live platform settings
    pub config: Arc<SharedConfig>,
    /// Tenants, payments, status overrides
    pub subscriptions: SubscriptionService,
    /// Expiry sweeps
    pub sweeper: Arc<SubscriptionSweeper>,
    /// Tenant listing lifecycle
    pub listings: ListingService,
    /// Public storefront views
    pub catalog: PublicCatalog,
    /// Canonical entry administration
    pub catalog_admin: CatalogAdmin,
    /// Orders, transitions, purchases
    pub ledger: Arc<StockLedger>,
    /// Public order entry
    pub checkout: MarketplaceCheckout,
    /// Seller reports
    pub reports: SalesReports,
    /// Shared sign-in throttle
    pub limiter: Arc<LoginRateLimiter>,
    messages: Box<dyn MessageCatalog>,
}

impl Marketplace {
    /// Wire every service to in-memory stores
    pub fn in_memory(config: &ServerConfig, notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>) -> Self {
        let shared = Arc::new(SharedConfig::new(config.platform.clone()));

        let tenants = Arc::new(InMemoryTenantRepository::new());
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let entries = Arc::new(InMemoryCatalogRepository::new());
        let listings = Arc::new(InMemoryListingRepository::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let index = IndexPublisher::new(Arc::new(InMemorySearchIndex::new()));

        let gate = Arc::new(SubscriptionGate::new(shared.clone()));
        let unifier = Arc::new(CatalogUnifier::new(entries.clone(), clock.clone()));
        let ledger = Arc::new(StockLedger::new(
            tenants.clone(),
            listings.clone(),
            orders.clone(),
            customers.clone(),
            gate.clone(),
            clock.clone(),
            config.ledger,
        ));

        Self {
            subscriptions: SubscriptionService::new(tenants.clone(), payments, shared.clone(), clock.clone()),
            sweeper: Arc::new(SubscriptionSweeper::new(tenants.clone(), shared.clone())),
            listings: ListingService::new(
                tenants.clone(),
                listings.clone(),
                unifier,
                gate,
                index.clone(),
                clock.clone(),
            ),
            catalog: PublicCatalog::new(tenants, listings.clone(), entries.clone(), index.clone()),
            catalog_admin: CatalogAdmin::new(entries, listings.clone(), index, clock.clone()),
            checkout: MarketplaceCheckout::new(
                ledger.clone(),
                listings.clone(),
                customers,
                shared.clone(),
                notifier,
                clock.clone(),
            ),
            reports: SalesReports::new(orders, listings),
            ledger,
            limiter: Arc::new(LoginRateLimiter::with_clock(config.rate_limit.clone(), clock)),
            messages: config.locale.catalog(),
            config: shared,
        }
    }

    /// Rate-limited sign-in over `verifier`
    pub fn login_guard<V: CredentialVerifier>(&self, verifier: V) -> LoginGuard<V> {
        LoginGuard::new(verifier, self.limiter.clone())
    }

    /// Platform owner figures for activity since `since`
    pub fn platform_stats(&self, since: DateTime<Utc>) -> MarketResult<PlatformStats> {
        Ok(PlatformStats {
            subscriptions: self.subscriptions.stats()?,
            activity: self.reports.platform_activity(since)?,
            since,
        })
    }

    /// Caller-facing text for an error in the configured locale
    pub fn describe(&self, err: &MarketError) -> String {
        self.messages.render(err)
    }
}
