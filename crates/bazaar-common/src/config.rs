//! Platform-wide settings
//!
//! A single settings record (free-plan cap, trial length, pricing, public
//! announcements) is modeled as an immutable, versioned value. Operations
//! read a snapshot through [`ConfigSource`] instead of touching global state,
//! so gate decisions can be tested with any configuration.

use arc_swap::ArcSwap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Versioned platform configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Incremented on every update
    pub version: u64,
    /// Listings a FREE tenant may hold
    pub free_plan_product_limit: u32,
    /// Trial length in days
    pub trial_days: u32,
    /// Monthly price of the paid plan
    pub premium_monthly_price: Decimal,
    /// Banner text published to tenants; not interpreted by the core
    pub announcement: Option<String>,
    /// Refuses marketplace checkout while set; sellers keep working
    pub maintenance_mode: bool,
    /// Support e-mail shown publicly
    pub contact_email: Option<String>,
    /// Support phone shown publicly
    pub contact_phone: Option<String>,
    /// Secondary currency units per primary unit, published for display.
    /// Prices and totals are always in the primary currency.
    pub exchange_rate: Decimal,
    /// Secondary currency code, published for display
    pub secondary_currency: String,
    /// Secondary currency symbol, published for display
    pub secondary_currency_symbol: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            version: 1,
            free_plan_product_limit: 10,
            trial_days: 30,
            premium_monthly_price: dec!(25.00),
            announcement: None,
            maintenance_mode: false,
            contact_email: None,
            contact_phone: None,
            exchange_rate: dec!(36.50),
            secondary_currency: "VES".into(),
            secondary_currency_symbol: "Bs.".into(),
        }
    }
}

/// Accessor for the current configuration snapshot
pub trait ConfigSource: Send + Sync {
    /// Snapshot valid for the duration of one operation
    fn current(&self) -> Arc<PlatformConfig>;
}

impl ConfigSource for PlatformConfig {
    fn current(&self) -> Arc<PlatformConfig> {
        Arc::new(self.clone())
    }
}

/// Hot-swappable configuration shared across services
pub struct SharedConfig {
    inner: ArcSwap<PlatformConfig>,
}

impl SharedConfig {
    /// Start from an initial configuration
    pub fn new(initial: PlatformConfig) -> Self {
        Self { inner: ArcSwap::from_pointee(initial) }
    }

    /// Apply an edit atomically and bump the version
    pub fn update<F>(&self, edit: F) -> Arc<PlatformConfig>
    where
        F: Fn(&mut PlatformConfig),
    {
        self.inner.rcu(|current| {
            let mut next = PlatformConfig::clone(current);
            edit(&mut next);
            next.version = current.version + 1;
            next
        });
        let updated = self.inner.load_full();
        tracing::info!(version = updated.version, "platform configuration updated");
        updated
    }

    /// Current version
    pub fn version(&self) -> u64 {
        self.inner.load().version
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(PlatformConfig::default())
    }
}

impl ConfigSource for SharedConfig {
    fn current(&self) -> Arc<PlatformConfig> {
        self.inner.load_full()
    }
}
