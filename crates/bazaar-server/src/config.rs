//! Server Configuration

use bazaar_access::RateLimitPolicy;
use bazaar_common::{Locale, PlatformConfig};
use bazaar_ledger::LedgerOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Initial platform settings
    pub platform: PlatformConfig,
    /// Sign-in throttling
    pub rate_limit: RateLimitPolicy,
    /// Ledger behavior
    pub ledger: LedgerOptions,
    /// Language of rendered error messages
    pub locale: Locale,
    /// UTC hour of the daily subscription sweep
    pub sweep_hour_utc: u32,
    /// Delay before the sweep that runs once at startup
    pub startup_sweep_delay_secs: u64,
    /// Period of rate limiter eviction
    pub limiter_cleanup_interval_secs: u64,
    /// Buffered sale notifications before new ones are dropped
    pub notification_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig::default(),
            rate_limit: RateLimitPolicy::default(),
            ledger: LedgerOptions::default(),
            locale: Locale::default(),
            sweep_hour_utc: 2,
            startup_sweep_delay_secs: 60,
            limiter_cleanup_interval_secs: 60,
            notification_queue: 1024,
        }
    }
}

impl ServerConfig {
    /// Load from file
    pub fn load(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), std::io::Error> {
        let invalid = |msg: &str| std::io::Error::new(std::io::ErrorKind::InvalidData, msg.to_string());
        if self.sweep_hour_utc > 23 {
            return Err(invalid("sweep_hour_utc must be between 0 and 23"));
        }
        if self.limiter_cleanup_interval_secs == 0 {
            return Err(invalid("limiter_cleanup_interval_secs must be positive"));
        }
        if self.notification_queue == 0 {
            return Err(invalid("notification_queue must be positive"));
        }
        Ok(())
    }

    /// Startup sweep delay
    pub fn startup_sweep_delay(&self) -> Duration {
        Duration::from_secs(self.startup_sweep_delay_secs)
    }

    /// Limiter cleanup period
    pub fn limiter_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.limiter_cleanup_interval_secs)
    }
}
