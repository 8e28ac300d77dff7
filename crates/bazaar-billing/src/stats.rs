//! Subscription statistics for the platform owner

use bazaar_common::PlatformConfig;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::tenant::{SubscriptionStatus, Tenant};

/// Tenant counts per status and monthly recurring revenue
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubscriptionStats {
    /// All tenants
    pub total_tenants: usize,
    /// FREE
    pub free: usize,
    /// TRIAL
    pub trial: usize,
    /// PAID
    pub paid: usize,
    /// PAST_DUE
    pub past_due: usize,
    /// SUSPENDED
    pub suspended: usize,
    /// Paid tenants times the monthly plan price
    pub monthly_recurring_revenue: Decimal,
}

impl SubscriptionStats {
    /// Tally tenants against the current plan price
    pub fn compute(tenants: &[Tenant], config: &PlatformConfig) -> Self {
        let mut stats = Self { total_tenants: tenants.len(), ..Default::default() };
        for tenant in tenants {
            match tenant.subscription_status {
                SubscriptionStatus::Free => stats.free += 1,
                SubscriptionStatus::Trial => stats.trial += 1,
                SubscriptionStatus::Paid => stats.paid += 1,
                SubscriptionStatus::PastDue => stats.past_due += 1,
                SubscriptionStatus::Suspended => stats.suspended += 1,
            }
        }
        stats.monthly_recurring_revenue = config.premium_monthly_price * Decimal::from(stats.paid);
        stats
    }
}
