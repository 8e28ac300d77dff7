//! Subscription gate
//!
//! Pure decisions over a tenant's billing state and a configuration
//! snapshot. Nothing here mutates state.

use bazaar_common::{ConfigSource, DenyReason, MarketError};
use std::sync::Arc;

use crate::tenant::{SubscriptionStatus, Tenant};

/// Gate outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead
    Allow,
    /// Refused
    Deny(DenyReason),
}

impl Decision {
    /// Whether the action may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Turn a denial into a business-rule error
    pub fn into_result(self) -> Result<(), MarketError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny(reason) => Err(reason.into()),
        }
    }
}

/// Decides what a tenant may do given its subscription state
pub struct SubscriptionGate {
    config: Arc<dyn ConfigSource>,
}

impl SubscriptionGate {
    /// Gate reading limits from `config`
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self { config }
    }

    /// Orders are open to PAID and TRIAL tenants only
    pub fn can_create_order(&self, tenant: &Tenant) -> Decision {
        match tenant.subscription_status {
            SubscriptionStatus::Paid | SubscriptionStatus::Trial => Decision::Allow,
            SubscriptionStatus::Free => Decision::Deny(DenyReason::UpgradeRequired),
            SubscriptionStatus::PastDue => Decision::Deny(DenyReason::RenewToContinue),
            SubscriptionStatus::Suspended => Decision::Deny(DenyReason::ContactAdmin),
        }
    }

    /// FREE tenants are capped; lapsed or suspended tenants cannot list
    pub fn can_create_listing(&self, tenant: &Tenant, current_listing_count: u64) -> Decision {
        match tenant.subscription_status {
            SubscriptionStatus::PastDue => Decision::Deny(DenyReason::RenewToContinue),
            SubscriptionStatus::Suspended => Decision::Deny(DenyReason::ContactAdmin),
            SubscriptionStatus::Free | SubscriptionStatus::Paid | SubscriptionStatus::Trial => {
                match self.listing_cap(tenant) {
                    Some(limit) if current_listing_count >= u64::from(limit) => {
                        Decision::Deny(DenyReason::FreePlanLimit { limit })
                    }
                    _ => Decision::Allow,
                }
            }
        }
    }

    /// Most listings the tenant may hold, `None` when unlimited.
    ///
    /// Stores enforce it again at insert time so concurrent creates cannot
    /// overshoot the count checked by [`Self::can_create_listing`].
    pub fn listing_cap(&self, tenant: &Tenant) -> Option<u32> {
        (tenant.subscription_status == SubscriptionStatus::Free)
            .then(|| self.config.current().free_plan_product_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::{SignupPlan, TenantProfile};
    use bazaar_common::PlatformConfig;
    use chrono::Utc;

    fn tenant(status: SubscriptionStatus) -> Tenant {
        let mut t = Tenant::signup(TenantProfile::named("Shop"), SignupPlan::Free, Utc::now());
        t.subscription_status = status;
        t
    }

    fn gate(limit: u32) -> SubscriptionGate {
        SubscriptionGate::new(Arc::new(PlatformConfig {
            free_plan_product_limit: limit,
            ..Default::default()
        }))
    }

    #[test]
    fn test_order_gate_by_status() {
        let gate = gate(10);
        let cases = [
            (SubscriptionStatus::Paid, Decision::Allow),
            (SubscriptionStatus::Trial, Decision::Allow),
            (SubscriptionStatus::Free, Decision::Deny(DenyReason::UpgradeRequired)),
            (SubscriptionStatus::PastDue, Decision::Deny(DenyReason::RenewToContinue)),
            (SubscriptionStatus::Suspended, Decision::Deny(DenyReason::ContactAdmin)),
        ];
        for (status, expected) in cases {
            assert_eq!(gate.can_create_order(&tenant(status)), expected, "{status}");
        }
    }

    #[test]
    fn test_free_plan_limit() {
        let gate = gate(10);
        let free = tenant(SubscriptionStatus::Free);
        assert!(gate.can_create_listing(&free, 9).is_allowed());
        assert_eq!(
            gate.can_create_listing(&free, 10),
            Decision::Deny(DenyReason::FreePlanLimit { limit: 10 })
        );
    }

    #[test]
    fn test_listing_cap_only_for_free() {
        let gate = gate(7);
        assert_eq!(gate.listing_cap(&tenant(SubscriptionStatus::Free)), Some(7));
        assert_eq!(gate.listing_cap(&tenant(SubscriptionStatus::Paid)), None);
        assert_eq!(gate.listing_cap(&tenant(SubscriptionStatus::Trial)), None);
    }

    #[test]
    fn test_limit_comes_from_injected_config() {
        let free = tenant(SubscriptionStatus::Free);
        assert!(!gate(2).can_create_listing(&free, 2).is_allowed());
        assert!(gate(50).can_create_listing(&free, 2).is_allowed());
    }

    #[test]
    fn test_paid_listing_is_unlimited() {
        let gate = gate(10);
        assert!(gate.can_create_listing(&tenant(SubscriptionStatus::Paid), 10_000).is_allowed());
        assert!(gate.can_create_listing(&tenant(SubscriptionStatus::Trial), 10_000).is_allowed());
    }

    #[test]
    fn test_lapsed_tenants_cannot_list() {
        let gate = gate(10);
        assert_eq!(
            gate.can_create_listing(&tenant(SubscriptionStatus::PastDue), 0),
            Decision::Deny(DenyReason::RenewToContinue)
        );
        assert_eq!(
            gate.can_create_listing(&tenant(SubscriptionStatus::Suspended), 0),
            Decision::Deny(DenyReason::ContactAdmin)
        );
    }

    #[test]
    fn test_denial_maps_to_business_rule() {
        let err = gate(10)
            .can_create_order(&tenant(SubscriptionStatus::Free))
            .into_result()
            .unwrap_err();
        assert_eq!(err.code(), "subscription.upgrade_required");
    }
}
