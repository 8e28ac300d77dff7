//! Subscription use cases: signup, payment review, admin overrides

use bazaar_common::{
    BusinessRuleViolation, Clock, ConfigSource, MarketError, MarketResult, PaymentId,
    RepositoryError, TenantId,
};
use std::sync::Arc;

use crate::payments::{NewPayment, PaymentStatus, SubscriptionPayment};
use crate::repository::{PaymentRepository, TenantRepository};
use crate::stats::SubscriptionStats;
use crate::tenant::{SignupPlan, SubscriptionStatus, Tenant, TenantProfile};

/// Result of approving a payment
#[derive(Debug, Clone)]
pub struct ApprovedPayment {
    /// The approved payment
    pub payment: SubscriptionPayment,
    /// Tenant after the subscription was extended
    pub tenant: Tenant,
}

/// Subscription application service
pub struct SubscriptionService {
    tenants: Arc<dyn TenantRepository>,
    payments: Arc<dyn PaymentRepository>,
    config: Arc<dyn ConfigSource>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionService {
    /// Create service
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        payments: Arc<dyn PaymentRepository>,
        config: Arc<dyn ConfigSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { tenants, payments, config, clock }
    }

    /// Register a seller
    pub fn signup(&self, profile: TenantProfile, plan: SignupPlan) -> MarketResult<Tenant> {
        if profile.name.trim().is_empty() {
            return Err(MarketError::validation("store name is required"));
        }
        let tenant = Tenant::signup(profile, plan, self.clock.now());
        self.tenants.insert(&tenant)?;
        tracing::info!(tenant = %tenant.id, status = %tenant.subscription_status, "tenant signed up");
        Ok(tenant)
    }

    /// Load a tenant
    pub fn tenant(&self, id: &TenantId) -> MarketResult<Tenant> {
        self.tenants
            .find_by_id(id)?
            .ok_or_else(|| MarketError::not_found("tenant", id))
    }

    /// Replace a tenant's storefront details
    pub fn update_profile(&self, id: &TenantId, profile: TenantProfile) -> MarketResult<Tenant> {
        if profile.name.trim().is_empty() {
            return Err(MarketError::validation("store name is required"));
        }
        let now = self.clock.now();
        let updated = self.tenants.update(id, &mut |t: &mut Tenant| {
            t.profile = profile.clone();
            t.updated_at = now;
            true
        })?;
        updated.ok_or_else(|| MarketError::not_found("tenant", id))
    }

    /// Tenant reports a payment for review
    pub fn submit_payment(&self, tenant_id: &TenantId, payment: NewPayment) -> MarketResult<SubscriptionPayment> {
        payment.validate()?;
        self.tenant(tenant_id)?;

        let payment = SubscriptionPayment::submit(*tenant_id, payment, self.clock.now());
        self.payments.insert(&payment)?;
        tracing::info!(tenant = %tenant_id, payment = %payment.id, amount = %payment.amount, "subscription payment submitted");
        Ok(payment)
    }

    /// Payment history of a tenant
    pub fn payments_for(&self, tenant_id: &TenantId) -> MarketResult<Vec<SubscriptionPayment>> {
        Ok(self.payments.find_by_tenant(tenant_id)?)
    }

    /// Review queue
    pub fn pending_payments(&self) -> MarketResult<Vec<SubscriptionPayment>> {
        Ok(self.payments.find_by_status(PaymentStatus::Pending)?)
    }

    /// Approve a PENDING payment: tenant becomes PAID and gains 30 days
    /// counted from the later of now and its current end date
    pub fn approve_payment(&self, id: &PaymentId) -> MarketResult<ApprovedPayment> {
        let payment = self.payment(id)?;
        ensure_pending(&payment)?;
        self.tenant(&payment.tenant_id)?;

        let now = self.clock.now();
        let approved = self.decide(id, PaymentStatus::Approved, None)?;

        let extended = self.tenants.update(&payment.tenant_id, &mut |t: &mut Tenant| {
            t.apply_approved_payment(now);
            true
        });

        let tenant = match extended {
            Ok(Some(tenant)) => tenant,
            Ok(None) => return Err(MarketError::not_found("tenant", payment.tenant_id)),
            Err(err) => {
                // Put the payment back so it can be approved again
                let reopened = self.payments.update(id, &mut |p: &mut SubscriptionPayment| {
                    if p.status != PaymentStatus::Approved {
                        return false;
                    }
                    p.status = PaymentStatus::Pending;
                    p.decided_at = None;
                    true
                });
                match reopened {
                    Ok(Some(_)) => {
                        tracing::warn!(payment = %id, error = %err, "subscription not extended, payment reopened");
                    }
                    Ok(None) => {
                        tracing::error!(payment = %id, error = %err, "subscription not extended and payment changed meanwhile");
                    }
                    Err(undo) => {
                        tracing::error!(payment = %id, error = %err, undo = %undo, "subscription not extended and payment left approved");
                    }
                }
                return Err(err.into());
            }
        };

        tracing::info!(
            tenant = %tenant.id,
            payment = %id,
            ends = ?tenant.subscription_end_date,
            "payment approved, subscription extended"
        );
        Ok(ApprovedPayment { payment: approved, tenant })
    }

    /// Reject a PENDING payment; the tenant's status is not touched
    pub fn reject_payment(&self, id: &PaymentId, reason: &str) -> MarketResult<SubscriptionPayment> {
        let payment = self.payment(id)?;
        ensure_pending(&payment)?;

        let reason = reason.trim();
        let notes = (!reason.is_empty()).then(|| reason.to_string());
        let rejected = self.decide(id, PaymentStatus::Rejected, notes)?;
        tracing::info!(tenant = %rejected.tenant_id, payment = %id, "payment rejected");
        Ok(rejected)
    }

    /// Platform owner override; `raw_status` comes straight from the request
    pub fn admin_set_status(&self, id: &TenantId, raw_status: &str) -> MarketResult<Tenant> {
        let status: SubscriptionStatus = raw_status.parse()?;
        let now = self.clock.now();

        let updated = self.tenants.update(id, &mut |t: &mut Tenant| {
            t.set_status(status, now);
            true
        })?;
        let tenant = updated.ok_or_else(|| MarketError::not_found("tenant", id))?;
        tracing::warn!(tenant = %id, status = %status, "subscription status overridden by admin");
        Ok(tenant)
    }

    /// Tenant counts and recurring revenue
    pub fn stats(&self) -> MarketResult<SubscriptionStats> {
        let tenants = self.tenants.list()?;
        Ok(SubscriptionStats::compute(&tenants, &self.config.current()))
    }

    fn payment(&self, id: &PaymentId) -> MarketResult<SubscriptionPayment> {
        self.payments
            .find_by_id(id)?
            .ok_or_else(|| MarketError::not_found("payment", id))
    }

    fn decide(
        &self,
        id: &PaymentId,
        status: PaymentStatus,
        notes: Option<String>,
    ) -> MarketResult<SubscriptionPayment> {
        let now = self.clock.now();
        let decided = self.payments.update(id, &mut |p: &mut SubscriptionPayment| {
            p.decide(status, notes.clone(), now)
        })?;

        match decided {
            Some(payment) => Ok(payment),
            // Lost a race with another reviewer
            None => {
                ensure_pending(&self.payment(id)?)?;
                Err(RepositoryError::Conflict(format!("payment {id}")).into())
            }
        }
    }
}

fn ensure_pending(payment: &SubscriptionPayment) -> MarketResult<()> {
    if payment.status == PaymentStatus::Pending {
        Ok(())
    } else {
        Err(BusinessRuleViolation::PaymentNotPending { status: payment.status.to_string() }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryPaymentRepository, InMemoryTenantRepository};
    use bazaar_common::{ManualClock, PlatformConfig, RepoResult};
    use std::sync::atomic::{AtomicBool, Ordering};
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    struct Fixture {
        service: SubscriptionService,
        tenants: Arc<InMemoryTenantRepository>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let service = SubscriptionService::new(
            tenants.clone(),
            Arc::new(InMemoryPaymentRepository::new()),
            Arc::new(PlatformConfig::default()),
            clock.clone(),
        );
        Fixture { service, tenants, clock }
    }

    fn fifteen() -> NewPayment {
        NewPayment { amount: dec!(15), method: "Zelle".into(), reference: "REF-1".into() }
    }

    #[test]
    fn test_approve_sets_paid_and_thirty_days() {
        let f = fixture();
        let tenant = f.service.signup(TenantProfile::named("Shop"), SignupPlan::Free).unwrap();
        let payment = f.service.submit_payment(&tenant.id, fifteen()).unwrap();

        let approved = f.service.approve_payment(&payment.id).unwrap();

        let now = f.clock.now();
        assert_eq!(approved.payment.status, PaymentStatus::Approved);
        assert_eq!(approved.tenant.subscription_status, SubscriptionStatus::Paid);
        assert_eq!(approved.tenant.subscription_end_date, Some(now + Duration::days(30)));
    }

    /// Tenant store whose updates fail while `failing` is set
    struct FailingUpdates {
        inner: InMemoryTenantRepository,
        failing: AtomicBool,
    }

    impl TenantRepository for FailingUpdates {
        fn insert(&self, tenant: &Tenant) -> RepoResult<()> {
            self.inner.insert(tenant)
        }
        fn find_by_id(&self, id: &TenantId) -> RepoResult<Option<Tenant>> {
            self.inner.find_by_id(id)
        }
        fn find_by_status(&self, status: SubscriptionStatus) -> RepoResult<Vec<Tenant>> {
            self.inner.find_by_status(status)
        }
        fn list(&self) -> RepoResult<Vec<Tenant>> {
            self.inner.list()
        }
        fn update(
            &self,
            id: &TenantId,
            change: &mut dyn FnMut(&mut Tenant) -> bool,
        ) -> RepoResult<Option<Tenant>> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RepositoryError::StorageError("connection reset".into()));
            }
            self.inner.update(id, change)
        }
    }

    #[test]
    fn test_failed_extension_reopens_payment() {
        let tenants = Arc::new(FailingUpdates { inner: InMemoryTenantRepository::new(), failing: AtomicBool::new(false) });
        let payments = Arc::new(InMemoryPaymentRepository::new());
        let service = SubscriptionService::new(
            tenants.clone(),
            payments.clone(),
            Arc::new(PlatformConfig::default()),
            Arc::new(ManualClock::new(Utc::now())),
        );
        let tenant = service.signup(TenantProfile::named("Shop"), SignupPlan::Free).unwrap();
        let payment = service.submit_payment(&tenant.id, fifteen()).unwrap();

        tenants.failing.store(true, Ordering::SeqCst);
        let err = service.approve_payment(&payment.id).unwrap_err();

        assert!(matches!(err, MarketError::Repository(RepositoryError::StorageError(_))));
        let stored = payments.find_by_id(&payment.id).unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
        assert_eq!(stored.decided_at, None);

        tenants.failing.store(false, Ordering::SeqCst);
        let approved = service.approve_payment(&payment.id).unwrap();
        assert_eq!(approved.tenant.subscription_status, SubscriptionStatus::Paid);
    }

    #[test]
    fn test_remaining_time_accumulates() {
        let f = fixture();
        let tenant = f.service.signup(TenantProfile::named("Shop"), SignupPlan::Free).unwrap();
        let first = f.service.submit_payment(&tenant.id, fifteen()).unwrap();
        f.service.approve_payment(&first.id).unwrap();

        f.clock.advance(Duration::days(10));
        let second = f.service.submit_payment(&tenant.id, fifteen()).unwrap();
        let approved = f.service.approve_payment(&second.id).unwrap();

        // 20 days left + 30 new days
        let now = f.clock.now();
        assert_eq!(approved.tenant.subscription_end_date, Some(now + Duration::days(50)));
    }

    #[test]
    fn test_payment_decided_only_once() {
        let f = fixture();
        let tenant = f.service.signup(TenantProfile::named("Shop"), SignupPlan::Free).unwrap();
        let payment = f.service.submit_payment(&tenant.id, fifteen()).unwrap();
        f.service.approve_payment(&payment.id).unwrap();

        let err = f.service.approve_payment(&payment.id).unwrap_err();
        assert_eq!(err.code(), "payment.not_pending");
        let err = f.service.reject_payment(&payment.id, "late").unwrap_err();
        assert_eq!(err.code(), "payment.not_pending");
    }

    #[test]
    fn test_reject_keeps_tenant_status() {
        let f = fixture();
        let tenant = f.service.signup(TenantProfile::named("Shop"), SignupPlan::Trial).unwrap();
        let payment = f.service.submit_payment(&tenant.id, fifteen()).unwrap();

        let rejected = f.service.reject_payment(&payment.id, "receipt does not match").unwrap();

        assert_eq!(rejected.status, PaymentStatus::Rejected);
        assert_eq!(rejected.notes.as_deref(), Some("receipt does not match"));
        let stored = f.tenants.find_by_id(&tenant.id).unwrap().unwrap();
        assert_eq!(stored.subscription_status, SubscriptionStatus::Trial);
        assert!(stored.subscription_end_date.is_none());
    }

    #[test]
    fn test_unknown_payment() {
        let f = fixture();
        let err = f.service.approve_payment(&PaymentId::new()).unwrap_err();
        assert!(matches!(err, MarketError::NotFound { entity: "payment", .. }));
    }

    #[test]
    fn test_admin_status_is_parsed() {
        let f = fixture();
        let tenant = f.service.signup(TenantProfile::named("Shop"), SignupPlan::Free).unwrap();

        let err = f.service.admin_set_status(&tenant.id, "GOLD").unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));

        let updated = f.service.admin_set_status(&tenant.id, "suspended").unwrap();
        assert_eq!(updated.subscription_status, SubscriptionStatus::Suspended);
    }

    #[test]
    fn test_signup_requires_name() {
        let f = fixture();
        let err = f.service.signup(TenantProfile::named("  "), SignupPlan::Free).unwrap_err();
        assert!(matches!(err, MarketError::Validation(_)));
    }

    #[test]
    fn test_pending_queue() {
        let f = fixture();
        let tenant = f.service.signup(TenantProfile::named("Shop"), SignupPlan::Free).unwrap();
        let a = f.service.submit_payment(&tenant.id, fifteen()).unwrap();
        let b = f.service.submit_payment(&tenant.id, fifteen()).unwrap();
        f.service.reject_payment(&a.id, "").unwrap();

        let pending = f.service.pending_payments().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
        assert_eq!(f.service.payments_for(&tenant.id).unwrap().len(), 2);
    }
}
