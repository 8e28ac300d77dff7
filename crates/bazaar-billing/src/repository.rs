//! Tenant and payment persistence ports
//!
//! `update` applies a change to a copy under the row lock and stores it only
//! when the closure reports a change, so a record is never half-written.

use bazaar_common::{PaymentId, RepoResult, RepositoryError, TenantId};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::payments::{PaymentStatus, SubscriptionPayment};
use crate::tenant::{SubscriptionStatus, Tenant};

/// Tenant repository port
pub trait TenantRepository: Send + Sync {
    /// Store a new tenant
    fn insert(&self, tenant: &Tenant) -> RepoResult<()>;

    /// Find tenant by id
    fn find_by_id(&self, id: &TenantId) -> RepoResult<Option<Tenant>>;

    /// Tenants currently in `status`
    fn find_by_status(&self, status: SubscriptionStatus) -> RepoResult<Vec<Tenant>>;

    /// Every tenant
    fn list(&self) -> RepoResult<Vec<Tenant>>;

    /// Atomically modify one tenant; `change` returns whether it changed
    /// anything. Returns the stored tenant when a change was applied.
    fn update(
        &self,
        id: &TenantId,
        change: &mut dyn FnMut(&mut Tenant) -> bool,
    ) -> RepoResult<Option<Tenant>>;
}

/// Subscription payment repository port
pub trait PaymentRepository: Send + Sync {
    /// Store a new payment
    fn insert(&self, payment: &SubscriptionPayment) -> RepoResult<()>;

    /// Find payment by id
    fn find_by_id(&self, id: &PaymentId) -> RepoResult<Option<SubscriptionPayment>>;

    /// Payments of one tenant, newest first
    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<SubscriptionPayment>>;

    /// Payments in `status`, oldest first
    fn find_by_status(&self, status: PaymentStatus) -> RepoResult<Vec<SubscriptionPayment>>;

    /// Atomically modify one payment, same contract as [`TenantRepository::update`]
    fn update(
        &self,
        id: &PaymentId,
        change: &mut dyn FnMut(&mut SubscriptionPayment) -> bool,
    ) -> RepoResult<Option<SubscriptionPayment>>;
}

/// In-memory tenant repository
pub struct InMemoryTenantRepository {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self { tenants: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryTenantRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TenantRepository for InMemoryTenantRepository {
    fn insert(&self, tenant: &Tenant) -> RepoResult<()> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(&tenant.id) {
            return Err(RepositoryError::Conflict(format!("tenant {} exists", tenant.id)));
        }
        tenants.insert(tenant.id, tenant.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &TenantId) -> RepoResult<Option<Tenant>> {
        Ok(self.tenants.read().get(id).cloned())
    }

    fn find_by_status(&self, status: SubscriptionStatus) -> RepoResult<Vec<Tenant>> {
        Ok(self
            .tenants
            .read()
            .values()
            .filter(|t| t.subscription_status == status)
            .cloned()
            .collect())
    }

    fn list(&self) -> RepoResult<Vec<Tenant>> {
        let mut all: Vec<_> = self.tenants.read().values().cloned().collect();
        all.sort_by_key(|t| t.created_at);
        Ok(all)
    }

    fn update(
        &self,
        id: &TenantId,
        change: &mut dyn FnMut(&mut Tenant) -> bool,
    ) -> RepoResult<Option<Tenant>> {
        let mut tenants = self.tenants.write();
        let stored = tenants
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("tenant {id}")))?;

        let mut draft = stored.clone();
        if !change(&mut draft) {
            return Ok(None);
        }
        *stored = draft.clone();
        Ok(Some(draft))
    }
}

/// In-memory payment repository
pub struct InMemoryPaymentRepository {
    payments: RwLock<HashMap<PaymentId, SubscriptionPayment>>,
}

impl InMemoryPaymentRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self { payments: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryPaymentRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn insert(&self, payment: &SubscriptionPayment) -> RepoResult<()> {
        let mut payments = self.payments.write();
        if payments.contains_key(&payment.id) {
            return Err(RepositoryError::Conflict(format!("payment {} exists", payment.id)));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &PaymentId) -> RepoResult<Option<SubscriptionPayment>> {
        Ok(self.payments.read().get(id).cloned())
    }

    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<SubscriptionPayment>> {
        let mut found: Vec<_> = self
            .payments
            .read()
            .values()
            .filter(|p| &p.tenant_id == tenant_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(found)
    }

    fn find_by_status(&self, status: PaymentStatus) -> RepoResult<Vec<SubscriptionPayment>> {
        let mut found: Vec<_> = self
            .payments
            .read()
            .values()
            .filter(|p| p.status == status)
            .cloned()
            .collect();
        found.sort_by_key(|p| p.submitted_at);
        Ok(found)
    }

    fn update(
        &self,
        id: &PaymentId,
        change: &mut dyn FnMut(&mut SubscriptionPayment) -> bool,
    ) -> RepoResult<Option<SubscriptionPayment>> {
        let mut payments = self.payments.write();
        let stored = payments
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {id}")))?;

        let mut draft = stored.clone();
        if !change(&mut draft) {
            return Ok(None);
        }
        *stored = draft.clone();
        Ok(Some(draft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::{SignupPlan, TenantProfile};
    use chrono::Utc;

    #[test]
    fn test_update_without_change_stores_nothing() {
        let repo = InMemoryTenantRepository::new();
        let tenant = Tenant::signup(TenantProfile::named("Shop"), SignupPlan::Free, Utc::now());
        repo.insert(&tenant).unwrap();

        let result = repo
            .update(&tenant.id, &mut |t| {
                t.profile.name = "scratch".into();
                false
            })
            .unwrap();

        assert!(result.is_none());
        assert_eq!(repo.find_by_id(&tenant.id).unwrap().unwrap().profile.name, "Shop");
    }

    #[test]
    fn test_update_missing_tenant() {
        let repo = InMemoryTenantRepository::new();
        let err = repo.update(&TenantId::new(), &mut |_| true).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }

    #[test]
    fn test_duplicate_insert_conflicts() {
        let repo = InMemoryTenantRepository::new();
        let tenant = Tenant::signup(TenantProfile::named("Shop"), SignupPlan::Free, Utc::now());
        repo.insert(&tenant).unwrap();
        assert!(matches!(repo.insert(&tenant), Err(RepositoryError::Conflict(_))));
    }
}
