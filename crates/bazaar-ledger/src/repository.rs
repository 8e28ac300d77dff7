//! Order and customer persistence ports

use bazaar_common::{CustomerId, OrderId, RepoResult, RepositoryError, TenantId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::customer::{normalize_email, Customer};
use crate::order::Order;

/// Order repository port
pub trait OrderRepository: Send + Sync {
    /// Store an order with all of its lines
    fn insert(&self, order: &Order) -> RepoResult<()>;

    /// Find order by id
    fn find_by_id(&self, id: &OrderId) -> RepoResult<Option<Order>>;

    /// Orders of one tenant, newest first
    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<Order>>;

    /// Orders of one tenant placed in `[from, to)`
    fn find_by_tenant_between(
        &self,
        tenant_id: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Order>>;

    /// Orders of every tenant placed at or after `since`
    fn find_since(&self, since: DateTime<Utc>) -> RepoResult<Vec<Order>>;

    /// Atomically modify one order; `change` returns whether it changed
    /// anything. Returns the stored order when a change was applied.
    fn update(&self, id: &OrderId, change: &mut dyn FnMut(&mut Order) -> bool) -> RepoResult<Option<Order>>;
}

/// Customer repository port
pub trait CustomerRepository: Send + Sync {
    /// Insert or replace a customer; `Conflict` if another customer of the
    /// tenant already has the email
    fn save(&self, customer: &Customer) -> RepoResult<()>;

    /// Atomically modify one customer; `change` returns whether it changed
    /// anything. `Conflict` if the new email clashes within the tenant.
    fn update(&self, id: &CustomerId, change: &mut dyn FnMut(&mut Customer) -> bool)
        -> RepoResult<Option<Customer>>;

    /// Find customer by id
    fn find_by_id(&self, id: &CustomerId) -> RepoResult<Option<Customer>>;

    /// Find a tenant's customer by email, ignoring case
    fn find_by_email_and_tenant(&self, email: &str, tenant_id: &TenantId) -> RepoResult<Option<Customer>>;

    /// Customers of one tenant
    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<Customer>>;
}

/// In-memory order repository
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self { orders: RwLock::new(HashMap::new()) }
    }

    fn collect<F>(&self, keep: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let mut found: Vec<Order> = self.orders.read().values().filter(|o| keep(o)).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        found
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderRepository for InMemoryOrderRepository {
    fn insert(&self, order: &Order) -> RepoResult<()> {
        let mut orders = self.orders.write();
        if orders.contains_key(&order.id) {
            return Err(RepositoryError::Conflict(format!("order {} exists", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &OrderId) -> RepoResult<Option<Order>> {
        Ok(self.orders.read().get(id).cloned())
    }

    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<Order>> {
        Ok(self.collect(|o| &o.tenant_id == tenant_id))
    }

    fn find_by_tenant_between(
        &self,
        tenant_id: &TenantId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Order>> {
        Ok(self.collect(|o| &o.tenant_id == tenant_id && o.created_at >= from && o.created_at < to))
    }

    fn find_since(&self, since: DateTime<Utc>) -> RepoResult<Vec<Order>> {
        Ok(self.collect(|o| o.created_at >= since))
    }

    fn update(&self, id: &OrderId, change: &mut dyn FnMut(&mut Order) -> bool) -> RepoResult<Option<Order>> {
        let mut orders = self.orders.write();
        let stored = orders
            .get_mut(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("order {id}")))?;

        let mut draft = stored.clone();
        if !change(&mut draft) {
            return Ok(None);
        }
        *stored = draft.clone();
        Ok(Some(draft))
    }
}

/// In-memory customer repository
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<CustomerId, Customer>>,
}

impl InMemoryCustomerRepository {
    /// Empty repository
    pub fn new() -> Self {
        Self { customers: RwLock::new(HashMap::new()) }
    }
}

impl InMemoryCustomerRepository {
    fn check_email(customers: &HashMap<CustomerId, Customer>, customer: &Customer) -> RepoResult<()> {
        let email = normalize_email(&customer.email);
        let clash = customers.values().any(|c| {
            c.id != customer.id && c.tenant_id == customer.tenant_id && normalize_email(&c.email) == email
        });
        if clash {
            return Err(RepositoryError::Conflict(format!("customer email {email}")));
        }
        Ok(())
    }
}

impl Default for InMemoryCustomerRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl CustomerRepository for InMemoryCustomerRepository {
    fn save(&self, customer: &Customer) -> RepoResult<()> {
        let mut customers = self.customers.write();
        Self::check_email(&customers, customer)?;
        customers.insert(customer.id, customer.clone());
        Ok(())
    }

    fn update(
        &self,
        id: &CustomerId,
        change: &mut dyn FnMut(&mut Customer) -> bool,
    ) -> RepoResult<Option<Customer>> {
        let mut customers = self.customers.write();
        let mut draft = customers
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(format!("customer {id}")))?;
        if !change(&mut draft) {
            return Ok(None);
        }
        Self::check_email(&customers, &draft)?;
        customers.insert(draft.id, draft.clone());
        Ok(Some(draft))
    }

    fn find_by_id(&self, id: &CustomerId) -> RepoResult<Option<Customer>> {
        Ok(self.customers.read().get(id).cloned())
    }

    fn find_by_email_and_tenant(&self, email: &str, tenant_id: &TenantId) -> RepoResult<Option<Customer>> {
        let email = normalize_email(email);
        Ok(self
            .customers
            .read()
            .values()
            .find(|c| &c.tenant_id == tenant_id && normalize_email(&c.email) == email)
            .cloned())
    }

    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<Customer>> {
        let mut found: Vec<_> = self
            .customers
            .read()
            .values()
            .filter(|c| &c.tenant_id == tenant_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::CustomerContact;

    #[test]
    fn test_customer_email_unique_per_tenant() {
        let repo = InMemoryCustomerRepository::new();
        let tenant = TenantId::new();
        let contact = CustomerContact { name: "Ana".into(), email: "ana@mail.com".into(), ..Default::default() };
        let first = Customer::new(CustomerId::new(), tenant, &contact, Utc::now());
        repo.save(&first).unwrap();

        let twin = Customer::new(CustomerId::new(), tenant, &contact, Utc::now());
        assert!(matches!(repo.save(&twin), Err(RepositoryError::Conflict(_))));

        let elsewhere = Customer::new(CustomerId::new(), TenantId::new(), &contact, Utc::now());
        repo.save(&elsewhere).unwrap();

        let found = repo.find_by_email_and_tenant("ANA@mail.com", &tenant).unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[test]
    fn test_customer_update_keeps_email_unique() {
        let repo = InMemoryCustomerRepository::new();
        let tenant = TenantId::new();
        let ana = CustomerContact { name: "Ana".into(), email: "ana@mail.com".into(), ..Default::default() };
        let bea = CustomerContact { name: "Bea".into(), email: "bea@mail.com".into(), ..Default::default() };
        let first = Customer::new(CustomerId::new(), tenant, &ana, Utc::now());
        let second = Customer::new(CustomerId::new(), tenant, &bea, Utc::now());
        repo.save(&first).unwrap();
        repo.save(&second).unwrap();

        let credited = repo
            .update(&first.id, &mut |c: &mut Customer| {
                c.loyalty_points += 5;
                true
            })
            .unwrap()
            .unwrap();
        assert_eq!(credited.loyalty_points, 5);

        let err = repo
            .update(&second.id, &mut |c: &mut Customer| {
                c.email = "ANA@mail.com".into();
                true
            })
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(repo.find_by_id(&second.id).unwrap().unwrap().email, "bea@mail.com");
        assert!(repo.update(&first.id, &mut |_: &mut Customer| false).unwrap().is_none());
    }
}
