//! Marketplace checkout
//!
//! A buyer orders one listing from the public storefront. The seller is the
//! listing's tenant; gate and stock rules are the stock ledger's. The
//! customer record and the seller notification are written only after the
//! order commits, so a refused order leaves nothing behind. Two first
//! orders racing on one email end up on a single customer record. The
//! storefront takes no orders while the platform is in maintenance.

use bazaar_catalog::ListingRepository;
use bazaar_common::{
    BusinessRuleViolation, Clock, ConfigSource, CustomerId, ListingId, MarketError, MarketResult, RepositoryError,
    TenantId,
};
use std::sync::Arc;

use crate::customer::{Customer, CustomerContact};
use crate::notify::{Notifier, SaleEvent};
use crate::order::{LineRequest, NewOrder, Order};
use crate::repository::CustomerRepository;
use crate::stock::StockLedger;

const MAX_CUSTOMER_ATTEMPTS: usize = 3;

/// Public order entry point
pub struct MarketplaceCheckout {
    ledger: Arc<StockLedger>,
    listings: Arc<dyn ListingRepository>,
    customers: Arc<dyn CustomerRepository>,
    config: Arc<dyn ConfigSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl MarketplaceCheckout {
    /// Create checkout
    pub fn new(
        ledger: Arc<StockLedger>,
        listings: Arc<dyn ListingRepository>,
        customers: Arc<dyn CustomerRepository>,
        config: Arc<dyn ConfigSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { ledger, listings, customers, config, notifier, clock }
    }

    /// Buy `quantity` units of a listing
    pub fn place_order(
        &self,
        listing_id: &ListingId,
        quantity: u32,
        contact: CustomerContact,
    ) -> MarketResult<Order> {
        if self.config.current().maintenance_mode {
            tracing::debug!(listing = %listing_id, "checkout refused during maintenance");
            return Err(BusinessRuleViolation::StorefrontClosed.into());
        }
        if contact.email.trim().is_empty() {
            return Err(MarketError::validation("customer email is required"));
        }
        if contact.name.trim().is_empty() {
            return Err(MarketError::validation("customer name is required"));
        }

        let listing = self
            .listings
            .find_by_id(listing_id)?
            .ok_or_else(|| MarketError::not_found("listing", listing_id))?;
        let seller = listing.tenant_id;

        let existing = self.customers.find_by_email_and_tenant(&contact.email, &seller)?;
        let customer_id = existing.as_ref().map(|c| c.id).unwrap_or_default();

        let order = self.ledger.create_for_new_customer(
            &seller,
            NewOrder {
                customer_id: Some(customer_id),
                lines: vec![LineRequest { listing_id: *listing_id, quantity }],
                ..Default::default()
            },
        )?;

        let order = match self.credit_customer(&order, seller, customer_id, &contact) {
            Ok(customer) if order.customer_id != Some(customer.id) => {
                tracing::debug!(order = %order.id, customer = %customer.id, "order moved to existing customer");
                match self.ledger.assign_customer(&order.id, customer.id) {
                    Ok(Some(updated)) => updated,
                    Ok(None) => order,
                    Err(err) => {
                        tracing::error!(order = %order.id, customer = %customer.id, error = %err, "order customer not updated");
                        order
                    }
                }
            }
            Ok(_) => order,
            Err(err) => {
                tracing::error!(order = %order.id, error = %err, "customer update failed after order commit");
                order
            }
        };

        let event = SaleEvent {
            tenant_id: seller,
            order_id: order.id,
            amount: order.total_amount,
            customer_name: contact.name.trim().to_string(),
        };
        if let Err(err) = self.notifier.notify(event) {
            tracing::warn!(order = %order.id, error = %err, "sale notification dropped");
        }

        tracing::info!(tenant = %seller, order = %order.id, "marketplace order placed");
        Ok(order)
    }

    /// Record the buyer's contact and points on their customer record,
    /// creating it under `new_id` when the email is new to the seller
    fn credit_customer(
        &self,
        order: &Order,
        seller: TenantId,
        new_id: CustomerId,
        contact: &CustomerContact,
    ) -> MarketResult<Customer> {
        let mut credit = |c: &mut Customer| {
            c.apply_contact(contact);
            c.award_points(order.total_amount);
            true
        };

        for attempt in 1..=MAX_CUSTOMER_ATTEMPTS {
            if let Some(existing) = self.customers.find_by_email_and_tenant(&contact.email, &seller)? {
                match self.customers.update(&existing.id, &mut credit) {
                    Ok(Some(customer)) => return Ok(customer),
                    Ok(None) => return Ok(existing),
                    // Removed between lookup and update
                    Err(RepositoryError::NotFound(_)) => continue,
                    Err(err) => return Err(err.into()),
                }
            }

            let mut customer = Customer::new(new_id, seller, contact, self.clock.now());
            credit(&mut customer);
            match self.customers.save(&customer) {
                Ok(()) => return Ok(customer),
                Err(RepositoryError::Conflict(reason)) => {
                    tracing::debug!(order = %order.id, attempt, %reason, "customer created concurrently, crediting it");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepositoryError::Conflict(format!("customer {} is busy", contact.email.trim())).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotifyError, NullNotifier};
    use crate::repository::{InMemoryCustomerRepository, InMemoryOrderRepository, OrderRepository};
    use crate::stock::LedgerOptions;
    use bazaar_billing::{
        InMemoryTenantRepository, SignupPlan, SubscriptionGate, SubscriptionStatus, Tenant, TenantProfile,
        TenantRepository,
    };
    use bazaar_catalog::{DisplayFields, InMemoryListingRepository, Listing};
    use bazaar_common::{PlatformConfig, RepoResult, SystemClock};
    use chrono::Utc;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<SaleEvent>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: SaleEvent) -> Result<(), NotifyError> {
            self.events.lock().push(event);
            Ok(())
        }
    }

    struct FullNotifier;

    impl Notifier for FullNotifier {
        fn notify(&self, _: SaleEvent) -> Result<(), NotifyError> {
            Err(NotifyError::Full)
        }
    }

    struct Fixture {
        checkout: MarketplaceCheckout,
        tenants: Arc<InMemoryTenantRepository>,
        listings: Arc<InMemoryListingRepository>,
        customers: Arc<InMemoryCustomerRepository>,
    }

    fn fixture(notifier: Arc<dyn Notifier>) -> Fixture {
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let listings = Arc::new(InMemoryListingRepository::new());
        let customers = Arc::new(InMemoryCustomerRepository::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Arc::new(StockLedger::new(
            tenants.clone(),
            listings.clone(),
            Arc::new(InMemoryOrderRepository::new()),
            customers.clone(),
            Arc::new(SubscriptionGate::new(Arc::new(PlatformConfig::default()))),
            clock.clone(),
            LedgerOptions::default(),
        ));
        let checkout = MarketplaceCheckout::new(
            ledger,
            listings.clone(),
            customers.clone(),
            Arc::new(PlatformConfig::default()),
            notifier,
            clock,
        );
        Fixture { checkout, tenants, listings, customers }
    }

    impl Fixture {
        fn shop(&self, status: SubscriptionStatus) -> TenantId {
            let mut t = Tenant::signup(TenantProfile::named("Shop"), SignupPlan::Free, Utc::now());
            t.subscription_status = status;
            self.tenants.insert(&t).unwrap();
            t.id
        }

        fn listing(&self, tenant: TenantId, price: Decimal, stock: u32) -> ListingId {
            let now = Utc::now();
            let listing = Listing {
                id: ListingId::new(),
                tenant_id: tenant,
                sku: None,
                display: DisplayFields::named("Coffee Beans"),
                category: None,
                variant: None,
                price,
                cost_price: dec!(4),
                stock,
                min_stock: 0,
                catalog_entry_id: None,
                version: 0,
                created_at: now,
                updated_at: now,
            };
            self.listings.insert(&listing).unwrap();
            listing.id
        }
    }

    fn ana() -> CustomerContact {
        CustomerContact {
            name: "Ana".into(),
            email: "ana@mail.com".into(),
            phone: Some("555-0101".into()),
            address: None,
        }
    }

    #[test]
    fn test_order_credits_points_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let f = fixture(notifier.clone());
        let shop = f.shop(SubscriptionStatus::Paid);
        let beans = f.listing(shop, dec!(7.99), 10);

        let order = f.checkout.place_order(&beans, 3, ana()).unwrap();

        assert_eq!(order.tenant_id, shop);
        assert_eq!(order.total_amount, dec!(23.97));
        let customer = f.customers.find_by_email_and_tenant("ana@mail.com", &shop).unwrap().unwrap();
        assert_eq!(order.customer_id, Some(customer.id));
        assert_eq!(customer.loyalty_points, 23);

        let events = notifier.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].customer_name, "Ana");
        assert_eq!(events[0].amount, dec!(23.97));
    }

    #[test]
    fn test_returning_customer_is_updated() {
        let f = fixture(Arc::new(NullNotifier));
        let shop = f.shop(SubscriptionStatus::Trial);
        let beans = f.listing(shop, dec!(10), 10);

        let first = f.checkout.place_order(&beans, 1, ana()).unwrap();
        let mut moved = ana();
        moved.email = "ANA@mail.com".into();
        moved.address = Some("Calle 5".into());
        let second = f.checkout.place_order(&beans, 2, moved).unwrap();

        assert_eq!(first.customer_id, second.customer_id);
        let customers = f.customers.find_by_tenant(&shop).unwrap();
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].loyalty_points, 30);
        assert_eq!(customers[0].address.as_deref(), Some("Calle 5"));
    }

    #[test]
    fn test_refused_order_leaves_no_customer() {
        let notifier = Arc::new(RecordingNotifier::default());
        let f = fixture(notifier.clone());
        let free = f.shop(SubscriptionStatus::Free);
        let beans = f.listing(free, dec!(10), 10);

        let err = f.checkout.place_order(&beans, 1, ana()).unwrap_err();
        assert_eq!(err.code(), "subscription.upgrade_required");

        let paid = f.shop(SubscriptionStatus::Paid);
        let scarce = f.listing(paid, dec!(10), 1);
        let err = f.checkout.place_order(&scarce, 2, ana()).unwrap_err();
        assert_eq!(err.code(), "stock.insufficient");

        assert!(f.customers.find_by_tenant(&free).unwrap().is_empty());
        assert!(f.customers.find_by_tenant(&paid).unwrap().is_empty());
        assert!(notifier.events.lock().is_empty());
    }

    #[test]
    fn test_notifier_failure_does_not_fail_order() {
        let f = fixture(Arc::new(FullNotifier));
        let shop = f.shop(SubscriptionStatus::Paid);
        let beans = f.listing(shop, dec!(5), 2);

        f.checkout.place_order(&beans, 1, ana()).unwrap();
        assert_eq!(f.listings.find_by_id(&beans).unwrap().unwrap().stock, 1);
    }

    /// Customer store whose email lookup is slow, so racing first orders
    /// all see the email as new
    struct SlowLookup(InMemoryCustomerRepository);

    impl CustomerRepository for SlowLookup {
        fn save(&self, customer: &Customer) -> RepoResult<()> {
            self.0.save(customer)
        }
        fn update(
            &self,
            id: &CustomerId,
            change: &mut dyn FnMut(&mut Customer) -> bool,
        ) -> RepoResult<Option<Customer>> {
            self.0.update(id, change)
        }
        fn find_by_id(&self, id: &CustomerId) -> RepoResult<Option<Customer>> {
            self.0.find_by_id(id)
        }
        fn find_by_email_and_tenant(&self, email: &str, tenant_id: &TenantId) -> RepoResult<Option<Customer>> {
            let found = self.0.find_by_email_and_tenant(email, tenant_id);
            std::thread::sleep(std::time::Duration::from_millis(50));
            found
        }
        fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<Customer>> {
            self.0.find_by_tenant(tenant_id)
        }
    }

    #[test]
    fn test_racing_first_orders_share_one_customer() {
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let listings = Arc::new(InMemoryListingRepository::new());
        let orders = Arc::new(InMemoryOrderRepository::new());
        let customers = Arc::new(SlowLookup(InMemoryCustomerRepository::new()));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Arc::new(StockLedger::new(
            tenants.clone(),
            listings.clone(),
            orders.clone(),
            customers.clone(),
            Arc::new(SubscriptionGate::new(Arc::new(PlatformConfig::default()))),
            clock.clone(),
            LedgerOptions::default(),
        ));
        let checkout = MarketplaceCheckout::new(
            ledger,
            listings.clone(),
            customers.clone(),
            Arc::new(PlatformConfig::default()),
            Arc::new(NullNotifier),
            clock,
        );
        let mut shop = Tenant::signup(TenantProfile::named("Shop"), SignupPlan::Free, Utc::now());
        shop.subscription_status = SubscriptionStatus::Paid;
        tenants.insert(&shop).unwrap();
        let now = Utc::now();
        let beans = Listing {
            id: ListingId::new(),
            tenant_id: shop.id,
            sku: None,
            display: DisplayFields::named("Coffee Beans"),
            category: None,
            variant: None,
            price: dec!(10),
            cost_price: dec!(4),
            stock: 10,
            min_stock: 0,
            catalog_entry_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        listings.insert(&beans).unwrap();

        let beans = beans.id;
        std::thread::scope(|s| {
            for _ in 0..4 {
                let checkout = &checkout;
                s.spawn(move || checkout.place_order(&beans, 1, ana()).unwrap());
            }
        });

        let stored = customers.find_by_tenant(&shop.id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].loyalty_points, 40);
        let placed = orders.find_by_tenant(&shop.id).unwrap();
        assert_eq!(placed.len(), 4);
        for order in placed {
            assert_eq!(order.customer_id, Some(stored[0].id));
        }
    }

    #[test]
    fn test_contact_is_required() {
        let f = fixture(Arc::new(NullNotifier));
        let shop = f.shop(SubscriptionStatus::Paid);
        let beans = f.listing(shop, dec!(5), 2);

        let mut nameless = ana();
        nameless.name = " ".into();
        assert!(matches!(f.checkout.place_order(&beans, 1, nameless), Err(MarketError::Validation(_))));
        assert!(matches!(
            f.checkout.place_order(&ListingId::new(), 1, ana()),
            Err(MarketError::NotFound { .. })
        ));
    }
}
