//! Stock ledger
//!
//! Turns a cart into a persisted order while keeping listing stock
//! consistent. Stock is checked and decremented through version-checked
//! batch writes: every listing in the order moves together or none does,
//! and a concurrent writer forces a re-read instead of a lost update.

use bazaar_billing::{SubscriptionGate, Tenant, TenantRepository};
use bazaar_catalog::{Listing, ListingRepository, StockChange};
use bazaar_common::{
    BusinessRuleViolation, Clock, CustomerId, ListingId, MarketError, MarketResult, OrderId, RepositoryError,
    TenantId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::order::{LineRequest, NewOrder, Order, OrderLine, OrderStatus, PaymentMethod};
use crate::repository::{CustomerRepository, OrderRepository};

const MAX_STOCK_ATTEMPTS: usize = 5;

/// Ledger behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerOptions {
    /// Return each line's quantity to stock when an order is cancelled
    pub restock_on_cancel: bool,
}

/// Goods received from a supplier for one listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseLine {
    /// Restocked listing
    pub listing_id: ListingId,
    /// Units received
    pub quantity: u32,
    /// New purchase cost per unit
    pub unit_cost: Decimal,
}

/// Result of receiving a purchase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseReceipt {
    /// Receiving tenant
    pub tenant_id: TenantId,
    /// Lines as submitted
    pub lines: Vec<PurchaseLine>,
    /// Sum of quantity times unit cost
    pub total_cost: Decimal,
    /// Listings after the stock increase
    pub listings: Vec<Listing>,
    /// Receipt time
    pub received_at: DateTime<Utc>,
}

struct Restock {
    listing_id: ListingId,
    quantity: u32,
    cost_price: Option<Decimal>,
}

/// Order creation, status changes and stock receipts
pub struct StockLedger {
    tenants: Arc<dyn TenantRepository>,
    listings: Arc<dyn ListingRepository>,
    orders: Arc<dyn OrderRepository>,
    customers: Arc<dyn CustomerRepository>,
    gate: Arc<SubscriptionGate>,
    clock: Arc<dyn Clock>,
    options: LedgerOptions,
}

impl StockLedger {
    /// Create ledger
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        listings: Arc<dyn ListingRepository>,
        orders: Arc<dyn OrderRepository>,
        customers: Arc<dyn CustomerRepository>,
        gate: Arc<SubscriptionGate>,
        clock: Arc<dyn Clock>,
        options: LedgerOptions,
    ) -> Self {
        Self { tenants, listings, orders, customers, gate, clock, options }
    }

    /// Active options
    pub fn options(&self) -> LedgerOptions {
        self.options
    }

    /// Place an order on behalf of `tenant_id`.
    ///
    /// Fails without side effects when the gate denies, a line is invalid,
    /// a listing belongs to another tenant or stock is short.
    pub fn create_order(&self, tenant_id: &TenantId, order: NewOrder) -> MarketResult<Order> {
        self.gated_tenant(tenant_id)?;

        if let Some(customer_id) = &order.customer_id {
            let customer = self
                .customers
                .find_by_id(customer_id)?
                .ok_or_else(|| MarketError::not_found("customer", customer_id))?;
            if &customer.tenant_id != tenant_id {
                return Err(MarketError::forbidden("customer belongs to another store"));
            }
        }

        self.commit(tenant_id, order)
    }

    /// Order for a customer the caller vouches for (not yet persisted)
    pub(crate) fn create_for_new_customer(&self, tenant_id: &TenantId, order: NewOrder) -> MarketResult<Order> {
        self.gated_tenant(tenant_id)?;
        self.commit(tenant_id, order)
    }

    /// Point an order at the customer record that holds its buyer
    pub(crate) fn assign_customer(&self, order_id: &OrderId, customer_id: CustomerId) -> MarketResult<Option<Order>> {
        Ok(self.orders.update(order_id, &mut |o: &mut Order| {
            if o.customer_id == Some(customer_id) {
                return false;
            }
            o.customer_id = Some(customer_id);
            true
        })?)
    }

    /// Move an order to `next`.
    ///
    /// A payment method is recorded only when moving to PAID. With
    /// `restock_on_cancel` set, cancelling returns every line to stock; the
    /// cancellation is undone when the stock cannot be returned.
    pub fn transition(
        &self,
        tenant_id: &TenantId,
        order_id: &OrderId,
        next: OrderStatus,
        payment_method: Option<PaymentMethod>,
    ) -> MarketResult<Order> {
        let current = self.order(tenant_id, order_id)?;
        let illegal = |from: OrderStatus| -> MarketError {
            BusinessRuleViolation::IllegalTransition { from: from.to_string(), to: next.to_string() }.into()
        };
        if !current.status.can_transition_to(next) {
            return Err(illegal(current.status));
        }
        let restock: Vec<Restock> = if next == OrderStatus::Cancelled && self.options.restock_on_cancel {
            let items: Vec<Restock> = current
                .lines
                .iter()
                .map(|l| Restock { listing_id: l.listing_id, quantity: l.quantity, cost_price: None })
                .collect();
            // Refuse up front when the stock could never be returned
            self.plan_stock(None, &items, true)?;
            items
        } else {
            Vec::new()
        };

        let now = self.clock.now();
        let mut rejected_from = None;
        let updated = self.orders.update(order_id, &mut |o: &mut Order| {
            if !o.status.can_transition_to(next) {
                rejected_from = Some(o.status);
                return false;
            }
            o.status = next;
            if next == OrderStatus::Paid && payment_method.is_some() {
                o.payment_method = payment_method;
            }
            o.updated_at = now;
            true
        })?;

        let Some(order) = updated else {
            return Err(illegal(rejected_from.unwrap_or(current.status)));
        };

        tracing::info!(tenant = %tenant_id, order = %order_id, from = %current.status, to = %next, "order status changed");

        if !restock.is_empty() {
            if let Err(err) = self.add_stock(None, &restock, true) {
                return self.undo_cancel(order, current.status, err);
            }
            tracing::info!(order = %order_id, lines = restock.len(), "cancelled order restocked");
        }

        Ok(order)
    }

    /// Put a cancelled order back to `previous` after its restock failed.
    ///
    /// Returns the restock error once the order is back; when the order
    /// cannot be restored the cancellation stands and is returned as such.
    fn undo_cancel(&self, order: Order, previous: OrderStatus, cause: MarketError) -> MarketResult<Order> {
        let updated_at = order.updated_at;
        let restored = self.orders.update(&order.id, &mut |o: &mut Order| {
            if o.status != OrderStatus::Cancelled || o.updated_at != updated_at {
                return false;
            }
            o.status = previous;
            true
        });
        match restored {
            Ok(Some(_)) => {
                tracing::warn!(order = %order.id, error = %cause, "restock failed, cancellation undone");
                Err(cause)
            }
            Ok(None) => {
                tracing::error!(order = %order.id, error = %cause, "restock failed and order changed meanwhile, cancellation kept");
                Ok(order)
            }
            Err(err) => {
                tracing::error!(order = %order.id, error = %cause, undo = %err, "restock failed and cancellation could not be undone");
                Ok(order)
            }
        }
    }

    /// Add received goods to stock and record their unit cost
    pub fn receive_purchase(&self, tenant_id: &TenantId, lines: Vec<PurchaseLine>) -> MarketResult<PurchaseReceipt> {
        if lines.is_empty() {
            return Err(MarketError::validation("purchase must have at least one line"));
        }
        for line in &lines {
            if line.quantity == 0 {
                return Err(MarketError::validation("purchase quantity must be positive"));
            }
            if line.unit_cost < Decimal::ZERO {
                return Err(MarketError::validation("unit cost cannot be negative"));
            }
        }
        self.tenant(tenant_id)?;

        // Repeated listings add up; the last cost wins
        let mut items: Vec<Restock> = Vec::new();
        for line in &lines {
            match items.iter_mut().find(|i| i.listing_id == line.listing_id) {
                Some(item) => {
                    item.quantity = item
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or_else(|| MarketError::validation("purchase quantity too large"))?;
                    item.cost_price = Some(line.unit_cost);
                }
                None => items.push(Restock {
                    listing_id: line.listing_id,
                    quantity: line.quantity,
                    cost_price: Some(line.unit_cost),
                }),
            }
        }

        let total_cost = lines
            .iter()
            .try_fold(Decimal::ZERO, |acc, l| {
                l.unit_cost.checked_mul(Decimal::from(l.quantity)).and_then(|c| acc.checked_add(c))
            })
            .ok_or_else(|| MarketError::validation("purchase total too large"))?;
        let listings = self.add_stock(Some(tenant_id), &items, false)?;

        tracing::info!(tenant = %tenant_id, lines = lines.len(), %total_cost, "purchase received");
        Ok(PurchaseReceipt {
            tenant_id: *tenant_id,
            lines,
            total_cost,
            listings,
            received_at: self.clock.now(),
        })
    }

    /// Order owned by `tenant_id`
    pub fn order(&self, tenant_id: &TenantId, order_id: &OrderId) -> MarketResult<Order> {
        let order = self
            .orders
            .find_by_id(order_id)?
            .ok_or_else(|| MarketError::not_found("order", order_id))?;
        if &order.tenant_id != tenant_id {
            tracing::warn!(tenant = %tenant_id, order = %order_id, "cross-tenant order access");
            return Err(MarketError::forbidden("order belongs to another store"));
        }
        Ok(order)
    }

    /// A tenant's orders, newest first
    pub fn orders_for(&self, tenant_id: &TenantId) -> MarketResult<Vec<Order>> {
        Ok(self.orders.find_by_tenant(tenant_id)?)
    }

    fn tenant(&self, tenant_id: &TenantId) -> MarketResult<Tenant> {
        self.tenants
            .find_by_id(tenant_id)?
            .ok_or_else(|| MarketError::not_found("tenant", tenant_id))
    }

    fn gated_tenant(&self, tenant_id: &TenantId) -> MarketResult<Tenant> {
        let tenant = self.tenant(tenant_id)?;
        if let Err(err) = self.gate.can_create_order(&tenant).into_result() {
            tracing::debug!(tenant = %tenant_id, status = %tenant.subscription_status, "order refused by gate");
            return Err(err);
        }
        Ok(tenant)
    }

    fn commit(&self, tenant_id: &TenantId, order: NewOrder) -> MarketResult<Order> {
        let wanted = aggregate(&order.lines)?;
        let (lines, total_amount) = self.reserve(tenant_id, &wanted)?;
        let status = order.status.unwrap_or(OrderStatus::Pending);
        let payment_method = match (status, order.payment_method) {
            (OrderStatus::Paid, None) => Some(PaymentMethod::Cash),
            (_, method) => method,
        };
        let now = self.clock.now();
        let record = Order {
            id: OrderId::new(),
            tenant_id: *tenant_id,
            customer_id: order.customer_id,
            cashier: order.cashier,
            lines,
            total_amount,
            status,
            payment_method,
            created_at: now,
            updated_at: now,
        };

        if let Err(err) = self.orders.insert(&record) {
            tracing::error!(order = %record.id, error = %err, "order save failed, returning stock");
            let items: Vec<Restock> = record
                .quantities()
                .into_iter()
                .map(|(listing_id, quantity)| Restock { listing_id, quantity, cost_price: None })
                .collect();
            if let Err(restock) = self.add_stock(None, &items, true) {
                tracing::error!(order = %record.id, error = %restock, "stock compensation failed");
            }
            return Err(err.into());
        }

        tracing::info!(
            tenant = %tenant_id,
            order = %record.id,
            lines = record.lines.len(),
            total = %record.total_amount,
            status = %record.status,
            "order created"
        );
        Ok(record)
    }

    /// Check and decrement stock for every line in one version-checked write,
    /// returning the priced lines and their total
    fn reserve(
        &self,
        tenant_id: &TenantId,
        wanted: &[(ListingId, u32)],
    ) -> MarketResult<(Vec<OrderLine>, Decimal)> {
        for attempt in 1..=MAX_STOCK_ATTEMPTS {
            let mut changes = Vec::with_capacity(wanted.len());
            let mut lines = Vec::with_capacity(wanted.len());
            let mut total = Decimal::ZERO;

            for &(listing_id, quantity) in wanted {
                let listing = self
                    .listings
                    .find_by_id(&listing_id)?
                    .ok_or_else(|| MarketError::not_found("listing", listing_id))?;
                if &listing.tenant_id != tenant_id {
                    tracing::warn!(tenant = %tenant_id, listing = %listing_id, "order line for another store's listing");
                    return Err(MarketError::forbidden("listing belongs to another store"));
                }
                if quantity > listing.stock {
                    return Err(BusinessRuleViolation::InsufficientStock {
                        listing: listing.display.name,
                        requested: quantity,
                        available: listing.stock,
                    }
                    .into());
                }

                let (subtotal, running) = listing
                    .price
                    .checked_mul(Decimal::from(quantity))
                    .and_then(|subtotal| Some((subtotal, total.checked_add(subtotal)?)))
                    .ok_or_else(|| MarketError::validation("order total too large"))?;
                total = running;

                changes.push(StockChange {
                    listing_id,
                    expected_version: listing.version,
                    new_stock: listing.stock - quantity,
                    new_cost_price: None,
                });
                lines.push(OrderLine {
                    listing_id,
                    subtotal,
                    unit_price: listing.price,
                    name: listing.display.name,
                    quantity,
                });
            }

            match self.listings.apply_stock_changes(&changes) {
                Ok(_) => return Ok((lines, total)),
                Err(RepositoryError::Conflict(reason)) => {
                    tracing::debug!(tenant = %tenant_id, attempt, %reason, "stock changed concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepositoryError::Conflict("stock is busy, try again".into()).into())
    }

    /// Increase stock, optionally checking ownership and skipping listings
    /// that no longer exist
    fn add_stock(
        &self,
        owner: Option<&TenantId>,
        items: &[Restock],
        skip_missing: bool,
    ) -> MarketResult<Vec<Listing>> {
        for attempt in 1..=MAX_STOCK_ATTEMPTS {
            let changes = self.plan_stock(owner, items, skip_missing)?;

            match self.listings.apply_stock_changes(&changes) {
                Ok(updated) => return Ok(updated),
                Err(RepositoryError::Conflict(reason)) => {
                    tracing::debug!(attempt, %reason, "stock changed concurrently, retrying restock");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepositoryError::Conflict("stock is busy, try again".into()).into())
    }

    /// Stock writes that would add `items` to the current listings
    fn plan_stock(
        &self,
        owner: Option<&TenantId>,
        items: &[Restock],
        skip_missing: bool,
    ) -> MarketResult<Vec<StockChange>> {
        let mut changes = Vec::with_capacity(items.len());
        for item in items {
            let Some(listing) = self.listings.find_by_id(&item.listing_id)? else {
                if skip_missing {
                    tracing::debug!(listing = %item.listing_id, "listing gone, not restocking");
                    continue;
                }
                return Err(MarketError::not_found("listing", item.listing_id));
            };
            if let Some(owner) = owner {
                if &listing.tenant_id != owner {
                    tracing::warn!(tenant = %owner, listing = %item.listing_id, "restock of another store's listing");
                    return Err(MarketError::forbidden("listing belongs to another store"));
                }
            }
            let new_stock = listing.stock.checked_add(item.quantity).ok_or_else(|| {
                BusinessRuleViolation::StockOverflow { listing: listing.display.name.clone(), adding: item.quantity }
            })?;
            changes.push(StockChange {
                listing_id: item.listing_id,
                expected_version: listing.version,
                new_stock,
                new_cost_price: item.cost_price,
            });
        }
        Ok(changes)
    }
}

/// Validate lines and merge repeated listings, keeping first-seen order
fn aggregate(lines: &[LineRequest]) -> MarketResult<Vec<(ListingId, u32)>> {
    if lines.is_empty() {
        return Err(MarketError::validation("order must have at least one line"));
    }

    let mut merged: Vec<(ListingId, u32)> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(MarketError::validation("line quantity must be positive"));
        }
        match merged.iter_mut().find(|(id, _)| *id == line.listing_id) {
            Some((_, quantity)) => {
                *quantity = quantity
                    .checked_add(line.quantity)
                    .ok_or_else(|| MarketError::validation("line quantity too large"))?;
            }
            None => merged.push((line.listing_id, line.quantity)),
        }
    }
    Ok(merged)
}
