//! Listing lifecycle for tenants

use bazaar_billing::{SubscriptionGate, Tenant, TenantRepository};
use bazaar_common::{
    BusinessRuleViolation, Clock, DenyReason, ListingId, MarketError, MarketResult, RepositoryError, TenantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::index::{IndexEvent, IndexPublisher};
use crate::model::{DisplayFields, Listing, Sku};
use crate::repository::ListingRepository;
use crate::sku;
use crate::unify::CatalogUnifier;

const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Tenant input for creating or editing a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingDraft {
    /// SKU; blank keeps the listing out of the shared catalog
    pub sku: String,
    /// Name, description and image
    pub display: DisplayFields,
    /// Category
    pub category: Option<String>,
    /// Variant
    pub variant: Option<String>,
    /// Sale price
    pub price: Decimal,
    /// Purchase cost
    pub cost_price: Decimal,
    /// Units on hand
    pub stock: u32,
    /// Low-stock threshold
    pub min_stock: u32,
}

impl ListingDraft {
    fn validate(&self) -> MarketResult<()> {
        if self.display.name.trim().is_empty() {
            return Err(MarketError::validation("product name is required"));
        }
        if self.price < Decimal::ZERO {
            return Err(MarketError::validation("price cannot be negative"));
        }
        if self.cost_price < Decimal::ZERO {
            return Err(MarketError::validation("cost price cannot be negative"));
        }
        Ok(())
    }

    fn apply_to(&self, listing: &mut Listing) {
        listing.sku = Sku::parse(&self.sku);
        listing.display = self.display.clone();
        listing.category = self.category.clone();
        listing.variant = self.variant.clone();
        listing.price = self.price;
        listing.cost_price = self.cost_price;
        listing.stock = self.stock;
        listing.min_stock = self.min_stock;
    }
}

/// Creates, edits and removes tenant listings
pub struct ListingService {
    tenants: Arc<dyn TenantRepository>,
    listings: Arc<dyn ListingRepository>,
    unifier: Arc<CatalogUnifier>,
    gate: Arc<SubscriptionGate>,
    index: IndexPublisher,
    clock: Arc<dyn Clock>,
}

impl ListingService {
    /// Create service
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        listings: Arc<dyn ListingRepository>,
        unifier: Arc<CatalogUnifier>,
        gate: Arc<SubscriptionGate>,
        index: IndexPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { tenants, listings, unifier, gate, index, clock }
    }

    /// Add a listing to a tenant's store
    pub fn create_listing(&self, tenant_id: &TenantId, draft: ListingDraft) -> MarketResult<Listing> {
        draft.validate()?;
        let tenant = self.tenant(tenant_id)?;

        let sku = Sku::parse(&draft.sku);
        if let Some(sku) = &sku {
            if self.listings.find_by_sku_and_tenant(sku, tenant_id)?.is_some() {
                return Err(BusinessRuleViolation::DuplicateSku { sku: sku.to_string() }.into());
            }
        }

        let count = self.listings.count_by_tenant(tenant_id)?;
        self.gate.can_create_listing(&tenant, count).into_result()?;

        let now = self.clock.now();
        let mut listing = Listing {
            id: ListingId::new(),
            tenant_id: *tenant_id,
            sku: None,
            display: DisplayFields::default(),
            category: None,
            variant: None,
            price: Decimal::ZERO,
            cost_price: Decimal::ZERO,
            stock: 0,
            min_stock: 0,
            catalog_entry_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        draft.apply_to(&mut listing);
        self.unifier.link(&mut listing)?;

        let cap = self.gate.listing_cap(&tenant);
        match self.listings.insert_within_limit(&listing, cap.map(u64::from)) {
            Ok(true) => {}
            Ok(false) => {
                let limit = cap.unwrap_or_default();
                tracing::debug!(tenant = %tenant_id, limit, "free plan limit reached at insert");
                return Err(DenyReason::FreePlanLimit { limit }.into());
            }
            Err(RepositoryError::Conflict(_)) => {
                return Err(BusinessRuleViolation::DuplicateSku { sku: draft.sku.trim().to_string() }.into())
            }
            Err(err) => return Err(err.into()),
        }

        tracing::info!(
            tenant = %tenant_id,
            listing = %listing.id,
            catalog_entry = ?listing.catalog_entry_id,
            "listing created"
        );
        self.index.publish(IndexEvent::Upsert(listing.clone()));
        Ok(listing)
    }

    /// Replace a listing's fields, re-resolving its canonical identity
    pub fn update_listing(
        &self,
        tenant_id: &TenantId,
        listing_id: &ListingId,
        draft: ListingDraft,
    ) -> MarketResult<Listing> {
        draft.validate()?;

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self.owned_listing(tenant_id, listing_id)?;

            let new_sku = Sku::parse(&draft.sku);
            if new_sku != current.sku {
                if let Some(sku) = &new_sku {
                    if self.listings.find_by_sku_and_tenant(sku, tenant_id)?.is_some() {
                        return Err(BusinessRuleViolation::DuplicateSku { sku: sku.to_string() }.into());
                    }
                }
            }

            let mut next = current.clone();
            draft.apply_to(&mut next);
            self.unifier.link(&mut next)?;
            next.updated_at = self.clock.now();

            match self.listings.update(&next) {
                Ok(stored) => {
                    tracing::info!(tenant = %tenant_id, listing = %listing_id, "listing updated");
                    self.index.publish(IndexEvent::Upsert(stored.clone()));
                    return Ok(stored);
                }
                Err(RepositoryError::Conflict(reason)) => {
                    tracing::debug!(listing = %listing_id, attempt, %reason, "listing update raced, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepositoryError::Conflict(format!("listing {listing_id} is busy")).into())
    }

    /// Remove a listing
    pub fn delete_listing(&self, tenant_id: &TenantId, listing_id: &ListingId) -> MarketResult<()> {
        self.owned_listing(tenant_id, listing_id)?;
        self.listings.delete(listing_id)?;
        tracing::info!(tenant = %tenant_id, listing = %listing_id, "listing deleted");
        self.index.publish(IndexEvent::Delete(*listing_id));
        Ok(())
    }

    /// A tenant's own listings
    pub fn listings_for(&self, tenant_id: &TenantId) -> MarketResult<Vec<Listing>> {
        Ok(self.listings.find_by_tenant(tenant_id)?)
    }

    /// Listing owned by `tenant_id`
    pub fn owned_listing(&self, tenant_id: &TenantId, listing_id: &ListingId) -> MarketResult<Listing> {
        let listing = self
            .listings
            .find_by_id(listing_id)?
            .ok_or_else(|| MarketError::not_found("listing", listing_id))?;
        if &listing.tenant_id != tenant_id {
            tracing::warn!(tenant = %tenant_id, listing = %listing_id, "cross-tenant listing access");
            return Err(MarketError::forbidden("listing belongs to another store"));
        }
        Ok(listing)
    }

    /// Unused SKU suggestion for a new product
    pub fn suggest_sku(
        &self,
        tenant_id: &TenantId,
        name: &str,
        category: Option<&str>,
        variant: Option<&str>,
    ) -> MarketResult<String> {
        let prefix = sku::prefix(name, category, variant);
        let start = self.listings.count_by_tenant(tenant_id)? + 1;

        let mut lookup_error = None;
        let suggestion = sku::suggest(&prefix, start, |candidate| {
            let Some(sku) = Sku::parse(candidate) else {
                return false;
            };
            match self.listings.find_by_sku_and_tenant(&sku, tenant_id) {
                Ok(found) => found.is_some(),
                Err(err) => {
                    lookup_error = Some(err);
                    false
                }
            }
        });

        match lookup_error {
            Some(err) => Err(err.into()),
            None => Ok(suggestion),
        }
    }

    fn tenant(&self, id: &TenantId) -> MarketResult<Tenant> {
        self.tenants
            .find_by_id(id)?
            .ok_or_else(|| MarketError::not_found("tenant", id))
    }
}
