//! Buyer-facing catalog views
//!
//! Linked listings are shown with their canonical entry's current display
//! fields, so an admin edit is visible even before write-through reaches
//! every listing.

use bazaar_billing::{SubscriptionStatus, TenantProfile, TenantRepository};
use bazaar_common::{ListingId, MarketResult, TenantId};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::index::IndexPublisher;
use crate::model::{CanonicalKey, Listing};
use crate::repository::{CatalogRepository, ListingRepository};
use crate::unify::{group_for_public_view, ProductGroup};

/// One tenant's offer for a canonical product
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerOffer {
    /// Selling tenant
    pub tenant_id: TenantId,
    /// Tenant metadata shown to buyers
    pub profile: TenantProfile,
    /// Current billing state
    pub subscription_status: SubscriptionStatus,
    /// Whether the tenant can take orders right now
    pub accepting_orders: bool,
    /// Offered listing
    pub listing_id: ListingId,
    /// Tenant's price
    pub price: Decimal,
    /// Tenant's stock
    pub stock: u32,
}

/// Read-only storefront queries
pub struct PublicCatalog {
    tenants: Arc<dyn TenantRepository>,
    listings: Arc<dyn ListingRepository>,
    entries: Arc<dyn CatalogRepository>,
    index: IndexPublisher,
}

impl PublicCatalog {
    /// Create views over the stores
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        listings: Arc<dyn ListingRepository>,
        entries: Arc<dyn CatalogRepository>,
        index: IndexPublisher,
    ) -> Self {
        Self { tenants, listings, entries, index }
    }

    /// Every product grouped by canonical identity
    pub fn products(&self) -> MarketResult<Vec<ProductGroup>> {
        let listings = self.present(self.listings.list()?)?;
        Ok(group_for_public_view(&listings))
    }

    /// Products matching `query`.
    ///
    /// The search index is asked first; an index failure or an empty hit
    /// list falls back to a substring match on name and description.
    pub fn search(&self, query: &str) -> MarketResult<Vec<ProductGroup>> {
        if query.trim().is_empty() {
            return self.products();
        }

        let mut hits = Vec::new();
        if let Some(ids) = self.index.search(query) {
            for id in ids {
                // Index may lag behind deletes
                if let Some(listing) = self.listings.find_by_id(&id)? {
                    hits.push(listing);
                }
            }
        }
        if hits.is_empty() {
            tracing::debug!(query, "search index gave nothing, using substring match");
            hits = self.listings.search(query)?;
        }

        let hits = self.present(hits)?;
        Ok(group_for_public_view(&hits))
    }

    /// One tenant's listings
    pub fn tenant_storefront(&self, tenant_id: &TenantId) -> MarketResult<Vec<Listing>> {
        self.present(self.listings.find_by_tenant(tenant_id)?)
    }

    /// Every tenant offering the product, cheapest first
    pub fn sellers_for(&self, key: &CanonicalKey) -> MarketResult<Vec<SellerOffer>> {
        let listings = match key {
            CanonicalKey::Catalog(entry_id) => self.listings.find_by_catalog_entry(entry_id)?,
            CanonicalKey::Name(_) => self
                .listings
                .list()?
                .into_iter()
                .filter(|l| &l.canonical_key() == key)
                .collect(),
        };

        let mut offers = Vec::with_capacity(listings.len());
        for listing in listings {
            let Some(tenant) = self.tenants.find_by_id(&listing.tenant_id)? else {
                tracing::warn!(listing = %listing.id, tenant = %listing.tenant_id, "listing without tenant");
                continue;
            };
            offers.push(SellerOffer {
                tenant_id: tenant.id,
                accepting_orders: tenant.subscription_status.can_sell(),
                subscription_status: tenant.subscription_status,
                profile: tenant.profile,
                listing_id: listing.id,
                price: listing.price,
                stock: listing.stock,
            });
        }
        offers.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(offers)
    }

    fn present(&self, mut listings: Vec<Listing>) -> MarketResult<Vec<Listing>> {
        let mut cache = HashMap::new();
        for listing in &mut listings {
            let Some(entry_id) = listing.catalog_entry_id else {
                continue;
            };
            if !cache.contains_key(&entry_id) {
                let display = self.entries.find_by_id(&entry_id)?.map(|e| e.display);
                cache.insert(entry_id, display);
            }
            if let Some(Some(display)) = cache.get(&entry_id) {
                listing.display = display.clone();
            }
        }
        Ok(listings)
    }
}
