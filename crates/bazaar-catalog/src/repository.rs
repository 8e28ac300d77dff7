//! Catalog and listing persistence ports
//!
//! Two constraints the core relies on are enforced here rather than by
//! check-then-act in services:
//! - one catalog entry per SKU (`CatalogRepository::insert` conflicts)
//! - listing writes are version-checked, and stock changes across several
//!   listings commit together or not at all

use bazaar_common::{CatalogEntryId, ListingId, RepoResult, RepositoryError, TenantId};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::model::{CatalogEntry, Listing, Sku};

/// Conditional stock write for one listing
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    /// Listing to change
    pub listing_id: ListingId,
    /// Version the caller read; the write fails if it moved
    pub expected_version: u64,
    /// Stock after the change
    pub new_stock: u32,
    /// Replacement purchase cost, if any
    pub new_cost_price: Option<Decimal>,
}

/// Canonical catalog store
pub trait CatalogRepository: Send + Sync {
    /// Store a new entry; `Conflict` when the SKU already has one
    fn insert(&self, entry: &CatalogEntry) -> RepoResult<()>;

    /// Find entry by id
    fn find_by_id(&self, id: &CatalogEntryId) -> RepoResult<Option<CatalogEntry>>;

    /// Find entry by SKU
    fn find_by_sku(&self, sku: &Sku) -> RepoResult<Option<CatalogEntry>>;

    /// Replace display fields of an existing entry
    fn update(&self, entry: &CatalogEntry) -> RepoResult<()>;

    /// Remove an entry
    fn delete(&self, id: &CatalogEntryId) -> RepoResult<()>;

    /// Every entry, by name
    fn list(&self) -> RepoResult<Vec<CatalogEntry>>;

    /// Entries whose name contains `query`, ignoring case
    fn search_by_name(&self, query: &str) -> RepoResult<Vec<CatalogEntry>>;
}

/// Tenant listing store
pub trait ListingRepository: Send + Sync {
    /// Store a new listing; `Conflict` when the tenant already uses its SKU
    fn insert(&self, listing: &Listing) -> RepoResult<()>;

    /// Count the tenant's listings and insert in one step. Returns `false`
    /// without storing anything when the tenant already holds `cap`.
    fn insert_within_limit(&self, listing: &Listing, cap: Option<u64>) -> RepoResult<bool>;

    /// Replace a listing if `listing.version` is current; returns the stored
    /// copy with its new version
    fn update(&self, listing: &Listing) -> RepoResult<Listing>;

    /// Remove a listing
    fn delete(&self, id: &ListingId) -> RepoResult<()>;

    /// Find listing by id
    fn find_by_id(&self, id: &ListingId) -> RepoResult<Option<Listing>>;

    /// Listings of one tenant
    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<Listing>>;

    /// Number of listings a tenant holds
    fn count_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<u64>;

    /// Tenant's listing with `sku`
    fn find_by_sku_and_tenant(&self, sku: &Sku, tenant_id: &TenantId) -> RepoResult<Option<Listing>>;

    /// Listings linked to a catalog entry
    fn find_by_catalog_entry(&self, id: &CatalogEntryId) -> RepoResult<Vec<Listing>>;

    /// Every listing
    fn list(&self) -> RepoResult<Vec<Listing>>;

    /// Case-insensitive substring search on name and description
    fn search(&self, query: &str) -> RepoResult<Vec<Listing>>;

    /// Apply every change or none; `Conflict` if any version moved
    fn apply_stock_changes(&self, changes: &[StockChange]) -> RepoResult<Vec<Listing>>;
}

#[derive(Default)]
struct CatalogTables {
    entries: HashMap<CatalogEntryId, CatalogEntry>,
    by_sku: HashMap<Sku, CatalogEntryId>,
}

/// In-memory catalog store with a unique SKU index
pub struct InMemoryCatalogRepository {
    tables: RwLock<CatalogTables>,
}

impl InMemoryCatalogRepository {
    /// Empty store
    pub fn new() -> Self {
        Self { tables: RwLock::new(CatalogTables::default()) }
    }
}

impl Default for InMemoryCatalogRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogRepository for InMemoryCatalogRepository {
    fn insert(&self, entry: &CatalogEntry) -> RepoResult<()> {
        let mut tables = self.tables.write();
        if tables.by_sku.contains_key(&entry.sku) {
            return Err(RepositoryError::Conflict(format!("catalog sku {}", entry.sku)));
        }
        tables.by_sku.insert(entry.sku.clone(), entry.id);
        tables.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    fn find_by_id(&self, id: &CatalogEntryId) -> RepoResult<Option<CatalogEntry>> {
        Ok(self.tables.read().entries.get(id).cloned())
    }

    fn find_by_sku(&self, sku: &Sku) -> RepoResult<Option<CatalogEntry>> {
        let tables = self.tables.read();
        Ok(tables.by_sku.get(sku).and_then(|id| tables.entries.get(id)).cloned())
    }

    fn update(&self, entry: &CatalogEntry) -> RepoResult<()> {
        let mut tables = self.tables.write();
        let stored = tables
            .entries
            .get_mut(&entry.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("catalog entry {}", entry.id)))?;
        // SKU is the identity and never changes
        stored.display = entry.display.clone();
        stored.updated_at = entry.updated_at;
        Ok(())
    }

    fn delete(&self, id: &CatalogEntryId) -> RepoResult<()> {
        let mut tables = self.tables.write();
        let entry = tables
            .entries
            .remove(id)
            .ok_or_else(|| RepositoryError::NotFound(format!("catalog entry {id}")))?;
        tables.by_sku.remove(&entry.sku);
        Ok(())
    }

    fn list(&self) -> RepoResult<Vec<CatalogEntry>> {
        let mut all: Vec<_> = self.tables.read().entries.values().cloned().collect();
        all.sort_by(|a, b| a.display.name.cmp(&b.display.name));
        Ok(all)
    }

    fn search_by_name(&self, query: &str) -> RepoResult<Vec<CatalogEntry>> {
        let needle = query.trim().to_lowercase();
        let mut found: Vec<_> = self
            .tables
            .read()
            .entries
            .values()
            .filter(|e| e.display.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.display.name.cmp(&b.display.name));
        Ok(found)
    }
}

/// In-memory listing store
///
/// A single lock covers all listings so multi-listing stock commits are
/// atomic.
pub struct InMemoryListingRepository {
    listings: RwLock<HashMap<ListingId, Listing>>,
}

impl InMemoryListingRepository {
    /// Empty store
    pub fn new() -> Self {
        Self { listings: RwLock::new(HashMap::new()) }
    }

    fn sku_taken(listings: &HashMap<ListingId, Listing>, candidate: &Listing) -> bool {
        let Some(sku) = &candidate.sku else {
            return false;
        };
        listings.values().any(|l| {
            l.id != candidate.id && l.tenant_id == candidate.tenant_id && l.sku.as_ref() == Some(sku)
        })
    }

    fn sorted(mut listings: Vec<Listing>) -> Vec<Listing> {
        listings.sort_by_key(|l| (l.created_at, l.id));
        listings
    }
}

impl Default for InMemoryListingRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingRepository for InMemoryListingRepository {
    fn insert(&self, listing: &Listing) -> RepoResult<()> {
        self.insert_within_limit(listing, None).map(|_| ())
    }

    fn insert_within_limit(&self, listing: &Listing, cap: Option<u64>) -> RepoResult<bool> {
        let mut listings = self.listings.write();
        if listings.contains_key(&listing.id) || Self::sku_taken(&listings, listing) {
            return Err(RepositoryError::Conflict(format!("listing {}", listing.id)));
        }
        if let Some(cap) = cap {
            let held = listings.values().filter(|l| l.tenant_id == listing.tenant_id).count() as u64;
            if held >= cap {
                return Ok(false);
            }
        }
        listings.insert(listing.id, listing.clone());
        Ok(true)
    }

    fn update(&self, listing: &Listing) -> RepoResult<Listing> {
        let mut listings = self.listings.write();
        let current = listings
            .get(&listing.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("listing {}", listing.id)))?;
        if current.version != listing.version {
            return Err(RepositoryError::Conflict(format!(
                "listing {} changed (version {} != {})",
                listing.id, current.version, listing.version
            )));
        }
        if Self::sku_taken(&listings, listing) {
            return Err(RepositoryError::Conflict(format!("listing sku for {}", listing.id)));
        }

        let mut stored = listing.clone();
        stored.version += 1;
        listings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn delete(&self, id: &ListingId) -> RepoResult<()> {
        self.listings
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("listing {id}")))
    }

    fn find_by_id(&self, id: &ListingId) -> RepoResult<Option<Listing>> {
        Ok(self.listings.read().get(id).cloned())
    }

    fn find_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<Vec<Listing>> {
        let found = self
            .listings
            .read()
            .values()
            .filter(|l| &l.tenant_id == tenant_id)
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    fn count_by_tenant(&self, tenant_id: &TenantId) -> RepoResult<u64> {
        Ok(self.listings.read().values().filter(|l| &l.tenant_id == tenant_id).count() as u64)
    }

    fn find_by_sku_and_tenant(&self, sku: &Sku, tenant_id: &TenantId) -> RepoResult<Option<Listing>> {
        Ok(self
            .listings
            .read()
            .values()
            .find(|l| &l.tenant_id == tenant_id && l.sku.as_ref() == Some(sku))
            .cloned())
    }

    fn find_by_catalog_entry(&self, id: &CatalogEntryId) -> RepoResult<Vec<Listing>> {
        let found = self
            .listings
            .read()
            .values()
            .filter(|l| l.catalog_entry_id.as_ref() == Some(id))
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    fn list(&self) -> RepoResult<Vec<Listing>> {
        Ok(Self::sorted(self.listings.read().values().cloned().collect()))
    }

    fn search(&self, query: &str) -> RepoResult<Vec<Listing>> {
        let needle = query.trim().to_lowercase();
        let found = self
            .listings
            .read()
            .values()
            .filter(|l| l.display.matches(&needle))
            .cloned()
            .collect();
        Ok(Self::sorted(found))
    }

    fn apply_stock_changes(&self, changes: &[StockChange]) -> RepoResult<Vec<Listing>> {
        let mut listings = self.listings.write();

        for change in changes {
            let current = listings
                .get(&change.listing_id)
                .ok_or_else(|| RepositoryError::NotFound(format!("listing {}", change.listing_id)))?;
            if current.version != change.expected_version {
                return Err(RepositoryError::Conflict(format!(
                    "listing {} stock changed concurrently",
                    change.listing_id
                )));
            }
        }

        let mut updated = Vec::with_capacity(changes.len());
        for change in changes {
            if let Some(listing) = listings.get_mut(&change.listing_id) {
                listing.stock = change.new_stock;
                if let Some(cost) = change.new_cost_price {
                    listing.cost_price = cost;
                }
                listing.version += 1;
                updated.push(listing.clone());
            }
        }
        Ok(updated)
    }
}
