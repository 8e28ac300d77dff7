//! Platform-owner maintenance of canonical catalog entries

use bazaar_common::{CatalogEntryId, Clock, MarketError, MarketResult, RepositoryError};
use std::sync::Arc;

use crate::index::{IndexEvent, IndexPublisher};
use crate::model::{CatalogEntry, DisplayFields, Listing};
use crate::repository::{CatalogRepository, ListingRepository};

const MAX_LINK_ATTEMPTS: usize = 3;

/// Admin operations over the shared catalog
pub struct CatalogAdmin {
    entries: Arc<dyn CatalogRepository>,
    listings: Arc<dyn ListingRepository>,
    index: IndexPublisher,
    clock: Arc<dyn Clock>,
}

impl CatalogAdmin {
    /// Create admin over the stores
    pub fn new(
        entries: Arc<dyn CatalogRepository>,
        listings: Arc<dyn ListingRepository>,
        index: IndexPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { entries, listings, index, clock }
    }

    /// All entries by name
    pub fn list_entries(&self) -> MarketResult<Vec<CatalogEntry>> {
        Ok(self.entries.list()?)
    }

    /// Entries whose name contains `query`
    pub fn search_entries(&self, query: &str) -> MarketResult<Vec<CatalogEntry>> {
        Ok(self.entries.search_by_name(query)?)
    }

    /// Replace an entry's display fields and copy them to every linked listing
    pub fn edit_entry(&self, id: &CatalogEntryId, display: DisplayFields) -> MarketResult<CatalogEntry> {
        if display.name.trim().is_empty() {
            return Err(MarketError::validation("product name is required"));
        }
        let mut entry = self.entry(id)?;
        entry.display = display;
        entry.updated_at = self.clock.now();
        self.entries.update(&entry)?;

        let mut synced = 0;
        for listing in self.listings.find_by_catalog_entry(id)? {
            let display = entry.display.clone();
            let changed = self.rewrite_linked(listing, id, &mut |l: &mut Listing| {
                l.display = display.clone();
            })?;
            synced += usize::from(changed);
        }

        tracing::info!(entry = %id, sku = %entry.sku, listings = synced, "catalog entry edited");
        Ok(entry)
    }

    /// Remove an entry; its listings become standalone with their current
    /// display fields
    pub fn delete_entry(&self, id: &CatalogEntryId) -> MarketResult<usize> {
        let entry = self.entry(id)?;

        let mut unlinked = 0;
        for listing in self.listings.find_by_catalog_entry(id)? {
            let changed = self.rewrite_linked(listing, id, &mut |l: &mut Listing| {
                l.catalog_entry_id = None;
            })?;
            unlinked += usize::from(changed);
        }
        self.entries.delete(id)?;

        tracing::info!(entry = %id, sku = %entry.sku, listings = unlinked, "catalog entry deleted");
        Ok(unlinked)
    }

    fn entry(&self, id: &CatalogEntryId) -> MarketResult<CatalogEntry> {
        self.entries
            .find_by_id(id)?
            .ok_or_else(|| MarketError::not_found("catalog entry", id))
    }

    /// Apply `change` to a listing still linked to `entry_id`, retrying on
    /// version conflicts. Returns false if the listing went away or was
    /// relinked in the meantime.
    fn rewrite_linked(
        &self,
        mut listing: Listing,
        entry_id: &CatalogEntryId,
        change: &mut dyn FnMut(&mut Listing),
    ) -> MarketResult<bool> {
        for attempt in 1..=MAX_LINK_ATTEMPTS {
            if listing.catalog_entry_id.as_ref() != Some(entry_id) {
                return Ok(false);
            }
            let mut next = listing.clone();
            change(&mut next);
            next.updated_at = self.clock.now();

            match self.listings.update(&next) {
                Ok(stored) => {
                    self.index.publish(IndexEvent::Upsert(stored));
                    return Ok(true);
                }
                Err(RepositoryError::Conflict(_)) => {
                    tracing::debug!(listing = %listing.id, attempt, "linked listing changed, reloading");
                    match self.listings.find_by_id(&listing.id)? {
                        Some(fresh) => listing = fresh,
                        None => return Ok(false),
                    }
                }
                Err(RepositoryError::NotFound(_)) => return Ok(false),
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepositoryError::Conflict(format!("listing {} is busy", listing.id)).into())
    }
}
