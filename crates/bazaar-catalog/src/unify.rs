//! Catalog unification engine
//!
//! `resolve` maps a SKU to its one canonical entry, creating it from the
//! first listing that uses the SKU. Two tenants introducing the same new SKU
//! at once both try to insert; the store's unique SKU index lets exactly one
//! win and the loser re-resolves to the winner's entry.

use bazaar_common::{BusinessRuleViolation, Clock, MarketResult, RepositoryError};
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{CanonicalKey, CatalogEntry, DisplayFields, Listing, Sku};
use crate::repository::CatalogRepository;

const MAX_RESOLVE_ATTEMPTS: usize = 3;

/// Resolves and maintains canonical product identity
pub struct CatalogUnifier {
    entries: Arc<dyn CatalogRepository>,
    clock: Arc<dyn Clock>,
}

impl CatalogUnifier {
    /// Create engine over a catalog store
    pub fn new(entries: Arc<dyn CatalogRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { entries, clock }
    }

    /// Canonical entry for `sku`, created from `incoming` if the SKU is new.
    /// Blank SKUs are never linked and yield `None`.
    pub fn resolve(&self, sku: &str, incoming: &DisplayFields) -> MarketResult<Option<CatalogEntry>> {
        let Some(sku) = Sku::parse(sku) else {
            return Ok(None);
        };

        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            if let Some(existing) = self.entries.find_by_sku(&sku)? {
                return Ok(Some(existing));
            }

            let entry = CatalogEntry::new(sku.clone(), incoming.clone(), self.clock.now());
            match self.entries.insert(&entry) {
                Ok(()) => {
                    tracing::info!(sku = %sku, entry = %entry.id, "catalog entry created");
                    return Ok(Some(entry));
                }
                Err(RepositoryError::Conflict(_)) => {
                    tracing::debug!(sku = %sku, attempt, "catalog entry created concurrently, re-resolving");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(BusinessRuleViolation::CatalogConflict { sku: sku.to_string() }.into())
    }

    /// Link `listing` to the canonical entry for its SKU. A linked listing
    /// takes the entry's display fields; price, cost and stock are untouched.
    pub fn link(&self, listing: &mut Listing) -> MarketResult<()> {
        let sku = listing.sku.as_ref().map(Sku::as_str).unwrap_or_default();
        match self.resolve(sku, &listing.display)? {
            Some(entry) => {
                listing.catalog_entry_id = Some(entry.id);
                listing.display = entry.display;
            }
            None => listing.catalog_entry_id = None,
        }
        Ok(())
    }
}

/// One product on the public storefront
#[derive(Debug, Clone, PartialEq)]
pub struct ProductGroup {
    /// Canonical identity
    pub key: CanonicalKey,
    /// Cheapest listing for the product
    pub representative: Listing,
    /// Listings offering the product
    pub offers: usize,
}

/// Group listings by canonical key and keep the cheapest per group.
///
/// Groups come back in the order their first listing appears; price ties
/// keep the first listing encountered.
pub fn group_for_public_view(listings: &[Listing]) -> Vec<ProductGroup> {
    let mut groups: Vec<ProductGroup> = Vec::new();
    let mut index: HashMap<CanonicalKey, usize> = HashMap::new();

    for listing in listings {
        let key = listing.canonical_key();
        match index.get(&key) {
            Some(&slot) => {
                let group = &mut groups[slot];
                group.offers += 1;
                if listing.price < group.representative.price {
                    group.representative = listing.clone();
                }
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(ProductGroup { key, representative: listing.clone(), offers: 1 });
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryCatalogRepository;
    use bazaar_common::{ListingId, MarketError, SystemClock, TenantId};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn unifier() -> (CatalogUnifier, Arc<InMemoryCatalogRepository>) {
        let repo = Arc::new(InMemoryCatalogRepository::new());
        (CatalogUnifier::new(repo.clone(), Arc::new(SystemClock)), repo)
    }

    fn listing(name: &str, sku: &str, price: Decimal) -> Listing {
        let now = Utc::now();
        Listing {
            id: ListingId::new(),
            tenant_id: TenantId::new(),
            sku: Sku::parse(sku),
            display: DisplayFields::named(name),
            category: None,
            variant: None,
            price,
            cost_price: Decimal::ZERO,
            stock: 1,
            min_stock: 0,
            catalog_entry_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_first_listing_seeds_entry() {
        let (unifier, _) = unifier();
        let first = unifier.resolve("X-1", &DisplayFields::named("Cold Brew")).unwrap().unwrap();
        let second = unifier.resolve("X-1", &DisplayFields::named("cold brew 2")).unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.display.name, "Cold Brew");
    }

    #[test]
    fn test_blank_sku_stays_standalone() {
        let (unifier, repo) = unifier();
        assert!(unifier.resolve("  ", &DisplayFields::named("Mug")).unwrap().is_none());
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn test_link_overrides_display_only() {
        let (unifier, _) = unifier();
        let mut a = listing("Cold Brew", "X-1", dec!(10));
        unifier.link(&mut a).unwrap();

        let mut b = listing("Iced coffee (mine)", "X-1", dec!(8));
        b.display.description = Some("tenant text".into());
        unifier.link(&mut b).unwrap();

        assert_eq!(a.catalog_entry_id, b.catalog_entry_id);
        assert_eq!(b.display.name, "Cold Brew");
        assert_eq!(b.display.description, None);
        assert_eq!(b.price, dec!(8));
    }

    #[test]
    fn test_concurrent_new_sku_yields_one_entry() {
        let (unifier, repo) = unifier();
        let ids = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let unifier = &unifier;
                    s.spawn(move || {
                        unifier
                            .resolve("NEW-9", &DisplayFields::named(format!("tenant {i}")))
                            .unwrap()
                            .unwrap()
                            .id
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>()
        });

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[test]
    fn test_persistent_conflict_is_business_rule() {
        struct AlwaysConflict;
        impl CatalogRepository for AlwaysConflict {
            fn insert(&self, _: &CatalogEntry) -> bazaar_common::RepoResult<()> {
                Err(RepositoryError::Conflict("sku".into()))
            }
            fn find_by_id(&self, _: &bazaar_common::CatalogEntryId) -> bazaar_common::RepoResult<Option<CatalogEntry>> {
                Ok(None)
            }
            fn find_by_sku(&self, _: &Sku) -> bazaar_common::RepoResult<Option<CatalogEntry>> {
                Ok(None)
            }
            fn update(&self, _: &CatalogEntry) -> bazaar_common::RepoResult<()> {
                Ok(())
            }
            fn delete(&self, _: &bazaar_common::CatalogEntryId) -> bazaar_common::RepoResult<()> {
                Ok(())
            }
            fn list(&self) -> bazaar_common::RepoResult<Vec<CatalogEntry>> {
                Ok(vec![])
            }
            fn search_by_name(&self, _: &str) -> bazaar_common::RepoResult<Vec<CatalogEntry>> {
                Ok(vec![])
            }
        }

        let unifier = CatalogUnifier::new(Arc::new(AlwaysConflict), Arc::new(SystemClock));
        let err = unifier.resolve("X-1", &DisplayFields::named("A")).unwrap_err();
        assert!(matches!(
            err,
            MarketError::BusinessRule(BusinessRuleViolation::CatalogConflict { .. })
        ));
    }

    #[test]
    fn test_cheapest_listing_represents_group() {
        let (unifier, _) = unifier();
        let mut a = listing("Cold Brew", "P", dec!(10));
        let mut b = listing("Cold Brew", "P", dec!(8));
        unifier.link(&mut a).unwrap();
        unifier.link(&mut b).unwrap();

        let groups = group_for_public_view(&[a, b.clone()]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].representative.id, b.id);
        assert_eq!(groups[0].representative.price, dec!(8));
        assert_eq!(groups[0].offers, 2);
    }

    #[test]
    fn test_unlinked_listings_group_by_name() {
        let a = listing("  Clay Mug", "", dec!(4));
        let b = listing("clay mug ", "", dec!(4));
        let c = listing("Teapot", "", dec!(20));

        let groups = group_for_public_view(&[a.clone(), b, c]);

        assert_eq!(groups.len(), 2);
        // Tie keeps the first listing seen
        assert_eq!(groups[0].representative.id, a.id);
        assert_eq!(groups[0].key, CanonicalKey::for_name("clay mug"));
    }
}
