//! Search index synchronization
//!
//! The full-text index is an external collaborator. Listing writes publish
//! events to it through [`IndexPublisher`], which logs and swallows every
//! failure.

use bazaar_common::ListingId;
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::model::Listing;

/// Index failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// Index could not be reached
    #[error("search index unavailable: {0}")]
    Unavailable(String),
    /// Index rejected the document or query
    #[error("search index rejected request: {0}")]
    Rejected(String),
}

/// Index mutation
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    /// Listing created or changed
    Upsert(Listing),
    /// Listing removed
    Delete(ListingId),
}

/// Search index port
pub trait SearchIndex: Send + Sync {
    /// Apply one mutation
    fn apply(&self, event: &IndexEvent) -> Result<(), IndexError>;

    /// Listing ids matching `query`, best match first
    fn search(&self, query: &str) -> Result<Vec<ListingId>, IndexError>;
}

/// Fire-and-forget wrapper around a [`SearchIndex`]
#[derive(Clone)]
pub struct IndexPublisher {
    index: Arc<dyn SearchIndex>,
}

impl IndexPublisher {
    /// Wrap an index
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Publish an event; failures are logged only
    pub fn publish(&self, event: IndexEvent) {
        if let Err(err) = self.index.apply(&event) {
            let listing = match &event {
                IndexEvent::Upsert(l) => l.id,
                IndexEvent::Delete(id) => *id,
            };
            tracing::warn!(%listing, error = %err, "search index update failed");
        }
    }

    /// Query the index, `None` if it failed
    pub fn search(&self, query: &str) -> Option<Vec<ListingId>> {
        match self.index.search(query) {
            Ok(ids) => Some(ids),
            Err(err) => {
                tracing::warn!(query, error = %err, "search index query failed");
                None
            }
        }
    }
}

/// Naive in-process index over name, description, SKU and category
#[derive(Default)]
pub struct InMemorySearchIndex {
    documents: DashMap<ListingId, String>,
}

impl InMemorySearchIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexed documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn document(listing: &Listing) -> String {
        let mut text = listing.display.name.clone();
        for part in [
            listing.display.description.as_deref(),
            listing.sku.as_ref().map(|s| s.as_str()),
            listing.category.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            text.push(' ');
            text.push_str(part);
        }
        text.to_lowercase()
    }
}

impl SearchIndex for InMemorySearchIndex {
    fn apply(&self, event: &IndexEvent) -> Result<(), IndexError> {
        match event {
            IndexEvent::Upsert(listing) => {
                self.documents.insert(listing.id, Self::document(listing));
            }
            IndexEvent::Delete(id) => {
                self.documents.remove(id);
            }
        }
        Ok(())
    }

    fn search(&self, query: &str) -> Result<Vec<ListingId>, IndexError> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let mut hits: Vec<ListingId> = self
            .documents
            .iter()
            .filter(|doc| terms.iter().all(|t| doc.value().contains(t.as_str())))
            .map(|doc| *doc.key())
            .collect();
        hits.sort();
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DisplayFields, Sku};
    use bazaar_common::TenantId;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct BrokenIndex;

    impl SearchIndex for BrokenIndex {
        fn apply(&self, _: &IndexEvent) -> Result<(), IndexError> {
            Err(IndexError::Unavailable("connection refused".into()))
        }

        fn search(&self, _: &str) -> Result<Vec<ListingId>, IndexError> {
            Err(IndexError::Unavailable("connection refused".into()))
        }
    }

    fn listing(name: &str, sku: &str) -> Listing {
        let now = Utc::now();
        Listing {
            id: ListingId::new(),
            tenant_id: TenantId::new(),
            sku: Sku::parse(sku),
            display: DisplayFields::named(name),
            category: Some("Drinks".into()),
            variant: None,
            price: dec!(1),
            cost_price: dec!(0),
            stock: 1,
            min_stock: 0,
            catalog_entry_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_all_terms_must_match() {
        let index = InMemorySearchIndex::new();
        let cola = listing("Cola Zero", "COLA-0");
        index.apply(&IndexEvent::Upsert(cola.clone())).unwrap();
        index.apply(&IndexEvent::Upsert(listing("Orange Juice", "OJ-1"))).unwrap();

        assert_eq!(index.search("zero COLA").unwrap(), vec![cola.id]);
        assert_eq!(index.search("drinks").unwrap().len(), 2);
        assert!(index.search("   ").unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_document() {
        let index = InMemorySearchIndex::new();
        let l = listing("Cola", "");
        index.apply(&IndexEvent::Upsert(l.clone())).unwrap();
        index.apply(&IndexEvent::Delete(l.id)).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_publisher_swallows_failures() {
        let publisher = IndexPublisher::new(Arc::new(BrokenIndex));
        publisher.publish(IndexEvent::Delete(ListingId::new()));
        assert_eq!(publisher.search("cola"), None);
    }
}
