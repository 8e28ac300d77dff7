//! Catalog and listing model

use bazaar_common::{CatalogEntryId, ListingId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stock keeping unit, trimmed and never blank
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Parse a raw SKU; blank input means "no SKU"
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// SKU text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields shared by every tenant selling the same product
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFields {
    /// Product name
    pub name: String,
    /// Long description
    pub description: Option<String>,
    /// Picture URL
    pub image_url: Option<String>,
}

impl DisplayFields {
    /// Fields with only a name
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Case-insensitive substring match on name or description
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(needle_lower))
    }
}

/// Global product identity keyed by SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Entry id
    pub id: CatalogEntryId,
    /// Unique across all tenants
    pub sku: Sku,
    /// Shared display fields
    pub display: DisplayFields,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last edit
    pub updated_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// New entry seeded from the first listing that used `sku`
    pub fn new(sku: Sku, display: DisplayFields, now: DateTime<Utc>) -> Self {
        Self {
            id: CatalogEntryId::new(),
            sku,
            display,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A tenant's sellable product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing id
    pub id: ListingId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// SKU, unique within the tenant
    pub sku: Option<Sku>,
    /// Shown to buyers; mirrors the catalog entry when linked
    pub display: DisplayFields,
    /// Free-form category
    pub category: Option<String>,
    /// Free-form variant (size, color, ...)
    pub variant: Option<String>,
    /// Sale price
    pub price: Decimal,
    /// Purchase cost
    pub cost_price: Decimal,
    /// Units on hand
    pub stock: u32,
    /// Low-stock threshold
    pub min_stock: u32,
    /// Canonical entry shared with other tenants
    pub catalog_entry_id: Option<CatalogEntryId>,
    /// Optimistic concurrency counter, bumped on every write
    pub version: u64,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Stock at or below the threshold
    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.min_stock
    }

    /// Gross margin as a fraction of price, `None` for free items
    pub fn margin(&self) -> Option<Decimal> {
        (self.price > Decimal::ZERO).then(|| (self.price - self.cost_price) / self.price)
    }

    /// Grouping key for the public storefront
    pub fn canonical_key(&self) -> CanonicalKey {
        match self.catalog_entry_id {
            Some(id) => CanonicalKey::Catalog(id),
            None => CanonicalKey::Name(normalize_name(&self.display.name)),
        }
    }
}

/// Identity of a product across tenants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalKey {
    /// Linked to a catalog entry
    Catalog(CatalogEntryId),
    /// Standalone, grouped by normalized display name
    Name(String),
}

impl CanonicalKey {
    /// Key for a free-text product name
    pub fn for_name(name: &str) -> Self {
        Self::Name(normalize_name(name))
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog(id) => write!(f, "CAT-{id}"),
            Self::Name(name) => write!(f, "NAME-{name}"),
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn listing(name: &str) -> Listing {
        let now = Utc::now();
        Listing {
            id: ListingId::new(),
            tenant_id: TenantId::new(),
            sku: None,
            display: DisplayFields::named(name),
            category: None,
            variant: None,
            price: dec!(10),
            cost_price: dec!(6),
            stock: 3,
            min_stock: 3,
            catalog_entry_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_blank_sku_is_none() {
        assert_eq!(Sku::parse("   "), None);
        assert_eq!(Sku::parse(" X-1 ").unwrap().as_str(), "X-1");
    }

    #[test]
    fn test_name_key_is_normalized() {
        assert_eq!(listing("  Coffee Beans ").canonical_key(), listing("coffee beans").canonical_key());
        assert_eq!(listing("Mug").canonical_key().to_string(), "NAME-mug");
    }

    #[test]
    fn test_linked_key_uses_entry() {
        let mut l = listing("Mug");
        let id = CatalogEntryId::new();
        l.catalog_entry_id = Some(id);
        assert_eq!(l.canonical_key(), CanonicalKey::Catalog(id));
        assert_eq!(l.canonical_key().to_string(), format!("CAT-{id}"));
    }

    #[test]
    fn test_margin_and_low_stock() {
        let l = listing("Mug");
        assert_eq!(l.margin(), Some(dec!(0.4)));
        assert!(l.is_low_stock());
    }

    #[test]
    fn test_display_matching_ignores_case() {
        let fields = DisplayFields {
            name: "Arabica Coffee".into(),
            description: Some("Single ORIGIN beans".into()),
            image_url: None,
        };
        assert!(fields.matches("coffee"));
        assert!(fields.matches("origin"));
        assert!(!fields.matches("tea"));
    }
}
