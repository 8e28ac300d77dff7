//! Bazaar Catalog - Cross-tenant product identity
//!
//! Tenants sell their own listings (price, cost and stock stay private), but
//! identical products are unified by SKU into one canonical catalog entry
//! that owns the shared display fields. The public storefront groups
//! listings by canonical identity and shows the cheapest offer per product.
//!
//! # Architecture
//!
//! ```text
//!  tenant A: SKU X-1 $10 ─┐                       ┌─► public view: X-1 @ $8
//!                          ├─► CatalogEntry(X-1) ──┤
//!  tenant B: SKU X-1 $8  ─┘     name/desc/image    └─► sellers_for: B $8, A $10
//!
//!  tenant C: no SKU "Mug" ──► NAME-mug (standalone, grouped by name)
//! ```
//!
//! Listing writes emit search-index events; index failures are logged and
//! never fail the write.

#![warn(missing_docs)]

pub mod admin;
pub mod index;
pub mod listing;
pub mod model;
pub mod public;
pub mod repository;
pub mod sku;
pub mod unify;

pub use admin::CatalogAdmin;
pub use index::{IndexError, IndexEvent, IndexPublisher, InMemorySearchIndex, SearchIndex};
pub use listing::{ListingDraft, ListingService};
pub use model::{CanonicalKey, CatalogEntry, DisplayFields, Listing, Sku};
pub use public::{PublicCatalog, SellerOffer};
pub use repository::{
    CatalogRepository, InMemoryCatalogRepository, InMemoryListingRepository, ListingRepository,
    StockChange,
};
pub use unify::{group_for_public_view, CatalogUnifier, ProductGroup};
