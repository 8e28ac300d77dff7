//! Entity identifiers
//!
//! Each aggregate gets its own UUID newtype so a listing id can never be
//! passed where an order id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::MarketError;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = MarketError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| MarketError::validation(format!("invalid {} id: {s}", $entity)))
            }
        }
    };
}

entity_id!(
    /// Tenant (seller account) identifier
    TenantId,
    "tenant"
);
entity_id!(
    /// Tenant-scoped listing identifier
    ListingId,
    "listing"
);
entity_id!(
    /// Canonical catalog entry identifier
    CatalogEntryId,
    "catalog entry"
);
entity_id!(
    /// Order identifier
    OrderId,
    "order"
);
entity_id!(
    /// Subscription payment identifier
    PaymentId,
    "payment"
);
entity_id!(
    /// Customer identifier
    CustomerId,
    "customer"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ListingId::new(), ListingId::new());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<OrderId>().unwrap_err();
        assert!(matches!(err, MarketError::Validation(msg) if msg.contains("order")));
    }

    #[test]
    fn test_display_parses_back() {
        let id = TenantId::new();
        assert_eq!(id.to_string().parse::<TenantId>().unwrap(), id);
    }
}
