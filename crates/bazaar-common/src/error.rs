//! Error types for the marketplace core

use thiserror::Error;

/// Result type for core operations
pub type MarketResult<T> = Result<T, MarketError>;

/// Repository result type
pub type RepoResult<T> = Result<T, RepositoryError>;

/// Caller-facing error taxonomy
///
/// Every variant except [`MarketError::Repository`] is an expected,
/// recoverable condition. Storage failures pass through untouched so a
/// boundary handler can treat them generically.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketError {
    /// Malformed or missing input
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. "listing"
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Cross-tenant access attempt
    #[error("access denied: {0}")]
    Authorization(String),

    /// A domain rule refused the operation
    #[error(transparent)]
    BusinessRule(#[from] BusinessRuleViolation),

    /// Too many failed sign-in attempts
    #[error("too many attempts, retry in {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds until the key is unblocked
        retry_after_secs: u64,
    },

    /// The external credential verifier rejected the attempt
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Unexpected storage failure
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MarketError {
    /// Build a validation error
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }

    /// Build a not-found error
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Build an authorization error
    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::Authorization(detail.into())
    }

    /// Stable message key used by [`crate::MessageCatalog`]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation.invalid",
            Self::NotFound { .. } => "entity.not_found",
            Self::Authorization(_) => "access.denied",
            Self::BusinessRule(rule) => rule.code(),
            Self::RateLimited { .. } => "auth.rate_limited",
            Self::AuthenticationFailed => "auth.failed",
            Self::Repository(_) => "storage.failure",
        }
    }

    /// Named parameters substituted into catalog templates
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Validation(detail) | Self::Authorization(detail) => {
                vec![("detail", detail.clone())]
            }
            Self::NotFound { entity, id } => {
                vec![("entity", (*entity).to_string()), ("id", id.clone())]
            }
            Self::BusinessRule(rule) => rule.params(),
            Self::RateLimited { retry_after_secs } => {
                vec![("seconds", retry_after_secs.to_string())]
            }
            Self::AuthenticationFailed => vec![],
            Self::Repository(err) => vec![("detail", err.to_string())],
        }
    }

    /// Whether this is part of the expected contract (not a storage fault)
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Repository(_))
    }
}

impl From<DenyReason> for MarketError {
    fn from(reason: DenyReason) -> Self {
        Self::BusinessRule(BusinessRuleViolation::SubscriptionDenied(reason))
    }
}

/// Why the subscription gate refused an action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DenyReason {
    /// FREE tenants may not sell
    #[error("the free plan does not allow this, upgrade required")]
    UpgradeRequired,
    /// PAST_DUE tenants must renew
    #[error("subscription expired, renew to continue")]
    RenewToContinue,
    /// SUSPENDED tenants must talk to the platform owner
    #[error("account suspended, contact the administrator")]
    ContactAdmin,
    /// FREE tenant reached the listing cap
    #[error("free plan allows at most {limit} listings")]
    FreePlanLimit {
        /// Configured cap
        limit: u32,
    },
}

/// Domain rule violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusinessRuleViolation {
    /// Subscription gate denial
    #[error(transparent)]
    SubscriptionDenied(DenyReason),

    /// Requested more units than the listing holds
    #[error("insufficient stock for {listing}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Listing display name
        listing: String,
        /// Requested quantity
        requested: u32,
        /// Units on hand
        available: u32,
    },

    /// Adding units would exceed the largest stock a listing can hold
    #[error("stock for {listing} cannot grow by {adding}")]
    StockOverflow {
        /// Listing display name
        listing: String,
        /// Units being added
        adding: u32,
    },

    /// Order status change not in the transition table
    #[error("cannot move order from {from} to {to}")]
    IllegalTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// SKU already used by another listing of the same tenant
    #[error("SKU {sku} already exists in this store")]
    DuplicateSku {
        /// Offending SKU
        sku: String,
    },

    /// Canonical entry could not be settled for a SKU
    #[error("catalog entry for SKU {sku} is contended, try again")]
    CatalogConflict {
        /// Offending SKU
        sku: String,
    },

    /// Marketplace orders are paused while the platform is in maintenance
    #[error("the marketplace is in maintenance")]
    StorefrontClosed,

    /// Payment already decided
    #[error("payment is {status}, only PENDING payments can be decided")]
    PaymentNotPending {
        /// Current payment status
        status: String,
    },
}

impl BusinessRuleViolation {
    /// Stable message key
    pub fn code(&self) -> &'static str {
        match self {
            Self::SubscriptionDenied(DenyReason::UpgradeRequired) => "subscription.upgrade_required",
            Self::SubscriptionDenied(DenyReason::RenewToContinue) => "subscription.renew",
            Self::SubscriptionDenied(DenyReason::ContactAdmin) => "subscription.suspended",
            Self::SubscriptionDenied(DenyReason::FreePlanLimit { .. }) => "subscription.free_plan_limit",
            Self::InsufficientStock { .. } => "stock.insufficient",
            Self::StockOverflow { .. } => "stock.overflow",
            Self::IllegalTransition { .. } => "order.illegal_transition",
            Self::DuplicateSku { .. } => "listing.duplicate_sku",
            Self::CatalogConflict { .. } => "catalog.conflict",
            Self::PaymentNotPending { .. } => "payment.not_pending",
            Self::StorefrontClosed => "platform.maintenance",
        }
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::SubscriptionDenied(DenyReason::FreePlanLimit { limit }) => {
                vec![("limit", limit.to_string())]
            }
            Self::SubscriptionDenied(_) => vec![],
            Self::InsufficientStock { listing, requested, available } => vec![
                ("listing", listing.clone()),
                ("requested", requested.to_string()),
                ("available", available.to_string()),
            ],
            Self::StockOverflow { listing, adding } => {
                vec![("listing", listing.clone()), ("adding", adding.to_string())]
            }
            Self::IllegalTransition { from, to } => {
                vec![("from", from.clone()), ("to", to.clone())]
            }
            Self::DuplicateSku { sku } | Self::CatalogConflict { sku } => {
                vec![("sku", sku.clone())]
            }
            Self::PaymentNotPending { status } => vec![("status", status.clone())],
            Self::StorefrontClosed => vec![],
        }
    }
}

/// Repository errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Row missing
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness or version check failed
    #[error("conflict: {0}")]
    Conflict(String),

    /// Backend failure
    #[error("storage error: {0}")]
    StorageError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_reason_converts_to_business_rule() {
        let err: MarketError = DenyReason::RenewToContinue.into();
        assert!(matches!(
            err,
            MarketError::BusinessRule(BusinessRuleViolation::SubscriptionDenied(
                DenyReason::RenewToContinue
            ))
        ));
        assert_eq!(err.code(), "subscription.renew");
    }

    #[test]
    fn test_repository_errors_are_unexpected() {
        let err: MarketError = RepositoryError::StorageError("disk".into()).into();
        assert!(!err.is_expected());
        assert!(MarketError::AuthenticationFailed.is_expected());
    }

    #[test]
    fn test_insufficient_stock_params() {
        let err = MarketError::from(BusinessRuleViolation::InsufficientStock {
            listing: "Coffee".into(),
            requested: 3,
            available: 2,
        });
        let params = err.params();
        assert!(params.contains(&("requested", "3".to_string())));
        assert!(params.contains(&("available", "2".to_string())));
    }
}
