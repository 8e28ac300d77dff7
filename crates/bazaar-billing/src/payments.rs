//! Subscription payments

use bazaar_common::{MarketError, PaymentId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payment review state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Awaiting review
    Pending,
    /// Accepted, subscription extended
    Approved,
    /// Refused
    Rejected,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        })
    }
}

/// Payment submission from a tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    /// Amount paid
    pub amount: Decimal,
    /// Free-form channel, e.g. "Zelle" or "bank transfer"
    pub method: String,
    /// Transfer reference supplied by the tenant
    pub reference: String,
}

impl NewPayment {
    pub(crate) fn validate(&self) -> Result<(), MarketError> {
        if self.amount <= Decimal::ZERO {
            return Err(MarketError::validation("payment amount must be positive"));
        }
        if self.method.trim().is_empty() {
            return Err(MarketError::validation("payment method is required"));
        }
        if self.reference.trim().is_empty() {
            return Err(MarketError::validation("payment reference is required"));
        }
        Ok(())
    }
}

/// Payment reported by a tenant for manual review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPayment {
    /// Payment id
    pub id: PaymentId,
    /// Paying tenant
    pub tenant_id: TenantId,
    /// Amount paid
    pub amount: Decimal,
    /// Payment channel
    pub method: String,
    /// Transfer reference
    pub reference: String,
    /// Review state
    pub status: PaymentStatus,
    /// Reviewer notes, e.g. rejection reason
    pub notes: Option<String>,
    /// Submission time
    pub submitted_at: DateTime<Utc>,
    /// Review time
    pub decided_at: Option<DateTime<Utc>>,
}

impl SubscriptionPayment {
    /// New pending payment
    pub fn submit(tenant_id: TenantId, payment: NewPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            tenant_id,
            amount: payment.amount,
            method: payment.method.trim().to_string(),
            reference: payment.reference.trim().to_string(),
            status: PaymentStatus::Pending,
            notes: None,
            submitted_at: now,
            decided_at: None,
        }
    }

    /// Move out of PENDING; false if already decided
    pub fn decide(&mut self, status: PaymentStatus, notes: Option<String>, now: DateTime<Utc>) -> bool {
        if self.status != PaymentStatus::Pending || status == PaymentStatus::Pending {
            return false;
        }
        self.status = status;
        self.notes = notes;
        self.decided_at = Some(now);
        true
    }
}
