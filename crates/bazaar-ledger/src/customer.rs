//! Tenant customers

use bazaar_common::{CustomerId, TenantId};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Buyer contact details supplied with a marketplace order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    /// Display name
    pub name: String,
    /// Identifies the customer within a tenant
    pub email: String,
    /// Phone
    pub phone: Option<String>,
    /// Delivery address
    pub address: Option<String>,
}

/// A buyer as known to one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id
    pub id: CustomerId,
    /// Owning tenant
    pub tenant_id: TenantId,
    /// Display name
    pub name: String,
    /// Lookup key together with the tenant
    pub email: String,
    /// Phone
    pub phone: Option<String>,
    /// Delivery address
    pub address: Option<String>,
    /// One point per whole currency unit spent
    pub loyalty_points: u64,
    /// First order time
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// New customer with no points
    pub fn new(id: CustomerId, tenant_id: TenantId, contact: &CustomerContact, now: DateTime<Utc>) -> Self {
        let mut customer = Self {
            id,
            tenant_id,
            name: String::new(),
            email: String::new(),
            phone: None,
            address: None,
            loyalty_points: 0,
            created_at: now,
        };
        customer.apply_contact(contact);
        customer
    }

    /// Overwrite contact fields with the latest ones
    pub fn apply_contact(&mut self, contact: &CustomerContact) {
        self.name = contact.name.trim().to_string();
        self.email = normalize_email(&contact.email);
        self.phone = contact.phone.clone();
        self.address = contact.address.clone();
    }

    /// Credit points for an order total
    pub fn award_points(&mut self, total: Decimal) {
        self.loyalty_points = self.loyalty_points.saturating_add(loyalty_points_for(total));
    }
}

/// Whole currency units of `total`, never negative
pub fn loyalty_points_for(total: Decimal) -> u64 {
    total.trunc().to_u64().unwrap_or(0)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
