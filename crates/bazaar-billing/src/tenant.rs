//! Tenant model

use bazaar_common::{MarketError, TenantId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Days added to a subscription per approved payment
pub const SUBSCRIPTION_PERIOD_DAYS: i64 = 30;

/// Billing state of a tenant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// No paid features
    Free,
    /// Time-limited full access
    Trial,
    /// Paid subscription in good standing
    Paid,
    /// Paid period ended without renewal
    PastDue,
    /// Disabled by the platform owner
    Suspended,
}

impl SubscriptionStatus {
    /// All variants
    pub const ALL: [SubscriptionStatus; 5] = [
        Self::Free,
        Self::Trial,
        Self::Paid,
        Self::PastDue,
        Self::Suspended,
    ];

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "FREE",
            Self::Trial => "TRIAL",
            Self::Paid => "PAID",
            Self::PastDue => "PAST_DUE",
            Self::Suspended => "SUSPENDED",
        }
    }

    /// Whether the tenant may take orders
    pub fn can_sell(&self) -> bool {
        matches!(self, Self::Paid | Self::Trial)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| MarketError::validation(format!("invalid subscription status: {s}")))
    }
}

/// How a new tenant starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignupPlan {
    /// Start on the free plan
    Free,
    /// Start a trial today
    Trial,
}

/// Public storefront details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantProfile {
    /// Store name
    pub name: String,
    /// Short description
    pub description: Option<String>,
    /// Logo URL
    pub image_url: Option<String>,
    /// Store latitude
    pub latitude: Option<f64>,
    /// Store longitude
    pub longitude: Option<f64>,
}

impl TenantProfile {
    /// Profile with just a name
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }
}

/// Independent seller account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant id
    pub id: TenantId,
    /// Storefront details
    pub profile: TenantProfile,
    /// Current billing state
    pub subscription_status: SubscriptionStatus,
    /// When the trial began
    pub trial_start_date: Option<DateTime<Utc>>,
    /// End of the paid period
    pub subscription_end_date: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Register a new tenant
    pub fn signup(profile: TenantProfile, plan: SignupPlan, now: DateTime<Utc>) -> Self {
        let (subscription_status, trial_start_date) = match plan {
            SignupPlan::Free => (SubscriptionStatus::Free, None),
            SignupPlan::Trial => (SubscriptionStatus::Trial, Some(now)),
        };
        Self {
            id: TenantId::new(),
            profile,
            subscription_status,
            trial_start_date,
            subscription_end_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Trial older than `trial_days` at `now`
    pub fn trial_expired(&self, now: DateTime<Utc>, trial_days: u32) -> bool {
        self.subscription_status == SubscriptionStatus::Trial
            && self
                .trial_start_date
                .is_some_and(|start| start + Duration::days(i64::from(trial_days)) < now)
    }

    /// Paid or trial period ended before `now`
    pub fn period_ended(&self, now: DateTime<Utc>) -> bool {
        self.subscription_end_date.is_some_and(|end| end < now)
    }

    /// Record an approved payment: PAID, with the period extended from
    /// whichever is later of `now` and the current end date
    pub fn apply_approved_payment(&mut self, now: DateTime<Utc>) {
        let base = match self.subscription_end_date {
            Some(end) if end > now => end,
            _ => now,
        };
        self.subscription_status = SubscriptionStatus::Paid;
        self.subscription_end_date = Some(base + Duration::days(SUBSCRIPTION_PERIOD_DAYS));
        self.updated_at = now;
    }

    /// Overwrite the status
    pub fn set_status(&mut self, status: SubscriptionStatus, now: DateTime<Utc>) {
        self.subscription_status = status;
        self.updated_at = now;
    }
}
