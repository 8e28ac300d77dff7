//! Periodic subscription sweeps
//!
//! Each tenant is re-checked and updated inside its own atomic `update`, so
//! a sweep that dies halfway leaves every tenant either fully moved or
//! untouched; the next run picks up the rest.

use bazaar_common::{ConfigSource, MarketResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::repository::TenantRepository;
use crate::tenant::{SubscriptionStatus, Tenant};

/// Outcome of one sweep pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tenants looked at
    pub examined: usize,
    /// TRIAL -> FREE
    pub trials_expired: usize,
    /// PAID/TRIAL -> PAST_DUE
    pub subscriptions_lapsed: usize,
    /// Tenants whose update failed and will be retried next run
    pub failed: usize,
}

impl SweepReport {
    /// Tenants moved to a new status
    pub fn changed(&self) -> usize {
        self.trials_expired + self.subscriptions_lapsed
    }

    fn merge(self, other: SweepReport) -> SweepReport {
        SweepReport {
            examined: self.examined + other.examined,
            trials_expired: self.trials_expired + other.trials_expired,
            subscriptions_lapsed: self.subscriptions_lapsed + other.subscriptions_lapsed,
            failed: self.failed + other.failed,
        }
    }
}

enum Outcome {
    Changed,
    Unchanged,
    Failed,
}

/// Downgrades tenants whose trial or paid period has run out
pub struct SubscriptionSweeper {
    tenants: Arc<dyn TenantRepository>,
    config: Arc<dyn ConfigSource>,
}

impl SubscriptionSweeper {
    /// Create sweeper
    pub fn new(tenants: Arc<dyn TenantRepository>, config: Arc<dyn ConfigSource>) -> Self {
        Self { tenants, config }
    }

    /// TRIAL older than `trial_days` becomes FREE; PAID past its end date
    /// becomes PAST_DUE. Re-running is a no-op.
    pub fn sweep_expired_trials(&self, now: DateTime<Utc>, trial_days: u32) -> MarketResult<SweepReport> {
        let mut report = SweepReport::default();

        for tenant in self.tenants.find_by_status(SubscriptionStatus::Trial)? {
            report.examined += 1;
            match self.transition(&tenant, now, |t| t.trial_expired(now, trial_days), SubscriptionStatus::Free) {
                Outcome::Changed => {
                    report.trials_expired += 1;
                    tracing::warn!(tenant = %tenant.id, name = %tenant.profile.name, "trial expired, moved to FREE");
                }
                Outcome::Failed => report.failed += 1,
                Outcome::Unchanged => {}
            }
        }

        for tenant in self.tenants.find_by_status(SubscriptionStatus::Paid)? {
            report.examined += 1;
            let lapsed = |t: &Tenant| t.subscription_status == SubscriptionStatus::Paid && t.period_ended(now);
            match self.transition(&tenant, now, lapsed, SubscriptionStatus::PastDue) {
                Outcome::Changed => {
                    report.subscriptions_lapsed += 1;
                    tracing::warn!(tenant = %tenant.id, name = %tenant.profile.name, "subscription expired, moved to PAST_DUE");
                }
                Outcome::Failed => report.failed += 1,
                Outcome::Unchanged => {}
            }
        }

        tracing::info!(
            examined = report.examined,
            trials_expired = report.trials_expired,
            subscriptions_lapsed = report.subscriptions_lapsed,
            failed = report.failed,
            "trial sweep finished"
        );
        Ok(report)
    }

    /// PAID or TRIAL tenants whose end date passed become PAST_DUE
    pub fn sweep_expired_subscriptions(&self, now: DateTime<Utc>) -> MarketResult<SweepReport> {
        let mut report = SweepReport::default();

        for status in [SubscriptionStatus::Paid, SubscriptionStatus::Trial] {
            for tenant in self.tenants.find_by_status(status)? {
                report.examined += 1;
                let lapsed = |t: &Tenant| t.subscription_status.can_sell() && t.period_ended(now);
                match self.transition(&tenant, now, lapsed, SubscriptionStatus::PastDue) {
                    Outcome::Changed => {
                        report.subscriptions_lapsed += 1;
                        tracing::warn!(tenant = %tenant.id, from = %status, "subscription ended, moved to PAST_DUE");
                    }
                    Outcome::Failed => report.failed += 1,
                    Outcome::Unchanged => {}
                }
            }
        }

        tracing::info!(
            examined = report.examined,
            lapsed = report.subscriptions_lapsed,
            failed = report.failed,
            "subscription sweep finished"
        );
        Ok(report)
    }

    /// Both sweeps, trial length taken from the current configuration
    pub fn run_all(&self, now: DateTime<Utc>) -> MarketResult<SweepReport> {
        let trial_days = self.config.current().trial_days;
        let trials = self.sweep_expired_trials(now, trial_days)?;
        let subscriptions = self.sweep_expired_subscriptions(now)?;
        Ok(trials.merge(subscriptions))
    }

    fn transition<F>(&self, tenant: &Tenant, now: DateTime<Utc>, due: F, to: SubscriptionStatus) -> Outcome
    where
        F: Fn(&Tenant) -> bool,
    {
        // Re-check under the row lock: a payment approval may have landed
        // since the tenant was listed.
        let result = self.tenants.update(&tenant.id, &mut |t: &mut Tenant| {
            if !due(&*t) {
                return false;
            }
            t.set_status(to, now);
            true
        });

        match result {
            Ok(Some(_)) => Outcome::Changed,
            Ok(None) => Outcome::Unchanged,
            Err(err) => {
                tracing::error!(tenant = %tenant.id, error = %err, "sweep could not update tenant");
                Outcome::Failed
            }
        }
    }
}
