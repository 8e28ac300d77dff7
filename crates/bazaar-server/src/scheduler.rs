//! Background Jobs
//!
//! The subscription sweep runs once shortly after startup and then daily at
//! a fixed UTC hour. Limiter cleanup runs on a fixed interval. Jobs never
//! stop on a failed run; the next tick retries. Sweeps walk the tenant store
//! synchronously, so they run on the blocking pool.

use bazaar_access::LoginRateLimiter;
use bazaar_billing::{SubscriptionSweeper, SweepReport};
use bazaar_common::Clock;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// First instant at `hour:00` UTC strictly after `now`
pub fn next_daily_run(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Run both subscription sweeps once; `None` when the run failed
pub async fn sweep_once(sweeper: Arc<SubscriptionSweeper>, clock: Arc<dyn Clock>) -> Option<SweepReport> {
    let now = clock.now();
    match tokio::task::spawn_blocking(move || sweeper.run_all(now)).await {
        Ok(Ok(report)) => Some(report),
        Ok(Err(err)) => {
            tracing::error!(error = %err, "subscription sweep failed");
            None
        }
        Err(err) => {
            tracing::error!(error = %err, "subscription sweep task died");
            None
        }
    }
}

/// Sweep after `delay`, once
pub fn spawn_startup_sweep(
    sweeper: Arc<SubscriptionSweeper>,
    clock: Arc<dyn Clock>,
    delay: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        sweep_once(sweeper, clock).await;
    })
}

/// Sweep every day at `hour` UTC
pub fn spawn_daily_sweep(sweeper: Arc<SubscriptionSweeper>, clock: Arc<dyn Clock>, hour: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = clock.now();
            let next = next_daily_run(now, hour);
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(next = %next, "next subscription sweep scheduled");
            tokio::time::sleep(wait).await;
            sweep_once(sweeper.clone(), clock.clone()).await;
        }
    })
}

/// Evict stale limiter records every `every`
pub fn spawn_limiter_cleanup(limiter: Arc<LoginRateLimiter>, every: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let removed = limiter.cleanup();
            if removed > 0 {
                tracing::info!(removed, "login limiter records evicted");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_access::RateLimitPolicy;
    use bazaar_billing::{
        InMemoryTenantRepository, SignupPlan, SubscriptionStatus, Tenant, TenantProfile, TenantRepository,
    };
    use bazaar_common::{ManualClock, PlatformConfig};
    use chrono::TimeZone;

    #[test]
    fn test_next_daily_run() {
        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();
        assert_eq!(next_daily_run(morning, 2), Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap());

        let on_the_hour = Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap();
        assert_eq!(next_daily_run(on_the_hour, 2), Utc.with_ymd_and_hms(2024, 5, 2, 2, 0, 0).unwrap());

        let evening = Utc.with_ymd_and_hms(2024, 12, 31, 22, 0, 0).unwrap();
        assert_eq!(next_daily_run(evening, 2), Utc.with_ymd_and_hms(2025, 1, 1, 2, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_startup_sweep_expires_trials() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let stale = Tenant::signup(TenantProfile::named("Old"), SignupPlan::Trial, now - Duration::days(40));
        let fresh = Tenant::signup(TenantProfile::named("New"), SignupPlan::Trial, now - Duration::days(3));
        tenants.insert(&stale).unwrap();
        tenants.insert(&fresh).unwrap();

        let sweeper = Arc::new(SubscriptionSweeper::new(tenants.clone(), Arc::new(PlatformConfig::default())));
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(now));
        spawn_startup_sweep(sweeper, clock, std::time::Duration::from_millis(5))
            .await
            .unwrap();

        let status = |t: &Tenant| tenants.find_by_id(&t.id).unwrap().unwrap().subscription_status;
        assert_eq!(status(&stale), SubscriptionStatus::Free);
        assert_eq!(status(&fresh), SubscriptionStatus::Trial);
    }

    #[tokio::test]
    async fn test_sweep_once_reports_changes() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let tenants = Arc::new(InMemoryTenantRepository::new());
        let stale = Tenant::signup(TenantProfile::named("Old"), SignupPlan::Trial, now - Duration::days(40));
        tenants.insert(&stale).unwrap();
        let sweeper = Arc::new(SubscriptionSweeper::new(tenants.clone(), Arc::new(PlatformConfig::default())));

        let report = sweep_once(sweeper.clone(), Arc::new(ManualClock::new(now))).await.unwrap();
        assert_eq!(report.trials_expired, 1);
        assert_eq!(report.failed, 0);

        let again = sweep_once(sweeper, Arc::new(ManualClock::new(now))).await.unwrap();
        assert_eq!(again.trials_expired, 0);
    }

    #[tokio::test]
    async fn test_limiter_cleanup_task_evicts() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = Arc::new(LoginRateLimiter::with_clock(RateLimitPolicy::default(), clock.clone()));
        limiter.record_failed_attempt("10.0.0.1");
        assert_eq!(limiter.tracked_keys(), 1);
        clock.advance(Duration::hours(1));

        let task = spawn_limiter_cleanup(limiter.clone(), std::time::Duration::from_millis(5));
        for _ in 0..100 {
            if limiter.tracked_keys() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        task.abort();

        assert_eq!(limiter.tracked_keys(), 0);
    }
}
