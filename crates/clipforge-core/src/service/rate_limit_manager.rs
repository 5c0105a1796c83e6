//! Multi-dimensional rate limiting with graceful degradation on store failure.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::model::{ClientIp, RateLimit, RateLimitEntity};
use crate::repository::RateLimitRepository;

/// Outcome of a rate-limit admission check.
///
/// Never an `Err`: a store failure is swallowed internally (logged, then
/// treated as [`Self::AdmittedDegraded`]) so that rate-limit enforcement can
/// never become a single point of failure for the service (§4.7).
#[derive(Debug, Clone)]
pub enum AdmissionOutcome {
    /// The client bypassed all limits via the whitelist.
    Whitelisted,
    /// The request was admitted within its configured limit.
    Admitted(RateLimitEntity),
    /// The store failed; the request was admitted anyway.
    AdmittedDegraded,
    /// The configured limit was exceeded.
    Rejected(RateLimitEntity),
}

impl AdmissionOutcome {
    /// `true` unless the limit was exceeded.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Enforces one or more [`RateLimit`] dimensions against a [`RateLimitRepository`].
pub struct RateLimitManager<R> {
    repository: Arc<R>,
}

impl<R: RateLimitRepository> RateLimitManager<R> {
    /// Construct a manager over the given repository.
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Check and atomically increment the counter for a single limit dimension.
    ///
    /// `whitelist` bypasses every dimension unconditionally. Repository
    /// failures are logged at `ERROR` and converted into admission, never
    /// propagated to the caller.
    pub async fn check_and_increment(
        &self,
        client: ClientIp,
        limit: &RateLimit,
        whitelist: &[String],
    ) -> AdmissionOutcome {
        if client.is_whitelisted(whitelist) {
            return AdmissionOutcome::Whitelisted;
        }
        let now = Utc::now();
        let reset_at = Self::reset_at(limit, now);
        match self
            .repository
            .increment(&client, &limit.limit_type, limit.limit, reset_at, now)
            .await
        {
            Ok(increment) if increment.admitted => AdmissionOutcome::Admitted(increment.entity),
            Ok(increment) => AdmissionOutcome::Rejected(increment.entity),
            Err(error) => {
                tracing::error!(
                    limit_type = %limit.limit_type,
                    client_key = %client.hash_for_key(),
                    %error,
                    "rate limit store failure; admitting request"
                );
                AdmissionOutcome::AdmittedDegraded
            }
        }
    }

    /// Delete every counter for a client, across all dimensions.
    ///
    /// # Errors
    ///
    /// Propagates repository failures; callers (tests, operator tooling)
    /// decide whether a failed flush is fatal to their use case.
    pub async fn reset_client(&self, client: &ClientIp) -> crate::error::DomainResult<()> {
        self.repository.reset_client(client).await
    }

    /// Compute the next window boundary for a limit's `reset_at`.
    ///
    /// `daily*` resets at the next UTC midnight, `*hourly` at the next hour
    /// boundary, everything else at the next minute boundary.
    fn reset_at(limit: &RateLimit, now: DateTime<Utc>) -> DateTime<Utc> {
        if limit.is_daily() {
            let next_midnight = (now + Duration::days(1))
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .expect("midnight is always a valid time");
            return Utc.from_utc_datetime(&next_midnight);
        }
        if limit.is_hourly() {
            let next_hour = now
                .date_naive()
                .and_hms_opt(now.hour(), 0, 0)
                .expect("top of the hour is always a valid time")
                + Duration::hours(1);
            return Utc.from_utc_datetime(&next_hour);
        }
        let next_minute = now
            .date_naive()
            .and_hms_opt(now.hour(), now.minute(), 0)
            .expect("top of the minute is always a valid time")
            + Duration::minutes(1);
        Utc.from_utc_datetime(&next_minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::RateLimitIncrement;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryRateLimits {
        counters: Mutex<HashMap<(String, String), u32>>,
        fail_next: Mutex<bool>,
    }

    #[async_trait]
    impl RateLimitRepository for InMemoryRateLimits {
        async fn increment(
            &self,
            client: &ClientIp,
            limit_type: &str,
            limit: u32,
            reset_at: DateTime<Utc>,
            _now: DateTime<Utc>,
        ) -> crate::error::DomainResult<RateLimitIncrement> {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(crate::error::DomainError::PersistenceFailure(
                    "simulated outage".to_string(),
                ));
            }
            let key = (client.hash_for_key(), limit_type.to_string());
            let mut counters = self.counters.lock().unwrap();
            let count = counters.entry(key).or_insert(0);
            *count += 1;
            let entity = RateLimitEntity {
                client_key: client.hash_for_key(),
                limit_type: limit_type.to_string(),
                current_count: *count,
                limit,
                reset_at,
            };
            Ok(RateLimitIncrement {
                admitted: *count <= limit,
                entity,
            })
        }

        async fn reset_client(&self, client: &ClientIp) -> crate::error::DomainResult<()> {
            let key_prefix = client.hash_for_key();
            self.counters
                .lock()
                .unwrap()
                .retain(|(client_key, _), _| *client_key != key_prefix);
            Ok(())
        }
    }

    fn manager() -> RateLimitManager<InMemoryRateLimits> {
        RateLimitManager::new(Arc::new(InMemoryRateLimits::default()))
    }

    fn ip(a: u8, b: u8, c: u8, d: u8) -> ClientIp {
        ClientIp::parse(&format!("{a}.{b}.{c}.{d}")).unwrap()
    }

    #[tokio::test]
    async fn admits_until_limit_then_rejects() {
        let manager = manager();
        let limit = RateLimit::new(2, 86_400, "daily_video-only").unwrap();
        let client = ip(203, 0, 113, 1);
        for _ in 0..2 {
            let outcome = manager.check_and_increment(client, &limit, &[]).await;
            assert!(outcome.is_admitted());
        }
        let outcome = manager.check_and_increment(client, &limit, &[]).await;
        assert!(!outcome.is_admitted());
    }

    #[tokio::test]
    async fn whitelisted_client_always_bypasses() {
        let manager = manager();
        let limit = RateLimit::new(1, 86_400, "daily_total").unwrap();
        let client = ip(10, 0, 0, 1);
        let whitelist = vec!["10.0.0.1".to_string()];
        for _ in 0..5 {
            let outcome = manager.check_and_increment(client, &limit, &whitelist).await;
            assert!(matches!(outcome, AdmissionOutcome::Whitelisted));
        }
    }

    #[tokio::test]
    async fn store_failure_degrades_to_admission() {
        let manager = manager();
        let limit = RateLimit::new(1, 60, "per-minute").unwrap();
        *manager.repository.fail_next.lock().unwrap() = true;
        let outcome = manager.check_and_increment(ip(1, 2, 3, 4), &limit, &[]).await;
        assert!(matches!(outcome, AdmissionOutcome::AdmittedDegraded));
    }

    #[tokio::test]
    async fn reset_client_clears_only_that_clients_counters() {
        let manager = manager();
        let limit = RateLimit::new(1, 86_400, "daily_total").unwrap();
        let a = ip(1, 1, 1, 1);
        let b = ip(2, 2, 2, 2);
        manager.check_and_increment(a, &limit, &[]).await;
        manager.check_and_increment(b, &limit, &[]).await;
        manager.reset_client(&a).await.unwrap();
        let outcome = manager.check_and_increment(a, &limit, &[]).await;
        assert!(outcome.is_admitted());
        let outcome = manager.check_and_increment(b, &limit, &[]).await;
        assert!(!outcome.is_admitted());
    }
}
