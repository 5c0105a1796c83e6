//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges the job-orchestration domain actually emits:
//!   HTTP traffic, domain events, rate-limit throttling, and reaper sweeps.

use std::convert::TryFrom;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    events_emitted_total: IntCounterVec,
    jobs_total: IntCounterVec,
    active_jobs: IntGauge,
    reaper_items_removed_total: IntCounterVec,
    reaper_errors_total: IntCounter,
    reaper_duration_ms: IntGauge,
    rate_limit_throttled_total: IntCounter,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Current number of jobs in `PENDING` or `PROCESSING`.
    pub active_jobs: i64,
    /// Duration (ms) of the most recently completed reaper sweep.
    pub reaper_duration_ms: i64,
    /// Total reaper sub-step failures observed.
    pub reaper_errors_total: u64,
    /// Total requests throttled by API rate limiting.
    pub rate_limit_throttled_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests received"),
            &["route", "code"],
        )?;
        let events_emitted_total = IntCounterVec::new(
            Opts::new("events_emitted_total", "Domain events emitted by type"),
            &["type"],
        )?;
        let jobs_total = IntCounterVec::new(
            Opts::new(
                "jobs_total",
                "Download jobs reaching a given lifecycle outcome",
            ),
            &["outcome"],
        )?;
        let active_jobs = IntGauge::with_opts(Opts::new(
            "active_jobs",
            "Jobs currently pending or processing",
        ))?;
        let reaper_items_removed_total = IntCounterVec::new(
            Opts::new(
                "reaper_items_removed_total",
                "Items removed by the reaper per sweep, by kind",
            ),
            &["kind"],
        )?;
        let reaper_errors_total = IntCounter::with_opts(Opts::new(
            "reaper_errors_total",
            "Reaper sub-step failures observed",
        ))?;
        let reaper_duration_ms = IntGauge::with_opts(Opts::new(
            "reaper_duration_ms",
            "Duration of the most recently completed reaper sweep (ms)",
        ))?;
        let rate_limit_throttled_total = IntCounter::with_opts(Opts::new(
            "api_rate_limit_throttled_total",
            "Requests rejected due to API rate limiting",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(events_emitted_total.clone()))?;
        registry.register(Box::new(jobs_total.clone()))?;
        registry.register(Box::new(active_jobs.clone()))?;
        registry.register(Box::new(reaper_items_removed_total.clone()))?;
        registry.register(Box::new(reaper_errors_total.clone()))?;
        registry.register(Box::new(reaper_duration_ms.clone()))?;
        registry.register(Box::new(rate_limit_throttled_total.clone()))?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                http_requests_total,
                events_emitted_total,
                jobs_total,
                active_jobs,
                reaper_items_removed_total,
                reaper_errors_total,
                reaper_duration_ms,
                rate_limit_throttled_total,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the emitted event counter for the specific event type.
    pub fn inc_event(&self, event_type: &str) {
        self.inner
            .events_emitted_total
            .with_label_values(&[event_type])
            .inc();
    }

    /// Increment the job-outcome counter (`started`, `completed`, `failed`, `cancelled`).
    pub fn inc_job_outcome(&self, outcome: &str) {
        self.inner.jobs_total.with_label_values(&[outcome]).inc();
    }

    /// Set the active-job gauge.
    pub fn set_active_jobs(&self, count: i64) {
        self.inner.active_jobs.set(count);
    }

    /// Increment the reaper's removed-item counter for `kind` (`expired_job`,
    /// `expired_file`, `orphaned_file`) by `count`.
    pub fn inc_reaper_items_removed(&self, kind: &str, count: u64) {
        self.inner
            .reaper_items_removed_total
            .with_label_values(&[kind])
            .inc_by(count);
    }

    /// Increment the reaper sub-step failure counter.
    pub fn inc_reaper_error(&self) {
        self.inner.reaper_errors_total.inc();
    }

    /// Record the wall-clock duration of the most recently completed reaper sweep.
    pub fn observe_reaper_duration(&self, duration: Duration) {
        self.inner
            .reaper_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Increment the API rate limiter throttle counter.
    pub fn inc_rate_limit_throttled(&self) {
        self.inner.rate_limit_throttled_total.inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("failed to encode Prometheus metrics")?;
        String::from_utf8(buffer).context("metrics output was not valid UTF-8")
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_jobs: self.inner.active_jobs.get(),
            reaper_duration_ms: self.inner.reaper_duration_ms.get(),
            reaper_errors_total: self.inner.reaper_errors_total.get(),
            rate_limit_throttled_total: self.inner.rate_limit_throttled_total.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 200);
        metrics.inc_event("job_started");
        metrics.inc_job_outcome("completed");
        metrics.set_active_jobs(3);
        metrics.inc_reaper_items_removed("expired_job", 2);
        metrics.inc_reaper_error();
        metrics.observe_reaper_duration(Duration::from_millis(45));
        metrics.inc_rate_limit_throttled();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_jobs, 3);
        assert_eq!(snapshot.reaper_duration_ms, 45);
        assert_eq!(snapshot.reaper_errors_total, 1);
        assert_eq!(snapshot.rate_limit_throttled_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("jobs_total"));
        assert!(rendered.contains("reaper_items_removed_total"));
        Ok(())
    }
}
