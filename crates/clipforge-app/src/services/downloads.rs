//! [`JobOrchestrator`] backed by the job/file/rate-limit domain services and
//! the yt-dlp extractor adapter.
//!
//! `submit` only creates the job record and admits it against the
//! dimensions already known at request time; the rest of the pipeline
//! (probing, format resolution, the second rate-limit pass, the actual
//! download, and completion/failure) runs on a detached task so the HTTP
//! handler returns as soon as the job exists.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, warn};

use clipforge_api::JobOrchestrator;
use clipforge_config::RateLimitConfig;
use clipforge_core::{
    AdmissionOutcome, ClientIp, DomainError, DomainEvent, DomainResult, ErrorCategory, FileManager,
    FormatId, FormatType, JobId, JobManager, JobProgress, JobStatusInfo, ProgressOutcome,
    RateLimitManager, VideoProcessor,
};
use clipforge_data::{PgFileRepository, PgJobRepository, PgRateLimitRepository};
use clipforge_events::EventBus;
use clipforge_extractor::format::FormatRequest;
use clipforge_extractor::ytdlp::{
    DownloadRequest, ExtractorEventSink, RawPostprocessorEvent, RawProgressEvent,
    RawProgressStatus,
};
use clipforge_extractor::{categorize_error, Extractor, YtDlpExtractor};
use clipforge_storage::FilesystemStorage;
use clipforge_telemetry::metrics::Metrics;

/// Lower bound of the download-phase progress clamp (§ job_manager's
/// `JobProgress::downloading` doc comment calls this out as the caller's job).
const DOWNLOAD_PROGRESS_FLOOR: u8 = 10;
/// Upper bound of the download-phase progress clamp; the remainder is reserved
/// for post-processing so a job never reports 100% before it is `COMPLETED`.
const DOWNLOAD_PROGRESS_CEIL: u8 = 95;
/// Reported when the extractor hasn't told us a total size yet.
const DOWNLOAD_PROGRESS_UNKNOWN_SIZE: u8 = 50;
/// Share of the `[10, 95]` band driven by known download fraction; the rest
/// is the fixed `DOWNLOAD_PROGRESS_FLOOR` offset.
const DOWNLOAD_PROGRESS_SPAN: f64 = 85.0;

/// Failure captured from any step of the background execution pipeline,
/// destined for [`JobManager::fail`].
struct JobFailure {
    category: &'static str,
    message: String,
}

impl JobFailure {
    fn new(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl From<DomainError> for JobFailure {
    fn from(error: DomainError) -> Self {
        Self::new(error.category().wire_id(), error.to_string())
    }
}

type StepResult<T> = Result<T, JobFailure>;

pub(crate) struct DownloadService {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: Arc<JobManager<PgJobRepository>>,
    files: Arc<FileManager<PgFileRepository, FilesystemStorage>>,
    rate_limits: Arc<RateLimitManager<PgRateLimitRepository>>,
    rate_limit_config: Arc<RateLimitConfig>,
    video: Arc<VideoProcessor>,
    extractor: Arc<YtDlpExtractor>,
    events: EventBus,
    metrics: Arc<Metrics>,
    file_ttl: chrono::Duration,
}

impl DownloadService {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        jobs: Arc<JobManager<PgJobRepository>>,
        files: Arc<FileManager<PgFileRepository, FilesystemStorage>>,
        rate_limits: Arc<RateLimitManager<PgRateLimitRepository>>,
        rate_limit_config: Arc<RateLimitConfig>,
        video: Arc<VideoProcessor>,
        extractor: Arc<YtDlpExtractor>,
        events: EventBus,
        metrics: Arc<Metrics>,
        file_ttl: chrono::Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs,
                files,
                rate_limits,
                rate_limit_config,
                video,
                extractor,
                events,
                metrics,
                file_ttl,
            }),
        }
    }
}

#[async_trait]
impl JobOrchestrator for DownloadService {
    async fn submit(
        &self,
        client: ClientIp,
        url: String,
        format_id: FormatId,
    ) -> DomainResult<JobId> {
        if !self.inner.video.validate_url(&url) {
            return Err(DomainError::InvalidValue {
                field: "url",
                reason: "must be an absolute http(s) URL with a host".to_string(),
            });
        }

        let job = self.inner.jobs.create(url, format_id).await?;
        let job_id = job.job_id;
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.execute(job_id, client).await });
        Ok(job_id)
    }

    async fn status(&self, job_id: JobId) -> DomainResult<JobStatusInfo> {
        self.inner.jobs.status_info(job_id).await
    }

    async fn cancel(&self, job_id: JobId) -> DomainResult<bool> {
        self.inner.jobs.delete(job_id).await
    }
}

impl Inner {
    /// Run the full pipeline for a freshly created job, failing it on any
    /// error rather than propagating one to a caller that has long since
    /// returned its HTTP response.
    async fn execute(&self, job_id: JobId, client: ClientIp) {
        if let Err(failure) = self.run(job_id, client).await {
            self.metrics.inc_job_outcome("failed");
            match self.jobs.fail(job_id, failure.message, failure.category).await {
                Ok((_, event)) => self.events.publish(event).await,
                Err(error) => error!(%job_id, %error, "failed to record job failure"),
            }
        }
    }

    async fn run(&self, job_id: JobId, client: ClientIp) -> StepResult<()> {
        let (job, started_event) = self.jobs.start(job_id).await?;
        if let Some(event) = started_event {
            self.events.publish(event).await;
        }
        self.metrics.inc_job_outcome("started");

        let raw = self.extractor.probe(&job.url).await.map_err(|error| {
            let category = categorize_error(&error);
            JobFailure::new(category.wire_id(), error.to_string())
        })?;

        let formats = self.video.available_formats(&raw);
        let matched = formats
            .iter()
            .find(|format| format.format_id == job.format_id.as_str())
            .ok_or_else(|| {
                JobFailure::new(
                    ErrorCategory::FormatNotSupported.wire_id(),
                    format!("format '{}' is no longer available for this source", job.format_id),
                )
            })?;

        self.check_format_rate_limit(client, matched.format_type).await?;

        let selector = self.resolve_selector(&job.format_id, matched.format_type)?;
        let request = DownloadRequest {
            url: job.url.clone(),
            job_id,
            format: FormatRequest {
                format_id: Some(selector),
                mute_video: false,
                mute_audio: false,
                quality_cap: None,
            },
            trim: None,
        };

        let sink = ProgressSink {
            jobs: self.jobs.clone(),
            events: self.events.clone(),
            job_id,
            cancelled: AtomicBool::new(false),
        };
        let output_path = self.extractor.download(&request, &sink).await.map_err(|error| {
            let category = categorize_error(&error);
            JobFailure::new(category.wire_id(), error.to_string())
        })?;

        if sink.cancelled.load(Ordering::Relaxed) {
            info!(%job_id, "job was cancelled mid-download; discarding produced artifact");
            return Ok(());
        }

        self.finalize(job_id, &output_path).await
    }

    async fn check_format_rate_limit(
        &self,
        client: ClientIp,
        format_type: FormatType,
    ) -> StepResult<()> {
        if !self.rate_limit_config.enabled {
            return Ok(());
        }
        let dimension = match format_type {
            FormatType::VideoAudio => &self.rate_limit_config.video_audio_daily,
            FormatType::VideoOnly => &self.rate_limit_config.video_only_daily,
            FormatType::AudioOnly => &self.rate_limit_config.audio_only_daily,
        };
        let outcome = self
            .rate_limits
            .check_and_increment(client, dimension, &self.rate_limit_config.whitelist)
            .await;
        match outcome {
            AdmissionOutcome::Rejected(entity) => {
                self.metrics.inc_rate_limit_throttled();
                Err(JobFailure::new(
                    ErrorCategory::RateLimited.wire_id(),
                    format!("daily limit for {} reached", entity.limit_type),
                ))
            }
            AdmissionOutcome::Whitelisted
            | AdmissionOutcome::Admitted(_)
            | AdmissionOutcome::AdmittedDegraded => Ok(()),
        }
    }

    /// A `VideoOnly` match has no audio track on its own; merge in the best
    /// available audio so the produced file is always playable standalone.
    fn resolve_selector(
        &self,
        format_id: &FormatId,
        format_type: FormatType,
    ) -> StepResult<FormatId> {
        match format_type {
            FormatType::VideoOnly => FormatId::parse(format!("{format_id}+bestaudio/best"))
                .map_err(JobFailure::from),
            FormatType::VideoAudio | FormatType::AudioOnly => Ok(format_id.clone()),
        }
    }

    async fn finalize(&self, job_id: JobId, output_path: &Path) -> StepResult<()> {
        let bytes = tokio::fs::read(output_path).await.map_err(|source| {
            JobFailure::new(
                ErrorCategory::SystemError.wire_id(),
                format!("failed to read produced file: {source}"),
            )
        })?;
        let filename = output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| job_id.to_string());
        let relative_path = format!("{job_id}/{filename}");

        let (_, token) = self
            .files
            .register(job_id, relative_path, filename, &bytes, Utc::now(), self.file_ttl)
            .await
            .map_err(JobFailure::from)?;

        let download_url = format!("/api/v1/downloads/file/{token}");
        let expire_at = Utc::now() + self.file_ttl;
        let (_, event) = self
            .jobs
            .complete(job_id, download_url, token, expire_at)
            .await
            .map_err(JobFailure::from)?;
        self.events.publish(event).await;
        self.metrics.inc_job_outcome("completed");
        Ok(())
    }
}

/// Maps raw extractor progress ticks into domain progress updates, clamping
/// the download phase into `[10, 95]` so a job never reports completion
/// before [`JobManager::complete`] actually runs.
///
/// Also detects cancellation: a deleted job record surfaces as
/// [`ProgressOutcome::JobGone`] on the next tick. This adapter has no
/// subprocess-cancellation hook, so it cannot kill the in-flight `yt-dlp`
/// child; it emits [`DomainEvent::JobCancelled`] once and stops writing
/// further progress, letting the extractor run to completion or failure
/// with its output simply discarded (the job record is already gone, so
/// `finalize` will fail to re-complete it).
struct ProgressSink {
    jobs: Arc<JobManager<PgJobRepository>>,
    events: EventBus,
    job_id: JobId,
    cancelled: AtomicBool,
}

impl ProgressSink {
    fn clamp_percentage(event: &RawProgressEvent) -> u8 {
        if event.status == RawProgressStatus::Finished {
            return DOWNLOAD_PROGRESS_CEIL;
        }
        let total = event.total_bytes.or(event.total_bytes_estimate);
        match (event.downloaded_bytes, total) {
            (Some(downloaded), Some(total)) if total > 0 => {
                let scaled = (downloaded as f64 / total as f64 * DOWNLOAD_PROGRESS_SPAN).floor() as u8;
                scaled
                    .saturating_add(DOWNLOAD_PROGRESS_FLOOR)
                    .min(DOWNLOAD_PROGRESS_CEIL)
            }
            _ => DOWNLOAD_PROGRESS_UNKNOWN_SIZE,
        }
    }

    async fn apply(&self, progress: JobProgress) {
        if self.cancelled.load(Ordering::Relaxed) {
            return;
        }
        match self.jobs.update_progress(self.job_id, progress.clone()).await {
            Ok(ProgressOutcome::Applied) => {
                self.events
                    .publish(DomainEvent::JobProgressUpdated {
                        job_id: self.job_id,
                        progress,
                        occurred_at: Utc::now(),
                    })
                    .await;
            }
            Ok(ProgressOutcome::JobGone) => {
                self.cancelled.store(true, Ordering::Relaxed);
                self.events
                    .publish(DomainEvent::JobCancelled {
                        job_id: self.job_id,
                        occurred_at: Utc::now(),
                    })
                    .await;
            }
            Ok(ProgressOutcome::RefusedTerminal) => {}
            Err(error) => warn!(job_id = %self.job_id, %error, "failed to record progress tick"),
        }
    }
}

#[async_trait]
impl ExtractorEventSink for ProgressSink {
    async fn on_progress(&self, event: RawProgressEvent) {
        let percentage = Self::clamp_percentage(&event);
        if event.status == RawProgressStatus::Finished {
            self.apply(JobProgress::processing(percentage)).await;
        } else {
            self.apply(JobProgress::downloading(percentage, event.speed, event.eta))
                .await;
        }
    }

    async fn on_postprocessor(&self, event: RawPostprocessorEvent) {
        info!(
            job_id = %self.job_id,
            postprocessor = %event.postprocessor,
            status = %event.status,
            "extractor post-processor tick"
        );
        let percentage = if event.status == "finished" {
            DOWNLOAD_PROGRESS_CEIL
        } else {
            DOWNLOAD_PROGRESS_CEIL.saturating_sub(2)
        };
        self.apply(JobProgress::processing(percentage)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(
        status: RawProgressStatus,
        downloaded: Option<u64>,
        total: Option<u64>,
    ) -> RawProgressEvent {
        RawProgressEvent {
            status,
            downloaded_bytes: downloaded,
            total_bytes: total,
            total_bytes_estimate: None,
            speed: None,
            eta: None,
        }
    }

    #[test]
    fn clamp_percentage_reports_ceiling_once_finished() {
        let event = progress(RawProgressStatus::Finished, Some(100), Some(100));
        assert_eq!(ProgressSink::clamp_percentage(&event), DOWNLOAD_PROGRESS_CEIL);
    }

    #[test]
    fn clamp_percentage_falls_back_to_fifty_without_known_size() {
        let event = progress(RawProgressStatus::Downloading, Some(512), None);
        assert_eq!(ProgressSink::clamp_percentage(&event), DOWNLOAD_PROGRESS_UNKNOWN_SIZE);
    }

    #[test]
    fn clamp_percentage_matches_formula_near_the_start() {
        let event = progress(RawProgressStatus::Downloading, Some(10), Some(100));
        assert_eq!(ProgressSink::clamp_percentage(&event), 18);
    }

    #[test]
    fn clamp_percentage_stays_within_bounds_near_completion() {
        let event = progress(RawProgressStatus::Downloading, Some(99), Some(100));
        assert_eq!(ProgressSink::clamp_percentage(&event), 94);
    }

    #[test]
    fn clamp_percentage_uses_estimate_when_exact_total_is_missing() {
        let mut event = progress(RawProgressStatus::Downloading, Some(25), None);
        event.total_bytes_estimate = Some(100);
        assert_eq!(ProgressSink::clamp_percentage(&event), 31);
    }

    #[test]
    fn job_failure_from_domain_error_carries_its_wire_category() {
        let failure: JobFailure = DomainError::FileNotFound.into();
        assert_eq!(failure.category, DomainError::FileNotFound.category().wire_id());
        assert_eq!(failure.message, DomainError::FileNotFound.to_string());
    }

    #[test]
    fn job_failure_new_stores_fixed_category_and_message() {
        let failure = JobFailure::new(ErrorCategory::RateLimited.wire_id(), "daily limit for daily_total reached");
        assert_eq!(failure.category, ErrorCategory::RateLimited.wire_id());
        assert_eq!(failure.message, "daily limit for daily_total reached");
    }
}
