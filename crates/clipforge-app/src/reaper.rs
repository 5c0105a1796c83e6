//! Background sweep: archives terminal jobs, reaps expired files, and
//! clears stale extractor scratch files, on a fixed interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clipforge_core::{FileManager, JobArchive, JobArchiveRepository, JobManager};
use clipforge_data::{PgFileRepository, PgJobArchiveRepository, PgJobRepository};
use clipforge_storage::scratch::sweep_scratch_dir;
use clipforge_storage::FilesystemStorage;
use clipforge_telemetry::metrics::Metrics;
use tracing::{info, warn};

/// Fixed orphan-file age threshold for the scratch sweep, independent of the
/// configurable job-archival expiration.
const SCRATCH_MAX_AGE: Duration = Duration::from_secs(3600);

pub(crate) struct Reaper {
    jobs: Arc<JobManager<PgJobRepository>>,
    archives: PgJobArchiveRepository,
    files: Arc<FileManager<PgFileRepository, FilesystemStorage>>,
    metrics: Arc<Metrics>,
    scratch_dir: PathBuf,
    interval: Duration,
    job_expiration: chrono::Duration,
}

impl Reaper {
    pub(crate) fn new(
        jobs: Arc<JobManager<PgJobRepository>>,
        archives: PgJobArchiveRepository,
        files: Arc<FileManager<PgFileRepository, FilesystemStorage>>,
        metrics: Arc<Metrics>,
        scratch_dir: PathBuf,
        interval: Duration,
        job_expiration: Duration,
    ) -> Self {
        Self {
            jobs,
            archives,
            files,
            metrics,
            scratch_dir,
            interval,
            job_expiration: chrono::Duration::from_std(job_expiration)
                .unwrap_or_else(|_| chrono::Duration::seconds(3600)),
        }
    }

    /// Run the sweep loop until the process shuts down.
    pub(crate) async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    async fn sweep_once(&self) {
        let start = Instant::now();
        let archived = self.archive_expired_jobs().await;
        let reaped_files = self.reap_expired_files().await;
        let scratch = sweep_scratch_dir(&self.scratch_dir, SCRATCH_MAX_AGE).await;

        self.metrics.inc_reaper_items_removed("archived_jobs", archived);
        self.metrics.inc_reaper_items_removed("expired_files", reaped_files);
        self.metrics
            .inc_reaper_items_removed("scratch_files", scratch.files_removed);
        self.metrics
            .inc_reaper_items_removed("scratch_directories", scratch.directories_removed);
        self.metrics.observe_reaper_duration(start.elapsed());
        info!(
            archived,
            reaped_files,
            scratch_files = scratch.files_removed,
            scratch_directories = scratch.directories_removed,
            "reaper sweep complete"
        );
    }

    async fn archive_expired_jobs(&self) -> u64 {
        let expired = match self.jobs.list_expired(self.job_expiration).await {
            Ok(jobs) => jobs,
            Err(error) => {
                self.metrics.inc_reaper_error();
                warn!(%error, "failed to list expired jobs");
                return 0;
            }
        };
        let mut archived = 0;
        for job in &expired {
            let archive = match JobArchive::from_job(job, chrono::Utc::now()) {
                Ok(archive) => archive,
                Err(error) => {
                    self.metrics.inc_reaper_error();
                    warn!(job_id = %job.job_id, %error, "failed to build archive record");
                    continue;
                }
            };
            if let Err(error) = self.archives.save(&archive).await {
                self.metrics.inc_reaper_error();
                warn!(job_id = %job.job_id, %error, "failed to persist job archive");
                continue;
            }
            if let Err(error) = self.jobs.delete(job.job_id).await {
                self.metrics.inc_reaper_error();
                warn!(job_id = %job.job_id, %error, "failed to delete archived job record");
                continue;
            }
            archived += 1;
        }
        archived
    }

    async fn reap_expired_files(&self) -> u64 {
        let expired = match self.files.list_expired().await {
            Ok(files) => files,
            Err(error) => {
                self.metrics.inc_reaper_error();
                warn!(%error, "failed to list expired files");
                return 0;
            }
        };
        let mut reaped = 0;
        for file in &expired {
            if let Err(error) = self.files.reap(file).await {
                self.metrics.inc_reaper_error();
                warn!(job_id = %file.job_id, %error, "failed to reap expired file");
                continue;
            }
            reaped += 1;
        }
        reaped
    }
}
