//! Owns the job state machine and coordinates the job repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{DomainError, DomainResult};
use crate::model::{DomainEvent, DownloadJob, DownloadToken, FormatId, JobId, JobProgress};
use crate::repository::{JobMutationOutcome, JobRepository};

/// Outcome of a progress-update attempt, richer than the plain `bool` the
/// distilled interface describes, so callers can distinguish "the store
/// refused because the job already finished" from "the job record is gone"
/// (§5: the latter signals cancellation and the caller must stop the
/// extractor and emit [`DomainEvent::JobCancelled`] instead of continuing).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// The update was applied.
    Applied,
    /// The job exists but is already terminal; the update was silently refused.
    RefusedTerminal,
    /// No job record exists; treat as a cancellation.
    JobGone,
}

impl ProgressOutcome {
    /// `true` iff the update was applied — the `bool` the distilled spec describes.
    #[must_use]
    pub const fn applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Projection returned by [`JobManager::status_info`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobStatusInfo {
    /// Job identifier.
    pub job_id: JobId,
    /// Current lifecycle state.
    pub status: crate::model::JobStatus,
    /// Current progress snapshot.
    pub progress: JobProgress,
    /// Download URL, once completed.
    pub download_url: Option<String>,
    /// Expiry timestamp, once completed.
    pub expire_at: Option<DateTime<Utc>>,
    /// Seconds remaining until `expire_at`, floored at zero.
    pub time_remaining: Option<i64>,
    /// Failure message, once failed.
    pub error_message: Option<String>,
    /// Failure category, once failed.
    pub error_category: Option<String>,
}

/// Coordinates [`DownloadJob`] lifecycle transitions against a [`JobRepository`].
pub struct JobManager<R> {
    repository: Arc<R>,
}

impl<R: JobRepository> JobManager<R> {
    /// Construct a manager over the given repository.
    pub const fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// Create a new `PENDING` job and persist it.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::PersistenceFailure`] if the store rejects the write.
    pub async fn create(&self, url: impl Into<String>, format_id: FormatId) -> DomainResult<DownloadJob> {
        let job = DownloadJob::create(url, format_id, Utc::now());
        self.repository.create(&job).await?;
        Ok(job)
    }

    /// Fetch a job by id.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobNotFound`] if no such job exists.
    pub async fn get(&self, job_id: JobId) -> DomainResult<DownloadJob> {
        self.repository
            .find(job_id)
            .await?
            .ok_or_else(|| DomainError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Transition a job to `PROCESSING`, idempotently.
    ///
    /// Returns the resulting job plus `Some(event)` when a real transition
    /// occurred, or `None` for the idempotent already-`PROCESSING` case.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobStateError`] if the job is terminal, or
    /// [`DomainError::JobNotFound`] if it no longer exists.
    pub async fn start(&self, job_id: JobId) -> DomainResult<(DownloadJob, Option<DomainEvent>)> {
        match self.repository.start(job_id, Utc::now()).await? {
            JobMutationOutcome::Applied(job) => {
                let event = DomainEvent::JobStarted {
                    job_id,
                    url: job.url.clone(),
                    format_id: job.format_id.as_str().to_string(),
                    occurred_at: job.updated_at,
                };
                Ok((*job, Some(event)))
            }
            JobMutationOutcome::NoOp(job) => Ok((*job, None)),
            JobMutationOutcome::Rejected { status } => Err(DomainError::JobStateError {
                state: status.as_str(),
                action: "start",
            }),
            JobMutationOutcome::NotFound => Err(DomainError::JobNotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    /// Atomically update progress.
    ///
    /// Never loads-then-saves: the repository performs the terminal-status
    /// guard and the write as one atomic operation.
    ///
    /// # Errors
    ///
    /// Propagates only store-level failures; a refused or job-gone outcome
    /// is reported via the returned [`ProgressOutcome`], not an error.
    pub async fn update_progress(
        &self,
        job_id: JobId,
        progress: JobProgress,
    ) -> DomainResult<ProgressOutcome> {
        match self
            .repository
            .update_progress(job_id, &progress, Utc::now())
            .await?
        {
            JobMutationOutcome::Applied(_) => Ok(ProgressOutcome::Applied),
            JobMutationOutcome::NoOp(_) | JobMutationOutcome::Rejected { .. } => {
                Ok(ProgressOutcome::RefusedTerminal)
            }
            JobMutationOutcome::NotFound => Ok(ProgressOutcome::JobGone),
        }
    }

    /// Mark a job `COMPLETED`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobStateError`] if the job is not `PROCESSING`,
    /// or [`DomainError::JobNotFound`] if it no longer exists.
    pub async fn complete(
        &self,
        job_id: JobId,
        download_url: impl Into<String>,
        download_token: DownloadToken,
        expire_at: DateTime<Utc>,
    ) -> DomainResult<(DownloadJob, DomainEvent)> {
        let download_url = download_url.into();
        match self
            .repository
            .complete(job_id, &download_url, &download_token, expire_at, Utc::now())
            .await?
        {
            JobMutationOutcome::Applied(job) => {
                let event = DomainEvent::JobCompleted {
                    job_id,
                    download_url,
                    expire_at,
                    occurred_at: job.updated_at,
                };
                Ok((*job, event))
            }
            JobMutationOutcome::NoOp(job) => {
                // Already completed by a racing worker; report the existing state.
                let event = DomainEvent::JobCompleted {
                    job_id,
                    download_url: job.download_url.clone().unwrap_or_default(),
                    expire_at: job.expire_at.unwrap_or(expire_at),
                    occurred_at: job.updated_at,
                };
                Ok((*job, event))
            }
            JobMutationOutcome::Rejected { status } => Err(DomainError::JobStateError {
                state: status.as_str(),
                action: "complete",
            }),
            JobMutationOutcome::NotFound => Err(DomainError::JobNotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    /// Mark a job `FAILED`. Always legal while the job exists.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobNotFound`] if the job no longer exists
    /// (e.g. it was cancelled concurrently).
    pub async fn fail(
        &self,
        job_id: JobId,
        message: impl Into<String>,
        category: &'static str,
    ) -> DomainResult<(DownloadJob, DomainEvent)> {
        let message = message.into();
        match self
            .repository
            .fail(job_id, &message, category, Utc::now())
            .await?
        {
            JobMutationOutcome::Applied(job) | JobMutationOutcome::NoOp(job) => {
                let event = DomainEvent::JobFailed {
                    job_id,
                    error_message: message,
                    error_category: category.to_string(),
                    occurred_at: job.updated_at,
                };
                Ok((*job, event))
            }
            JobMutationOutcome::Rejected { status } => Err(DomainError::JobStateError {
                state: status.as_str(),
                action: "fail",
            }),
            JobMutationOutcome::NotFound => Err(DomainError::JobNotFound {
                job_id: job_id.to_string(),
            }),
        }
    }

    /// Delete a job record outright (used by `DELETE /jobs/{id}` and cancellation).
    ///
    /// # Errors
    ///
    /// Propagates store failures only; deleting an absent job is not an error.
    pub async fn delete(&self, job_id: JobId) -> DomainResult<bool> {
        self.repository.delete(job_id).await
    }

    /// Project a job's wire-facing status, including `time_remaining`.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::JobNotFound`] if no such job exists.
    pub async fn status_info(&self, job_id: JobId) -> DomainResult<JobStatusInfo> {
        let job = self.get(job_id).await?;
        let now = Utc::now();
        let time_remaining = job
            .expire_at
            .map(|expire_at| (expire_at - now).num_seconds().max(0));
        Ok(JobStatusInfo {
            job_id: job.job_id,
            status: job.status,
            progress: job.progress,
            download_url: job.download_url,
            expire_at: job.expire_at,
            time_remaining,
            error_message: job.error_message,
            error_category: job.error_category,
        })
    }

    /// List terminal jobs older than `expiration` relative to now.
    ///
    /// Used by the reaper (§4.8) to find archival candidates.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_expired(
        &self,
        expiration: chrono::Duration,
    ) -> DomainResult<Vec<DownloadJob>> {
        let cutoff = Utc::now() - expiration;
        self.repository.list_terminal_older_than(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JobStatus;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryJobRepository {
        jobs: Mutex<HashMap<JobId, DownloadJob>>,
    }

    #[async_trait::async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn create(&self, job: &DownloadJob) -> DomainResult<()> {
            self.jobs.lock().unwrap().insert(job.job_id, job.clone());
            Ok(())
        }

        async fn find(&self, job_id: JobId) -> DomainResult<Option<DownloadJob>> {
            Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
        }

        async fn start(&self, job_id: JobId, now: DateTime<Utc>) -> DomainResult<JobMutationOutcome> {
            let mut guard = self.jobs.lock().unwrap();
            let Some(job) = guard.get_mut(&job_id) else {
                return Ok(JobMutationOutcome::NotFound);
            };
            if job.status == JobStatus::Processing {
                return Ok(JobMutationOutcome::NoOp(Box::new(job.clone())));
            }
            match job.start(now) {
                Ok(Some(_)) => Ok(JobMutationOutcome::Applied(Box::new(job.clone()))),
                Ok(None) => Ok(JobMutationOutcome::NoOp(Box::new(job.clone()))),
                Err(DomainError::JobStateError { state, .. }) => {
                    Ok(JobMutationOutcome::Rejected {
                        status: match state {
                            "completed" => JobStatus::Completed,
                            _ => JobStatus::Failed,
                        },
                    })
                }
                Err(other) => Err(other),
            }
        }

        async fn update_progress(
            &self,
            job_id: JobId,
            progress: &JobProgress,
            now: DateTime<Utc>,
        ) -> DomainResult<JobMutationOutcome> {
            let mut guard = self.jobs.lock().unwrap();
            let Some(job) = guard.get_mut(&job_id) else {
                return Ok(JobMutationOutcome::NotFound);
            };
            if job.status.is_terminal() {
                return Ok(JobMutationOutcome::Rejected { status: job.status });
            }
            job.update_progress(progress.clone(), now)
                .map_err(DomainError::from)?;
            Ok(JobMutationOutcome::Applied(Box::new(job.clone())))
        }

        async fn complete(
            &self,
            job_id: JobId,
            download_url: &str,
            download_token: &DownloadToken,
            expire_at: DateTime<Utc>,
            now: DateTime<Utc>,
        ) -> DomainResult<JobMutationOutcome> {
            let mut guard = self.jobs.lock().unwrap();
            let Some(job) = guard.get_mut(&job_id) else {
                return Ok(JobMutationOutcome::NotFound);
            };
            if job.status == JobStatus::Completed {
                return Ok(JobMutationOutcome::NoOp(Box::new(job.clone())));
            }
            match job.complete(download_url, download_token.clone(), expire_at, now) {
                Ok(_) => Ok(JobMutationOutcome::Applied(Box::new(job.clone()))),
                Err(DomainError::JobStateError { .. }) => {
                    Ok(JobMutationOutcome::Rejected { status: job.status })
                }
                Err(other) => Err(other),
            }
        }

        async fn fail(
            &self,
            job_id: JobId,
            message: &str,
            category: &str,
            now: DateTime<Utc>,
        ) -> DomainResult<JobMutationOutcome> {
            let mut guard = self.jobs.lock().unwrap();
            let Some(job) = guard.get_mut(&job_id) else {
                return Ok(JobMutationOutcome::NotFound);
            };
            job.fail(message, Some(Box::leak(category.to_string().into_boxed_str())), now);
            Ok(JobMutationOutcome::Applied(Box::new(job.clone())))
        }

        async fn delete(&self, job_id: JobId) -> DomainResult<bool> {
            Ok(self.jobs.lock().unwrap().remove(&job_id).is_some())
        }

        async fn list_terminal_older_than(
            &self,
            cutoff: DateTime<Utc>,
        ) -> DomainResult<Vec<DownloadJob>> {
            Ok(self
                .jobs
                .lock()
                .unwrap()
                .values()
                .filter(|job| job.is_terminal() && job.updated_at < cutoff)
                .cloned()
                .collect())
        }
    }

    fn manager() -> JobManager<InMemoryJobRepository> {
        JobManager::new(Arc::new(InMemoryJobRepository::default()))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let manager = manager();
        let job = manager
            .create("https://example.test/v/X", FormatId::parse("best").unwrap())
            .await
            .unwrap();
        let fetched = manager.get(job.job_id).await.unwrap();
        assert_eq!(fetched.job_id, job.job_id);
        assert_eq!(fetched.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn get_missing_job_errors() {
        let manager = manager();
        let err = manager.get(uuid::Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, DomainError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let manager = manager();
        let job = manager
            .create("u", FormatId::parse("best").unwrap())
            .await
            .unwrap();
        let (_, first_event) = manager.start(job.job_id).await.unwrap();
        assert!(first_event.is_some());
        let (_, second_event) = manager.start(job.job_id).await.unwrap();
        assert!(second_event.is_none());
    }

    #[tokio::test]
    async fn update_progress_on_gone_job_is_reported_not_errored() {
        let manager = manager();
        let outcome = manager
            .update_progress(uuid::Uuid::new_v4(), JobProgress::downloading(50, None, None))
            .await
            .unwrap();
        assert_eq!(outcome, ProgressOutcome::JobGone);
    }

    #[tokio::test]
    async fn complete_requires_processing_and_yields_event() {
        let manager = manager();
        let job = manager
            .create("u", FormatId::parse("best").unwrap())
            .await
            .unwrap();
        manager.start(job.job_id).await.unwrap();
        let token = DownloadToken::generate();
        let expire_at = Utc::now() + chrono::Duration::minutes(10);
        let (job, event) = manager
            .complete(job.job_id, "https://dl/x", token, expire_at)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(matches!(event, DomainEvent::JobCompleted { .. }));
    }

    #[tokio::test]
    async fn status_info_computes_time_remaining() {
        let manager = manager();
        let job = manager
            .create("u", FormatId::parse("best").unwrap())
            .await
            .unwrap();
        manager.start(job.job_id).await.unwrap();
        let token = DownloadToken::generate();
        let expire_at = Utc::now() + chrono::Duration::seconds(600);
        manager
            .complete(job.job_id, "https://dl/x", token, expire_at)
            .await
            .unwrap();
        let info = manager.status_info(job.job_id).await.unwrap();
        let remaining = info.time_remaining.unwrap();
        assert!((590..=600).contains(&remaining), "remaining was {remaining}");
    }
}
