//! Persistence contracts implemented by storage adapters.
//!
//! The domain services in [`crate::service`] are written against these traits
//! only; no domain code depends on a concrete store. Adapters (e.g. the
//! Postgres-backed implementation in `clipforge-data`) are responsible for
//! making the mutations listed in each trait's doc comment atomic, per the
//! concurrency model: a mutation that would overwrite a terminal job, or a
//! rate-limit counter read/increment, must be a single round trip to the
//! store, not a client-side read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainResult;
use crate::model::{
    ClientIp, DownloadJob, DownloadToken, DownloadedFile, JobArchive, JobId, JobProgress,
    JobStatus, RateLimitEntity,
};

/// Outcome of an atomic job-mutation attempt.
///
/// Every [`JobRepository`] mutation returns one of these instead of throwing,
/// so the calling domain service can distinguish "nothing to do" (idempotent
/// no-op), "the store refused it" (terminal-state guard fired), and "the
/// record is gone" (deleted by a concurrent cancellation) without a separate
/// existence check.
#[derive(Debug, Clone)]
pub enum JobMutationOutcome {
    /// The mutation was applied; the returned job reflects the new state.
    Applied(Box<DownloadJob>),
    /// The mutation was a legal no-op (e.g. `start` on an already-`PROCESSING` job).
    NoOp(Box<DownloadJob>),
    /// The mutation was rejected because the job is in a terminal state.
    Rejected {
        /// The terminal state the job was found in.
        status: JobStatus,
    },
    /// No job exists with the given identifier.
    NotFound,
}

/// Persistence contract for [`DownloadJob`] aggregates.
///
/// Implementations MUST perform `start`, `update_progress`, `complete`, and
/// `fail` as a single atomic operation at the store (e.g. a `PL/pgSQL`
/// function invoked in one round trip) that re-checks the job's current
/// status before applying the mutation.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a newly created `PENDING` job.
    async fn create(&self, job: &DownloadJob) -> DomainResult<()>;

    /// Fetch a job by id, without mutating it.
    async fn find(&self, job_id: JobId) -> DomainResult<Option<DownloadJob>>;

    /// Atomically transition `PENDING` → `PROCESSING`.
    ///
    /// Idempotent: a job already `PROCESSING` yields [`JobMutationOutcome::NoOp`].
    async fn start(&self, job_id: JobId, now: DateTime<Utc>) -> DomainResult<JobMutationOutcome>;

    /// Atomically update progress. Refuses to apply if the job is terminal.
    async fn update_progress(
        &self,
        job_id: JobId,
        progress: &JobProgress,
        now: DateTime<Utc>,
    ) -> DomainResult<JobMutationOutcome>;

    /// Atomically mark the job `COMPLETED`, forcing terminal progress.
    async fn complete(
        &self,
        job_id: JobId,
        download_url: &str,
        download_token: &DownloadToken,
        expire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<JobMutationOutcome>;

    /// Atomically mark the job `FAILED`. Always legal while the job exists.
    async fn fail(
        &self,
        job_id: JobId,
        message: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<JobMutationOutcome>;

    /// Delete a job record. Returns `false` if no record existed.
    async fn delete(&self, job_id: JobId) -> DomainResult<bool>;

    /// List terminal jobs whose last update is older than `cutoff`.
    async fn list_terminal_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DomainResult<Vec<DownloadJob>>;
}

/// Persistence contract for [`DownloadedFile`] metadata.
///
/// `register` MUST replace any prior entry for the same `job_id`, including
/// its token index, as a single atomic operation.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Persist a new file registration, replacing any existing entry for `job_id`.
    async fn register(&self, file: &DownloadedFile) -> DomainResult<()>;

    /// Fetch a file entry by its token, regardless of expiry.
    async fn find_by_token(&self, token: &DownloadToken) -> DomainResult<Option<DownloadedFile>>;

    /// Fetch a file entry by owning job id, regardless of expiry.
    async fn find_by_job_id(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>>;

    /// Delete a file entry by token. Returns `false` if no record existed.
    async fn delete_by_token(&self, token: &DownloadToken) -> DomainResult<bool>;

    /// List every file entry whose `expires_at` is at or before `now`.
    async fn list_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<DownloadedFile>>;
}

/// Persistence contract for the post-mortem [`JobArchive`] store.
#[async_trait]
pub trait JobArchiveRepository: Send + Sync {
    /// Write an archive record along with its status/date secondary indexes.
    async fn save(&self, archive: &JobArchive) -> DomainResult<()>;

    /// Fetch a single archived job by id.
    async fn find(&self, job_id: JobId) -> DomainResult<Option<JobArchive>>;

    /// List archived jobs with the given terminal status, most recent first.
    async fn list_by_status(&self, status: JobStatus, limit: i64) -> DomainResult<Vec<JobArchive>>;

    /// List archived jobs archived on the given UTC calendar date (`YYYY-MM-DD`).
    async fn list_by_date(&self, date: &str) -> DomainResult<Vec<JobArchive>>;
}

/// Result of an atomic rate-limit increment.
#[derive(Debug, Clone)]
pub struct RateLimitIncrement {
    /// The counter state after the increment was applied.
    pub entity: RateLimitEntity,
    /// Whether this increment was admitted (`current_count <= limit`).
    pub admitted: bool,
}

/// Persistence contract for distributed rate-limit counters.
///
/// `increment` MUST be a single atomic `INCR`-with-`EXPIRE`-style operation:
/// read the current counter, compare against `limit`, increment, and
/// (re)set the window boundary, all in one round trip.
#[async_trait]
pub trait RateLimitRepository: Send + Sync {
    /// Atomically increment the counter for `(client, limit_type)` and report
    /// whether the post-increment count is within `limit` for the window
    /// ending at `reset_at`.
    async fn increment(
        &self,
        client: &ClientIp,
        limit_type: &str,
        limit: u32,
        reset_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<RateLimitIncrement>;

    /// Delete every counter key for a given client (used by tests and operators).
    async fn reset_client(&self, client: &ClientIp) -> DomainResult<()>;
}

/// Persistence contract for the physical bytes behind a [`DownloadedFile`].
///
/// Adapters are filesystem- or object-store-backed; the domain layer never
/// touches bytes directly.
#[async_trait]
pub trait FileStorageRepository: Send + Sync {
    /// Persist `bytes` at `path`, creating any parent directories as needed.
    async fn save(&self, path: &str, bytes: &[u8]) -> DomainResult<bool>;

    /// Read back the bytes at `path`, or `None` if absent.
    async fn get(&self, path: &str) -> DomainResult<Option<Vec<u8>>>;

    /// Delete the bytes at `path`. Idempotent: deleting an absent path is not an error.
    async fn delete(&self, path: &str) -> DomainResult<bool>;

    /// Whether `path` currently exists.
    async fn exists(&self, path: &str) -> DomainResult<bool>;

    /// Size of the bytes at `path`, or `None` if absent.
    async fn get_size(&self, path: &str) -> DomainResult<Option<u64>>;

    /// Logical root the adapter composes absolute paths under.
    ///
    /// Exposed for parity with the source interface; used only for disk I/O,
    /// never echoed to clients (see `DESIGN.md`).
    fn base_path(&self) -> &str;
}

/// Opaque handle identifying a rate-limited client for logging purposes
/// without leaking the raw address.
#[must_use]
pub fn client_key_for(client: &ClientIp) -> String {
    client.hash_for_key()
}

/// Convenience conversion used by reaper sweeps that operate on raw ids.
#[must_use]
pub fn job_id_from_uuid(id: Uuid) -> JobId {
    id
}
