//! Postgres-backed implementations of the [`clipforge_core::repository`] traits.
//!
//! Each multi-step mutation described by a trait's doc comment as "must be
//! a single round trip" is realized here as one call to a `PL/pgSQL`
//! function in `migrations/0001_init.sql` (`clipforge_runtime.*`), never a
//! client-side read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clipforge_core::{
    ClientIp, DomainError, DomainResult, DownloadJob, DownloadToken, DownloadedFile, FileRepository,
    FormatId, JobArchive, JobArchiveRepository, JobId, JobMutationOutcome, JobProgress,
    JobRepository, JobStatus, RateLimitEntity, RateLimitIncrement, RateLimitRepository,
};
use sqlx::{FromRow, PgPool, Row};

/// Shared Postgres connection pool, with migrations applied.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and apply any pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DataError`] if the database is unreachable or
    /// migrations fail to apply.
    pub async fn connect(database_url: &str) -> crate::DataResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|source| crate::DataError::QueryFailed {
                operation: "connect",
                source,
            })?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|source| crate::DataError::MigrationFailed { source })?;
        Ok(Self { pool })
    }

    /// Wrap an already-connected, already-migrated pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Borrow the underlying pool, e.g. for health checks.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Construct every repository adapter over this pool.
    #[must_use]
    pub fn job_repository(&self) -> PgJobRepository {
        PgJobRepository {
            pool: self.pool.clone(),
        }
    }

    /// Construct the file-metadata repository adapter.
    #[must_use]
    pub fn file_repository(&self) -> PgFileRepository {
        PgFileRepository {
            pool: self.pool.clone(),
        }
    }

    /// Construct the archive repository adapter.
    #[must_use]
    pub fn job_archive_repository(&self) -> PgJobArchiveRepository {
        PgJobArchiveRepository {
            pool: self.pool.clone(),
        }
    }

    /// Construct the rate-limit counter repository adapter.
    #[must_use]
    pub fn rate_limit_repository(&self) -> PgRateLimitRepository {
        PgRateLimitRepository {
            pool: self.pool.clone(),
        }
    }
}

fn persistence_failure(context: &'static str, source: sqlx::Error) -> DomainError {
    DomainError::PersistenceFailure(format!("{context}: {source}"))
}

#[derive(FromRow)]
struct JobRow {
    job_id: JobId,
    url: String,
    format_id: String,
    status: String,
    progress: sqlx::types::Json<JobProgress>,
    error_message: Option<String>,
    error_category: Option<String>,
    download_url: Option<String>,
    download_token: Option<String>,
    expire_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for DownloadJob {
    type Error = DomainError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "pending" => JobStatus::Pending,
            "processing" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            other => {
                return Err(DomainError::PersistenceFailure(format!(
                    "unknown job status {other:?} in storage"
                )))
            }
        };
        let download_token = row
            .download_token
            .map(DownloadToken::parse)
            .transpose()
            .map_err(|error| DomainError::PersistenceFailure(error.to_string()))?;
        Ok(Self {
            job_id: row.job_id,
            url: row.url,
            format_id: FormatId::parse(row.format_id)
                .map_err(|error| DomainError::PersistenceFailure(error.to_string()))?,
            status,
            progress: row.progress.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
            error_message: row.error_message,
            error_category: row.error_category,
            download_url: row.download_url,
            download_token,
            expire_at: row.expire_at,
        })
    }
}

/// Postgres-backed [`JobRepository`].
#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, job: &DownloadJob) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO clipforge_runtime.jobs
                (job_id, url, format_id, status, progress, error_message, error_category,
                 download_url, download_token, expire_at, created_at, updated_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(job.job_id)
        .bind(&job.url)
        .bind(job.format_id.as_str())
        .bind(job.status.as_str())
        .bind(sqlx::types::Json(&job.progress))
        .bind(&job.error_message)
        .bind(&job.error_category)
        .bind(&job.download_url)
        .bind(job.download_token.as_ref().map(DownloadToken::as_str))
        .bind(job.expire_at)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|source| persistence_failure("create job", source))?;
        Ok(())
    }

    async fn find(&self, job_id: JobId) -> DomainResult<Option<DownloadJob>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM clipforge_runtime.jobs WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| persistence_failure("find job", source))?;
        row.map(DownloadJob::try_from).transpose()
    }

    async fn start(&self, job_id: JobId, now: DateTime<Utc>) -> DomainResult<JobMutationOutcome> {
        let row = sqlx::query("SELECT * FROM clipforge_runtime.start_job($1, $2)")
            .bind(job_id)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| persistence_failure("start job", source))?;
        mutation_outcome_from_row(&row)
    }

    async fn update_progress(
        &self,
        job_id: JobId,
        progress: &JobProgress,
        now: DateTime<Utc>,
    ) -> DomainResult<JobMutationOutcome> {
        let row = sqlx::query(
            "SELECT * FROM clipforge_runtime.update_job_progress($1, $2, $3)",
        )
        .bind(job_id)
        .bind(sqlx::types::Json(progress))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|source| persistence_failure("update job progress", source))?;
        mutation_outcome_from_row(&row)
    }

    async fn complete(
        &self,
        job_id: JobId,
        download_url: &str,
        download_token: &DownloadToken,
        expire_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<JobMutationOutcome> {
        let row = sqlx::query(
            "SELECT * FROM clipforge_runtime.complete_job($1, $2, $3, $4, $5)",
        )
        .bind(job_id)
        .bind(download_url)
        .bind(download_token.as_str())
        .bind(expire_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|source| persistence_failure("complete job", source))?;
        terminal_outcome_from_row(&row)
    }

    async fn fail(
        &self,
        job_id: JobId,
        message: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<JobMutationOutcome> {
        let row = sqlx::query("SELECT * FROM clipforge_runtime.fail_job($1, $2, $3, $4)")
            .bind(job_id)
            .bind(message)
            .bind(category)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|source| persistence_failure("fail job", source))?;
        terminal_outcome_from_row(&row)
    }

    async fn delete(&self, job_id: JobId) -> DomainResult<bool> {
        let result = sqlx::query("DELETE FROM clipforge_runtime.jobs WHERE job_id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await
            .map_err(|source| persistence_failure("delete job", source))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_terminal_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> DomainResult<Vec<DownloadJob>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM clipforge_runtime.jobs
             WHERE status IN ('completed', 'failed') AND updated_at <= $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| persistence_failure("list terminal jobs", source))?;
        rows.into_iter().map(DownloadJob::try_from).collect()
    }
}

fn mutation_outcome_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<JobMutationOutcome> {
    let outcome: String = row
        .try_get("outcome")
        .map_err(|source| persistence_failure("decode mutation outcome", source))?;
    match outcome.as_str() {
        "not_found" => Ok(JobMutationOutcome::NotFound),
        "rejected" => {
            let status_label: String = row
                .try_get("rejected_status")
                .map_err(|source| persistence_failure("decode rejected status", source))?;
            Ok(JobMutationOutcome::Rejected {
                status: parse_status(&status_label)?,
            })
        }
        "noop" | "applied" => {
            let job_row: JobRow = FromRow::from_row(row)
                .map_err(|source| persistence_failure("decode mutated job", source))?;
            let job = DownloadJob::try_from(job_row)?;
            Ok(if outcome == "noop" {
                JobMutationOutcome::NoOp(Box::new(job))
            } else {
                JobMutationOutcome::Applied(Box::new(job))
            })
        }
        other => Err(DomainError::PersistenceFailure(format!(
            "unknown mutation outcome {other:?}"
        ))),
    }
}

fn terminal_outcome_from_row(row: &sqlx::postgres::PgRow) -> DomainResult<JobMutationOutcome> {
    let outcome: String = row
        .try_get("outcome")
        .map_err(|source| persistence_failure("decode mutation outcome", source))?;
    if outcome == "not_found" {
        return Ok(JobMutationOutcome::NotFound);
    }
    let job_row: JobRow = FromRow::from_row(row)
        .map_err(|source| persistence_failure("decode mutated job", source))?;
    Ok(JobMutationOutcome::Applied(Box::new(DownloadJob::try_from(
        job_row,
    )?)))
}

fn parse_status(label: &str) -> DomainResult<JobStatus> {
    match label {
        "pending" => Ok(JobStatus::Pending),
        "processing" => Ok(JobStatus::Processing),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(DomainError::PersistenceFailure(format!(
            "unknown job status {other:?} in storage"
        ))),
    }
}

#[derive(FromRow)]
struct FileRow {
    download_token: String,
    job_id: JobId,
    relative_path: String,
    filename: String,
    size_bytes: Option<i64>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for DownloadedFile {
    type Error = DomainError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            token: DownloadToken::parse(row.download_token)
                .map_err(|error| DomainError::PersistenceFailure(error.to_string()))?,
            file_path: row.relative_path,
            job_id: row.job_id,
            filename: row.filename,
            filesize: row.size_bytes.map(|size| size.max(0) as u64),
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

/// Postgres-backed [`FileRepository`].
#[derive(Clone)]
pub struct PgFileRepository {
    pool: PgPool,
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn register(&self, file: &DownloadedFile) -> DomainResult<()> {
        sqlx::query(
            r"INSERT INTO clipforge_runtime.downloaded_files
                (download_token, job_id, relative_path, filename, size_bytes, created_at, expires_at)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              ON CONFLICT (job_id) DO UPDATE SET
                download_token = EXCLUDED.download_token,
                relative_path = EXCLUDED.relative_path,
                filename = EXCLUDED.filename,
                size_bytes = EXCLUDED.size_bytes,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(file.token.as_str())
        .bind(file.job_id)
        .bind(&file.file_path)
        .bind(&file.filename)
        .bind(file.filesize.map(|size| size as i64))
        .bind(file.created_at)
        .bind(file.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|source| persistence_failure("register file", source))?;
        Ok(())
    }

    async fn find_by_token(&self, token: &DownloadToken) -> DomainResult<Option<DownloadedFile>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM clipforge_runtime.downloaded_files WHERE download_token = $1",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| persistence_failure("find file by token", source))?;
        row.map(DownloadedFile::try_from).transpose()
    }

    async fn find_by_job_id(&self, job_id: JobId) -> DomainResult<Option<DownloadedFile>> {
        let row = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM clipforge_runtime.downloaded_files WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| persistence_failure("find file by job", source))?;
        row.map(DownloadedFile::try_from).transpose()
    }

    async fn delete_by_token(&self, token: &DownloadToken) -> DomainResult<bool> {
        let result = sqlx::query(
            "DELETE FROM clipforge_runtime.downloaded_files WHERE download_token = $1",
        )
        .bind(token.as_str())
        .execute(&self.pool)
        .await
        .map_err(|source| persistence_failure("delete file", source))?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> DomainResult<Vec<DownloadedFile>> {
        let rows = sqlx::query_as::<_, FileRow>(
            "SELECT * FROM clipforge_runtime.downloaded_files WHERE expires_at <= $1",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| persistence_failure("list expired files", source))?;
        rows.into_iter().map(DownloadedFile::try_from).collect()
    }
}

/// Postgres-backed [`JobArchiveRepository`].
///
/// The archive row stores the full snapshot as a `jsonb` payload; the
/// `status`/`archived_at` columns exist purely as query indexes, mirroring
/// the KV rendition's `archive:index:status:*`/`archive:index:date:*` sets.
#[derive(Clone)]
pub struct PgJobArchiveRepository {
    pool: PgPool,
}

#[async_trait]
impl JobArchiveRepository for PgJobArchiveRepository {
    async fn save(&self, archive: &JobArchive) -> DomainResult<()> {
        let payload = serde_json::to_value(archive)
            .map_err(|error| DomainError::PersistenceFailure(error.to_string()))?;
        sqlx::query(
            r"INSERT INTO clipforge_runtime.job_archives (job_id, status, archived_at, payload)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (job_id) DO UPDATE SET
                status = EXCLUDED.status,
                archived_at = EXCLUDED.archived_at,
                payload = EXCLUDED.payload",
        )
        .bind(archive.job_id)
        .bind(archive.status.as_str())
        .bind(archive.archived_at)
        .bind(sqlx::types::Json(payload))
        .execute(&self.pool)
        .await
        .map_err(|source| persistence_failure("save job archive", source))?;
        Ok(())
    }

    async fn find(&self, job_id: JobId) -> DomainResult<Option<JobArchive>> {
        let row: Option<(sqlx::types::Json<JobArchive>,)> = sqlx::query_as(
            "SELECT payload FROM clipforge_runtime.job_archives WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|source| persistence_failure("find job archive", source))?;
        Ok(row.map(|(payload,)| payload.0))
    }

    async fn list_by_status(&self, status: JobStatus, limit: i64) -> DomainResult<Vec<JobArchive>> {
        let rows: Vec<(sqlx::types::Json<JobArchive>,)> = sqlx::query_as(
            r"SELECT payload FROM clipforge_runtime.job_archives
              WHERE status = $1
              ORDER BY archived_at DESC
              LIMIT $2",
        )
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| persistence_failure("list job archives by status", source))?;
        Ok(rows.into_iter().map(|(payload,)| payload.0).collect())
    }

    async fn list_by_date(&self, date: &str) -> DomainResult<Vec<JobArchive>> {
        let rows: Vec<(sqlx::types::Json<JobArchive>,)> = sqlx::query_as(
            r"SELECT payload FROM clipforge_runtime.job_archives
              WHERE archived_at::date = $1::date
              ORDER BY archived_at DESC",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|source| persistence_failure("list job archives by date", source))?;
        Ok(rows.into_iter().map(|(payload,)| payload.0).collect())
    }
}

/// Postgres-backed [`RateLimitRepository`].
#[derive(Clone)]
pub struct PgRateLimitRepository {
    pool: PgPool,
}

#[async_trait]
impl RateLimitRepository for PgRateLimitRepository {
    async fn increment(
        &self,
        client: &ClientIp,
        limit_type: &str,
        limit: u32,
        reset_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<RateLimitIncrement> {
        let client_key = clipforge_core::client_key_for(client);
        let row = sqlx::query(
            "SELECT * FROM clipforge_runtime.increment_rate_limit($1, $2, $3, $4, $5)",
        )
        .bind(&client_key)
        .bind(limit_type)
        .bind(i32::try_from(limit).unwrap_or(i32::MAX))
        .bind(reset_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|source| persistence_failure("increment rate limit", source))?;

        let current_count: i32 = row
            .try_get("current_count")
            .map_err(|source| persistence_failure("decode rate limit count", source))?;
        let reset_at: DateTime<Utc> = row
            .try_get("reset_at")
            .map_err(|source| persistence_failure("decode rate limit reset", source))?;
        let admitted: bool = row
            .try_get("admitted")
            .map_err(|source| persistence_failure("decode rate limit admission", source))?;

        let entity = RateLimitEntity {
            client_key,
            limit_type: limit_type.to_string(),
            current_count: current_count.max(0) as u32,
            limit,
            reset_at,
        };
        Ok(RateLimitIncrement { entity, admitted })
    }

    async fn reset_client(&self, client: &ClientIp) -> DomainResult<()> {
        let client_key = clipforge_core::client_key_for(client);
        sqlx::query("DELETE FROM clipforge_runtime.rate_limit_counters WHERE client_key = $1")
            .bind(client_key)
            .execute(&self.pool)
            .await
            .map_err(|source| persistence_failure("reset rate limit client", source))?;
        Ok(())
    }
}
