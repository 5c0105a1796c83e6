//! Sweeper for the extractor's scratch directory.
//!
//! The extractor writes intermediate files per job under a scratch root
//! before the finished artifact is registered through
//! [`FileStorageRepository`](clipforge_core::FileStorageRepository). A
//! crashed or cancelled job can leave orphaned files behind; this sweeper
//! is the reaper's third step (see `DESIGN.md`).

use std::path::Path;
use std::time::{Duration, SystemTime};

use tracing::warn;

/// Outcome of one scratch-directory sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScratchSweepSummary {
    /// Files removed for being older than the configured age threshold.
    pub files_removed: u64,
    /// Now-empty per-job directories removed, regardless of age.
    pub directories_removed: u64,
}

/// Remove files older than `max_age` under `scratch_dir`, then remove any
/// directory left empty by that removal (or already empty beforehand),
/// regardless of its age.
///
/// Best-effort: a single entry's failure is logged at `WARN` and does not
/// stop the sweep.
pub async fn sweep_scratch_dir(scratch_dir: &Path, max_age: Duration) -> ScratchSweepSummary {
    let mut summary = ScratchSweepSummary::default();
    let now = SystemTime::now();

    let mut entries = match tokio::fs::read_dir(scratch_dir).await {
        Ok(entries) => entries,
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => return summary,
        Err(source) => {
            warn!(path = %scratch_dir.display(), %source, "failed to read scratch directory");
            return summary;
        }
    };

    let mut job_dirs = Vec::new();
    loop {
        let next = entries.next_entry().await;
        let entry = match next {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                warn!(path = %scratch_dir.display(), %source, "failed to iterate scratch directory");
                break;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            job_dirs.push(path);
        }
    }

    for job_dir in job_dirs {
        summary.files_removed += sweep_job_dir(&job_dir, now, max_age).await;
        if is_empty_dir(&job_dir).await {
            match tokio::fs::remove_dir(&job_dir).await {
                Ok(()) => summary.directories_removed += 1,
                Err(source) => {
                    warn!(path = %job_dir.display(), %source, "failed to remove empty scratch directory");
                }
            }
        }
    }

    summary
}

async fn sweep_job_dir(job_dir: &Path, now: SystemTime, max_age: Duration) -> u64 {
    let mut removed = 0;
    let mut entries = match tokio::fs::read_dir(job_dir).await {
        Ok(entries) => entries,
        Err(source) => {
            warn!(path = %job_dir.display(), %source, "failed to read scratch job directory");
            return removed;
        }
    };

    loop {
        let next = entries.next_entry().await;
        let entry = match next {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                warn!(path = %job_dir.display(), %source, "failed to iterate scratch job directory");
                break;
            }
        };
        let path = entry.path();
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if metadata.is_dir() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_none_or(|age| age >= max_age) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(source) => {
                    warn!(path = %path.display(), %source, "failed to remove orphaned scratch file");
                }
            }
        }
    }
    removed
}

async fn is_empty_dir(path: &Path) -> bool {
    match tokio::fs::read_dir(path).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn removes_old_files_and_resulting_empty_directory() {
        let root = tempfile::tempdir().unwrap();
        let job_dir = root.path().join("job-1");
        tokio::fs::create_dir_all(&job_dir).await.unwrap();
        let stale = job_dir.join("stale.part");
        tokio::fs::write(&stale, b"x").await.unwrap();

        let old_time = filetime::FileTime::from_system_time(
            SystemTime::now() - StdDuration::from_secs(7_200),
        );
        filetime::set_file_mtime(&stale, old_time).unwrap();

        let summary = sweep_scratch_dir(root.path(), StdDuration::from_secs(3_600)).await;
        assert_eq!(summary.files_removed, 1);
        assert_eq!(summary.directories_removed, 1);
        assert!(!job_dir.exists());
    }

    #[tokio::test]
    async fn leaves_recent_files_in_place() {
        let root = tempfile::tempdir().unwrap();
        let job_dir = root.path().join("job-2");
        tokio::fs::create_dir_all(&job_dir).await.unwrap();
        tokio::fs::write(job_dir.join("fresh.part"), b"x")
            .await
            .unwrap();

        let summary = sweep_scratch_dir(root.path(), StdDuration::from_secs(3_600)).await;
        assert_eq!(summary.files_removed, 0);
        assert_eq!(summary.directories_removed, 0);
        assert!(job_dir.exists());
    }

    #[tokio::test]
    async fn missing_scratch_dir_is_a_silent_no_op() {
        let summary =
            sweep_scratch_dir(Path::new("/nonexistent/scratch"), StdDuration::from_secs(60)).await;
        assert_eq!(summary, ScratchSweepSummary::default());
    }
}
