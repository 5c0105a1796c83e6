//! Subprocess adapter over the `yt-dlp` CLI.
//!
//! The extractor is invoked as a child process rather than linked in-process:
//! metadata probing uses `--dump-json`, downloads stream `--newline
//! --progress-template` JSON lines on stdout that are parsed as they arrive,
//! and the final manifest line (`--print-json`) yields the output path.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use clipforge_core::{JobId, RawVideoFormat, RawVideoInfo};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::error::{ExtractorError, ExtractorResult};
use crate::format::{FormatRequest, TrimOptions};

/// Marker yt-dlp's `--progress-template` is configured to emit before the
/// JSON payload, so stdout lines that are unrelated logging can be skipped.
const PROGRESS_PREFIX: &str = "CLIPFORGE-PROGRESS:";

/// One download request handed to the extractor.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Source URL.
    pub url: String,
    /// Owning job, used only to name the scratch subdirectory.
    pub job_id: JobId,
    /// Resolved format selector inputs.
    pub format: FormatRequest,
    /// Optional clip trim.
    pub trim: Option<TrimOptions>,
}

/// Download phase reported by a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawProgressStatus {
    /// Bytes are actively being transferred.
    Downloading,
    /// The transfer finished; post-processing may still run.
    Finished,
}

/// One `downloading`/`finished` progress tick from the extractor.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProgressEvent {
    /// Current phase.
    pub status: RawProgressStatus,
    /// Bytes transferred so far.
    pub downloaded_bytes: Option<u64>,
    /// Exact total size, when known.
    pub total_bytes: Option<u64>,
    /// Estimated total size, used when the exact size is unknown.
    pub total_bytes_estimate: Option<u64>,
    /// Transfer rate in bytes/second.
    pub speed: Option<f64>,
    /// Estimated seconds remaining.
    pub eta: Option<u64>,
}

/// One post-processor lifecycle tick (e.g. remux, trim).
#[derive(Debug, Clone, Deserialize)]
pub struct RawPostprocessorEvent {
    /// Post-processor phase, e.g. `"started"`/`"finished"`.
    pub status: String,
    /// Post-processor name.
    pub postprocessor: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ProgressLine {
    Progress(RawProgressEvent),
    Postprocessor(RawPostprocessorEvent),
}

/// Receives the raw events an in-flight download emits.
///
/// Implementations map these into domain progress updates; the adapter
/// itself has no notion of jobs or percentages.
#[async_trait]
pub trait ExtractorEventSink: Send + Sync {
    /// A download progress tick arrived.
    async fn on_progress(&self, event: RawProgressEvent);
    /// A post-processor lifecycle tick arrived.
    async fn on_postprocessor(&self, event: RawPostprocessorEvent);
}

/// Metadata probing and media download over an external extractor process.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Resolve a URL into its available formats without downloading.
    async fn probe(&self, url: &str) -> ExtractorResult<RawVideoInfo>;

    /// Execute a download, streaming progress to `sink`, returning the path
    /// to the produced media file.
    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &(dyn ExtractorEventSink + Send + Sync),
    ) -> ExtractorResult<PathBuf>;
}

/// [`Extractor`] implemented by shelling out to the `yt-dlp` binary.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: PathBuf,
    scratch_dir: PathBuf,
}

impl YtDlpExtractor {
    /// Build an adapter invoking `binary` with scratch files under `scratch_dir`.
    pub fn new(binary: impl Into<PathBuf>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    fn job_scratch_dir(&self, job_id: &JobId) -> PathBuf {
        self.scratch_dir.join(job_id.to_string())
    }

    fn output_template(&self, job_id: &JobId) -> PathBuf {
        self.job_scratch_dir(job_id).join("%(id)s.%(ext)s")
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn probe(&self, url: &str) -> ExtractorResult<RawVideoInfo> {
        let output = Command::new(&self.binary)
            .arg("--dump-json")
            .arg("--no-playlist")
            .arg("--skip-download")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| ExtractorError::Spawn { source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(classify_stderr(output.status.code(), &stderr));
        }

        let raw: YtDlpInfoJson = serde_json::from_slice(&output.stdout).map_err(|err| {
            ExtractorError::Decode {
                message: format!("failed to parse extractor metadata: {err}"),
            }
        })?;
        Ok(raw.into_raw_video_info(url))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        sink: &(dyn ExtractorEventSink + Send + Sync),
    ) -> ExtractorResult<PathBuf> {
        let scratch_dir = self.job_scratch_dir(&request.job_id);
        tokio::fs::create_dir_all(&scratch_dir)
            .await
            .map_err(|source| ExtractorError::Io { source })?;

        let mut command = Command::new(&self.binary);
        command
            .arg("-f")
            .arg(request.format.resolve_selector())
            .arg("-o")
            .arg(self.output_template(&request.job_id))
            .arg("--newline")
            .arg("--progress-template")
            .arg(progress_template())
            .arg("--print-json")
            .arg("--no-playlist");

        if let Some(trim) = &request.trim {
            command
                .arg("--download-sections")
                .arg(trim.download_section())
                .arg("--force-keyframes-at-cuts")
                .arg("--remux-video")
                .arg(trim.container_or_default());
        }

        command
            .arg(&request.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| ExtractorError::Spawn { source })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractorError::Decode {
                message: "extractor child produced no stdout handle".to_string(),
            })?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractorError::Decode {
                message: "extractor child produced no stderr handle".to_string(),
            })?;

        let stdout_task = tokio::spawn(read_stdout(stdout, sink));
        let stderr_task = tokio::spawn(read_stderr(stderr));

        let status = child
            .wait()
            .await
            .map_err(|source| ExtractorError::Io { source })?;
        let manifest_line = stdout_task
            .await
            .map_err(|err| ExtractorError::Decode {
                message: format!("stdout reader task failed: {err}"),
            })??;
        let stderr_text = stderr_task.await.map_err(|err| ExtractorError::Decode {
            message: format!("stderr reader task failed: {err}"),
        })?;

        if !status.success() {
            return Err(classify_stderr(status.code(), &stderr_text));
        }

        let manifest_line = manifest_line.ok_or_else(|| ExtractorError::Decode {
            message: "extractor exited successfully but printed no manifest line".to_string(),
        })?;
        let manifest: YtDlpManifest = serde_json::from_str(&manifest_line).map_err(|err| {
            ExtractorError::Decode {
                message: format!("failed to parse extractor manifest: {err}"),
            }
        })?;
        let output_path = manifest.resolved_path();

        if !tokio::fs::try_exists(&output_path)
            .await
            .unwrap_or(false)
        {
            return Err(ExtractorError::OutputMissing {
                expected: output_path,
            });
        }

        Ok(output_path)
    }
}

/// The `--progress-template` value producing the JSON lines this adapter parses.
fn progress_template() -> String {
    format!(
        "download:{PROGRESS_PREFIX}{{\"type\":\"progress\",\"status\":\"%(progress.status)s\",\
\"downloaded_bytes\":%(progress.downloaded_bytes)s,\"total_bytes\":%(progress.total_bytes)s,\
\"total_bytes_estimate\":%(progress.total_bytes_estimate)s,\"speed\":%(progress.speed)s,\
\"eta\":%(progress.eta)s}}"
    )
}

async fn read_stdout(
    stdout: tokio::process::ChildStdout,
    sink: &(dyn ExtractorEventSink + Send + Sync),
) -> ExtractorResult<Option<String>> {
    let mut reader = BufReader::new(stdout).lines();
    let mut manifest_line = None;
    while let Some(line) = reader
        .next_line()
        .await
        .map_err(|source| ExtractorError::Io { source })?
    {
        if let Some(payload) = line.strip_prefix(PROGRESS_PREFIX) {
            match serde_json::from_str::<ProgressLine>(payload) {
                Ok(ProgressLine::Progress(event)) => sink.on_progress(event).await,
                Ok(ProgressLine::Postprocessor(event)) => sink.on_postprocessor(event).await,
                Err(error) => {
                    tracing::warn!(%error, "failed to parse extractor progress line");
                }
            }
        } else if line.trim_start().starts_with('{') {
            manifest_line = Some(line);
        }
    }
    Ok(manifest_line)
}

async fn read_stderr(stderr: tokio::process::ChildStderr) -> String {
    let mut reader = BufReader::new(stderr).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = reader.next_line().await {
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

fn classify_stderr(code: Option<i32>, stderr: &str) -> ExtractorError {
    let lower = stderr.to_lowercase();
    if lower.contains("video unavailable")
        || lower.contains("this video is unavailable")
        || lower.contains("has been removed")
    {
        return ExtractorError::VideoUnavailable {
            message: stderr.trim().to_string(),
        };
    }
    if lower.contains("unsupported url") || lower.contains("is not a valid url") {
        return ExtractorError::ExtractorFailure {
            message: stderr.trim().to_string(),
        };
    }
    if lower.contains("http error") || lower.contains("unable to download") {
        return ExtractorError::DownloadFailure {
            message: stderr.trim().to_string(),
        };
    }
    ExtractorError::NonZeroExit {
        code,
        stderr: stderr.trim().to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct YtDlpManifest {
    filepath: Option<String>,
    #[serde(rename = "_filename")]
    legacy_filename: Option<String>,
}

impl YtDlpManifest {
    fn resolved_path(&self) -> PathBuf {
        PathBuf::from(
            self.filepath
                .clone()
                .or_else(|| self.legacy_filename.clone())
                .unwrap_or_default(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
struct YtDlpInfoJson {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    formats: Option<Vec<YtDlpFormatJson>>,
}

#[derive(Debug, Default, Deserialize)]
struct YtDlpFormatJson {
    format_id: Option<String>,
    ext: Option<String>,
    height: Option<u32>,
    width: Option<u32>,
    filesize: Option<i64>,
    filesize_approx: Option<i64>,
    tbr: Option<f64>,
    vcodec: Option<String>,
    acodec: Option<String>,
    format_note: Option<String>,
}

impl YtDlpInfoJson {
    fn into_raw_video_info(self, source_url: &str) -> RawVideoInfo {
        RawVideoInfo {
            id: self.id,
            title: self.title,
            uploader: self.uploader,
            duration_seconds: self.duration.map(|value| value.round() as u64),
            thumbnail_url: self.thumbnail,
            source_url: source_url.to_string(),
            formats: self
                .formats
                .unwrap_or_default()
                .into_iter()
                .map(YtDlpFormatJson::into_raw_video_format)
                .collect(),
        }
    }
}

impl YtDlpFormatJson {
    fn into_raw_video_format(self) -> RawVideoFormat {
        RawVideoFormat {
            format_id: self.format_id,
            extension: self.ext,
            height: self.height,
            width: self.width,
            filesize: self.filesize,
            filesize_approx: self.filesize_approx,
            tbr: self.tbr,
            vcodec: self.vcodec,
            acodec: self.acodec,
            format_note: self.format_note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_stderr_maps_video_unavailable() {
        let error = classify_stderr(Some(1), "ERROR: [youtube] xyz: Video unavailable");
        assert!(matches!(error, ExtractorError::VideoUnavailable { .. }));
    }

    #[test]
    fn classify_stderr_maps_unsupported_url() {
        let error = classify_stderr(Some(1), "ERROR: Unsupported URL: ftp://host/a");
        assert!(matches!(error, ExtractorError::ExtractorFailure { .. }));
    }

    #[test]
    fn classify_stderr_maps_http_error() {
        let error = classify_stderr(Some(1), "ERROR: HTTP Error 404: Not Found");
        assert!(matches!(error, ExtractorError::DownloadFailure { .. }));
    }

    #[test]
    fn classify_stderr_falls_back_to_nonzero_exit() {
        let error = classify_stderr(Some(127), "command not found");
        assert!(matches!(error, ExtractorError::NonZeroExit { .. }));
    }

    #[test]
    fn manifest_prefers_filepath_over_legacy_filename() {
        let manifest = YtDlpManifest {
            filepath: Some("/scratch/a.mp4".to_string()),
            legacy_filename: Some("/scratch/b.mp4".to_string()),
        };
        assert_eq!(manifest.resolved_path(), PathBuf::from("/scratch/a.mp4"));
    }

    #[test]
    fn manifest_falls_back_to_legacy_filename() {
        let manifest = YtDlpManifest {
            filepath: None,
            legacy_filename: Some("/scratch/b.mp4".to_string()),
        };
        assert_eq!(manifest.resolved_path(), PathBuf::from("/scratch/b.mp4"));
    }

    #[test]
    fn progress_line_parses_downloading_event() {
        let payload = r#"{"type":"progress","status":"downloading","downloaded_bytes":100,"total_bytes":1000,"total_bytes_estimate":null,"speed":500.0,"eta":2}"#;
        let parsed: ProgressLine = serde_json::from_str(payload).unwrap();
        match parsed {
            ProgressLine::Progress(event) => {
                assert_eq!(event.status, RawProgressStatus::Downloading);
                assert_eq!(event.downloaded_bytes, Some(100));
            }
            ProgressLine::Postprocessor(_) => panic!("expected progress variant"),
        }
    }

    #[test]
    fn progress_line_parses_postprocessor_event() {
        let payload = r#"{"type":"postprocessor","status":"started","postprocessor":"Merger"}"#;
        let parsed: ProgressLine = serde_json::from_str(payload).unwrap();
        match parsed {
            ProgressLine::Postprocessor(event) => {
                assert_eq!(event.postprocessor, "Merger");
            }
            ProgressLine::Progress(_) => panic!("expected postprocessor variant"),
        }
    }

    #[test]
    fn info_json_maps_into_raw_video_info() {
        let raw = YtDlpInfoJson {
            id: Some("abc".to_string()),
            title: Some("Title".to_string()),
            uploader: Some("Uploader".to_string()),
            duration: Some(61.6),
            thumbnail: None,
            formats: Some(vec![YtDlpFormatJson {
                format_id: Some("137".to_string()),
                height: Some(1080),
                ..Default::default()
            }]),
        };
        let info = raw.into_raw_video_info("https://example.test/v/abc");
        assert_eq!(info.duration_seconds, Some(62));
        assert_eq!(info.formats.len(), 1);
        assert_eq!(info.formats[0].height, Some(1080));
    }
}
