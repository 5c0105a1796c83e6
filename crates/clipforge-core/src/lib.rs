#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]
#![allow(unexpected_cfgs)]
#![allow(clippy::multiple_crate_versions)]

//! Domain model, repository contracts, and domain services for the
//! video-download job orchestration core.
//!
//! This crate has no knowledge of HTTP, Postgres, or the filesystem: the
//! [`model`] module defines the aggregates, value objects, and events; the
//! [`error`] module defines the domain error taxonomy; [`repository`]
//! defines the persistence contracts every storage adapter implements; and
//! [`service`] coordinates them into the operations the application layer
//! calls.

pub mod error;
pub mod model;
pub mod repository;
pub mod service;

pub use error::{DomainError, DomainResult, ErrorCategory};
pub use model::{
    ClientIp, DomainEvent, DownloadJob, DownloadToken, DownloadedFile, FormatId, FormatType,
    JobArchive, JobId, JobProgress, JobStatus, RateLimit, RateLimitEntity, VideoFormat,
    VideoMetadata,
};
pub use repository::{
    FileRepository, FileStorageRepository, JobArchiveRepository, JobMutationOutcome,
    JobRepository, RateLimitIncrement, RateLimitRepository, client_key_for, job_id_from_uuid,
};
pub use service::{
    AdmissionOutcome, FileManager, JobManager, JobStatusInfo, ProgressOutcome, RateLimitManager,
    RawVideoFormat, RawVideoInfo, VideoProcessor,
};
