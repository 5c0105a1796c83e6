//! Application bootstrap: environment loading, service wiring, and the
//! server/reaper run loop.
//!
//! # Design
//! - [`BootstrapDependencies::from_env`] loads configuration and connects to
//!   every out-of-process dependency (database, filesystem storage) once at
//!   startup.
//! - [`run_app_with`] wires every domain service into the API facade seams,
//!   spawns the reaper as a background task, serves, then aborts and joins
//!   the reaper before returning.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use clipforge_api::{AppServices, build_api};
use clipforge_config::{Config, ConfigError};
use clipforge_core::{FileManager, JobManager, RateLimitManager, VideoProcessor};
use clipforge_data::Database;
use clipforge_events::EventBus;
use clipforge_extractor::YtDlpExtractor;
use clipforge_storage::FilesystemStorage;
use clipforge_telemetry::init::{self, LogFormat as TelemetryLogFormat, LoggingConfig};
use clipforge_telemetry::metrics::Metrics;

use crate::error::{AppError, AppResult};
use crate::reaper::Reaper;
use crate::services::{
    DownloadService, FileDeliveryService, HealthProbeService, RateLimitGateService,
    VideoCatalogService,
};

/// Dependencies required to bootstrap the application.
pub(crate) struct BootstrapDependencies {
    config: Config,
    database: Database,
    storage: FilesystemStorage,
    events: EventBus,
    metrics: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the process environment.
    pub(crate) async fn from_env() -> AppResult<Self> {
        let config = Config::from_env().map_err(|err| AppError::config("config.from_env", err))?;

        let database = Database::connect(&config.database_url)
            .await
            .map_err(|err| AppError::database("database.connect", err))?;

        let storage = FilesystemStorage::new(config.download_dir.clone());
        storage
            .ensure_base_path()
            .await
            .map_err(|err| AppError::storage("storage.ensure_base_path", err))?;

        let events = EventBus::new();
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;

        Ok(Self {
            config,
            database,
            storage,
            events,
            metrics,
        })
    }
}

/// Entry point for the application boot sequence.
///
/// # Errors
///
/// Returns an error if dependency construction or application startup fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env().await?;
    run_app_with(dependencies).await
}

/// Boot sequence that relies entirely on injected dependencies to simplify testing.
pub(crate) async fn run_app_with(dependencies: BootstrapDependencies) -> AppResult<()> {
    let BootstrapDependencies {
        config,
        database,
        storage,
        events,
        metrics,
    } = dependencies;

    let logging = LoggingConfig {
        level: &config.log_level,
        format: map_log_format(config.log_format),
        build_sha: init::build_sha(),
    };
    init::init_logging(&logging).map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!("clipforge application bootstrap starting");

    let storage = Arc::new(storage);
    let jobs = Arc::new(JobManager::new(Arc::new(database.job_repository())));
    let files = Arc::new(FileManager::new(
        Arc::new(database.file_repository()),
        Arc::clone(&storage),
    ));
    let rate_limits = Arc::new(RateLimitManager::new(Arc::new(
        database.rate_limit_repository(),
    )));
    let rate_limit_config = Arc::new(config.rate_limit.clone());
    let video = Arc::new(VideoProcessor::new());
    let extractor = Arc::new(YtDlpExtractor::new(
        config.extractor_bin.clone(),
        config.extractor_scratch_dir.clone(),
    ));
    let file_ttl = chrono::Duration::from_std(config.file_ttl)
        .unwrap_or_else(|_| chrono::Duration::minutes(10));

    let download_service: Arc<dyn clipforge_api::JobOrchestrator> = Arc::new(DownloadService::new(
        Arc::clone(&jobs),
        Arc::clone(&files),
        Arc::clone(&rate_limits),
        Arc::clone(&rate_limit_config),
        Arc::clone(&video),
        Arc::clone(&extractor),
        events.clone(),
        Arc::new(metrics.clone()),
        file_ttl,
    ));
    let video_catalog: Arc<dyn clipforge_api::VideoCatalog> =
        Arc::new(VideoCatalogService::new(Arc::clone(&video), Arc::clone(&extractor)));
    let file_delivery: Arc<dyn clipforge_api::FileDelivery> =
        Arc::new(FileDeliveryService::new(Arc::clone(&files)));
    let health_probe: Arc<dyn clipforge_api::HealthProbe> =
        Arc::new(HealthProbeService::new(database.clone()));
    let rate_limit_gate: Arc<dyn clipforge_api::RateLimitGate> = Arc::new(RateLimitGateService::new(
        Arc::clone(&rate_limits),
        Arc::clone(&rate_limit_config),
    ));

    let services = AppServices {
        video_catalog,
        job_orchestrator: download_service,
        file_delivery,
        health_probe,
        rate_limit_gate,
    };

    let api = build_api(services, events.clone(), metrics.clone())
        .map_err(|err| AppError::api_server("api_server.new", err))?;

    let reaper = Reaper::new(
        Arc::clone(&jobs),
        database.job_archive_repository(),
        Arc::clone(&files),
        Arc::new(metrics.clone()),
        PathBuf::from(config.extractor_scratch_dir.clone()),
        config.reaper_interval,
        config.reaper_job_expiration,
    );
    let reaper_task = tokio::spawn(reaper.run());

    let addr: SocketAddr = config.bind_addr.parse().map_err(|err: std::net::AddrParseError| {
        AppError::config(
            "bind_addr.parse",
            ConfigError::Invalid {
                key: "BIND_ADDR".to_string(),
                reason: err.to_string(),
            },
        )
    })?;
    info!(addr = %addr, "launching API listener");

    let serve_result = api.serve(addr).await;

    if !reaper_task.is_finished() {
        reaper_task.abort();
    }
    if let Err(err) = reaper_task.await {
        if !err.is_cancelled() {
            warn!(error = %err, "reaper task join failed");
        }
    }

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}

const fn map_log_format(format: clipforge_config::LogFormat) -> TelemetryLogFormat {
    match format {
        clipforge_config::LogFormat::Pretty => TelemetryLogFormat::Pretty,
        clipforge_config::LogFormat::Json => TelemetryLogFormat::Json,
    }
}
