//! Job, video, and file delivery handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use clipforge_core::{ClientIp, FormatId, JobId};
use tracing::warn;

use crate::facade::RateLimitDecision;
use crate::http::errors::ApiError;
use crate::http::rate_limit::insert_admitted_headers;
use crate::models::{
    CreateDownloadRequest, CreateDownloadResponse, JobStatusResponse, VideoFormatDto,
    VideoMetaDto, VideoResolutionsRequest, VideoResolutionsResponse,
};
use crate::state::ApiState;

fn client_ip(ConnectInfo(addr): &ConnectInfo<SocketAddr>) -> ClientIp {
    ClientIp::from_addr(addr.ip())
}

async fn admit(
    state: &ApiState,
    client: &ClientIp,
    endpoint: &str,
) -> Result<RateLimitDecision, ApiError> {
    let decision = state.services.rate_limit_gate.admit(client, endpoint).await;
    if decision.allowed {
        Ok(decision)
    } else {
        state.telemetry.inc_rate_limit_throttled();
        Err(ApiError::rate_limited(&decision))
    }
}

pub(crate) async fn post_resolutions(
    State(state): State<Arc<ApiState>>,
    connect_info: ConnectInfo<SocketAddr>,
    Json(request): Json<VideoResolutionsRequest>,
) -> Result<Response, ApiError> {
    let client = client_ip(&connect_info);
    let decision = admit(&state, &client, "/api/v1/videos/resolutions").await?;

    let (metadata, formats) = state
        .services
        .video_catalog
        .resolutions(&request.url)
        .await
        .map_err(|err| ApiError::from_domain(&err))?;

    let body = VideoResolutionsResponse {
        meta: VideoMetaDto::from(&metadata),
        formats: formats.iter().map(VideoFormatDto::from).collect(),
    };
    let mut response = (StatusCode::OK, Json(body)).into_response();
    insert_admitted_headers(response.headers_mut(), &decision);
    Ok(response)
}

pub(crate) async fn post_downloads(
    State(state): State<Arc<ApiState>>,
    connect_info: ConnectInfo<SocketAddr>,
    Json(request): Json<CreateDownloadRequest>,
) -> Result<Response, ApiError> {
    let client = client_ip(&connect_info);
    let decision = admit(&state, &client, "/api/v1/downloads").await?;

    let format_id =
        FormatId::parse(request.format_id).map_err(|err| ApiError::from_domain(&err))?;

    let job_id = state
        .services
        .job_orchestrator
        .submit(client, request.url, format_id)
        .await
        .map_err(|err| ApiError::from_domain(&err))?;

    let body = CreateDownloadResponse {
        job_id,
        status: "pending".to_string(),
        message: "job accepted".to_string(),
    };
    let mut response = (StatusCode::ACCEPTED, Json(body)).into_response();
    insert_admitted_headers(response.headers_mut(), &decision);
    Ok(response)
}

pub(crate) async fn get_job_status(
    State(state): State<Arc<ApiState>>,
    Path(job_id): Path<JobId>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let info = state
        .services
        .job_orchestrator
        .status(job_id)
        .await
        .map_err(|err| ApiError::from_domain(&err))?;
    Ok(Json(JobStatusResponse::from(info)))
}

pub(crate) async fn delete_job(
    State(state): State<Arc<ApiState>>,
    Path(job_id): Path<JobId>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .services
        .job_orchestrator
        .cancel(job_id)
        .await
        .map_err(|err| ApiError::from_domain(&err))?;
    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::from_domain(&clipforge_core::DomainError::JobNotFound {
            job_id: job_id.to_string(),
        }))
    }
}

pub(crate) async fn get_download_file(
    State(state): State<Arc<ApiState>>,
    Path(token): Path<String>,
) -> Result<Response, ApiError> {
    let (filename, bytes) = state
        .services
        .file_delivery
        .fetch(&token)
        .await
        .map_err(|err| ApiError::from_domain(&err))?;

    let disposition = format!("attachment; filename=\"{filename}\"");
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(bytes))
        .map_err(|err| {
            warn!(error = %err, "failed to build file download response");
            ApiError::internal("failed to build file download response")
        })
}
