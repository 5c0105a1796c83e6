//! Maps domain and request failures onto the canonical HTTP error body.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clipforge_core::{DomainError, ErrorCategory};

use crate::facade::RateLimitDecision;
use crate::http::rate_limit::insert_rate_limit_headers;
use crate::models::ErrorResponse;

/// An HTTP-ready error: a status code plus the canonical response body.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
    rate_limit: Option<ErrorRateLimitContext>,
}

#[derive(Debug)]
pub(crate) struct ErrorRateLimitContext {
    limit: u32,
    remaining: u32,
    retry_after: Option<Duration>,
}

/// HTTP status this category's errors are reported with.
const fn status_for_category(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::InvalidUrl
        | ErrorCategory::InvalidRequest
        | ErrorCategory::FormatNotSupported => StatusCode::BAD_REQUEST,
        ErrorCategory::JobNotFound | ErrorCategory::FileNotFound => StatusCode::NOT_FOUND,
        ErrorCategory::FileExpired => StatusCode::GONE,
        ErrorCategory::RateLimited | ErrorCategory::PlatformRateLimited => {
            StatusCode::TOO_MANY_REQUESTS
        }
        ErrorCategory::VideoUnavailable
        | ErrorCategory::GeoBlocked
        | ErrorCategory::LoginRequired => StatusCode::FORBIDDEN,
        ErrorCategory::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::DownloadTimeout | ErrorCategory::NetworkError => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ErrorCategory::DownloadFailed | ErrorCategory::SystemError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl ApiError {
    /// Map a domain error onto its canonical wire status and body.
    pub(crate) fn from_domain(error: &DomainError) -> Self {
        let category = error.category();
        Self {
            status: status_for_category(category),
            body: ErrorResponse::from(error),
            rate_limit: None,
        }
    }

    /// Build the 429 response for a rejected rate-limit admission.
    pub(crate) fn rate_limited(decision: &RateLimitDecision) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: ErrorResponse::rate_limited(&decision.limit_type, decision.reset_at),
            rate_limit: Some(ErrorRateLimitContext {
                limit: decision.limit,
                remaining: decision.remaining,
                retry_after: Some(Duration::from_secs(
                    u64::try_from(
                        (decision.reset_at - chrono::Utc::now())
                            .num_seconds()
                            .max(0),
                    )
                    .unwrap_or(0),
                )),
            }),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        let mut body = ErrorResponse::from_category(ErrorCategory::SystemError);
        body.message = message.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body,
            rate_limit: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        if let Some(rate) = self.rate_limit {
            insert_rate_limit_headers(
                response.headers_mut(),
                rate.limit,
                rate.remaining,
                rate.retry_after,
            );
        }
        response
    }
}
