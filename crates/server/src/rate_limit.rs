//! HTTP decision endpoint for rate limit checks.

use std::sync::Arc;

use ::rate_limit::{RateLimitError, RateLimitResult, RateLimiter};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use serde::{Deserialize, Serialize};

/// Body of a check request.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CheckRequest {
    identity: String,
}

#[derive(Debug, Serialize)]
struct AllowedBody {
    allowed: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed: Option<bool>,
    error: &'static str,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
}

/// Outcome of a check, mapped onto an HTTP response.
#[derive(Debug)]
pub(crate) enum CheckResponse {
    Allowed,
    Limited { retry_after_seconds: u64 },
    InvalidIdentity,
}

impl From<RateLimitResult> for CheckResponse {
    fn from(result: RateLimitResult) -> Self {
        match result {
            RateLimitResult::Allowed => CheckResponse::Allowed,
            RateLimitResult::Limited {
                retry_after_seconds, ..
            } => CheckResponse::Limited { retry_after_seconds },
        }
    }
}

impl IntoResponse for CheckResponse {
    fn into_response(self) -> Response {
        match self {
            CheckResponse::Allowed => (StatusCode::OK, Json(AllowedBody { allowed: true })).into_response(),
            CheckResponse::Limited { retry_after_seconds } => {
                let body = ErrorBody {
                    allowed: Some(false),
                    error: "Too Many Requests",
                    message: "Rate limit exceeded. Please try again later.",
                    retry_after: Some(retry_after_seconds),
                };

                let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();

                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(retry_after_seconds));

                response
            }
            CheckResponse::InvalidIdentity => {
                let body = ErrorBody {
                    allowed: None,
                    error: "Bad Request",
                    message: "identity must not be empty",
                    retry_after: None,
                };

                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
        }
    }
}

/// Checks and records one action for the identity in the request body.
pub(crate) async fn check(
    State(limiter): State<Arc<RateLimiter>>,
    Json(request): Json<CheckRequest>,
) -> CheckResponse {
    match limiter.check(&request.identity).await {
        Ok(result) => {
            if let RateLimitResult::Limited {
                retry_after_seconds,
                window,
            } = result
            {
                log::debug!(
                    "Identity '{}' is rate limited by the {window:?} window, retry after {retry_after_seconds}s",
                    request.identity
                );
            }

            result.into()
        }
        Err(RateLimitError::EmptyIdentity) => CheckResponse::InvalidIdentity,
        Err(e) => {
            // Nothing but an empty identity is surfaced from a check; anything else is let through.
            log::error!("Unexpected rate limit error, allowing the request: {e}");
            CheckResponse::Allowed
        }
    }
}
