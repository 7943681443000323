//! HTTP plumbing shared by the service clients.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use readgap_core::error::ServiceError;

pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub(crate) fn client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .context("failed to build HTTP client")
}

pub(crate) fn send_error(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(DEFAULT_TIMEOUT_SECS)
    } else {
        ServiceError::NetworkError(e.to_string())
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map non-success statuses to `ServiceError`.
pub(crate) async fn check_status(
    response: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status().as_u16();
    if status < 400 {
        return Ok(response);
    }
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5)
            .saturating_mul(1000);
        return Err(ServiceError::RateLimited {
            retry_after_ms: retry_after,
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(match status {
        401 | 403 => ServiceError::AuthenticationFailed(message),
        404 => ServiceError::ModelNotFound(model.to_string()),
        _ => ServiceError::ApiError { status, message },
    })
}
