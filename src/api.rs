//! JSON envelope handed to other tools: `{success, data}` or `{success, error}`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::pr::{fetch_aggregated_pr, AggregatedPR, PrError, PullRequestSource};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

impl<T> From<Result<T, PrError>> for ApiResponse<T> {
    fn from(result: Result<T, PrError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => {
                warn!(error = %err, status = ?err.status(), hint = ?err.hint(), "request failed");
                Self::error(err.to_string())
            }
        }
    }
}

/// Liveness probe payload.
#[derive(Debug, Serialize)]
pub struct Health {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub fn health() -> Health {
    Health {
        success: true,
        message: "pr-viewer is running".to_string(),
        timestamp: Utc::now(),
    }
}

/// Fetch complete PR data by reference, wrapped in the response envelope.
pub async fn fetch_envelope<S>(source: &S, reference: &str) -> ApiResponse<AggregatedPR>
where
    S: PullRequestSource + ?Sized,
{
    if reference.trim().is_empty() {
        return ApiResponse::error("PR reference is required");
    }
    fetch_aggregated_pr(source, reference).await.into()
}
