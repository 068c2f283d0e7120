//! Request and response bodies for the HTTP API

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::coordinator::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Largest `max_iterations` a request may ask for
pub const MAX_REQUEST_ITERATIONS: i32 = 10;

/// Body of `POST /run`; absent fields fall back to the server's pipeline config
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub query: String,
    #[serde(default)]
    pub max_iterations: Option<i32>,
    #[serde(default)]
    pub approval_threshold: Option<f64>,
    #[serde(default)]
    pub mock: Option<bool>,
}

impl RunRequest {
    /// Overlay this request's policy on the server defaults
    pub fn pipeline(&self, defaults: &PipelineConfig) -> Result<PipelineConfig, ApiError> {
        if let Some(requested) = self.max_iterations
            && requested > MAX_REQUEST_ITERATIONS
        {
            return Err(ApiError::TooManyIterations {
                requested,
                max: MAX_REQUEST_ITERATIONS,
            });
        }
        Ok(PipelineConfig {
            mock: self.mock.or(defaults.mock),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            approval_threshold: self.approval_threshold.unwrap_or(defaults.approval_threshold),
        })
    }
}

/// Error returned to HTTP clients as `{"error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    InvalidConfig(ConfigError),
    TooManyIterations { requested: i32, max: i32 },
    Timeout { query: String, after_ms: u64 },
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        ApiError::InvalidConfig(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidConfig(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::TooManyIterations { requested, max } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("max_iterations {} exceeds the per-request limit of {}", requested, max),
            ),
            ApiError::Timeout { query, after_ms } => (
                StatusCode::GATEWAY_TIMEOUT,
                format!("Run for '{}' did not finish within {}ms", query, after_ms),
            ),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_request_overlays_defaults() {
        let req: RunRequest = serde_json::from_str(r#"{"query": "q", "approval_threshold": 0.9}"#).unwrap();
        let defaults = PipelineConfig {
            mock: Some(true),
            ..Default::default()
        };

        let pipeline = req.pipeline(&defaults).unwrap();
        assert_eq!(pipeline.approval_threshold, 0.9);
        assert_eq!(pipeline.max_iterations, 3);
        assert_eq!(pipeline.mock, Some(true));
    }

    #[test]
    fn test_run_request_iteration_limit() {
        let defaults = PipelineConfig::default();

        let req: RunRequest = serde_json::from_str(r#"{"query": "q", "max_iterations": 10}"#).unwrap();
        assert_eq!(req.pipeline(&defaults).unwrap().max_iterations, 10);

        let req: RunRequest = serde_json::from_str(r#"{"query": "q", "max_iterations": 11}"#).unwrap();
        assert!(matches!(
            req.pipeline(&defaults),
            Err(ApiError::TooManyIterations { requested: 11, max: 10 })
        ));
    }

    #[test]
    fn test_error_status_codes() {
        let response = ApiError::from(ConfigError::InvalidThreshold(2.0)).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = ApiError::Timeout {
            query: "q".to_string(),
            after_ms: 10,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
