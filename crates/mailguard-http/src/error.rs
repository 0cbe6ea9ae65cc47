use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Everything that can stop a scan from producing a verdict.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    MalformedRequest(String),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl ScanError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Unauthorized => {
                warn!("rejected scan: bad or missing bearer token");
                "Unauthorized".to_string()
            }
            Self::MalformedRequest(reason) => {
                warn!(reason = %reason, "rejected scan: malformed request");
                reason.clone()
            }
            // Model errors stay in the log.
            Self::Inference(err) => {
                error!(error = %format!("{err:#}"), "scan failed");
                "Inference failed".to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
