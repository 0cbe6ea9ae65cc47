//! Router and handler for the scan endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use mailguard_core::{ClassificationResult, TextClassifier, classify};
use serde::Deserialize;
use tracing::info;

use crate::auth::ApiKey;
use crate::error::ScanError;

/// Shared, immutable-after-start state handed to every request.
#[derive(Clone)]
pub struct AppState {
    classifier: Arc<dyn TextClassifier>,
    api_key: ApiKey,
}

impl AppState {
    pub fn new(classifier: Arc<dyn TextClassifier>, api_key: ApiKey) -> Self {
        Self {
            classifier,
            api_key,
        }
    }
}

/// Body of `POST /scan`.
#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// Mail content to classify; absent means empty.
    #[serde(default)]
    pub text: String,
}

impl ScanRequest {
    /// Parse a request body. Only a JSON object is accepted.
    pub fn from_body(body: &[u8]) -> Result<Self, ScanError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ScanError::MalformedRequest(format!("body is not valid JSON: {e}")))?;
        if !value.is_object() {
            return Err(ScanError::MalformedRequest(
                "body must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| ScanError::MalformedRequest(format!("invalid scan request: {e}")))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scan", post(scan_handler))
        // Runs before any extractor, so unauthorised bodies are never read.
        .route_layer(from_fn_with_state(state.clone(), require_bearer))
        // Over-long text from an authorised client is truncated by the
        // model, not refused here.
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ScanError> {
    if !state.api_key.authorizes(request.headers()) {
        return Err(ScanError::Unauthorized);
    }
    Ok(next.run(request).await)
}

async fn scan_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ClassificationResult>, ScanError> {
    let request = ScanRequest::from_body(&body)?;
    let chars = request.text.chars().count();

    let classifier = Arc::clone(&state.classifier);
    let result = tokio::task::spawn_blocking(move || classify(classifier.as_ref(), &request.text))
        .await
        .map_err(|e| ScanError::Inference(anyhow::anyhow!("inference task aborted: {e}")))?
        .map_err(ScanError::Inference)?;

    info!(
        classification = result.classification.as_str(),
        confidence = result.confidence,
        chars,
        "scanned message"
    );
    Ok(Json(result))
}
