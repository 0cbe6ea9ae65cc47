use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use mailguard_core::TextClassifier;
use tracing::info;

use crate::auth::ApiKey;
use crate::routes::{AppState, router};

/// Where to listen and which key to accept.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub api_key: ApiKey,
}

/// Serve the scan API until ctrl-c.
///
/// The classifier must already be loaded: no request is accepted before
/// this function binds the listener.
pub async fn serve(
    config: ServerConfig,
    classifier: Arc<dyn TextClassifier>,
) -> anyhow::Result<()> {
    let model_id = classifier.model_id().to_string();
    let app = router(AppState::new(classifier, config.api_key));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    let local_addr = listener.local_addr()?;

    info!(addr = %local_addr, model = %model_id, "scan API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    info!("scan API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler: run until the process is killed.
        std::future::pending::<()>().await;
    }
}
