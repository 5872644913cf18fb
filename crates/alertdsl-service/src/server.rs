//! HTTP surface: the notifier posts events here.

use crate::config::ServiceConfig;
use crate::service::DslScriptService;
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Body of `POST /notify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub event_xml: String,
    #[serde(default)]
    pub identity_xml: String,
}

pub fn router(service: Arc<DslScriptService>) -> Router {
    Router::new()
        .route("/notify", post(notify_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

pub async fn serve(service: Arc<DslScriptService>) -> anyhow::Result<()> {
    let config: &ServiceConfig = service.config();
    let bind_addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_address()))?;

    info!("alertdsl v{} starting", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Plugins:      {}", config.dsl_folder.display());
    info!("  Scripts:      {}", config.script_folder.display());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(service)).await?;
    Ok(())
}

/// Runs the notification on a blocking thread and answers 202 once the run
/// has ended, whatever its outcome. The request stays open for the whole run:
/// a script that never finishes holds it open unless `script_timeout_ms` is
/// set.
async fn notify_handler(
    State(service): State<Arc<DslScriptService>>,
    Json(request): Json<NotifyRequest>,
) -> impl IntoResponse {
    let run = tokio::task::spawn_blocking(move || {
        service.notify(&request.event_xml, &request.identity_xml)
    })
    .await;

    if let Err(e) = run {
        error!(error = %e, "notification run did not complete");
    }
    StatusCode::ACCEPTED
}

async fn health_handler(State(service): State<Arc<DslScriptService>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "libraries": service.catalog().keys(),
        "plugin_directory": service.config().dsl_folder.display().to_string(),
    }))
}
