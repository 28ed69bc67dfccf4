use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServiceConfig;
use crate::edit::remote::{OpenRouterEditService, SharedRemoteEditService};
use crate::edit::{EditOrchestrator, SharedEditOrchestrator};

/// Base64 uploads run about a third larger than the image itself.
pub const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service_name: &'static str,
    pub service_version: &'static str,
    pub started_unix_ms: u128,
    pub orchestrator: SharedEditOrchestrator,
}

impl AppState {
    pub fn new(orchestrator: SharedEditOrchestrator) -> Self {
        Self {
            service_name: "photo-editor-core",
            service_version: env!("CARGO_PKG_VERSION"),
            started_unix_ms: now_unix_ms(),
            orchestrator,
        }
    }
}

pub fn build_router(config: &ServiceConfig) -> Router {
    let remote: SharedRemoteEditService = Arc::new(OpenRouterEditService::new(
        config.endpoint.clone(),
        config.model.clone(),
    ));
    build_router_with_orchestrator(Arc::new(EditOrchestrator::new(remote)))
}

pub fn build_router_with_orchestrator(orchestrator: SharedEditOrchestrator) -> Router {
    let state = AppState::new(orchestrator);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/presets",
            get(crate::api::session::list_presets_handler),
        )
        .route(
            "/api/session",
            get(crate::api::session::get_session_handler),
        )
        .route(
            "/api/session/image",
            post(crate::api::session::load_image_handler),
        )
        .route(
            "/api/session/instruction",
            put(crate::api::session::set_instruction_handler),
        )
        .route(
            "/api/session/edits",
            post(crate::api::session::submit_edit_handler),
        )
        .route("/api/session/undo", post(crate::api::session::undo_handler))
        .route(
            "/api/session/reset",
            post(crate::api::session::reset_handler),
        )
        .route(
            "/api/session/download",
            get(crate::api::session::download_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: ServiceConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let app = build_router(&config);
    info!(
        bind = %config.bind,
        endpoint = %config.endpoint,
        model = %config.model,
        "starting photo-editor-core HTTP surface"
    );
    axum::serve(listener, app).await
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let busy = state.orchestrator.snapshot().busy;
    (
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "status": "ok",
            "service": state.service_name,
            "version": state.service_version,
            "started_unix_ms": state.started_unix_ms,
            "edit_in_flight": busy,
        })),
    )
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis())
}
