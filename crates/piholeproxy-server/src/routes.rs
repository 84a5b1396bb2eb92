//! HTTP route handlers.
//!
//! Thin axum layer over `AdminProxy`: query/body extraction, JSON
//! responses, and mapping `ProxyError` to `{"detail": ...}` errors.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use piholeproxy_core::models::{ClientEntry, EditClientRequest, EditResults, Group, GroupIds};
use piholeproxy_core::{AdminProxy, EndpointStatus, ProxyError};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

/// Shared state for all handlers.
pub struct AppState {
    pub proxy: AdminProxy,
    /// Cancelled to stop the server (and the renewal task)
    pub shutdown: CancellationToken,
}

/// Build the application router.
pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .route("/clients", get(get_clients))
        .route("/groups", get(get_groups))
        .route("/group-ids", get(get_group_ids))
        .route("/editclient", post(edit_client))
        .route("/health", get(health))
        .route("/reboot", get(reboot))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Optional `?ep=` endpoint selection.
#[derive(Debug, Deserialize)]
pub struct EndpointQuery {
    ep: Option<String>,
}

/// `ProxyError` rendered as a JSON error response.
pub struct ApiFailure(ProxyError);

impl From<ProxyError> for ApiFailure {
    fn from(err: ProxyError) -> Self {
        Self(err)
    }
}

impl ApiFailure {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ProxyError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

async fn get_clients(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EndpointQuery>,
) -> Result<Json<Vec<ClientEntry>>, ApiFailure> {
    Ok(Json(state.proxy.clients(query.ep.as_deref()).await?))
}

async fn get_groups(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EndpointQuery>,
) -> Result<Json<Vec<Group>>, ApiFailure> {
    Ok(Json(state.proxy.groups(query.ep.as_deref()).await?))
}

async fn get_group_ids(State(state): State<Arc<AppState>>) -> Json<GroupIds> {
    Json(state.proxy.group_ids())
}

async fn edit_client(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EditClientRequest>,
) -> Json<EditResults> {
    Json(state.proxy.edit_client(&request).await)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Vec<EndpointStatus>> {
    Json(state.proxy.sessions().status().await)
}

/// Stop the process so the container supervisor restarts it.
async fn reboot(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    info!("Reboot endpoint hit, shutting down");
    state.shutdown.cancel();
    Json(json!({ "status": "shutting down" }))
}
