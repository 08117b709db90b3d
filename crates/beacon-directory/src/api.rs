//! Directory HTTP surface — register / peers / peerinfo as JSON.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use beacon_core::DirectoryError;

use crate::service::Directory;

#[derive(Clone)]
pub struct ApiState {
    pub directory: Arc<Directory>,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/register", post(handle_register))
        .route("/peers", get(handle_peers))
        .route("/peerinfo", get(handle_peerinfo))
        .with_state(state)
        .layer(cors)
}

/// Bind `port` on all interfaces and serve until `shutdown` fires.
pub async fn serve(state: ApiState, port: u16, shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "directory API listening");
    serve_with_listener(state, listener, shutdown).await
}

/// Serve on an already-bound listener. Used directly by tests that need an
/// ephemeral port.
pub async fn serve_with_listener(
    state: ApiState,
    listener: tokio::net::TcpListener,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("directory API shutting down");
        })
        .await?;
    Ok(())
}

// ── Shared response shapes ────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn to_api_error(e: DirectoryError) -> ApiError {
    let status = match &e {
        DirectoryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        DirectoryError::DuplicateUsername => StatusCode::CONFLICT,
        DirectoryError::NotFound => StatusCode::NOT_FOUND,
        DirectoryError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorResponse { error: e.to_string() }))
}

// ── POST /register ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub ip: String,
    /// A missing port deserializes to 0 and fails validation, matching the
    /// missing-field behavior of the other fields.
    #[serde(default)]
    pub port: u16,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub message: String,
}

pub async fn handle_register(
    State(state): State<ApiState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    state
        .directory
        .register(&req.username, &req.ip, req.port)
        .await
        .map_err(to_api_error)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registered successfully".to_string(),
        }),
    ))
}

// ── GET /peers ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<String>,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Result<Json<PeersResponse>, ApiError> {
    let peers = state.directory.list().await.map_err(to_api_error)?;
    Ok(Json(PeersResponse { peers }))
}

// ── GET /peerinfo ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct PeerInfoParams {
    pub username: Option<String>,
}

#[derive(Serialize)]
pub struct PeerInfoResponse {
    pub ip: String,
    pub port: u16,
}

pub async fn handle_peerinfo(
    State(state): State<ApiState>,
    Query(params): Query<PeerInfoParams>,
) -> Result<Json<PeerInfoResponse>, ApiError> {
    let username = params
        .username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| to_api_error(DirectoryError::InvalidInput("username")))?;

    let reg = state.directory.lookup(&username).await.map_err(to_api_error)?;
    Ok(Json(PeerInfoResponse {
        ip: reg.ip,
        port: reg.port,
    }))
}
