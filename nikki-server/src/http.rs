//! Nikki HTTP API
//!
//! Axum-based HTTP server for the diary page. Each endpoint has a thin axum
//! handler that delegates to an inner function returning
//! `(StatusCode, serde_json::Value)`; the inner functions are called directly
//! by the unit tests.
//!
//! Endpoints:
//! - GET  /health                 store reachability and document counts
//! - GET  /version                server version info
//! - GET  /api/data               whole diary document
//! - GET  /api/summaries          entries only, as a bare array
//! - POST /api/check-password     login check
//! - POST /api/entries            add an entry
//! - POST /api/entries/delete     delete an entry by id
//! - POST /api/checkins           record today's study check-in
//! - GET  /api/avatar             profile picture
//! - PUT  /api/upload             store an image, returns its URL

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use nikki_core::protocol::{DiaryRequest, DiaryResponse};
use nikki_core::NikkiConfig;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::context::DiaryContext;
use crate::router::handle_request;
use crate::subsystems::media;

/// Header carrying the admin password on requests without a JSON body.
pub const AUTH_HEADER: &str = "x-auth-pass";

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub ctx: DiaryContext,
    pub config: NikkiConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let upload_limit = state.config.http.max_upload_bytes;
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/data", get(data_handler))
        .route("/api/summaries", get(summaries_handler))
        .route("/api/check-password", post(check_password_handler))
        .route("/api/entries", post(submit_handler))
        .route("/api/entries/delete", post(delete_handler))
        .route("/api/checkins", post(checkin_handler))
        .route("/api/avatar", get(avatar_handler))
        .route(
            "/api/upload",
            put(upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    ctx: DiaryContext,
    config: NikkiConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState { ctx, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Nikki HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct PasswordRequest {
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SubmitRequest {
    pub password: Option<String>,
    /// Older pages post the text as `summary`.
    #[serde(default, alias = "summary")]
    pub text: String,
    #[serde(rename = "imageUrl", alias = "image_url")]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeleteRequest {
    pub password: Option<String>,
    /// Entries written before ids existed are keyed by their `date`.
    #[serde(alias = "date")]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct CheckInRequest {
    pub password: Option<String>,
    #[serde(
        default,
        alias = "at",
        deserialize_with = "nikki_core::models::instant::deserialize_option"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    /// Minutes east of UTC.
    #[serde(default, alias = "utcOffsetMinutes")]
    pub utc_offset_minutes: i32,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
    pub kind: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
            kind: kind.into(),
            retryable: false,
        }
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check, reading the document through the configured store.
pub async fn health_inner(ctx: &DiaryContext) -> (StatusCode, serde_json::Value) {
    let response = handle_request(DiaryRequest::Health, ctx).await;
    if !response.is_ok() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": response.error,
            }),
        );
    }

    let mut body = response.data.unwrap_or_else(|| serde_json::json!({}));
    if let Some(obj) = body.as_object_mut() {
        obj.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));
    }
    (StatusCode::OK, body)
}

/// Inner version, returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "nikki/1",
    })
}

pub async fn data_inner(ctx: &DiaryContext) -> (StatusCode, serde_json::Value) {
    response_to_http(handle_request(DiaryRequest::Load, ctx).await)
}

/// Entries only, for pages that predate check-ins.
pub async fn summaries_inner(ctx: &DiaryContext) -> (StatusCode, serde_json::Value) {
    let (status, mut body) = data_inner(ctx).await;
    if status != StatusCode::OK {
        return (status, body);
    }
    (status, body["entries"].take())
}

pub async fn check_password_inner(
    ctx: &DiaryContext,
    password: Option<String>,
) -> (StatusCode, serde_json::Value) {
    response_to_http(handle_request(DiaryRequest::CheckPassword { password }, ctx).await)
}

pub async fn submit_inner(
    ctx: &DiaryContext,
    password: Option<String>,
    req: SubmitRequest,
) -> (StatusCode, serde_json::Value) {
    let request = DiaryRequest::Submit {
        password,
        text: req.text,
        image_url: req.image_url,
    };
    response_to_http(handle_request(request, ctx).await)
}

pub async fn delete_inner(
    ctx: &DiaryContext,
    password: Option<String>,
    req: DeleteRequest,
) -> (StatusCode, serde_json::Value) {
    let request = DiaryRequest::Delete {
        password,
        id: req.id.unwrap_or_default(),
    };
    response_to_http(handle_request(request, ctx).await)
}

pub async fn checkin_inner(
    ctx: &DiaryContext,
    password: Option<String>,
    req: CheckInRequest,
) -> (StatusCode, serde_json::Value) {
    let request = DiaryRequest::CheckIn {
        password,
        at: req.timestamp,
        utc_offset_minutes: req.utc_offset_minutes,
    };
    response_to_http(handle_request(request, ctx).await)
}

pub async fn avatar_inner(ctx: &DiaryContext) -> (StatusCode, serde_json::Value) {
    response_to_http(handle_request(DiaryRequest::Avatar, ctx).await)
}

/// Inner upload. The body is raw image bytes, so this bypasses the router.
pub async fn upload_inner(
    ctx: &DiaryContext,
    password: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
) -> (StatusCode, serde_json::Value) {
    match media::upload(ctx, password, body, content_type).await {
        Ok(url) => (StatusCode::OK, serde_json::json!({ "url": url })),
        Err(e) => response_to_http(DiaryResponse::from_error(&e)),
    }
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn data_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = data_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn summaries_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = summaries_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn check_password_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<PasswordRequest>,
) -> impl IntoResponse {
    let password = resolve_password(req.password, &headers);
    let (status, body) = check_password_inner(&state.ctx, password).await;
    (status, Json(body))
}

pub async fn submit_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> impl IntoResponse {
    let password = resolve_password(req.password.clone(), &headers);
    let (status, body) = submit_inner(&state.ctx, password, req).await;
    (status, Json(body))
}

pub async fn delete_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<DeleteRequest>,
) -> impl IntoResponse {
    let password = resolve_password(req.password.clone(), &headers);
    let (status, body) = delete_inner(&state.ctx, password, req).await;
    (status, Json(body))
}

pub async fn checkin_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<CheckInRequest>,
) -> impl IntoResponse {
    let password = resolve_password(req.password.clone(), &headers);
    let (status, body) = checkin_inner(&state.ctx, password, req).await;
    (status, Json(body))
}

pub async fn avatar_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = avatar_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn upload_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let password = resolve_password(None, &headers);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let (status, body) = upload_inner(&state.ctx, password.as_deref(), content_type, &body).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Body field first, then the `X-Auth-Pass` header.
pub fn resolve_password(body: Option<String>, headers: &HeaderMap) -> Option<String> {
    body.or_else(|| {
        headers
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })
}

/// HTTP status for an error kind from [`nikki_core::DiaryError::kind`].
pub fn status_for_kind(kind: &str) -> StatusCode {
    match kind {
        "unauthorized" => StatusCode::UNAUTHORIZED,
        "invalid_request" => StatusCode::BAD_REQUEST,
        "entry_not_found" | "not_found" => StatusCode::NOT_FOUND,
        "conflict" => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a `DiaryResponse` into an HTTP status and body.
pub fn response_to_http(response: DiaryResponse) -> (StatusCode, serde_json::Value) {
    if response.is_ok() {
        return (
            StatusCode::OK,
            response.data.unwrap_or_else(|| serde_json::json!({})),
        );
    }

    let kind = response.kind.unwrap_or_else(|| "other".to_string());
    let status = status_for_kind(&kind);
    let mut error = ErrorResponse::new(
        response.error.unwrap_or_else(|| "unknown error".to_string()),
        kind,
    );
    error.retryable = response.retryable;
    (
        status,
        serde_json::to_value(error).unwrap_or_else(|_| serde_json::json!({"status": "error"})),
    )
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
