use crate::config::{ApiConfig, LimitsConfig};
use crate::error::{GatewayError, Result};
use crate::kv_store::KeyValueStore;
use crate::submissions::{self, ClientInfo, NewSubmission, Submission};
use crate::videos::{self, ProgressUpdate, Video};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

const ALLOWED_METHODS: &str = "GET, POST, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn KeyValueStore>,
    pub limits: LimitsConfig,
    pub service_name: String,
}

/// Body of every successful mutation that has nothing else to return
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let allow_origin = HeaderValue::from_str(&config.allow_origin).unwrap_or_else(|_| {
        warn!(origin = %config.allow_origin, "Invalid allow_origin, falling back to *");
        HeaderValue::from_static("*")
    });

    Router::new()
        .route("/health", get(health_check).fallback(not_found))
        .route("/ready", get(readiness_check).fallback(not_found))
        .route(
            "/api/videos",
            get(list_videos).post(add_video).fallback(not_found),
        )
        // DELETE on these two paths falls through to delete-by-id
        .route(
            "/api/videos/progress",
            post(update_progress).delete(delete_video).fallback(not_found),
        )
        .route(
            "/api/videos/clear",
            post(clear_videos).delete(delete_video).fallback(not_found),
        )
        .route("/api/videos/:id", delete(delete_video).fallback(not_found))
        .route(
            "/api/submissions",
            get(list_submissions).post(add_submission).fallback(not_found),
        )
        .fallback(not_found)
        .layer(middleware::from_fn(method_guard))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            allow_origin,
        ))
        .with_state(state)
}

/// Answer every OPTIONS request with an empty 200; CORS headers are added by
/// the outer layers. HEAD is not in the route table, so it never reaches the
/// GET handlers axum would otherwise reuse for it.
async fn method_guard(request: Request, next: Next) -> Response {
    match *request.method() {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::HEAD => GatewayError::NotFound.into_response(),
        _ => next.run(request).await,
    }
}

/// Final path segment, taken verbatim
fn last_segment(uri: &Uri) -> &str {
    uri.path().rsplit('/').next().unwrap_or_default()
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Handler panicked".to_string()
    };

    GatewayError::Internal(message).into_response()
}

async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

/// Decode a request body in two steps so that broken JSON and a wrong
/// shape are reported differently
fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(GatewayError::MalformedBody)?;
    serde_json::from_value(value)
        .map_err(|e| GatewayError::Validation(format!("Invalid request body: {}", e)))
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.service_name
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "store": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "store": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

#[instrument(skip(state))]
async fn list_videos(State(state): State<AppState>) -> Result<Json<Vec<Video>>> {
    Ok(Json(videos::list_videos(state.store.as_ref()).await?))
}

#[instrument(skip(state, body))]
async fn add_video(State(state): State<AppState>, body: Bytes) -> Result<(StatusCode, Json<Video>)> {
    let fields = videos::video_fields(parse_body(&body)?)?;
    let video = videos::add_video(state.store.as_ref(), fields, state.limits.max_videos).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

#[instrument(skip(state, body))]
async fn update_progress(State(state): State<AppState>, body: Bytes) -> Result<Json<SuccessResponse>> {
    let update: ProgressUpdate = parse_body(&body)?;
    videos::update_progress(state.store.as_ref(), update).await?;
    Ok(SuccessResponse::ok())
}

#[instrument(skip(state))]
async fn delete_video(State(state): State<AppState>, uri: Uri) -> Result<Json<SuccessResponse>> {
    videos::delete_video(state.store.as_ref(), last_segment(&uri)).await?;
    Ok(SuccessResponse::ok())
}

#[instrument(skip(state))]
async fn clear_videos(State(state): State<AppState>) -> Result<Json<SuccessResponse>> {
    videos::clear_videos(state.store.as_ref()).await?;
    Ok(SuccessResponse::ok())
}

#[instrument(skip(state))]
async fn list_submissions(State(state): State<AppState>) -> Result<Json<Vec<Submission>>> {
    Ok(Json(submissions::list_submissions(state.store.as_ref()).await?))
}

#[instrument(skip(state, headers, body))]
async fn add_submission(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Submission>)> {
    let request: NewSubmission = parse_body(&body)?;
    let client = ClientInfo::from_headers(&headers);
    let submission = submissions::add_submission(
        state.store.as_ref(),
        request,
        client,
        state.limits.max_submissions,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// Start the API server and serve until `shutdown` resolves
pub async fn start_api_server<F>(state: AppState, config: &ApiConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting gateway API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
