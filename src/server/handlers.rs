//! HTTP request handlers.
//!
//! Handlers are stateless: everything they touch lives in [`AppState`].
//! Store I/O and model invocation run under `spawn_blocking` so a slow disk
//! or a long synthesis never stalls the async workers.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::ApiError,
    generate::{validate_text, synthesize_and_store, GenerateError, GenerateRequest},
    session::{mint_session, session_from_headers},
    server::state::AppState,
    store::AudioEntry,
};

// ============================================================================
// Dashboard page
// ============================================================================

/// The browser dashboard — a single self-contained page talking to the API.
pub async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/index.html"))
}

// ============================================================================
// Health / readiness
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    device: String,
    model_ready: bool,
    model_loading: bool,
    loading_progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snap = state.slot.snapshot().await;
    Json(HealthResponse {
        status: "running",
        device: state.device.clone(),
        model_ready: snap.is_ready,
        model_loading: snap.is_loading,
        loading_progress: snap.progress,
        error: snap.error,
    })
}

#[derive(Serialize)]
pub struct StatusResponse {
    is_loading: bool,
    progress: u8,
    is_ready: bool,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let snap = state.slot.snapshot().await;
    Json(StatusResponse {
        is_loading: snap.is_loading,
        progress: snap.progress,
        is_ready: snap.is_ready,
    })
}

// ============================================================================
// Generation
// ============================================================================

pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Response {
    // Validation first: bad text is a 400 even while the model is loading.
    if let Err(e) = validate_text(&req.text) {
        return e.into_response();
    }
    let Some(model) = state.slot.model().await else {
        return GenerateError::NotReady.into_response();
    };

    // First contact mints the owner id; the Set-Cookie below hands it back.
    let (owner, set_cookie) = match session_from_headers(&headers, &state.session_key) {
        Some(id) => (id, None),
        None => {
            let (id, cookie) = mint_session(&state.session_key);
            (id, Some(cookie))
        }
    };

    let store = state.store.clone();
    let task_owner = owner.clone();
    let result =
        tokio::task::spawn_blocking(move || synthesize_and_store(model.as_ref(), &store, &task_owner, &req))
            .await;

    let mut response = match result {
        Ok(Ok(resp)) => Json(resp).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            GenerateError::Synthesis(anyhow::anyhow!("synthesis task failed: {e}")).into_response()
        }
    };
    if let Some(cookie) = set_cookie {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

// ============================================================================
// Audio retrieval
// ============================================================================

fn wav_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "audio/wav")], bytes).into_response()
}

pub async fn get_audio(
    State(state): State<AppState>,
    Path((user_id, filename)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let bytes = tokio::task::spawn_blocking(move || store.get(&user_id, &filename))
        .await
        .map_err(|e| anyhow::anyhow!("file read task failed: {e}"))??
        .ok_or_else(|| ApiError::not_found("Audio file not found."))?;
    Ok(wav_response(bytes))
}

/// Deprecated: predates owner partitioning and reads straight from the store
/// root.  Only mounted when the operator opts in.
pub async fn get_audio_legacy(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    warn!(%filename, "deprecated unscoped audio route used");
    let store = state.store.clone();
    let bytes = tokio::task::spawn_blocking(move || store.get_unscoped(&filename))
        .await
        .map_err(|e| anyhow::anyhow!("file read task failed: {e}"))??
        .ok_or_else(|| ApiError::not_found("Audio file not found."))?;
    Ok(wav_response(bytes))
}

// ============================================================================
// Listing / cleanup
// ============================================================================

#[derive(Serialize)]
pub struct ListResponse {
    files: Vec<AudioEntry>,
}

pub async fn list_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ListResponse>, ApiError> {
    let Some(owner) = session_from_headers(&headers, &state.session_key) else {
        return Ok(Json(ListResponse { files: Vec::new() }));
    };
    let store = state.store.clone();
    let files = tokio::task::spawn_blocking(move || store.list(&owner))
        .await
        .map_err(|e| anyhow::anyhow!("listing task failed: {e}"))??;
    Ok(Json(ListResponse { files }))
}

fn default_max_files() -> usize {
    10
}

#[derive(Deserialize)]
pub struct CleanupRequest {
    #[serde(default = "default_max_files")]
    max_files: usize,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    message: String,
    deleted_count: usize,
}

pub async fn cleanup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let Some(owner) = session_from_headers(&headers, &state.session_key) else {
        return Ok(Json(CleanupResponse {
            message: "No active session.".to_string(),
            deleted_count: 0,
        }));
    };
    let store = state.store.clone();
    let deleted = tokio::task::spawn_blocking(move || store.cleanup(&owner, req.max_files))
        .await
        .map_err(|e| anyhow::anyhow!("cleanup task failed: {e}"))??;
    Ok(Json(CleanupResponse {
        message: format!("Deleted {} old file(s).", deleted),
        deleted_count: deleted,
    }))
}

// ============================================================================
// Model reload
// ============================================================================

#[derive(Serialize)]
pub struct ReloadResponse {
    message: String,
}

/// Re-run the model loader after a failed load.  A no-op (409) while a load
/// is in flight or the model is already serving.
pub async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, ApiError> {
    if state.slot.spawn_load(state.loader.clone()).await {
        Ok(Json(ReloadResponse { message: "Model load restarted.".to_string() }))
    } else {
        Err(ApiError::conflict("Model is already loaded or loading."))
    }
}
