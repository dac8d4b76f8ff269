//! End-to-end API tests.
//!
//! Drives the real router with an in-memory fake model, so everything except
//! ONNX inference runs exactly as in production: session cookies, the audio
//! store on a temp directory, and the JSON envelopes.

use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use chatterbox_web::{
    model::{SpeechModel, SynthesisParams, Waveform},
    readiness::{ModelLoader, ModelSlot},
    server::{create_router, AppState},
    session::SessionKey,
    store::AudioStore,
};

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

/// Fake model: instant synthesis, records the last invocation.
struct FakeModel {
    last_params: Mutex<Option<SynthesisParams>>,
}

impl FakeModel {
    fn new() -> Arc<Self> {
        Arc::new(Self { last_params: Mutex::new(None) })
    }
}

impl SpeechModel for FakeModel {
    fn generate(&self, _: &str, _: &str, params: &SynthesisParams) -> anyhow::Result<Waveform> {
        *self.last_params.lock().unwrap() = Some(*params);
        Ok(Waveform { samples: vec![0.2; 2_400], sample_rate: 24_000 })
    }

    fn sample_rate(&self) -> u32 {
        24_000
    }
}

struct TestApp {
    router: Router,
    store_root: tempfile::TempDir,
    model: Arc<FakeModel>,
}

fn app_with_slot(slot: ModelSlot) -> TestApp {
    let store_root = tempfile::tempdir().unwrap();
    let model = FakeModel::new();
    let loader_model = model.clone();
    let loader: ModelLoader =
        Arc::new(move || Ok(loader_model.clone() as Arc<dyn SpeechModel>));

    let state = AppState {
        slot,
        store: Arc::new(AudioStore::new(store_root.path())),
        session_key: Arc::new(SessionKey::from_secret("test-secret")),
        loader,
        device: "cpu".to_string(),
        legacy_audio_route: false,
    };
    TestApp { router: create_router(state), store_root, model }
}

/// App with the fake model already loaded.
fn ready_app() -> TestApp {
    let model = FakeModel::new();
    let mut app = app_with_slot(ModelSlot::preloaded(model.clone()));
    app.model = model;
    app
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let response = router.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body, headers)
}

async fn send_json(router: &Router, req: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
    let (status, body, headers) = send(router, req).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value, headers)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
    req.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
    req
}

/// The `name=value` pair a browser would echo back from a Set-Cookie header.
fn cookie_pair(headers: &axum::http::HeaderMap) -> String {
    headers
        .get(header::SET_COOKIE)
        .expect("response carries a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn generate(router: &Router, body: Value) -> (StatusCode, Value, axum::http::HeaderMap) {
    send_json(router, post_json("/api/generate", body)).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Readiness endpoints
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_ready_model() {
    let app = ready_app();
    let (status, body, _) = send_json(&app.router, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
    assert_eq!(body["device"], "cpu");
    assert_eq!(body["model_ready"], true);
    assert_eq!(body["model_loading"], false);
    assert_eq!(body["loading_progress"], 100);
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn status_reports_unloaded_model() {
    let app = app_with_slot(ModelSlot::new());
    let (status, body, _) = send_json(&app.router, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_ready"], false);
    assert_eq!(body["is_loading"], false);
    assert_eq!(body["progress"], 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn generate_rejects_empty_text() {
    let app = ready_app();
    let (status, body, _) = generate(&app.router, json!({ "text": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());
    // No file was created for anyone.
    assert_eq!(std::fs::read_dir(app.store_root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn generate_rejects_oversized_text() {
    let app = ready_app();
    let long = "가".repeat(501);
    let (status, body, _) = generate(&app.router, json!({ "text": long })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn generate_fails_while_model_not_ready() {
    let app = app_with_slot(ModelSlot::new());
    let (status, body, _) = generate(&app.router, json!({ "text": "hello" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(!body["error"].as_str().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(app.store_root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn generate_happy_path_mints_session_and_stores_file() {
    let app = ready_app();
    let (status, body, headers) =
        generate(&app.router, json!({ "text": "안녕하세요", "emotion": "happy" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let audio_file = body["audioFile"].as_str().unwrap();
    let user_id = body["userId"].as_str().unwrap();
    assert!(audio_file.starts_with("tts_happy_"));
    assert!(audio_file.ends_with(".wav"));
    assert_eq!(body["sampleRate"], 24_000);
    assert!((body["duration"].as_f64().unwrap() - 0.1).abs() < 1e-6);

    // The emotion table ran: exaggeration 1.0 + 0.3, clamped at 1.5.
    let params = app.model.last_params.lock().unwrap().unwrap();
    assert!((params.exaggeration - 1.3).abs() < 1e-6);

    // Cookie hands the owner id back to the client.
    let cookie = cookie_pair(&headers);
    assert!(cookie.starts_with("cb_session="));

    // The file exists under the owner's partition.
    assert!(app.store_root.path().join(user_id).join(audio_file).exists());
}

#[tokio::test]
async fn generate_reuses_session_from_cookie() {
    let app = ready_app();
    let (_, first, headers) = generate(&app.router, json!({ "text": "one" })).await;
    let cookie = cookie_pair(&headers);

    let (status, second, headers) = send_json(
        &app.router,
        with_cookie(post_json("/api/generate", json!({ "text": "two", "emotion": "calm" })), &cookie),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["userId"], first["userId"]);
    // A recognized session is not re-minted.
    assert!(headers.get(header::SET_COOKIE).is_none());
}

// ─────────────────────────────────────────────────────────────────────────────
// Audio retrieval
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn audio_fetch_is_partitioned_by_owner() {
    let app = ready_app();
    let (_, body, _) = generate(&app.router, json!({ "text": "hello" })).await;
    let user_id = body["userId"].as_str().unwrap();
    let audio_file = body["audioFile"].as_str().unwrap();

    let (status, bytes, headers) =
        send(&app.router, get(&format!("/api/audio/{}/{}", user_id, audio_file))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "audio/wav");
    // RIFF magic from the WAV writer.
    assert_eq!(&bytes[..4], b"RIFF");

    // Same filename under a different owner is invisible.
    let (status, body, _) =
        send_json(&app.router, get(&format!("/api/audio/{}/{}", "someone-else", audio_file))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn audio_fetch_rejects_traversal() {
    let app = ready_app();
    let (status, _, _) = send(&app.router, get("/api/audio/owner/..%2F..%2Fetc%2Fpasswd")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn legacy_audio_route_is_disabled_by_default() {
    let app = ready_app();
    let (status, _, _) = send(&app.router, get("/api/audio/somefile.wav")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn legacy_audio_route_serves_unscoped_files_when_enabled() {
    let store_root = tempfile::tempdir().unwrap();
    std::fs::write(store_root.path().join("old.wav"), b"RIFFdata").unwrap();

    let model = FakeModel::new();
    let loader_model = model.clone();
    let loader: ModelLoader =
        Arc::new(move || Ok(loader_model.clone() as Arc<dyn SpeechModel>));
    let state = AppState {
        slot: ModelSlot::preloaded(model),
        store: Arc::new(AudioStore::new(store_root.path())),
        session_key: Arc::new(SessionKey::from_secret("test-secret")),
        loader,
        device: "cpu".to_string(),
        legacy_audio_route: true,
    };
    let router = create_router(state);

    let (status, bytes, _) = send(&router, get("/api/audio/old.wav")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"RIFFdata");

    let (status, _, _) = send(&router, get("/api/audio/missing.wav")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─────────────────────────────────────────────────────────────────────────────
// Listing / cleanup
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_audio_without_session_is_empty() {
    let app = ready_app();
    let (status, body, _) = send_json(&app.router, get("/api/list-audio")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn list_audio_shows_own_files_only() {
    let app = ready_app();
    let (_, _, headers) = generate(&app.router, json!({ "text": "mine" })).await;
    let cookie = cookie_pair(&headers);
    // A second client gets its own partition.
    generate(&app.router, json!({ "text": "theirs", "emotion": "sad" })).await;

    let (status, body, _) =
        send_json(&app.router, with_cookie(get("/api/list-audio"), &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0]["filename"].as_str().unwrap().starts_with("tts_neutral_"));
    assert!(files[0]["size"].as_u64().unwrap() > 0);
    assert!(files[0]["created"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn cleanup_prunes_beyond_keep_count() {
    let app = ready_app();
    // Distinct emotions give distinct filenames even inside one second.
    let (_, _, headers) = generate(&app.router, json!({ "text": "a", "emotion": "happy" })).await;
    let cookie = cookie_pair(&headers);
    for emotion in ["sad", "calm"] {
        send_json(
            &app.router,
            with_cookie(post_json("/api/generate", json!({ "text": "a", "emotion": emotion })), &cookie),
        )
        .await;
    }

    let (status, body, _) = send_json(
        &app.router,
        with_cookie(post_json("/api/cleanup", json!({ "max_files": 1 })), &cookie),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 2);
    assert!(!body["message"].as_str().unwrap().is_empty());

    let (_, body, _) = send_json(&app.router, with_cookie(get("/api/list-audio"), &cookie)).await;
    assert_eq!(body["files"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn cleanup_without_session_deletes_nothing() {
    let app = ready_app();
    let (status, body, _) =
        send_json(&app.router, post_json("/api/cleanup", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted_count"], 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Reload
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reload_restarts_a_never_started_load() {
    let app = app_with_slot(ModelSlot::new());
    let (status, body, _) = send_json(&app.router, post_json("/api/reload", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["message"].as_str().unwrap().is_empty());

    // The loader hands out the fake model, so the slot becomes ready.
    for _ in 0..200 {
        let (_, body, _) = send_json(&app.router, get("/api/status")).await;
        if body["is_ready"] == true {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("reload never reached readiness");
}

#[tokio::test]
async fn reload_conflicts_when_already_ready() {
    let app = ready_app();
    let (status, body, _) = send_json(&app.router, post_json("/api/reload", json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(!body["error"].as_str().unwrap().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Dashboard
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn index_serves_dashboard_page() {
    let app = ready_app();
    let (status, bytes, headers) = send(&app.router, get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_TYPE).unwrap().to_str().unwrap().starts_with("text/html"));
    assert!(String::from_utf8(bytes).unwrap().contains("/api/generate"));
}
