//! Web service entry point.
//!
//! Boots logging, kicks off the one-shot background model load, and serves
//! the API plus the dashboard page until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chatterbox_web::{
    config::ServerConfig,
    download,
    model::SpeechModel,
    readiness::{ModelLoader, ModelSlot},
    server::{create_router, AppState},
    session::SessionKey,
    store::AudioStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();

    std::fs::create_dir_all(&config.audio_root).with_context(|| {
        format!("Cannot create audio root: {}", config.audio_root.display())
    })?;

    let session_key = match config.session_secret.as_deref() {
        Some(secret) => SessionKey::from_secret(secret),
        None => {
            warn!("SESSION_SECRET not set; sessions will not survive a restart");
            SessionKey::random()
        }
    };

    // One-shot background load; requests arriving before it finishes are
    // answered with the not-ready error.
    let slot = ModelSlot::new();
    let repo = config.model_repo.clone();
    let loader: ModelLoader = Arc::new(move || {
        download::load_from_hub(&repo).map(|m| Arc::new(m) as Arc<dyn SpeechModel>)
    });
    slot.spawn_load(loader.clone()).await;

    let state = AppState {
        slot,
        store: Arc::new(AudioStore::new(&config.audio_root)),
        session_key: Arc::new(session_key),
        loader,
        device: "cpu".to_string(),
        legacy_audio_route: config.enable_legacy_audio_route,
    };

    if state.legacy_audio_route {
        warn!("deprecated unscoped /api/audio/{{filename}} route is enabled");
    }

    let app = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {}", addr))?;
    info!(%addr, audio_root = %config.audio_root.display(), "chatterbox web service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
