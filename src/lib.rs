//! # chatterbox-web
//!
//! REST API and browser dashboard over the Chatterbox multilingual ONNX
//! text-to-speech model.
//!
//! The crate is thin glue by design: text and a few numeric knobs go in,
//! the pretrained model synthesizes, the waveform lands in a per-session
//! WAV file, and a filename comes back.  The neural model itself is an
//! opaque collaborator behind the [`model::SpeechModel`] trait.
//!
//! ## Quick start
//!
//! ```bash
//! # Serve on port 5000 (PORT env or --port to change)
//! chatterbox-web --audio-root generated_audio
//! ```
//!
//! Embedding the service in another binary:
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatterbox_web::{download, model::SpeechModel};
//! use chatterbox_web::readiness::{ModelLoader, ModelSlot};
//! use chatterbox_web::server::{create_router, AppState};
//! use chatterbox_web::session::SessionKey;
//! use chatterbox_web::store::AudioStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let slot = ModelSlot::new();
//! let loader: ModelLoader = Arc::new(|| {
//!     download::load_from_hub("ResembleAI/chatterbox-multilingual-onnx")
//!         .map(|m| Arc::new(m) as Arc<dyn SpeechModel>)
//! });
//! slot.spawn_load(loader.clone()).await;
//!
//! let app = create_router(AppState {
//!     slot,
//!     store: Arc::new(AudioStore::new("generated_audio")),
//!     session_key: Arc::new(SessionKey::random()),
//!     loader,
//!     device: "cpu".to_string(),
//!     legacy_audio_route: false,
//! });
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Request lifecycle
//!
//! 1. **Session** — first generation request mints an opaque owner id,
//!    handed back in a signed cookie.
//! 2. **Validation** — trimmed text must be 1–500 characters.
//! 3. **Readiness** — the model loads once in the background at startup;
//!    requests before readiness fail, nothing queues.
//! 4. **Synthesis** — the emotion tag nudges the exaggeration parameter
//!    within fixed bounds, then the model runs.
//! 5. **Persistence** — 16-bit PCM WAV under the owner's directory,
//!    retrievable and prunable through the listing/cleanup routes.

pub mod config;
pub mod download;
pub mod error;
pub mod generate;
pub mod model;
pub mod readiness;
pub mod server;
pub mod session;
pub mod store;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use generate::{Emotion, GenerateRequest, GenerateResponse};
pub use model::{MultilingualOnnx, SpeechModel, SynthesisParams, Waveform};
pub use readiness::ModelSlot;
pub use server::{create_router, AppState};
pub use store::AudioStore;
