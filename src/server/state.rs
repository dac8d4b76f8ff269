//! Shared application state.

use std::sync::Arc;

use crate::{
    readiness::{ModelLoader, ModelSlot},
    session::SessionKey,
    store::AudioStore,
};

#[derive(Clone)]
pub struct AppState {
    pub slot: ModelSlot,
    pub store: Arc<AudioStore>,
    pub session_key: Arc<SessionKey>,
    /// Re-invoked by `POST /api/reload` after a failed load.
    pub loader: ModelLoader,
    /// Inference device label reported by `/api/health`.
    pub device: String,
    /// Serve the deprecated unpartitioned `/api/audio/{filename}` route.
    pub legacy_audio_route: bool,
}
