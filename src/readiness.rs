//! Model readiness tracking.
//!
//! One [`ModelSlot`] per process holds the load lifecycle of the TTS model:
//! not started → loading → ready, or loading → failed.  Exactly one load
//! task runs at a time; every request handler reads the same slot.
//!
//! A failed load is terminal until an operator hits `POST /api/reload`,
//! which re-runs the loader.  There is no automatic retry.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::RwLock;
use tracing::{error, info};

use crate::model::SpeechModel;

/// Progress shown while the loader runs.  The load is a single opaque call,
/// so progress jumps from this value straight to 100 on success.
const LOADING_PROGRESS: u8 = 10;

/// Factory that produces the loaded model.  Runs on a blocking thread; kept
/// as a shared closure so a reload can re-invoke it.
pub type ModelLoader = Arc<dyn Fn() -> anyhow::Result<Arc<dyn SpeechModel>> + Send + Sync>;

enum LoadState {
    NotStarted,
    Loading,
    Ready(Arc<dyn SpeechModel>),
    Failed(String),
}

/// Point-in-time view of the slot, safe to serialize into status responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessSnapshot {
    pub is_loading: bool,
    pub progress: u8,
    pub is_ready: bool,
    /// Loader error message, present only in the failed state.
    pub error: Option<String>,
}

struct Inner {
    state: RwLock<LoadState>,
    // Swap guard so two racing spawn_load calls cannot both start a task.
    load_in_flight: AtomicBool,
}

/// Process-wide holder of the model handle and its load state.  Cheap to
/// clone; clones share the same slot.
#[derive(Clone)]
pub struct ModelSlot {
    inner: Arc<Inner>,
}

impl Default for ModelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSlot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(LoadState::NotStarted),
                load_in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Slot that is ready from construction — used by tests and embeddings
    /// that already hold a model.
    pub fn preloaded(model: Arc<dyn SpeechModel>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(LoadState::Ready(model)),
                load_in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the background load task.
    ///
    /// Returns `false` without spawning when a load is already in flight or
    /// the model is already ready.  After a failure this can be called again
    /// (the reload path).
    pub async fn spawn_load(&self, loader: ModelLoader) -> bool {
        if self.inner.load_in_flight.swap(true, Ordering::SeqCst) {
            return false;
        }
        if matches!(*self.inner.state.read().await, LoadState::Ready(_)) {
            self.inner.load_in_flight.store(false, Ordering::SeqCst);
            return false;
        }

        *self.inner.state.write().await = LoadState::Loading;
        info!("model load started");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || loader()).await;
            let mut state = inner.state.write().await;
            match result {
                Ok(Ok(model)) => {
                    info!("model load complete");
                    *state = LoadState::Ready(model);
                }
                Ok(Err(e)) => {
                    error!(error = %format!("{e:#}"), "model load failed");
                    *state = LoadState::Failed(format!("{e:#}"));
                }
                Err(e) => {
                    error!(error = %e, "model load task panicked");
                    *state = LoadState::Failed(e.to_string());
                }
            }
            drop(state);
            inner.load_in_flight.store(false, Ordering::SeqCst);
        });
        true
    }

    /// The loaded model, if ready.
    pub async fn model(&self) -> Option<Arc<dyn SpeechModel>> {
        match &*self.inner.state.read().await {
            LoadState::Ready(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    pub async fn snapshot(&self) -> ReadinessSnapshot {
        match &*self.inner.state.read().await {
            LoadState::NotStarted => ReadinessSnapshot {
                is_loading: false,
                progress: 0,
                is_ready: false,
                error: None,
            },
            LoadState::Loading => ReadinessSnapshot {
                is_loading: true,
                progress: LOADING_PROGRESS,
                is_ready: false,
                error: None,
            },
            LoadState::Ready(_) => ReadinessSnapshot {
                is_loading: false,
                progress: 100,
                is_ready: true,
                error: None,
            },
            LoadState::Failed(msg) => ReadinessSnapshot {
                is_loading: false,
                progress: 0,
                is_ready: false,
                error: Some(msg.clone()),
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
