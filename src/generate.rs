//! Generation workflow: validate → invoke → persist.
//!
//! The handler-facing entry points are [`validate_text`] (cheap, run before
//! anything else) and [`synthesize_and_store`] (blocking; the server calls
//! it through `spawn_blocking`).  Either step failing maps to one JSON error
//! envelope — see [`GenerateError`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    model::{SpeechModel, SynthesisParams},
    store::AudioStore,
};

/// Maximum accepted text length in characters, after trimming.
pub const MAX_TEXT_CHARS: usize = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Emotion tags
// ─────────────────────────────────────────────────────────────────────────────

/// Presentational emotion tag.  Each tag nudges the exaggeration parameter
/// by a fixed offset within a tag-specific bound; the model itself has no
/// emotion input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Happy,
    Sad,
    Angry,
    Excited,
    Calm,
}

impl Default for Emotion {
    fn default() -> Self {
        Emotion::Neutral
    }
}

impl Emotion {
    /// Unknown tags fall back to neutral rather than failing the request.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "happy" => Emotion::Happy,
            "sad" => Emotion::Sad,
            "angry" => Emotion::Angry,
            "excited" => Emotion::Excited,
            "calm" => Emotion::Calm,
            _ => Emotion::Neutral,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Excited => "excited",
            Emotion::Calm => "calm",
        }
    }

    /// Apply this tag's exaggeration offset, clamped to its bound.
    pub fn adjust(self, exaggeration: f32) -> f32 {
        match self {
            Emotion::Neutral => exaggeration,
            Emotion::Happy => (exaggeration + 0.3).min(1.5),
            Emotion::Sad => (exaggeration - 0.2).max(0.7),
            Emotion::Angry => (exaggeration + 0.4).min(1.8),
            Emotion::Excited => (exaggeration + 0.3).min(1.6),
            Emotion::Calm => (exaggeration - 0.3).max(0.6),
        }
    }
}

impl<'de> Deserialize<'de> for Emotion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(Emotion::from_tag(&tag))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response types
// ─────────────────────────────────────────────────────────────────────────────

fn default_language() -> String {
    "ko".to_string()
}

fn default_speed() -> f32 {
    1.0
}

fn default_exaggeration() -> f32 {
    1.0
}

fn default_cfg_weight() -> f32 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    #[serde(default)]
    pub emotion: Emotion,
    /// Model language id; unknown values fall back to the model's default.
    #[serde(default = "default_language")]
    pub language: String,
    /// Accepted for wire compatibility but not forwarded: the model exposes
    /// no speed control.
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_exaggeration")]
    pub exaggeration: f32,
    #[serde(default = "default_cfg_weight", rename = "cfgWeight")]
    pub cfg_weight: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub audio_file: String,
    pub file_path: String,
    pub duration: f32,
    pub sample_rate: u32,
    pub user_id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Failures of the generation workflow, in state order.  Everything past
/// validation surfaces as a generic 500 envelope, matching the original
/// service's catch-all behavior.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("{0}")]
    Validation(String),
    #[error("model is not loaded yet")]
    NotReady,
    #[error("speech synthesis failed: {0}")]
    Synthesis(#[source] anyhow::Error),
    #[error("could not store generated audio: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl GenerateError {
    fn status(&self) -> StatusCode {
        match self {
            GenerateError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow
// ─────────────────────────────────────────────────────────────────────────────

/// Validate the request text.  Returns the trimmed text that goes to the
/// model; the model is never invoked on a validation failure.
pub fn validate_text(text: &str) -> Result<&str, GenerateError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerateError::Validation("Text must not be empty.".to_string()));
    }
    if trimmed.chars().count() > MAX_TEXT_CHARS {
        return Err(GenerateError::Validation(format!(
            "Text is too long (maximum {} characters).",
            MAX_TEXT_CHARS
        )));
    }
    Ok(trimmed)
}

/// Invoke the model and persist the waveform under `owner`'s partition.
///
/// Blocking: synthesis holds the model for the whole call and the WAV write
/// hits disk.  The server runs this inside `spawn_blocking`.
pub fn synthesize_and_store(
    model: &dyn SpeechModel,
    store: &AudioStore,
    owner: &str,
    req: &GenerateRequest,
) -> Result<GenerateResponse, GenerateError> {
    let text = validate_text(&req.text)?;

    if req.speed != default_speed() {
        debug!(speed = req.speed, "speed parameter is accepted but not applied");
    }

    let params = SynthesisParams {
        exaggeration: req.emotion.adjust(req.exaggeration),
        cfg_weight: req.cfg_weight,
    };

    let started = std::time::Instant::now();
    let wave = model
        .generate(text, &req.language, &params)
        .map_err(GenerateError::Synthesis)?;

    let stored = store
        .save(owner, &wave, req.emotion.as_str())
        .map_err(GenerateError::Persistence)?;

    info!(
        owner,
        filename = %stored.filename,
        chars = text.chars().count(),
        duration_secs = stored.duration_secs,
        latency_ms = started.elapsed().as_millis() as u64,
        "generated audio"
    );

    Ok(GenerateResponse {
        success: true,
        audio_file: stored.filename,
        file_path: stored.path.display().to_string(),
        duration: stored.duration_secs,
        sample_rate: stored.sample_rate,
        user_id: owner.to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
