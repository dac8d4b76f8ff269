//! ONNX model runner — wraps the pretrained Chatterbox multilingual graph.
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings) for inference.
//! The four model inputs are:
//!
//! | Name           | Shape          | dtype   |
//! |----------------|----------------|---------|
//! | `input_ids`    | `[1, seq_len]` | int64   |
//! | `language_id`  | `[1]`          | int64   |
//! | `exaggeration` | `[1]`          | float32 |
//! | `cfg_weight`   | `[1]`          | float32 |
//!
//! Output 0 is the mono waveform as float32 samples in `[-1.0, 1.0]`.
//!
//! Everything past this input/output contract — the acoustic model, the
//! decoder, the vocoder — lives inside the graph and is not this crate's
//! business.  The service layer talks to [`SpeechModel`] only, which keeps
//! the model swappable and lets tests run against an in-memory fake.

use std::{path::Path, sync::Mutex};

use anyhow::{Context, Result};
use ort::{session::Session, value::Tensor};
use tokenizers::Tokenizer;

/// A synthesized mono waveform together with its sample rate.
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Model-specific scalar knobs passed through on every inference call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    /// Perceived emotional intensity; adjusted per emotion tag by the
    /// generation workflow before it reaches the model.
    pub exaggeration: f32,
    /// Classifier-free-guidance strength, passed through unchanged.
    pub cfg_weight: f32,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self { exaggeration: 1.0, cfg_weight: 0.5 }
    }
}

/// The capability the service layer programs against: one loaded TTS model
/// instance that can turn text into audio.
pub trait SpeechModel: Send + Sync {
    /// Synthesize `text` in `language` and return the waveform.
    fn generate(&self, text: &str, language: &str, params: &SynthesisParams) -> Result<Waveform>;

    /// Sample rate of every waveform this model produces.
    fn sample_rate(&self) -> u32;
}

// ─────────────────────────────────────────────────────────────────────────────
// MultilingualOnnx
// ─────────────────────────────────────────────────────────────────────────────

/// Production [`SpeechModel`] backed by an ONNX Runtime session.
///
/// Use [`crate::download::load_from_hub`] to obtain one.
pub struct MultilingualOnnx {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    /// Language ids in graph order; index in this list is the `language_id`
    /// tensor value.  Unknown languages fall back to index 0.
    languages: Vec<String>,
    sample_rate: u32,
}

impl MultilingualOnnx {
    /// Load the model from an ONNX file and its `tokenizer.json`.
    pub fn load(
        model_path: &Path,
        tokenizer_path: &Path,
        languages: Vec<String>,
        sample_rate: u32,
    ) -> Result<Self> {
        anyhow::ensure!(!languages.is_empty(), "model config lists no languages");

        // ── Load ONNX model with ONNX Runtime ───────────────────────────────
        let session = Session::builder()
            .context("Failed to create ORT session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Cannot load ONNX model: {}", model_path.display()))?;

        // ── Tokenizer ────────────────────────────────────────────────────────
        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer {}: {e}", tokenizer_path.display())
        })?;

        Ok(Self { session: Mutex::new(session), tokenizer, languages, sample_rate })
    }

    fn language_index(&self, language: &str) -> i64 {
        self.languages.iter().position(|l| l == language).unwrap_or(0) as i64
    }
}

impl SpeechModel for MultilingualOnnx {
    fn generate(&self, text: &str, language: &str, params: &SynthesisParams) -> Result<Waveform> {
        // ── Tokenise ─────────────────────────────────────────────────────────
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenisation failed: {e}"))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let seq_len = ids.len();
        anyhow::ensure!(seq_len > 0, "Tokenisation produced no tokens for {:?}", text);

        // ── Build ORT tensors ─────────────────────────────────────────────────
        //
        // Inputs are positional (matching the ONNX graph input order):
        //   0 → input_ids     [1, seq_len]  i64
        //   1 → language_id   [1]           i64
        //   2 → exaggeration  [1]           f32
        //   3 → cfg_weight    [1]           f32

        let t_input_ids = Tensor::<i64>::from_array(([1usize, seq_len], ids))
            .context("Failed to build input_ids tensor")?;

        let t_language = Tensor::<i64>::from_array(([1usize], vec![self.language_index(language)]))
            .context("Failed to build language_id tensor")?;

        let t_exaggeration = Tensor::<f32>::from_array(([1usize], vec![params.exaggeration]))
            .context("Failed to build exaggeration tensor")?;

        let t_cfg_weight = Tensor::<f32>::from_array(([1usize], vec![params.cfg_weight]))
            .context("Failed to build cfg_weight tensor")?;

        // ── Inference ─────────────────────────────────────────────────────────
        // The graph is not documented as reentrant; calls are serialized
        // behind the session mutex.
        let mut session = self.session.lock().expect("ORT session mutex poisoned");
        let outputs = session
            .run(ort::inputs![t_input_ids, t_language, t_exaggeration, t_cfg_weight])
            .context("ONNX inference failed")?;

        // Output 0 is the raw waveform (shape e.g. [1, T] or [T]).
        let (_shape, audio_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract audio tensor")?;

        Ok(Waveform { samples: audio_data.to_vec(), sample_rate: self.sample_rate })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
