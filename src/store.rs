//! Per-owner audio file store.
//!
//! Generated waveforms land on local disk under one directory per owner
//! session id:
//!
//! ```text
//! <root>/<owner-id>/tts_<emotion>_<YYYYmmdd_HHMMSS>.wav
//! ```
//!
//! Filenames are derived at second granularity, so two saves for the same
//! owner and tag inside the same wall-clock second overwrite each other.
//! That matches the filename contract callers rely on and is a documented
//! weakness, not an invariant worth renaming files over.
//!
//! Writes are plain `create`-then-write; there is no fsync or atomic-rename
//! discipline, so a crash mid-write can leave a truncated file behind.

use std::{
    fs,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::warn;

use crate::model::Waveform;

/// Metadata returned by [`AudioStore::save`].
#[derive(Debug, Clone)]
pub struct StoredAudio {
    pub filename: String,
    pub path: PathBuf,
    pub duration_secs: f32,
    pub sample_rate: u32,
}

/// One row of [`AudioStore::list`], shaped for the listing response.
#[derive(Debug, Clone, Serialize)]
pub struct AudioEntry {
    pub filename: String,
    pub size: u64,
    /// Unix timestamp (seconds) of the last write.
    pub created: f64,
}

/// Maps (owner id, filename) to WAV files on local disk.
pub struct AudioStore {
    root: PathBuf,
}

/// Reject anything that could escape an owner's directory: empty names,
/// path separators, and dot-prefixed components (`.`, `..`, hidden files).
fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

fn filename_for(tag: &str, when: DateTime<Local>) -> String {
    format!("tts_{}_{}.wav", tag, when.format("%Y%m%d_%H%M%S"))
}

impl AudioStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn owner_dir(&self, owner: &str) -> Result<PathBuf> {
        anyhow::ensure!(is_safe_component(owner), "invalid owner id {:?}", owner);
        Ok(self.root.join(owner))
    }

    // ── Save ──────────────────────────────────────────────────────────────────

    /// Write `wave` under `owner`'s directory and return its metadata.
    ///
    /// The directory is created if absent.  `tag` becomes part of the
    /// filename together with the current local time.
    pub fn save(&self, owner: &str, wave: &Waveform, tag: &str) -> Result<StoredAudio> {
        self.save_at(owner, wave, tag, Local::now())
    }

    pub(crate) fn save_at(
        &self,
        owner: &str,
        wave: &Waveform,
        tag: &str,
        when: DateTime<Local>,
    ) -> Result<StoredAudio> {
        let dir = self.owner_dir(owner)?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create audio directory: {}", dir.display()))?;

        let filename = filename_for(tag, when);
        let path = dir.join(&filename);
        write_wav(&wave.samples, wave.sample_rate, &path)?;

        Ok(StoredAudio {
            filename,
            path,
            duration_secs: wave.duration_secs(),
            sample_rate: wave.sample_rate,
        })
    }

    // ── List ──────────────────────────────────────────────────────────────────

    /// All of `owner`'s WAV files, newest first.  An owner with no directory
    /// has an empty listing.
    pub fn list(&self, owner: &str) -> Result<Vec<AudioEntry>> {
        let dir = self.owner_dir(owner)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in
            fs::read_dir(&dir).with_context(|| format!("Cannot list: {}", dir.display()))?
        {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            let meta = entry.metadata()?;
            let created = meta
                .modified()?
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or(0.0);
            let filename = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            entries.push(AudioEntry { filename, size: meta.len(), created });
        }

        entries.sort_by(|a, b| b.created.partial_cmp(&a.created).unwrap_or(std::cmp::Ordering::Equal));
        Ok(entries)
    }

    // ── Get ───────────────────────────────────────────────────────────────────

    /// Read a stored file's bytes.  `Ok(None)` when the file does not exist
    /// or the name fails the path-safety check.
    pub fn get(&self, owner: &str, filename: &str) -> Result<Option<Vec<u8>>> {
        if !is_safe_component(owner) || !is_safe_component(filename) {
            return Ok(None);
        }
        let path = self.root.join(owner).join(filename);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Cannot read: {}", path.display())),
        }
    }

    /// Same as [`get`](Self::get) but unpartitioned: looks directly under the
    /// store root.  Only the deprecated legacy route uses this.
    pub fn get_unscoped(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        if !is_safe_component(filename) {
            return Ok(None);
        }
        let path = self.root.join(filename);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Cannot read: {}", path.display())),
        }
    }

    // ── Cleanup ───────────────────────────────────────────────────────────────

    /// Delete every file beyond the `keep` newest for `owner`.  Individual
    /// deletion failures are logged and skipped.  Returns the deleted count.
    pub fn cleanup(&self, owner: &str, keep: usize) -> Result<usize> {
        let dir = self.owner_dir(owner)?;
        let entries = self.list(owner)?;

        let mut deleted = 0;
        for entry in entries.iter().skip(keep) {
            let path = dir.join(&entry.filename);
            match fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "failed to delete audio file");
                }
            }
        }
        Ok(deleted)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WAV writer
// ─────────────────────────────────────────────────────────────────────────────

/// Write `audio` samples to a 16-bit PCM WAV file.
///
/// 16-bit PCM is chosen over 32-bit float because some browser `<audio>`
/// stacks accept an IEEE-float WAV header but produce silence at runtime.
/// PCM 16-bit plays everywhere.
pub fn write_wav(audio: &[f32], sample_rate: u32, output_path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output_path, spec)
        .with_context(|| format!("Cannot create WAV: {}", output_path.display()))?;
    for &s in audio {
        // Convert f32 [-1.0, 1.0] → i16 [-32768, 32767].
        let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s16).context("WAV write error")?;
    }
    writer.finalize().context("WAV finalise error")?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
