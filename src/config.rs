//! Server configuration — CLI flags with environment overrides.

use std::path::PathBuf;

use clap::Parser;

use crate::download;

#[derive(Parser, Debug)]
#[command(name = "chatterbox-web")]
#[command(about = "REST API and dashboard over the Chatterbox multilingual TTS model")]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(short, long, default_value_t = 5000, env = "PORT")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    /// Root directory for generated audio, one subdirectory per session
    #[arg(long, default_value = "generated_audio", env = "AUDIO_ROOT")]
    pub audio_root: PathBuf,

    /// HuggingFace repository the model is pulled from
    #[arg(long, default_value = download::DEFAULT_REPO, env = "MODEL_REPO")]
    pub model_repo: String,

    /// Secret for signing session cookies.  When unset a random per-process
    /// key is used and sessions do not survive restarts.
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: Option<String>,

    /// Serve the deprecated unpartitioned /api/audio/{filename} route
    #[arg(long, env = "ENABLE_LEGACY_AUDIO_ROUTE")]
    pub enable_legacy_audio_route: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    // The env overrides would leak the host environment into these tests.
    fn scrub_env() {
        for var in ["PORT", "HOST", "AUDIO_ROOT", "MODEL_REPO", "SESSION_SECRET", "ENABLE_LEGACY_AUDIO_ROUTE"] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        scrub_env();
        let config = ServerConfig::try_parse_from(["chatterbox-web"]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.audio_root, PathBuf::from("generated_audio"));
        assert_eq!(config.model_repo, download::DEFAULT_REPO);
        assert!(config.session_secret.is_none());
        assert!(!config.enable_legacy_audio_route);
    }

    #[test]
    fn test_flag_overrides() {
        scrub_env();
        let config = ServerConfig::try_parse_from([
            "chatterbox-web",
            "--port",
            "8080",
            "--audio-root",
            "/tmp/audio",
            "--enable-legacy-audio-route",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.audio_root, PathBuf::from("/tmp/audio"));
        assert!(config.enable_legacy_audio_route);
    }
}
