//! TOML configuration file loading
//!
//! Supports `~/.config/sentauri/voice.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults
//! and is itself overridden by environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// API keys for hosted services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Provider preference order
    #[serde(default)]
    pub providers: ProvidersFileConfig,

    /// Voice tuning
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Remote intent parsing
    #[serde(default)]
    pub intent: IntentFileConfig,

    /// Spend ceilings
    #[serde(default)]
    pub budget: BudgetFileConfig,

    /// Conversation and playback
    #[serde(default)]
    pub session: SessionFileConfig,

    /// HTTP server
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Provider preference lists, most preferred first
#[derive(Debug, Default, Deserialize)]
pub struct ProvidersFileConfig {
    /// e.g. `["whisper", "deepgram"]`
    pub stt: Option<Vec<String>>,
    /// e.g. `["openai", "elevenlabs", "local"]`
    pub tts: Option<Vec<String>>,
}

/// Voice tuning per provider
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub whisper_model: Option<String>,
    pub language: Option<String>,
    pub stt_temperature: Option<f32>,
    pub deepgram_model: Option<String>,
    pub openai_model: Option<String>,
    pub openai_voice: Option<String>,
    pub speed: Option<f32>,
    pub elevenlabs_model: Option<String>,
    pub elevenlabs_voice: Option<String>,
    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,
    pub local_engine: Option<String>,
    pub local_voice: Option<String>,
}

/// Remote intent parsing
#[derive(Debug, Default, Deserialize)]
pub struct IntentFileConfig {
    pub remote: Option<bool>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Spend ceilings in USD
#[derive(Debug, Default, Deserialize)]
pub struct BudgetFileConfig {
    pub daily_usd: Option<f64>,
    pub monthly_usd: Option<f64>,
}

/// Conversation and playback
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub history_limit: Option<usize>,
    pub player: Option<String>,
}

/// HTTP server
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,
    pub allowed_origins: Option<Vec<String>>,
    pub requests_per_15_minutes: Option<u32>,
    pub synthesis_per_minute: Option<u32>,
    pub transcription_per_minute: Option<u32>,
    pub upload_limit_mb: Option<usize>,
}

/// Load config file from the default location, or defaults if absent
///
/// Parse errors are logged and the defaults are used.
#[must_use]
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load config file from an explicit path, or defaults if unreadable
#[must_use]
pub fn load_config_file_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Get the default config file path
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("sentauri").join("voice.toml"))
}
