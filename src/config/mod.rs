//! Configuration management for the Sentauri voice pipeline
//!
//! Read once at startup. Priority: environment > TOML file > defaults.

pub mod file;

use std::str::FromStr;

use crate::providers::{Capability, ProviderKind};

pub use file::ConfigFile;

/// Pipeline configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Credentials for hosted services
    pub api_keys: ApiKeys,

    /// Provider preference order
    pub providers: ProviderPreferences,

    /// Voice tuning
    pub voice: VoiceConfig,

    /// Remote intent parsing
    pub intent: IntentConfig,

    /// Spend ceilings
    pub budget: BudgetConfig,

    /// Conversation and playback
    pub session: SessionConfig,

    /// HTTP server
    pub server: ServerConfig,
}

/// API keys for hosted services
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "***");
        f.debug_struct("ApiKeys")
            .field("openai", &mask(&self.openai))
            .field("elevenlabs", &mask(&self.elevenlabs))
            .field("deepgram", &mask(&self.deepgram))
            .finish()
    }
}

/// Ordered provider lists, most preferred first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPreferences {
    pub stt: Vec<ProviderKind>,
    pub tts: Vec<ProviderKind>,
}

impl Default for ProviderPreferences {
    fn default() -> Self {
        Self {
            stt: vec![ProviderKind::Whisper, ProviderKind::Deepgram],
            tts: vec![ProviderKind::OpenAi, ProviderKind::ElevenLabs, ProviderKind::Local],
        }
    }
}

/// Voice tuning per provider
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Whisper model (e.g. "whisper-1")
    pub whisper_model: String,
    /// Transcription language hint
    pub language: Option<String>,
    /// Whisper sampling temperature
    pub stt_temperature: f32,
    /// Deepgram model (e.g. "nova-2")
    pub deepgram_model: String,
    /// `OpenAI` speech model (e.g. "tts-1")
    pub openai_model: String,
    /// `OpenAI` voice (alloy, echo, fable, onyx, nova, shimmer)
    pub openai_voice: String,
    /// Speaking rate multiplier
    pub speed: f32,
    /// `ElevenLabs` model id
    pub elevenlabs_model: String,
    /// `ElevenLabs` voice id
    pub elevenlabs_voice: String,
    pub stability: f32,
    pub similarity_boost: f32,
    /// Local engine binary name or path
    pub local_engine: String,
    pub local_voice: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            whisper_model: "whisper-1".to_string(),
            language: Some("en".to_string()),
            stt_temperature: 0.2,
            deepgram_model: "nova-2".to_string(),
            openai_model: "tts-1".to_string(),
            openai_voice: "nova".to_string(),
            speed: 1.0,
            elevenlabs_model: "eleven_monolingual_v1".to_string(),
            elevenlabs_voice: "qSV5UqvHBC0Widy71Esh".to_string(),
            stability: 0.5,
            similarity_boost: 0.5,
            local_engine: "espeak-ng".to_string(),
            local_voice: None,
        }
    }
}

/// Remote intent parsing
#[derive(Debug, Clone)]
pub struct IntentConfig {
    /// Use the remote service before the local matcher
    pub remote: bool,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            remote: false,
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.7,
            max_tokens: 200,
        }
    }
}

/// Spend ceilings in USD; `None` means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BudgetConfig {
    pub daily_usd: Option<f64>,
    pub monthly_usd: Option<f64>,
}

/// Conversation and playback
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Conversation entries kept before the oldest is evicted
    pub history_limit: usize,
    /// External player command for local playback (e.g. "ffplay")
    pub player: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            player: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    pub allowed_origins: Vec<String>,
    pub requests_per_15_minutes: u32,
    pub synthesis_per_minute: u32,
    pub transcription_per_minute: u32,
    pub upload_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            allowed_origins: Vec::new(),
            requests_per_15_minutes: 100,
            synthesis_per_minute: 20,
            transcription_per_minute: 15,
            upload_limit_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from the environment and the default TOML file
    #[must_use]
    pub fn load() -> Self {
        Self::from_sources(file::load_config_file(), |name| std::env::var(name).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    #[must_use]
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let env: &dyn Fn(&str) -> Option<String> = &env;
        let text = |name: &str| text_var(env, name);

        let api_keys = ApiKeys {
            openai: text("OPENAI_API_KEY").or(fc.api_keys.openai),
            elevenlabs: text("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
            deepgram: text("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
        };

        let providers = ProviderPreferences {
            stt: preference_list(
                Capability::SpeechToText,
                text("SENTAURI_STT_PROVIDERS").or_else(|| fc.providers.stt.map(|l| l.join(","))),
                defaults.providers.stt,
            ),
            tts: preference_list(
                Capability::TextToSpeech,
                text("SENTAURI_TTS_PROVIDERS").or_else(|| fc.providers.tts.map(|l| l.join(","))),
                defaults.providers.tts,
            ),
        };

        let fv = fc.voice;
        let dv = defaults.voice;
        let voice = VoiceConfig {
            whisper_model: text("SENTAURI_WHISPER_MODEL")
                .or(fv.whisper_model)
                .unwrap_or(dv.whisper_model),
            language: text("SENTAURI_LANGUAGE").or(fv.language).or(dv.language),
            stt_temperature: fv.stt_temperature.unwrap_or(dv.stt_temperature),
            deepgram_model: text("SENTAURI_DEEPGRAM_MODEL")
                .or(fv.deepgram_model)
                .unwrap_or(dv.deepgram_model),
            openai_model: text("SENTAURI_TTS_MODEL")
                .or(fv.openai_model)
                .unwrap_or(dv.openai_model),
            openai_voice: text("SENTAURI_TTS_VOICE")
                .or(fv.openai_voice)
                .unwrap_or(dv.openai_voice),
            speed: parsed_var(env, "SENTAURI_TTS_SPEED").or(fv.speed).unwrap_or(dv.speed),
            elevenlabs_model: text("ELEVENLABS_MODEL")
                .or(fv.elevenlabs_model)
                .unwrap_or(dv.elevenlabs_model),
            elevenlabs_voice: text("ELEVENLABS_VOICE_ID")
                .or(fv.elevenlabs_voice)
                .unwrap_or(dv.elevenlabs_voice),
            stability: fv.stability.unwrap_or(dv.stability),
            similarity_boost: fv.similarity_boost.unwrap_or(dv.similarity_boost),
            local_engine: text("SENTAURI_LOCAL_ENGINE")
                .or(fv.local_engine)
                .unwrap_or(dv.local_engine),
            local_voice: text("SENTAURI_LOCAL_VOICE").or(fv.local_voice),
        };

        let di = defaults.intent;
        let intent = IntentConfig {
            remote: parsed_var(env, "SENTAURI_REMOTE_INTENT")
                .or(fc.intent.remote)
                .unwrap_or(di.remote),
            model: text("SENTAURI_INTENT_MODEL")
                .or(fc.intent.model)
                .unwrap_or(di.model),
            temperature: fc.intent.temperature.unwrap_or(di.temperature),
            max_tokens: fc.intent.max_tokens.unwrap_or(di.max_tokens),
        };

        let budget = BudgetConfig {
            daily_usd: parsed_var(env, "SENTAURI_DAILY_BUDGET_USD").or(fc.budget.daily_usd),
            monthly_usd: parsed_var(env, "SENTAURI_MONTHLY_BUDGET_USD").or(fc.budget.monthly_usd),
        };

        let session = SessionConfig {
            history_limit: parsed_var(env, "SENTAURI_HISTORY_LIMIT")
                .or(fc.session.history_limit)
                .unwrap_or(defaults.session.history_limit)
                .max(1),
            player: text("SENTAURI_PLAYER").or(fc.session.player),
        };

        let fs = fc.server;
        let ds = defaults.server;
        let server = ServerConfig {
            port: parsed_var(env, "SENTAURI_PORT")
                .or_else(|| parsed_var(env, "PORT"))
                .or(fs.port)
                .unwrap_or(ds.port),
            allowed_origins: text("SENTAURI_ALLOWED_ORIGINS")
                .map(|v| split_list(&v))
                .or(fs.allowed_origins)
                .unwrap_or(ds.allowed_origins),
            requests_per_15_minutes: fs
                .requests_per_15_minutes
                .unwrap_or(ds.requests_per_15_minutes),
            synthesis_per_minute: fs.synthesis_per_minute.unwrap_or(ds.synthesis_per_minute),
            transcription_per_minute: fs
                .transcription_per_minute
                .unwrap_or(ds.transcription_per_minute),
            upload_limit_bytes: fs
                .upload_limit_mb
                .map_or(ds.upload_limit_bytes, |mb| mb * 1024 * 1024),
        };

        Self {
            api_keys,
            providers,
            voice,
            intent,
            budget,
            session,
            server,
        }
    }

    /// Whether remote intent parsing can actually run
    #[must_use]
    pub const fn remote_intent_enabled(&self) -> bool {
        self.intent.remote && self.api_keys.openai.is_some()
    }
}

fn text_var(env: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    env(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed_var<T: FromStr>(env: &dyn Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let value = text_var(env, name)?;
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!(var = name, value = %value, "ignoring unparsable setting");
    }
    parsed
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a preference list, keeping only providers of the right capability
fn preference_list(
    capability: Capability,
    raw: Option<String>,
    default: Vec<ProviderKind>,
) -> Vec<ProviderKind> {
    let Some(raw) = raw else {
        return default;
    };

    let mut kinds = Vec::new();
    for kind in ProviderKind::parse_list(&raw) {
        if kind.capability() != capability {
            tracing::warn!(provider = %kind, ?capability, "provider listed under the wrong capability, skipping");
        } else if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}
