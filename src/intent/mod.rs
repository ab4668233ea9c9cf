//! Command interpretation
//!
//! Turns an utterance into a structured [`Intent`]. The local path is the
//! [`normalize`] + [`IntentMatcher`] pair; an optional remote service may be
//! consulted first, with the local matcher as the fallback.

pub mod matcher;
pub mod normalize;
pub mod remote;

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

pub use matcher::IntentMatcher;
pub use normalize::{NormalizedText, normalize};
pub use remote::{IntentService, OpenAiIntentService, RemoteIntent};

use crate::config::Config;

/// Edit action requested by a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Title,
    Subtitle,
    Logo,
    Badge,
    Button,
    Stat,
    Cta,
    Gradient,
    Background,
    FeatureAdd,
    FeatureRemove,
    Animate,
    Visibility,
    Scroll,
    Theme,
    Help,
    Unknown,
}

/// Optional intent field an action may require
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Target,
    Value,
    Modifier,
}

impl Field {
    /// Field name as it appears in serialized intents
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Value => "value",
            Self::Modifier => "modifier",
        }
    }
}

impl Action {
    /// Every action, in declaration order
    pub const ALL: [Self; 17] = [
        Self::Title,
        Self::Subtitle,
        Self::Logo,
        Self::Badge,
        Self::Button,
        Self::Stat,
        Self::Cta,
        Self::Gradient,
        Self::Background,
        Self::FeatureAdd,
        Self::FeatureRemove,
        Self::Animate,
        Self::Visibility,
        Self::Scroll,
        Self::Theme,
        Self::Help,
        Self::Unknown,
    ];

    /// Wire name of the action
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Subtitle => "subtitle",
            Self::Logo => "logo",
            Self::Badge => "badge",
            Self::Button => "button",
            Self::Stat => "stat",
            Self::Cta => "cta",
            Self::Gradient => "gradient",
            Self::Background => "background",
            Self::FeatureAdd => "feature-add",
            Self::FeatureRemove => "feature-remove",
            Self::Animate => "animate",
            Self::Visibility => "visibility",
            Self::Scroll => "scroll",
            Self::Theme => "theme",
            Self::Help => "help",
            Self::Unknown => "unknown",
        }
    }

    /// Fields that must be present before the action can be applied
    #[must_use]
    pub const fn required_fields(self) -> &'static [Field] {
        match self {
            Self::Title | Self::Subtitle | Self::Logo | Self::Badge | Self::Cta => &[Field::Value],
            Self::Button | Self::Stat => &[Field::Target, Field::Value],
            Self::Gradient | Self::Background | Self::Theme => &[Field::Modifier],
            Self::Visibility => &[Field::Target, Field::Modifier],
            Self::Scroll => &[Field::Target],
            Self::FeatureAdd | Self::FeatureRemove | Self::Animate | Self::Help | Self::Unknown => {
                &[]
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == wanted)
            .ok_or(())
    }
}

/// Structured representation of a user command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
}

impl Intent {
    /// Intent with only an action set
    #[must_use]
    pub const fn new(action: Action) -> Self {
        Self {
            action,
            target: None,
            value: None,
            modifier: None,
        }
    }

    /// The unrecognized-command intent
    #[must_use]
    pub const fn unknown() -> Self {
        Self::new(Action::Unknown)
    }

    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifier = Some(modifier.into());
        self
    }

    fn field(&self, field: Field) -> Option<&str> {
        match field {
            Field::Target => self.target.as_deref(),
            Field::Value => self.value.as_deref(),
            Field::Modifier => self.modifier.as_deref(),
        }
        .filter(|v| !v.trim().is_empty())
    }

    /// Required fields the action still lacks
    #[must_use]
    pub fn missing_fields(&self) -> Vec<Field> {
        self.action
            .required_fields()
            .iter()
            .copied()
            .filter(|f| self.field(*f).is_none())
            .collect()
    }

    /// Whether the executor can apply this intent deterministically
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        self.action != Action::Unknown && self.missing_fields().is_empty()
    }

    /// Response used instead of executing an unknown or incomplete intent
    #[must_use]
    pub fn clarification(&self) -> String {
        let hint = match self.action {
            Action::Title => "What should the title say? Try \"change the title to ...\"",
            Action::Subtitle => "What should the subtitle say? Try \"change the subtitle to ...\"",
            Action::Logo => "What should the brand name be? Try \"change the logo to ...\"",
            Action::Badge => "What should the badge say? Try \"change the badge to ...\"",
            Action::Button => "What should the button say? Try \"change the button to ...\"",
            Action::Cta => "What should the call to action say? Try \"change the CTA to ...\"",
            Action::Stat => "Which number should I show? Try \"set the user count to 10K\"",
            Action::Background => "Which background would you like? Try dark, light or blue",
            Action::Visibility => {
                "What should I hide or show? Try the navigation, stats or features"
            }
            Action::Scroll => "Where should I scroll? Try top, bottom, features or stats",
            Action::Theme => "Which theme would you like? Try light, dark, blue, green or purple",
            _ => {
                "I didn't quite understand that. Try saying 'Change the title to...' or 'Add a new feature'"
            }
        };
        hint.to_string()
    }
}

/// Where an interpretation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    Local,
    Remote,
}

/// Result of interpreting one utterance
#[derive(Debug, Clone, Serialize)]
pub struct Interpretation {
    pub intent: Intent,
    pub source: IntentSource,
    /// Natural-language confirmation suggested by a remote service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_confirmation: Option<String>,
}

/// Remote-first interpreter with local fallback
#[derive(Clone, Default)]
pub struct Interpreter {
    matcher: IntentMatcher,
    remote: Option<Arc<dyn IntentService>>,
}

impl Interpreter {
    /// Interpreter using only the local matcher
    #[must_use]
    pub fn local() -> Self {
        Self::default()
    }

    /// Interpreter as configured: local only unless remote parsing is
    /// enabled and an OpenAI key is present
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let interpreter = Self::local();
        if !config.remote_intent_enabled() {
            return interpreter;
        }

        let key = SecretString::from(config.api_keys.openai.clone().unwrap_or_default());
        match OpenAiIntentService::new(key, config.intent.model.clone()) {
            Ok(service) => {
                tracing::info!(model = %config.intent.model, "remote intent parsing enabled");
                interpreter.with_remote(Arc::new(
                    service.with_sampling(config.intent.temperature, config.intent.max_tokens),
                ))
            }
            Err(e) => {
                tracing::warn!(error = %e, "remote intent parsing unavailable, using local matcher");
                interpreter
            }
        }
    }

    /// Consult a remote service before the local matcher
    #[must_use]
    pub fn with_remote(mut self, service: Arc<dyn IntentService>) -> Self {
        self.remote = Some(service);
        self
    }

    /// Whether a remote service is configured
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Interpret a raw utterance
    ///
    /// Never fails: a remote error or panic falls back to the local matcher
    /// on the same text.
    pub async fn interpret(&self, original: &str) -> Interpretation {
        let normalized = normalize(original);

        if let Some(remote) = self.remote.as_ref().filter(|_| !normalized.is_empty()) {
            match AssertUnwindSafe(remote.parse(original)).catch_unwind().await {
                Ok(Ok(parsed)) => {
                    tracing::debug!(service = remote.name(), action = %parsed.intent.action, "remote intent");
                    return Interpretation {
                        intent: parsed.intent,
                        source: IntentSource::Remote,
                        remote_confirmation: parsed.confirmation,
                    };
                }
                Ok(Err(e)) => {
                    tracing::warn!(service = remote.name(), error = %e, "remote intent parsing failed, using local matcher");
                }
                Err(_) => {
                    tracing::error!(service = remote.name(), "remote intent parsing panicked, using local matcher");
                }
            }
        }

        Interpretation {
            intent: self.matcher.match_intent(&normalized, original),
            source: IntentSource::Local,
            remote_confirmation: None,
        }
    }
}
