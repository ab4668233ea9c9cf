//! Remote intent parsing through a chat-completion model
//!
//! The model reply is untrusted. Only the declared intent fields are read,
//! unknown actions and incomplete intents are demoted to
//! [`Action::Unknown`], and a reply that is not JSON at all is an error so
//! the caller can fall back to the local matcher.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Action, Intent};
use crate::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const SYSTEM_PROMPT: &str = r#"You are a voice assistant that edits a website.
Turn the user's command into JSON with these fields:
- "action": one of title, subtitle, logo, badge, button, stat, cta, gradient, background, feature-add, feature-remove, animate, visibility, scroll, theme, help, unknown
- "target": element or section (button: primary|secondary, stat: users, visibility: nav|stats|features, scroll: top|bottom|features|stats)
- "value": new text or number, exactly as spoken
- "modifier": variant (theme: light|dark|toggle|blue|green|purple, background: dark|light|blue|green|purple, gradient: add|remove, visibility: hide|show|toggle)
- "response": a short friendly confirmation
Omit fields that do not apply. Use "unknown" when the command is not a website edit."#;

/// Intent returned by a remote service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIntent {
    pub intent: Intent,
    /// Natural-language confirmation suggested by the model
    pub confirmation: Option<String>,
}

/// Service that interprets raw utterances remotely
#[async_trait]
pub trait IntentService: Send + Sync {
    /// Service name for logging
    fn name(&self) -> &'static str;

    /// Interpret a raw utterance
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable or its reply is not an
    /// intent object
    async fn parse(&self, utterance: &str) -> Result<RemoteIntent>;
}

/// Chat completion intent parser using `OpenAI` JSON mode
pub struct OpenAiIntentService {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiIntentService {
    /// Create a parser for the given model
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for remote intents".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 200,
        })
    }

    /// Point at a different API host
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub const fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl IntentService for OpenAiIntentService {
    fn name(&self) -> &'static str {
        "openai-chat"
    }

    async fn parse(&self, utterance: &str) -> Result<RemoteIntent> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": utterance },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %text, "intent API error");
            return Err(Error::Intent(format!("intent API returned {status}")));
        }

        let chat: ChatResponse = response.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Intent("empty completion".to_string()))?;

        parse_reply(&content)
    }
}

/// Parse a model reply into an intent
///
/// # Errors
///
/// Returns error if the reply contains no JSON object
pub fn parse_reply(reply: &str) -> Result<RemoteIntent> {
    let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) else {
        return Err(Error::Intent("no JSON object in reply".to_string()));
    };
    if end < start {
        return Err(Error::Intent("no JSON object in reply".to_string()));
    }

    let value: Value = serde_json::from_str(&reply[start..=end])?;
    let Value::Object(fields) = value else {
        return Err(Error::Intent("reply is not an object".to_string()));
    };

    let confirmation = text_field(&fields, "response").or_else(|| text_field(&fields, "confirmation"));
    let target = text_field(&fields, "target");

    let action = text_field(&fields, "action").map_or(Action::Unknown, |raw| {
        raw.parse()
            .unwrap_or_else(|()| legacy_action(&raw, target.as_deref(), &fields))
    });

    let mut intent = Intent::new(action);
    intent.target = target;
    intent.value = text_field(&fields, "value");
    intent.modifier = text_field(&fields, "modifier");

    if action != Action::Unknown && !intent.is_actionable() {
        tracing::debug!(action = %action, missing = ?intent.missing_fields(), "remote intent incomplete");
        intent = Intent::unknown();
    }

    Ok(RemoteIntent { intent, confirmation })
}

/// Read a scalar field as text, ignoring empty strings
fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Translate the coarse `style/content/structure/animation` vocabulary
fn legacy_action(action: &str, target: Option<&str>, fields: &Map<String, Value>) -> Action {
    let target = target.unwrap_or_default().to_ascii_lowercase();
    match action.to_ascii_lowercase().as_str() {
        "content" => match target.as_str() {
            "title" | "heading" | "headline" => Action::Title,
            "subtitle" | "description" | "tagline" => Action::Subtitle,
            "logo" | "brand" => Action::Logo,
            "badge" => Action::Badge,
            "button" => Action::Button,
            "cta" => Action::Cta,
            _ => Action::Unknown,
        },
        "style" => match target.as_str() {
            "background" => Action::Background,
            "theme" => Action::Theme,
            "gradient" => Action::Gradient,
            _ => Action::Unknown,
        },
        "structure" if target.starts_with("feature") => {
            let removing = text_field(fields, "value")
                .is_some_and(|v| v.eq_ignore_ascii_case("remove"));
            if removing { Action::FeatureRemove } else { Action::FeatureAdd }
        }
        "animation" => Action::Animate,
        _ => Action::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_declared_fields() {
        let reply = r#"{"action":"title","value":"Hello World","response":"Done!"}"#;
        let parsed = parse_reply(reply).unwrap();
        assert_eq!(parsed.intent, Intent::new(Action::Title).with_value("Hello World"));
        assert_eq!(parsed.confirmation.as_deref(), Some("Done!"));
    }

    #[test]
    fn test_ignores_extra_fields() {
        let reply = r#"{"action":"theme","modifier":"dark","script":"rm -rf /","priority":9}"#;
        let parsed = parse_reply(reply).unwrap();
        assert_eq!(parsed.intent, Intent::new(Action::Theme).with_modifier("dark"));
    }

    #[test]
    fn test_missing_required_field_demotes() {
        let parsed = parse_reply(r#"{"action":"title","response":"Sure"}"#).unwrap();
        assert_eq!(parsed.intent.action, Action::Unknown);
        assert_eq!(parsed.confirmation.as_deref(), Some("Sure"));
    }

    #[test]
    fn test_unknown_action_demotes() {
        let parsed = parse_reply(r#"{"action":"launch-rocket","value":"now"}"#).unwrap();
        assert_eq!(parsed.intent.action, Action::Unknown);
    }

    #[test]
    fn test_numeric_value() {
        let parsed = parse_reply(r#"{"action":"stat","target":"users","value":5000}"#).unwrap();
        assert_eq!(parsed.intent.value.as_deref(), Some("5000"));
    }

    #[test]
    fn test_legacy_shape() {
        let parsed = parse_reply(r#"{"action":"content","target":"title","value":"Hi"}"#).unwrap();
        assert_eq!(parsed.intent.action, Action::Title);

        let parsed = parse_reply(r#"{"action":"style","target":"background","modifier":"blue"}"#).unwrap();
        assert_eq!(parsed.intent.action, Action::Background);

        let parsed = parse_reply(r#"{"action":"animation","target":"page"}"#).unwrap();
        assert_eq!(parsed.intent.action, Action::Animate);
    }

    #[test]
    fn test_json_wrapped_in_prose() {
        let parsed = parse_reply("Sure! {\"action\":\"help\"} Anything else?").unwrap();
        assert_eq!(parsed.intent.action, Action::Help);
    }

    #[test]
    fn test_not_json_is_error() {
        assert!(parse_reply("I changed the title for you").is_err());
        assert!(parse_reply("} {").is_err());
        assert!(parse_reply("[1, 2]").is_err());
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(OpenAiIntentService::new(SecretString::from(String::new()), "gpt-4").is_err());
    }
}
