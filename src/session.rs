//! Session state, events and the conversation log
//!
//! The orchestrator is the only writer. Everyone else observes through a
//! `watch` receiver of [`SessionState`] or a `broadcast` receiver of
//! [`SessionEvent`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Orchestrator stage for the current utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Capturing,
    Interpreting,
    Executing,
    Responding,
}

/// Where an utterance came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UtteranceSource {
    #[default]
    Typed,
    BrowserSpeech,
    RecordedAudio,
}

/// Observable session flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionState {
    pub stage: Stage,
    pub is_listening: bool,
    pub is_speaking: bool,
    /// Utterance currently in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utterance: Option<u64>,
    /// Effective STT order
    pub stt_providers: Vec<&'static str>,
    /// Effective TTS order
    pub tts_providers: Vec<&'static str>,
}

/// Who produced a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One line of the conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    pub text: String,
    pub role: Role,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl ConversationEntry {
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            role: Role::User,
            success: true,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn assistant(text: impl Into<String>, success: bool) -> Self {
        Self {
            text: text.into(),
            role: Role::Assistant,
            success,
            timestamp: Utc::now(),
        }
    }
}

/// Event published while utterances are processed
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Stage transition
    Stage {
        stage: Stage,
        #[serde(skip_serializing_if = "Option::is_none")]
        utterance: Option<u64>,
    },
    /// Audio delivery began
    SpeakingStarted { utterance: u64, provider: &'static str },
    /// Audio delivery ended (or failed)
    SpeakingFinished { utterance: u64 },
    /// Entry appended to the conversation
    Entry { entry: ConversationEntry },
}

/// Append-only conversation with a fixed capacity
#[derive(Debug)]
pub struct ConversationLog {
    entries: VecDeque<ConversationEntry>,
    limit: usize,
}

impl ConversationLog {
    /// Log keeping at most `limit` entries (at least one)
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::new(),
            limit,
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&mut self, entry: ConversationEntry) {
        while self.entries.len() >= self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries oldest first
    #[must_use]
    pub fn entries(&self) -> Vec<ConversationEntry> {
        self.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}
