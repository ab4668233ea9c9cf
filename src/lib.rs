//! Sentauri Voice - voice-driven website editing pipeline
//!
//! This library turns spoken or typed commands into edits of a web page:
//! - Transcript normalization and rule-table intent matching
//! - Optional remote intent parsing with local fallback
//! - Speech-to-text and text-to-speech behind ordered provider fallback
//! - A single-flight orchestrator that always returns to idle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │      HTTP API  │  WebSocket events  │  CLI / REPL    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Orchestrator                       │
//! │ Capturing → Interpreting → Executing → Responding   │
//! └──────┬──────────────┬───────────────┬───────────────┘
//!        │              │               │
//! ┌──────▼──────┐ ┌─────▼──────┐ ┌──────▼──────────────┐
//! │  Provider   │ │ Interpreter│ │   Action Executor    │
//! │  Gateway    │ │ normalize +│ │   (PageEditor)       │
//! │ STT  │ TTS  │ │ matcher    │ │                      │
//! └─────────────┘ └────────────┘ └──────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod intent;
pub mod orchestrator;
pub mod playback;
pub mod providers;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use executor::{ActionExecutor, PageEditor};
pub use intent::{Action, Intent, Interpreter};
pub use orchestrator::Orchestrator;
pub use providers::ProviderGateway;
