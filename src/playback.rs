//! Audio delivery
//!
//! The orchestrator holds `is_speaking` for as long as [`Playback::play`]
//! runs. A server hands audio back to its client and returns at once; the
//! CLI waits for an external player to finish.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::providers::AudioHandle;

/// Delivers synthesized audio to the listener
#[async_trait]
pub trait Playback: Send + Sync {
    /// Resolves once the audio has finished playing
    async fn play(&self, audio: &AudioHandle) -> Result<()>;
}

/// Audio is returned to the caller, nothing is played locally
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

#[async_trait]
impl Playback for Detached {
    async fn play(&self, _audio: &AudioHandle) -> Result<()> {
        Ok(())
    }
}

/// Plays audio through an external player command
///
/// The command line is split on whitespace; the audio file path is appended
/// as the last argument, e.g. `ffplay -nodisp -autoexit -loglevel quiet`.
#[derive(Debug, Clone)]
pub struct CommandPlayback {
    program: String,
    args: Vec<String>,
}

impl CommandPlayback {
    /// Parse a player command line
    ///
    /// # Errors
    ///
    /// Returns error if the command line is empty
    pub fn new(command_line: &str) -> Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("player command is empty".to_string()))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    /// First of the common players found on `PATH`
    #[must_use]
    pub fn detect() -> Option<Self> {
        const CANDIDATES: [&str; 3] = [
            "ffplay -nodisp -autoexit -loglevel quiet",
            "mpv --no-video --really-quiet",
            "paplay",
        ];

        CANDIDATES.into_iter().find_map(|line| {
            let player = Self::new(line).ok()?;
            which::which(&player.program).ok()?;
            Some(player)
        })
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Playback for CommandPlayback {
    async fn play(&self, audio: &AudioHandle) -> Result<()> {
        let suffix = match audio.mime {
            "audio/wav" => ".wav",
            _ => ".mp3",
        };
        let file = tempfile::Builder::new()
            .prefix("sentauri-reply-")
            .suffix(suffix)
            .tempfile()?;
        tokio::fs::write(file.path(), &audio.bytes).await?;

        tracing::debug!(player = %self.program, bytes = audio.bytes.len(), "playing audio");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::Playback(format!("failed to run {}: {e}", self.program)))?;

        if !status.success() {
            return Err(Error::Playback(format!("{} exited with {status}", self.program)));
        }
        Ok(())
    }
}
