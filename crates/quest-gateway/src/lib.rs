//! QUEST Gateways
//!
//! Adapters for the slow, fallible external services a practice session
//! depends on: a text-generation backend and a speech engine.
//!
//! The orchestrator only ever sees the [`TextGenerator`] and [`SpeechGateway`]
//! traits. Concrete adapters talk to Ollama (over HTTP or its CLI), the
//! `edge-tts` CLI for synthesis and the `whisper` CLI for recognition.

pub mod command;
pub mod ollama;
pub mod speech;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use command::{CommandOutput, CommandSpec};
pub use ollama::{OllamaCliGenerator, OllamaHttpGenerator};
pub use speech::{CommandSpeechGateway, EdgeTtsOptions, WhisperOptions};

/// Errors that can occur while calling an external gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The call did not finish within its time budget.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout {
        /// What was being attempted (e.g. "ollama run").
        operation: String,
        /// The budget that was exceeded.
        timeout_secs: u64,
    },

    /// An external program exited unsuccessfully.
    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        /// Program name.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// An external program is not installed or not on `PATH`.
    #[error("'{program}' was not found on PATH")]
    CommandNotFound {
        /// Program name.
        program: String,
    },

    /// HTTP transport or status error.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend answered with something we could not use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Local I/O failure (spawning, pipes, scratch files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Creates a new `Timeout` error.
    #[must_use]
    pub fn timeout(operation: impl Into<String>, timeout_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_secs,
        }
    }

    /// Returns `true` if the call ran out of time.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// A text-generation backend: prompt in, raw text out.
///
/// Implementations are stateless and may take several seconds.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends `prompt` to the backend and returns its raw reply.
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

/// Speech synthesis and recognition.
#[async_trait]
pub trait SpeechGateway: Send + Sync {
    /// Narrates `text` with `voice` and writes the audio to `output`.
    async fn synthesize(&self, text: &str, voice: &str, output: &Path)
        -> Result<(), GatewayError>;

    /// Transcribes the recording at `audio`.
    ///
    /// An empty string means no speech was recognized; that is not an error.
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<String, GatewayError>;
}
