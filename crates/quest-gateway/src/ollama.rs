//! Ollama text-generation adapters.
//!
//! Two transports are supported: the REST API (`POST /api/generate`) and the
//! `ollama run <model>` CLI with the prompt on standard input.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{CommandSpec, GatewayError, TextGenerator};

/// Terminal control sequences the CLI emits while streaming (spinners, colors).
#[allow(clippy::expect_used)]
static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI escape regex"));

/// Removes ANSI escape sequences and surrounding whitespace.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPE.replace_all(text, "").trim().to_string()
}

// ============================================================================
// HTTP transport
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Talks to a running Ollama server over its REST API.
#[derive(Debug, Clone)]
pub struct OllamaHttpGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaHttpGenerator {
    /// Creates an adapter for the server at `base_url` (e.g. `http://127.0.0.1:11434`).
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

#[async_trait]
impl TextGenerator for OllamaHttpGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::timeout("ollama generate", self.timeout.as_secs())
                } else {
                    GatewayError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http(format!("{status}: {}", body.trim())));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        debug!(response_len = body.response.len(), "Generation finished");
        Ok(body.response.trim().to_string())
    }
}

// ============================================================================
// CLI transport
// ============================================================================

/// Runs `ollama run <model>` for every prompt.
#[derive(Debug, Clone)]
pub struct OllamaCliGenerator {
    command: String,
    model: String,
    timeout: Duration,
}

impl OllamaCliGenerator {
    /// Creates an adapter invoking `command` (usually `ollama`).
    #[must_use]
    pub fn new(command: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            model: model.into(),
            timeout,
        }
    }

    fn spec(&self, prompt: &str) -> CommandSpec {
        CommandSpec::new(&self.command)
            .with_args(["run", self.model.as_str()])
            .with_stdin(prompt)
            .with_timeout(self.timeout)
    }
}

#[async_trait]
impl TextGenerator for OllamaCliGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let output = self.spec(prompt).run().await?;
        Ok(strip_ansi(&output.stdout))
    }
}
