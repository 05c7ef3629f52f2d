//! Scripted gateway fakes for tests.
//!
//! Enabled with the `test-utils` feature. Both fakes record every call so
//! tests can assert on the prompts and voices the orchestrator used.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::{GatewayError, SpeechGateway, TextGenerator};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted generator reply.
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Failure(String),
}

/// A [`TextGenerator`] that replays queued replies in order.
///
/// Once the queue is empty it repeats the fallback reply if one was set,
/// otherwise it fails.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
    delay: Duration,
}

impl ScriptedGenerator {
    /// Creates a generator with no replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a generator that replays `replies` in order.
    #[must_use]
    pub fn with_replies(replies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let generator = Self::new();
        for reply in replies {
            generator.push_reply(reply);
        }
        generator
    }

    /// Creates a generator that always answers with `text`.
    #[must_use]
    pub fn repeating(text: impl Into<String>) -> Self {
        Self {
            fallback: Some(text.into()),
            ..Self::default()
        }
    }

    /// Sleeps for `delay` before every reply.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queues a successful reply.
    pub fn push_reply(&self, text: impl Into<String>) {
        lock(&self.replies).push_back(Reply::Text(text.into()));
    }

    /// Queues a failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.replies).push_back(Reply::Failure(message.into()));
    }

    /// Returns every prompt received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Returns how many times `generate` was called.
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.prompts).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        lock(&self.prompts).push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = lock(&self.replies).pop_front();
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Failure(message)) => Err(GatewayError::Http(message)),
            None => self.fallback.clone().ok_or_else(|| {
                GatewayError::InvalidResponse("scripted generator has no replies left".to_string())
            }),
        }
    }
}

/// A recorded synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisCall {
    /// Narrated text.
    pub text: String,
    /// Voice selector.
    pub voice: String,
    /// Target file.
    pub output: PathBuf,
}

/// A [`SpeechGateway`] that writes placeholder audio and returns a fixed transcript.
#[derive(Debug, Default)]
pub struct FakeSpeech {
    transcript: Mutex<String>,
    fail_synthesis: Mutex<bool>,
    fail_transcription: Mutex<bool>,
    syntheses: Mutex<Vec<SynthesisCall>>,
    transcriptions: Mutex<Vec<(PathBuf, Option<String>)>>,
    delay: Duration,
}

impl FakeSpeech {
    /// Creates a fake that transcribes everything as an empty string.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fake that transcribes everything as `transcript`.
    #[must_use]
    pub fn transcribing(transcript: impl Into<String>) -> Self {
        let speech = Self::new();
        speech.set_transcript(transcript);
        speech
    }

    /// Sleeps for `delay` inside every call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Changes the transcript returned by subsequent calls.
    pub fn set_transcript(&self, transcript: impl Into<String>) {
        *lock(&self.transcript) = transcript.into();
    }

    /// Makes subsequent synthesis calls fail (or succeed again).
    pub fn fail_synthesis(&self, fail: bool) {
        *lock(&self.fail_synthesis) = fail;
    }

    /// Makes subsequent transcription calls fail (or succeed again).
    pub fn fail_transcription(&self, fail: bool) {
        *lock(&self.fail_transcription) = fail;
    }

    /// Returns every synthesis request so far.
    #[must_use]
    pub fn syntheses(&self) -> Vec<SynthesisCall> {
        lock(&self.syntheses).clone()
    }

    /// Returns every `(audio, language_hint)` transcription request so far.
    #[must_use]
    pub fn transcriptions(&self) -> Vec<(PathBuf, Option<String>)> {
        lock(&self.transcriptions).clone()
    }
}

#[async_trait]
impl SpeechGateway for FakeSpeech {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        output: &Path,
    ) -> Result<(), GatewayError> {
        lock(&self.syntheses).push(SynthesisCall {
            text: text.to_string(),
            voice: voice.to_string(),
            output: output.to_path_buf(),
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *lock(&self.fail_synthesis) {
            return Err(GatewayError::CommandFailed {
                program: "fake-tts".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "synthesis disabled".to_string(),
            });
        }
        tokio::fs::write(output, format!("FAKEAUDIO:{voice}:{text}")).await?;
        Ok(())
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<String, GatewayError> {
        lock(&self.transcriptions)
            .push((audio.to_path_buf(), language_hint.map(ToString::to_string)));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *lock(&self.fail_transcription) {
            return Err(GatewayError::CommandFailed {
                program: "fake-stt".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "transcription disabled".to_string(),
            });
        }
        Ok(lock(&self.transcript).clone())
    }
}
