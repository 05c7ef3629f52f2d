//! The session orchestrator.
//!
//! [`Orchestrator`] implements the four session operations: generating a
//! question, transcribing an answer, producing feedback and resetting.
//!
//! # Concurrency
//!
//! Every operation holds the session lock from its precondition check until
//! it returns, gateway calls included, so operations on the one session are
//! strictly serialized. Session state is only mutated in a final commit step
//! after every gateway call has succeeded; an operation that fails, times out
//! or is dropped mid-flight leaves the session exactly as it found it.
//!
//! Each commit also publishes a [`SessionSnapshot`]. Status reads and error
//! localization use the published snapshot and never wait for the lock.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quest_gateway::{CommandSpeechGateway, OllamaCliGenerator};
//! use quest_orchestrator::{Config, Orchestrator, RequestedLanguage};
//!
//! # async fn example() -> quest_orchestrator::Result<()> {
//! let config = Config::default();
//! let generator = Arc::new(OllamaCliGenerator::new(
//!     "ollama",
//!     "llama3.2",
//!     config.generation.timeout(),
//! ));
//! let speech = Arc::new(CommandSpeechGateway::default());
//! let orchestrator = Orchestrator::from_config(&config, generator, speech);
//!
//! let issued = orchestrator
//!     .generate_question("train station", &RequestedLanguage::parse(Some("en")))
//!     .await?;
//! println!("{} ({})", issued.question, issued.audio);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use quest_gateway::{GatewayError, SpeechGateway, TextGenerator};
use quest_narration::markdown_to_text;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, instrument, warn};

use crate::artifacts::{
    sanitize_extension, Artifact, ArtifactKind, ArtifactStore, AuditLog, NARRATION_EXTENSION,
};
use crate::config::Config;
use crate::dedup::clean_question;
use crate::error::{QuestError, Result, SpeechOperation, ValidationIssue};
use crate::language::{feedback_voice, question_voice, Language, RequestedLanguage};
use crate::prompts::{self, RubricSection};
use crate::session::{Session, SessionSnapshot};

// ============================================================================
// Settings and outcomes
// ============================================================================

/// Limits and defaults the orchestrator applies to every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Generation attempts per question before giving up.
    pub max_question_attempts: u32,
    /// Language used when a request does not name one.
    pub default_language: Language,
    /// Budget for one text-generation call.
    pub generation_timeout: Duration,
    /// Budget for one synthesis call.
    pub synthesis_timeout: Duration,
    /// Budget for one transcription call.
    pub transcription_timeout: Duration,
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_question_attempts: config.max_question_attempts,
            default_language: config.default_language,
            generation_timeout: config.generation.timeout(),
            synthesis_timeout: config.speech.synthesis_timeout(),
            transcription_timeout: config.speech.transcription_timeout(),
        }
    }
}

/// A newly issued question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionOutcome {
    /// The question text.
    pub question: String,
    /// Artifact name of the narrated question.
    pub audio: String,
    /// Sequence number of the question.
    pub sequence: u32,
}

/// A transcribed recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptionOutcome {
    /// Recognized text; empty when nothing was recognized.
    pub transcription: String,
    /// Artifact name of the stored recording.
    pub saved_audio: String,
    /// Whether any speech was recognized.
    pub speech_detected: bool,
    /// Localized notice shown when no speech was recognized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Feedback on an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackOutcome {
    /// Markdown feedback as produced by the generator.
    pub feedback: String,
    /// Artifact name of the narrated feedback.
    pub audio: String,
    /// The question the feedback refers to.
    pub question: String,
    /// Sequence number of that question.
    pub sequence: u32,
    /// Rubric headings the generator left out.
    #[serde(skip)]
    pub missing_sections: Vec<RubricSection>,
}

/// Result of a reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResetOutcome {
    /// Artifacts deleted from disk.
    pub removed_artifacts: usize,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Coordinates one practice session across the text and speech gateways.
pub struct Orchestrator {
    session: Mutex<Session>,
    published: watch::Sender<SessionSnapshot>,
    generator: Arc<dyn TextGenerator>,
    speech: Arc<dyn SpeechGateway>,
    artifacts: ArtifactStore,
    audit: AuditLog,
    settings: OrchestratorSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("artifacts", &self.artifacts)
            .field("audit", &self.audit)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an orchestrator with an idle session.
    #[must_use]
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechGateway>,
        artifacts: ArtifactStore,
        audit: AuditLog,
        settings: OrchestratorSettings,
    ) -> Self {
        let session = Session::new();
        let (published, _) = watch::channel(session.snapshot());
        Self {
            session: Mutex::new(session),
            published,
            generator,
            speech,
            artifacts,
            audit,
            settings,
        }
    }

    /// Creates an orchestrator using the directories and limits in `config`.
    #[must_use]
    pub fn from_config(
        config: &Config,
        generator: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechGateway>,
    ) -> Self {
        Self::new(
            generator,
            speech,
            ArtifactStore::new(&config.audio_dir),
            AuditLog::new(&config.log_dir),
            OrchestratorSettings::from(config),
        )
    }

    /// The artifact store backing this session.
    #[must_use]
    pub const fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Returns the session state as of the last committed operation.
    ///
    /// Does not wait for an operation that is still in flight.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.published.borrow().clone()
    }

    /// Picks the language for user-facing messages about a request.
    ///
    /// The requested language wins, then the active question's language,
    /// then the configured default.
    pub fn message_language(&self, requested: &RequestedLanguage) -> Language {
        requested
            .known()
            .or(self.published.borrow().question_language)
            .unwrap_or(self.settings.default_language)
    }

    /// Generates, narrates and issues a question about `topic`.
    ///
    /// Candidates that are empty or were already asked are discarded and a
    /// new one is requested, up to `max_question_attempts` calls in total.
    ///
    /// # Errors
    ///
    /// - `Validation` if `topic` is blank
    /// - `Generation` if the backend fails or times out
    /// - `NoNovelQuestion` if every attempt produced a repeat
    /// - `Speech` if narration fails
    ///
    /// The session is unchanged on every error.
    #[instrument(skip(self, topic))]
    pub async fn generate_question(
        &self,
        topic: &str,
        language: &RequestedLanguage,
    ) -> Result<QuestionOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(QuestError::validation(ValidationIssue::EmptyTopic));
        }

        let language = language.resolve(self.settings.default_language);
        let prompt = prompts::question_prompt(topic, language);

        let mut session = self.session.lock().await;
        let sequence = session.next_sequence_number();

        let question = self.novel_question(&session, &prompt).await?;
        let artifact = self
            .narrate(
                ArtifactKind::Question,
                sequence,
                &question,
                question_voice(language),
            )
            .await?;

        if let Err(e) = session.issue_question(question.clone(), language) {
            self.artifacts.discard(&artifact).await;
            return Err(e);
        }
        self.publish(&session);
        self.audit.record_question(sequence, &question).await;

        info!(sequence, artifact = %artifact.name, "Question issued");
        Ok(QuestionOutcome {
            question,
            audio: artifact.name,
            sequence,
        })
    }

    /// Stores a recording and transcribes it.
    ///
    /// Does not depend on or change the session stage. An empty recognition
    /// result is a success with `speech_detected == false`.
    ///
    /// # Errors
    ///
    /// - `Validation` if `audio` is empty
    /// - `Speech` if recognition fails or times out (the stored recording is
    ///   removed again)
    /// - `Io` if the recording cannot be stored
    #[instrument(skip(self, audio), fields(bytes = audio.len()))]
    pub async fn transcribe_answer(
        &self,
        audio: &[u8],
        filename: Option<&str>,
        language: &RequestedLanguage,
    ) -> Result<TranscriptionOutcome> {
        if audio.is_empty() {
            return Err(QuestError::validation(ValidationIssue::MissingAudio));
        }

        let hint = language.resolve(self.settings.default_language);

        let session = self.session.lock().await;
        let artifact = self
            .artifacts
            .write(
                ArtifactKind::Answer,
                session.sequence_number(),
                &sanitize_extension(filename),
                audio,
            )
            .await?;

        let timeout = self.settings.transcription_timeout;
        let result = tokio::time::timeout(
            timeout,
            self.speech
                .transcribe(&artifact.path, hint.map(Language::code)),
        )
        .await
        .unwrap_or_else(|_| Err(GatewayError::timeout("speech transcription", timeout.as_secs())));

        let transcription = match result {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(artifact = %artifact.name, error = %e, "Transcription failed");
                self.artifacts.discard(&artifact).await;
                return Err(QuestError::speech(SpeechOperation::Transcription, e));
            }
        };
        drop(session);

        let speech_detected = !transcription.is_empty();
        let message = (!speech_detected).then(|| {
            hint.unwrap_or(self.settings.default_language)
                .no_speech_message()
                .to_string()
        });

        info!(artifact = %artifact.name, speech_detected, "Answer transcribed");
        Ok(TranscriptionOutcome {
            transcription,
            saved_audio: artifact.name,
            speech_detected,
            message,
        })
    }

    /// Evaluates `transcription` against the active question.
    ///
    /// Feedback is requested in the given language, or in the question's
    /// language when the request names none.
    ///
    /// # Errors
    ///
    /// - `Validation` if `transcription` is blank (checked first)
    /// - `StateConflict` if no question has been issued
    /// - `Generation` if the backend fails, times out or returns nothing
    /// - `Speech` if narration fails
    ///
    /// The session is unchanged on every error.
    #[instrument(skip(self, transcription))]
    pub async fn produce_feedback(
        &self,
        transcription: &str,
        language: &RequestedLanguage,
    ) -> Result<FeedbackOutcome> {
        let transcription = transcription.trim();
        if transcription.is_empty() {
            return Err(QuestError::validation(ValidationIssue::EmptyTranscription));
        }

        let mut session = self.session.lock().await;
        let active = session.require_question("produce feedback")?.clone();
        let sequence = session.sequence_number();
        let language = match language {
            RequestedLanguage::Unspecified => active.language,
            other => other.resolve(self.settings.default_language),
        };

        let prompt = prompts::feedback_prompt(&active.text, transcription, language);
        let feedback = self.generate_text(&prompt).await?.trim().to_string();
        if feedback.is_empty() {
            return Err(QuestError::generation(GatewayError::InvalidResponse(
                "empty feedback".to_string(),
            )));
        }

        let missing_sections = prompts::missing_sections(&feedback, language);
        if !missing_sections.is_empty() {
            warn!(sequence, missing = ?missing_sections, "Feedback is missing rubric sections");
        }

        let mut narration = markdown_to_text(&feedback);
        if narration.is_empty() {
            narration.clone_from(&feedback);
        }
        let artifact = self
            .narrate(
                ArtifactKind::Feedback,
                sequence,
                &narration,
                feedback_voice(language),
            )
            .await?;

        if let Err(e) = session.mark_answered() {
            self.artifacts.discard(&artifact).await;
            return Err(e);
        }
        self.publish(&session);
        self.audit.record_answer(sequence, transcription).await;
        self.audit.record_feedback(sequence, &feedback).await;

        info!(sequence, artifact = %artifact.name, "Feedback produced");
        Ok(FeedbackOutcome {
            feedback,
            audio: artifact.name,
            question: active.text,
            sequence,
            missing_sections,
        })
    }

    /// Deletes every artifact and returns the session to its initial state.
    ///
    /// Never fails; artifacts that cannot be deleted are logged and skipped.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> ResetOutcome {
        let mut session = self.session.lock().await;
        let removed_artifacts = self.artifacts.clear().await;
        session.reset();
        self.publish(&session);

        info!(removed_artifacts, "Session reset");
        ResetOutcome { removed_artifacts }
    }

    fn publish(&self, session: &Session) {
        self.published.send_replace(session.snapshot());
    }

    async fn novel_question(&self, session: &Session, prompt: &str) -> Result<String> {
        let attempts = self.settings.max_question_attempts;
        for attempt in 1..=attempts {
            let candidate = clean_question(&self.generate_text(prompt).await?);
            if session.is_novel(&candidate) {
                debug!(attempt, "Novel question generated");
                return Ok(candidate);
            }
            debug!(attempt, candidate = %candidate, "Discarded repeated or empty question");
        }

        warn!(attempts, "No novel question within the attempt limit");
        Err(QuestError::NoNovelQuestion { attempts })
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let timeout = self.settings.generation_timeout;
        tokio::time::timeout(timeout, self.generator.generate(prompt))
            .await
            .unwrap_or_else(|_| Err(GatewayError::timeout("text generation", timeout.as_secs())))
            .map_err(|e| {
                warn!(error = %e, "Text generation failed");
                QuestError::generation(e)
            })
    }

    async fn narrate(
        &self,
        kind: ArtifactKind,
        sequence: u32,
        text: &str,
        voice: &str,
    ) -> Result<Artifact> {
        let artifact = self
            .artifacts
            .allocate(kind, sequence, NARRATION_EXTENSION)
            .await?;

        let timeout = self.settings.synthesis_timeout;
        let result = tokio::time::timeout(
            timeout,
            self.speech.synthesize(text, voice, &artifact.path),
        )
        .await
        .unwrap_or_else(|_| Err(GatewayError::timeout("speech synthesis", timeout.as_secs())));

        if let Err(e) = result {
            warn!(artifact = %artifact.name, voice, error = %e, "Narration failed");
            self.artifacts.discard(&artifact).await;
            return Err(QuestError::speech(SpeechOperation::Synthesis, e));
        }

        debug!(artifact = %artifact.name, voice, "Narration written");
        Ok(artifact)
    }
}
