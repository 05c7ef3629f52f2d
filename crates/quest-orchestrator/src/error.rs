//! Error types for the QUEST session orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations:
//! input validation, gateway failures, lifecycle conflicts, configuration
//! loading and local I/O.

use std::path::PathBuf;

use quest_gateway::GatewayError;
use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::session::Stage;

/// A specialized `Result` type for QUEST orchestrator operations.
pub type Result<T> = std::result::Result<T, QuestError>;

/// Errors that can occur while running a practice session.
///
/// Variants map onto the user-facing taxonomy exposed by [`ErrorKind`].
#[derive(Debug, thiserror::Error)]
pub enum QuestError {
    // ========================================================================
    // Validation Errors
    // ========================================================================
    /// A required input was missing or empty; the operation was not attempted.
    #[error("Invalid request: {0}")]
    Validation(ValidationIssue),

    // ========================================================================
    // Gateway Errors
    // ========================================================================
    /// The text-generation backend failed, errored or timed out.
    #[error("Text generation failed: {0}")]
    Generation(#[source] GatewayError),

    /// Every attempt produced a question that had already been asked.
    #[error("Could not produce a novel question after {attempts} attempts")]
    NoNovelQuestion {
        /// Number of generation attempts made.
        attempts: u32,
    },

    /// Speech synthesis or transcription failed.
    #[error("Speech {operation} failed: {source}")]
    Speech {
        /// Which speech operation failed.
        operation: SpeechOperation,
        /// The underlying gateway failure.
        #[source]
        source: GatewayError,
    },

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// The operation is not allowed in the current lifecycle stage.
    #[error("Cannot {operation} while the session is {stage}")]
    StateConflict {
        /// The stage the session was in.
        stage: Stage,
        /// The operation that was refused.
        operation: String,
    },

    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your quest.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The specific input problem behind a [`QuestError::Validation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    /// `GenerateQuestion` was called without a topic.
    EmptyTopic,
    /// `TranscribeAnswer` was called without audio.
    MissingAudio,
    /// `ProduceFeedback` was called with nothing to evaluate.
    EmptyTranscription,
    /// The request body could not be read or has the wrong shape.
    MalformedRequest,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTopic => write!(f, "no topic given"),
            Self::MissingAudio => write!(f, "no audio file submitted"),
            Self::EmptyTranscription => write!(f, "nothing to evaluate"),
            Self::MalformedRequest => write!(f, "malformed request body"),
        }
    }
}

/// The speech operation behind a [`QuestError::Speech`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechOperation {
    /// Text to speech.
    Synthesis,
    /// Speech to text.
    Transcription,
}

impl std::fmt::Display for SpeechOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synthesis => write!(f, "synthesis"),
            Self::Transcription => write!(f, "transcription"),
        }
    }
}

/// Stable, machine-readable error category returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or empty input.
    Validation,
    /// Text backend unavailable, errored or timed out.
    GenerationFailure,
    /// Retry cap reached without a new question.
    NoNovelQuestion,
    /// Synthesis or transcription failed.
    SpeechFailure,
    /// Operation attempted in an illegal lifecycle stage.
    StateConflict,
    /// Anything else (I/O, configuration).
    Internal,
}

impl QuestError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub const fn validation(issue: ValidationIssue) -> Self {
        Self::Validation(issue)
    }

    /// Creates a new `Generation` error.
    #[must_use]
    pub const fn generation(source: GatewayError) -> Self {
        Self::Generation(source)
    }

    /// Creates a new `Speech` error for the given operation.
    #[must_use]
    pub const fn speech(operation: SpeechOperation, source: GatewayError) -> Self {
        Self::Speech { operation, source }
    }

    /// Creates a new `StateConflict` error.
    #[must_use]
    pub fn state_conflict(stage: Stage, operation: impl Into<String>) -> Self {
        Self::StateConflict {
            stage,
            operation: operation.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Returns the client-facing category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Generation(_) => ErrorKind::GenerationFailure,
            Self::NoNovelQuestion { .. } => ErrorKind::NoNovelQuestion,
            Self::Speech { .. } => ErrorKind::SpeechFailure,
            Self::StateConflict { .. } => ErrorKind::StateConflict,
            Self::InvalidStateTransition { .. }
            | Self::ConfigParseError { .. }
            | Self::ConfigValidationError { .. }
            | Self::Io(_)
            | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Returns `true` if the caller supplied bad input or called out of order.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::StateConflict
        )
    }

    /// Returns a human-readable message in `language`.
    ///
    /// Gateway and I/O details are left out; they belong in logs.
    #[must_use]
    pub fn user_message(&self, language: Language) -> String {
        use Language::{English, French, German};

        let message = match (self, language) {
            (Self::Validation(ValidationIssue::EmptyTopic), German) => {
                "Bitte gib zuerst ein Thema ein."
            }
            (Self::Validation(ValidationIssue::EmptyTopic), English) => {
                "Please enter a topic first."
            }
            (Self::Validation(ValidationIssue::EmptyTopic), French) => {
                "Veuillez d'abord saisir un thème."
            }
            (Self::Validation(ValidationIssue::MissingAudio), German) => {
                "Keine Audiodatei übermittelt."
            }
            (Self::Validation(ValidationIssue::MissingAudio), English) => {
                "No audio file submitted."
            }
            (Self::Validation(ValidationIssue::MissingAudio), French) => {
                "Aucun fichier audio transmis."
            }
            (Self::Validation(ValidationIssue::EmptyTranscription), German) => {
                "Keine Antwort zum Bewerten übermittelt."
            }
            (Self::Validation(ValidationIssue::EmptyTranscription), English) => {
                "No answer submitted for evaluation."
            }
            (Self::Validation(ValidationIssue::EmptyTranscription), French) => {
                "Aucune réponse à évaluer n'a été transmise."
            }
            (Self::Validation(ValidationIssue::MalformedRequest), German) => {
                "Die Anfrage ist ungültig."
            }
            (Self::Validation(ValidationIssue::MalformedRequest), English) => {
                "The request is malformed."
            }
            (Self::Validation(ValidationIssue::MalformedRequest), French) => {
                "La requête est invalide."
            }
            (Self::StateConflict { .. }, German) => "Es wurde noch keine Frage gestellt.",
            (Self::StateConflict { .. }, English) => "No question has been asked yet.",
            (Self::StateConflict { .. }, French) => "Aucune question n'a encore été posée.",
            (Self::Generation(_), German) => "Die Textgenerierung ist fehlgeschlagen.",
            (Self::Generation(_), English) => "Text generation failed.",
            (Self::Generation(_), French) => "La génération de texte a échoué.",
            (Self::NoNovelQuestion { .. }, German) => {
                "Es konnte keine neue Frage erzeugt werden. Bitte versuche ein anderes Thema."
            }
            (Self::NoNovelQuestion { .. }, English) => {
                "Could not produce a new question. Please try another topic."
            }
            (Self::NoNovelQuestion { .. }, French) => {
                "Impossible de générer une nouvelle question. Veuillez essayer un autre thème."
            }
            (Self::Speech { operation: SpeechOperation::Synthesis, .. }, German) => {
                "Die Sprachausgabe ist fehlgeschlagen."
            }
            (Self::Speech { operation: SpeechOperation::Synthesis, .. }, English) => {
                "Speech synthesis failed."
            }
            (Self::Speech { operation: SpeechOperation::Synthesis, .. }, French) => {
                "La synthèse vocale a échoué."
            }
            (Self::Speech { operation: SpeechOperation::Transcription, .. }, German) => {
                "Fehler bei der Transkription."
            }
            (Self::Speech { operation: SpeechOperation::Transcription, .. }, English) => {
                "Transcription failed."
            }
            (Self::Speech { operation: SpeechOperation::Transcription, .. }, French) => {
                "La transcription a échoué."
            }
            (_, German) => "Ein interner Fehler ist aufgetreten.",
            (_, English) => "An internal error occurred.",
            (_, French) => "Une erreur interne s'est produite.",
        };
        message.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = QuestError::validation(ValidationIssue::EmptyTopic);
        assert_eq!(err.to_string(), "Invalid request: no topic given");

        let err = QuestError::state_conflict(Stage::Idle, "produce feedback");
        assert_eq!(
            err.to_string(),
            "Cannot produce feedback while the session is idle"
        );

        let err = QuestError::NoNovelQuestion { attempts: 10 };
        assert!(err.to_string().contains("10 attempts"));
    }

    #[test]
    fn test_speech_error_display_includes_source() {
        let err = QuestError::speech(
            SpeechOperation::Transcription,
            GatewayError::timeout("whisper", 120),
        );
        assert_eq!(
            err.to_string(),
            "Speech transcription failed: whisper timed out after 120s"
        );
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            QuestError::validation(ValidationIssue::MissingAudio).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            QuestError::Generation(GatewayError::Http("down".into())).kind(),
            ErrorKind::GenerationFailure
        );
        assert_eq!(
            QuestError::NoNovelQuestion { attempts: 3 }.kind(),
            ErrorKind::NoNovelQuestion
        );
        assert_eq!(
            QuestError::state_conflict(Stage::Idle, "x").kind(),
            ErrorKind::StateConflict
        );
        assert_eq!(
            QuestError::invalid_transition(Stage::Idle, Stage::Answered).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_is_client_error() {
        assert!(QuestError::validation(ValidationIssue::EmptyTranscription).is_client_error());
        assert!(QuestError::state_conflict(Stage::Idle, "x").is_client_error());
        assert!(!QuestError::NoNovelQuestion { attempts: 1 }.is_client_error());
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!QuestError::from(io_err).is_client_error());
    }

    #[test]
    fn test_malformed_request_is_a_localized_validation_error() {
        let err = QuestError::validation(ValidationIssue::MalformedRequest);
        assert_eq!(err.to_string(), "Invalid request: malformed request body");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.is_client_error());
        assert_eq!(err.user_message(Language::German), "Die Anfrage ist ungültig.");
        assert_eq!(err.user_message(Language::English), "The request is malformed.");
        assert_eq!(err.user_message(Language::French), "La requête est invalide.");
    }

    #[test]
    fn test_user_message_is_localized() {
        let err = QuestError::state_conflict(Stage::Idle, "produce feedback");
        assert_eq!(
            err.user_message(Language::German),
            "Es wurde noch keine Frage gestellt."
        );
        assert_eq!(
            err.user_message(Language::English),
            "No question has been asked yet."
        );
        assert_eq!(
            err.user_message(Language::French),
            "Aucune question n'a encore été posée."
        );
    }

    #[test]
    fn test_user_message_hides_gateway_details() {
        let err = QuestError::Generation(GatewayError::Http("connection refused".into()));
        let msg = err.user_message(Language::English);
        assert_eq!(msg, "Text generation failed.");
        assert!(!msg.contains("refused"));
    }

    #[test]
    fn test_error_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::GenerationFailure).unwrap_or_default(),
            r#""generation_failure""#
        );
        assert_eq!(
            serde_json::to_string(&ErrorKind::StateConflict).unwrap_or_default(),
            r#""state_conflict""#
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let quest_err: QuestError = io_err.into();
        assert!(matches!(quest_err, QuestError::Io(_)));
    }
}
