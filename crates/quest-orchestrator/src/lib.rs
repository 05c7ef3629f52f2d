//! QUEST Session Orchestrator
//!
//! Runs the question, answer and feedback cycle of an oral-language practice
//! session and exposes it over HTTP.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod dedup;
pub mod error;
pub mod language;
pub mod orchestrator;
pub mod prompts;
pub mod session;

pub use api::{
    create_router, AppState, ClearResponse, ErrorResponse, FeedbackRequest,
    GenerateQuestionRequest,
};
pub use artifacts::{Artifact, ArtifactKind, ArtifactStore, AuditLog};
pub use config::{Config, GenerationBackend, GenerationConfig, SpeechConfig, CONFIG_FILE_NAME};
pub use dedup::QuestionDeduplicator;
pub use error::{ErrorKind, QuestError, Result, SpeechOperation, ValidationIssue};
pub use language::{Language, RequestedLanguage};
pub use orchestrator::{
    FeedbackOutcome, Orchestrator, OrchestratorSettings, QuestionOutcome, ResetOutcome,
    TranscriptionOutcome,
};
pub use prompts::RubricSection;
pub use session::{ActiveQuestion, Session, SessionSnapshot, Stage};
