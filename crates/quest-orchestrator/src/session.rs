//! Session state for a single learner.
//!
//! This module defines the lifecycle stages of a practice session and the
//! state the orchestrator mutates when an operation commits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::QuestionDeduplicator;
use crate::error::{QuestError, Result};
use crate::language::Language;

// ============================================================================
// Stage
// ============================================================================

/// Lifecycle stage of the session.
///
/// The stage transitions through these states:
/// - `Idle` -> `QuestionReady` (a question was generated)
/// - `QuestionReady` -> `QuestionReady` (a newer question replaced it)
/// - `QuestionReady` -> `Answered` (feedback was produced)
/// - `Answered` -> `Answered` (feedback was produced again)
/// - `Answered` -> `QuestionReady` (the next question was generated)
/// - any -> `Idle` (reset)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// No active question.
    #[default]
    Idle,
    /// A question has been issued and awaits an answer.
    QuestionReady,
    /// Feedback has been produced for the active question.
    Answered,
}

impl Stage {
    /// Returns `true` if there is an active question in this stage.
    ///
    /// # Examples
    ///
    /// ```
    /// use quest_orchestrator::Stage;
    ///
    /// assert!(Stage::QuestionReady.has_question());
    /// assert!(Stage::Answered.has_question());
    /// assert!(!Stage::Idle.has_question());
    /// ```
    #[must_use]
    pub const fn has_question(self) -> bool {
        matches!(self, Self::QuestionReady | Self::Answered)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::QuestionReady => write!(f, "question_ready"),
            Self::Answered => write!(f, "answered"),
        }
    }
}

// ============================================================================
// ActiveQuestion
// ============================================================================

/// The question the learner is currently answering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveQuestion {
    /// Cleaned question text, original casing.
    pub text: String,
    /// Language the question was generated in; `None` if the request used an
    /// unknown code.
    pub language: Option<Language>,
}

// ============================================================================
// Session
// ============================================================================

/// Mutable state of the one practice session.
///
/// Invariants:
/// - `stage == Idle` exactly when there is no active question
/// - the active question, once set, is recorded in the deduplicator
/// - `sequence_number` counts questions issued since the last reset
#[derive(Debug, Clone)]
pub struct Session {
    stage: Stage,
    sequence_number: u32,
    active: Option<ActiveQuestion>,
    asked: QuestionDeduplicator,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Creates an idle session.
    ///
    /// # Examples
    ///
    /// ```
    /// use quest_orchestrator::{Session, Stage};
    ///
    /// let session = Session::new();
    /// assert_eq!(session.stage(), Stage::Idle);
    /// assert_eq!(session.sequence_number(), 0);
    /// assert!(session.active_question().is_none());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            stage: Stage::Idle,
            sequence_number: 0,
            active: None,
            asked: QuestionDeduplicator::new(),
            started_at: now,
            updated_at: now,
        }
    }

    /// Current lifecycle stage.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Number of questions issued since the last reset.
    #[must_use]
    pub const fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Sequence number the next issued question will get.
    #[must_use]
    pub const fn next_sequence_number(&self) -> u32 {
        self.sequence_number.saturating_add(1)
    }

    /// The active question, if any.
    #[must_use]
    pub const fn active_question(&self) -> Option<&ActiveQuestion> {
        self.active.as_ref()
    }

    /// Questions asked since the last reset.
    #[must_use]
    pub const fn asked(&self) -> &QuestionDeduplicator {
        &self.asked
    }

    /// Returns `true` if `candidate` could be issued as the next question.
    #[must_use]
    pub fn is_novel(&self, candidate: &str) -> bool {
        self.asked.is_novel(candidate)
    }

    /// Returns the active question or a `StateConflict` naming `operation`.
    ///
    /// # Errors
    ///
    /// Returns `QuestError::StateConflict` when the session is idle.
    pub fn require_question(&self, operation: &str) -> Result<&ActiveQuestion> {
        self.active
            .as_ref()
            .ok_or_else(|| QuestError::state_conflict(self.stage, operation))
    }

    /// Issues `question` as the new active question.
    ///
    /// Records it in the deduplicator, bumps the sequence number and moves to
    /// `QuestionReady`. Returns the new sequence number.
    ///
    /// # Errors
    ///
    /// Returns `QuestError::InvalidStateTransition` if `question` is empty or
    /// was already asked; nothing is changed in that case.
    pub fn issue_question(&mut self, question: String, language: Option<Language>) -> Result<u32> {
        if !self.asked.accept(&question) {
            return Err(QuestError::invalid_transition(
                self.stage,
                format!("{} with a repeated question", Stage::QuestionReady),
            ));
        }

        self.sequence_number = self.next_sequence_number();
        self.active = Some(ActiveQuestion {
            text: question,
            language,
        });
        self.stage = Stage::QuestionReady;
        self.touch();
        Ok(self.sequence_number)
    }

    /// Marks the active question as answered.
    ///
    /// # Errors
    ///
    /// Returns `QuestError::InvalidStateTransition` when the session is idle.
    pub fn mark_answered(&mut self) -> Result<()> {
        if !self.stage.has_question() {
            return Err(QuestError::invalid_transition(self.stage, Stage::Answered));
        }
        self.stage = Stage::Answered;
        self.touch();
        Ok(())
    }

    /// Returns to the initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Captures the externally visible state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stage: self.stage,
            sequence_number: self.sequence_number,
            active_question: self.active.as_ref().map(|q| q.text.clone()),
            question_language: self.active.as_ref().and_then(|q| q.language),
            asked_count: self.asked.len(),
            started_at: self.started_at,
            updated_at: self.updated_at,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// SessionSnapshot
// ============================================================================

/// Read-only view of the session, as served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Current lifecycle stage.
    pub stage: Stage,
    /// Number of questions issued since the last reset.
    pub sequence_number: u32,
    /// Text of the active question.
    pub active_question: Option<String>,
    /// Language of the active question.
    pub question_language: Option<Language>,
    /// Number of distinct questions asked since the last reset.
    pub asked_count: usize,
    /// When the session was created or last reset.
    pub started_at: DateTime<Utc>,
    /// When the session last changed.
    pub updated_at: DateTime<Utc>,
}
