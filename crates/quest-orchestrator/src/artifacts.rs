//! Audio artifacts and audit logs on disk.
//!
//! Artifacts live in one flat directory and are named
//! `{kind}_{sequence}_{unix_millis}.{ext}`. The audit logs are append-only
//! text files with one line per event; nothing reads them back.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;

/// Extension used for recordings whose upload name carries none.
pub const DEFAULT_ANSWER_EXTENSION: &str = "webm";

/// Extension of synthesized narration.
pub const NARRATION_EXTENSION: &str = "mp3";

const MAX_EXTENSION_LEN: usize = 5;

// ============================================================================
// Artifacts
// ============================================================================

/// What an audio artifact contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Narrated question.
    Question,
    /// Uploaded learner recording.
    Answer,
    /// Narrated feedback.
    Feedback,
}

impl ArtifactKind {
    /// File-name prefix for this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Answer => "answer",
            Self::Feedback => "feedback",
        }
    }
}

/// A file in the artifact directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File name, as handed to clients.
    pub name: String,
    /// Full path on disk.
    pub path: PathBuf,
}

/// Returns a safe extension for an uploaded file name.
///
/// Only short alphanumeric extensions are kept; anything else falls back to
/// [`DEFAULT_ANSWER_EXTENSION`].
///
/// # Examples
///
/// ```
/// use quest_orchestrator::artifacts::sanitize_extension;
///
/// assert_eq!(sanitize_extension(Some("answer.OGG")), "ogg");
/// assert_eq!(sanitize_extension(Some("../../etc/passwd")), "webm");
/// assert_eq!(sanitize_extension(None), "webm");
/// ```
#[must_use]
pub fn sanitize_extension(filename: Option<&str>) -> String {
    filename
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map_or_else(
            || DEFAULT_ANSWER_EXTENSION.to_string(),
            str::to_ascii_lowercase,
        )
}

/// Owns the artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at `dir`. The directory is created lazily.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The artifact directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reserves a fresh, unused path for a new artifact.
    ///
    /// If the name for the current millisecond is taken, the timestamp is
    /// bumped until it is not.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created or inspected.
    pub async fn allocate(
        &self,
        kind: ArtifactKind,
        sequence: u32,
        extension: &str,
    ) -> Result<Artifact> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut millis = Utc::now().timestamp_millis();
        loop {
            let name = format!("{}_{sequence}_{millis}.{extension}", kind.prefix());
            let path = self.dir.join(&name);
            if !tokio::fs::try_exists(&path).await? {
                return Ok(Artifact { name, path });
            }
            millis += 1;
        }
    }

    /// Stores `bytes` as a new artifact.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub async fn write(
        &self,
        kind: ArtifactKind,
        sequence: u32,
        extension: &str,
        bytes: &[u8],
    ) -> Result<Artifact> {
        let artifact = self.allocate(kind, sequence, extension).await?;
        tokio::fs::write(&artifact.path, bytes).await?;
        debug!(artifact = %artifact.name, bytes = bytes.len(), "Artifact written");
        Ok(artifact)
    }

    /// Deletes an artifact, logging rather than failing.
    pub async fn discard(&self, artifact: &Artifact) {
        match tokio::fs::remove_file(&artifact.path).await {
            Ok(()) => debug!(artifact = %artifact.name, "Artifact discarded"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(artifact = %artifact.name, error = %e, "Failed to discard artifact"),
        }
    }

    /// Deletes every regular file in the directory.
    ///
    /// Returns the number of files removed. Individual failures are logged
    /// and skipped; a missing directory counts as already empty.
    pub async fn clear(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Failed to list artifacts");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "Failed to read artifact entry");
                    break;
                }
            };

            let path = entry.path();
            match entry.file_type().await {
                Ok(file_type) if file_type.is_file() => {}
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to inspect artifact");
                    continue;
                }
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete artifact"),
            }
        }
        removed
    }
}

// ============================================================================
// Audit logs
// ============================================================================

const QUESTIONS_LOG: &str = "questions_log.txt";
const RESPONSES_LOG: &str = "responses_log.txt";
const FEEDBACK_LOG: &str = "feedback_log.txt";

/// Append-only audit trail of questions, answers and feedback.
///
/// Write failures are logged and never surfaced to the caller.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
}

impl AuditLog {
    /// Creates an audit log writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the questions log.
    #[must_use]
    pub fn questions_path(&self) -> PathBuf {
        self.dir.join(QUESTIONS_LOG)
    }

    /// Path of the responses log.
    #[must_use]
    pub fn responses_path(&self) -> PathBuf {
        self.dir.join(RESPONSES_LOG)
    }

    /// Path of the feedback log.
    #[must_use]
    pub fn feedback_path(&self) -> PathBuf {
        self.dir.join(FEEDBACK_LOG)
    }

    /// Records an issued question.
    pub async fn record_question(&self, sequence: u32, question: &str) {
        self.append(&self.questions_path(), &format!("Question {sequence}: {question}"))
            .await;
    }

    /// Records the answer that was evaluated.
    pub async fn record_answer(&self, sequence: u32, answer: &str) {
        self.append(
            &self.responses_path(),
            &format!("Answer to question {sequence}: {answer}"),
        )
        .await;
    }

    /// Records generated feedback.
    pub async fn record_feedback(&self, sequence: u32, feedback: &str) {
        self.append(
            &self.feedback_path(),
            &format!("Feedback for question {sequence}: {feedback}"),
        )
        .await;
    }

    async fn append(&self, path: &Path, entry: &str) {
        let mut line = entry.replace('\r', "").replace('\n', "\\n");
        line.push('\n');

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "Failed to write audit log");
        }
    }
}
