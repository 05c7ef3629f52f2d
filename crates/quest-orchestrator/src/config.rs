//! Configuration types for the QUEST orchestrator.
//!
//! This module provides the configuration structures that control where
//! artifacts and audit logs are written, how question generation retries,
//! and which text-generation and speech backends are used.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use quest_gateway::{EdgeTtsOptions, WhisperOptions};
use serde::{Deserialize, Serialize};

use crate::error::{QuestError, Result};
use crate::language::Language;

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "quest.json";

/// Default directory for audio artifacts.
fn default_audio_dir() -> String {
    "uploads".to_string()
}

/// Default directory for the audit logs.
fn default_log_dir() -> String {
    ".".to_string()
}

/// Default cap on generation attempts per question.
const fn default_max_question_attempts() -> u32 {
    10
}

/// Default maximum size of an uploaded recording.
const fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_generation_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_generation_command() -> String {
    "ollama".to_string()
}

fn default_generation_model() -> String {
    "llama3.2".to_string()
}

const fn default_generation_timeout() -> u64 {
    40
}

fn default_tts_command() -> String {
    "edge-tts".to_string()
}

fn default_whisper_command() -> String {
    "whisper".to_string()
}

fn default_whisper_model() -> String {
    "base".to_string()
}

fn default_scratch_dir() -> String {
    std::env::temp_dir()
        .join("quest-whisper")
        .to_string_lossy()
        .into_owned()
}

const fn default_synthesis_timeout() -> u64 {
    60
}

const fn default_transcription_timeout() -> u64 {
    120
}

/// Main configuration for a QUEST server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Directory holding question, answer and feedback audio.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: String,

    /// Directory for `questions_log.txt`, `responses_log.txt` and
    /// `feedback_log.txt`.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// How many candidates to request before giving up on a novel question.
    #[serde(default = "default_max_question_attempts")]
    pub max_question_attempts: u32,

    /// Language used when a request does not name one.
    #[serde(default)]
    pub default_language: Language,

    /// Largest accepted upload, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Text-generation backend settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Speech backend settings.
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            log_dir: default_log_dir(),
            max_question_attempts: default_max_question_attempts(),
            default_language: Language::default(),
            max_upload_bytes: default_max_upload_bytes(),
            generation: GenerationConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `quest.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            QuestError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from a specific directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `QuestError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `QuestError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., zero timeouts, empty paths).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(QuestError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| QuestError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `QuestError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.max_question_attempts == 0 {
            return Err(QuestError::config_validation(
                "maxQuestionAttempts must be greater than 0",
                "Set maxQuestionAttempts to at least 1 in your quest.json",
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(QuestError::config_validation(
                "maxUploadBytes must be greater than 0",
                "Remove maxUploadBytes from your quest.json to use the 25 MiB default",
            ));
        }

        require_non_empty(
            &self.audio_dir,
            "audioDir",
            "Provide a directory for audio files in your quest.json",
        )?;
        require_non_empty(
            &self.log_dir,
            "logDir",
            "Provide a log directory in your quest.json (use '.' for current directory)",
        )?;

        // Reset deletes every file in audioDir, so the audit logs must live elsewhere.
        if lexical_dir(&self.log_dir).starts_with(lexical_dir(&self.audio_dir)) {
            return Err(QuestError::config_validation(
                format!(
                    "logDir '{}' must not be audioDir '{}' or a directory inside it",
                    self.log_dir, self.audio_dir
                ),
                "Point audioDir at a dedicated directory such as 'uploads'; clearing a session deletes every file in it",
            ));
        }

        self.generation.validate()?;
        self.speech.validate()
    }
}

/// Resolves `dir` against the working directory without touching the file
/// system, so `.`, `./` and `a/../` spellings compare equal.
fn lexical_dir(dir: &str) -> PathBuf {
    let path = Path::new(dir.trim());
    let mut resolved = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir().unwrap_or_default()
    };
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

fn require_non_empty(value: &str, field: &str, suggestion: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(QuestError::config_validation(
            format!("{field} must not be empty"),
            suggestion,
        ));
    }
    Ok(())
}

fn require_positive(value: u64, field: &str) -> Result<()> {
    if value == 0 {
        return Err(QuestError::config_validation(
            format!("{field} must be greater than 0"),
            format!("Set {field} to at least 1 second in your quest.json"),
        ));
    }
    Ok(())
}

// ============================================================================
// Generation
// ============================================================================

/// How the Ollama backend is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GenerationBackend {
    /// The Ollama HTTP API (default).
    #[default]
    Http,
    /// The `ollama run` command.
    Cli,
}

impl GenerationBackend {
    /// Parses a string into a `GenerationBackend`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(Self::Http),
            "cli" => Some(Self::Cli),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for GenerationBackend {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid generation backend '{s}': expected one of 'http', 'cli'"
            ))
        })
    }
}

impl Serialize for GenerationBackend {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let s = match self {
            Self::Http => "http",
            Self::Cli => "cli",
        };
        serializer.serialize_str(s)
    }
}

/// Text-generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Which transport to use.
    #[serde(default)]
    pub backend: GenerationBackend,

    /// Base URL of the Ollama server (HTTP backend).
    #[serde(default = "default_generation_url")]
    pub url: String,

    /// Ollama executable (CLI backend).
    #[serde(default = "default_generation_command")]
    pub command: String,

    /// Model name.
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Time budget per generation call in seconds.
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackend::default(),
            url: default_generation_url(),
            command: default_generation_command(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    /// Time budget per generation call.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        require_positive(self.timeout_secs, "generation.timeoutSecs")?;
        require_non_empty(
            &self.model,
            "generation.model",
            "Name an installed Ollama model, e.g. \"llama3.2\"",
        )?;
        match self.backend {
            GenerationBackend::Http => require_non_empty(
                &self.url,
                "generation.url",
                "Point generation.url at your Ollama server, e.g. \"http://127.0.0.1:11434\"",
            ),
            GenerationBackend::Cli => require_non_empty(
                &self.command,
                "generation.command",
                "Set generation.command to the ollama executable",
            ),
        }
    }
}

// ============================================================================
// Speech
// ============================================================================

/// Speech synthesis and recognition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    /// Text-to-speech executable.
    #[serde(default = "default_tts_command")]
    pub tts_command: String,

    /// Speech-to-text executable.
    #[serde(default = "default_whisper_command")]
    pub whisper_command: String,

    /// Recognition model.
    #[serde(default = "default_whisper_model")]
    pub whisper_model: String,

    /// Where the recognizer writes transcript files.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// Time budget per narration in seconds.
    #[serde(default = "default_synthesis_timeout")]
    pub synthesis_timeout_secs: u64,

    /// Time budget per transcription in seconds.
    #[serde(default = "default_transcription_timeout")]
    pub transcription_timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            tts_command: default_tts_command(),
            whisper_command: default_whisper_command(),
            whisper_model: default_whisper_model(),
            scratch_dir: default_scratch_dir(),
            synthesis_timeout_secs: default_synthesis_timeout(),
            transcription_timeout_secs: default_transcription_timeout(),
        }
    }
}

impl SpeechConfig {
    /// Time budget per narration.
    #[must_use]
    pub const fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    /// Time budget per transcription.
    #[must_use]
    pub const fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription_timeout_secs)
    }

    /// Settings for the synthesis adapter.
    #[must_use]
    pub fn edge_tts_options(&self) -> EdgeTtsOptions {
        EdgeTtsOptions {
            command: self.tts_command.clone(),
            timeout: self.synthesis_timeout(),
        }
    }

    /// Settings for the recognition adapter.
    #[must_use]
    pub fn whisper_options(&self) -> WhisperOptions {
        WhisperOptions {
            command: self.whisper_command.clone(),
            model: self.whisper_model.clone(),
            scratch_dir: self.scratch_dir.clone().into(),
            timeout: self.transcription_timeout(),
        }
    }

    fn validate(&self) -> Result<()> {
        require_positive(self.synthesis_timeout_secs, "speech.synthesisTimeoutSecs")?;
        require_positive(
            self.transcription_timeout_secs,
            "speech.transcriptionTimeoutSecs",
        )?;
        require_non_empty(
            &self.tts_command,
            "speech.ttsCommand",
            "Set speech.ttsCommand to the edge-tts executable",
        )?;
        require_non_empty(
            &self.whisper_command,
            "speech.whisperCommand",
            "Set speech.whisperCommand to the whisper executable",
        )?;
        require_non_empty(
            &self.whisper_model,
            "speech.whisperModel",
            "Name a whisper model, e.g. \"base\"",
        )?;
        require_non_empty(
            &self.scratch_dir,
            "speech.scratchDir",
            "Provide a writable directory for transcripts",
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert_eq!(config.audio_dir, "uploads");
        assert_eq!(config.log_dir, ".");
        assert_eq!(config.max_question_attempts, 10);
        assert_eq!(config.default_language, Language::German);
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.generation.backend, GenerationBackend::Http);
        assert_eq!(config.generation.url, "http://127.0.0.1:11434");
        assert_eq!(config.generation.model, "llama3.2");
        assert_eq!(config.generation.timeout(), Duration::from_secs(40));
        assert_eq!(config.speech.tts_command, "edge-tts");
        assert_eq!(config.speech.whisper_model, "base");
        assert_eq!(config.speech.synthesis_timeout(), Duration::from_secs(60));
        assert_eq!(
            config.speech.transcription_timeout(),
            Duration::from_secs(120)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialization_with_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.audio_dir, "uploads");
        assert_eq!(config.max_question_attempts, 10);
    }

    #[test]
    fn test_config_deserialization_with_overrides() {
        let json = r#"{
            "audioDir": "/var/lib/quest/audio",
            "defaultLanguage": "FR",
            "maxQuestionAttempts": 3,
            "generation": {
                "backend": "CLI",
                "model": "mistral"
            },
            "speech": {
                "whisperModel": "small",
                "transcriptionTimeoutSecs": 30
            }
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.audio_dir, "/var/lib/quest/audio");
        assert_eq!(config.default_language, Language::French);
        assert_eq!(config.max_question_attempts, 3);
        assert_eq!(config.generation.backend, GenerationBackend::Cli);
        assert_eq!(config.generation.model, "mistral");
        // Check that other fields got their defaults
        assert_eq!(config.generation.command, "ollama");
        assert_eq!(config.speech.whisper_model, "small");
        assert_eq!(config.speech.transcription_timeout_secs, 30);
        assert_eq!(config.speech.tts_command, "edge-tts");
    }

    #[test]
    fn test_generation_backend_case_insensitive() {
        for (raw, expected) in [
            ("http", GenerationBackend::Http),
            ("HTTP", GenerationBackend::Http),
            ("Cli", GenerationBackend::Cli),
        ] {
            let json = format!(r#"{{"generation": {{"backend": "{raw}"}}}}"#);
            let config: Config = serde_json::from_str(&json).unwrap();
            assert_eq!(config.generation.backend, expected);
        }
        assert_eq!(
            serde_json::to_string(&GenerationBackend::Cli).unwrap(),
            "\"cli\""
        );
    }

    #[test]
    fn test_invalid_enum_values_error() {
        let err = serde_json::from_str::<Config>(r#"{"generation": {"backend": "grpc"}}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid generation backend 'grpc'"));

        let err = serde_json::from_str::<Config>(r#"{"defaultLanguage": "xx"}"#)
            .unwrap_err()
            .to_string();
        assert!(err.contains("invalid language 'xx'"));
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let json = r#"{"audioDir": "a", "someFutureKey": true}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.audio_dir, "a");
    }

    #[test]
    fn test_speech_options_conversion() {
        let speech = SpeechConfig {
            whisper_command: "/opt/whisper/bin/whisper".into(),
            scratch_dir: "/tmp/scratch".into(),
            ..SpeechConfig::default()
        };

        let tts = speech.edge_tts_options();
        assert_eq!(tts.command, "edge-tts");
        assert_eq!(tts.timeout, Duration::from_secs(60));

        let whisper = speech.whisper_options();
        assert_eq!(whisper.command, "/opt/whisper/bin/whisper");
        assert_eq!(whisper.scratch_dir, PathBuf::from("/tmp/scratch"));
        assert_eq!(whisper.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_load_from_file_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("quest.json");
        std::fs::write(&config_path, r#"{"logDir": "logs", "defaultLanguage": "en"}"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.default_language, Language::English);
        assert_eq!(config.audio_dir, "uploads");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("quest.json");
        std::fs::write(&config_path, b"{ not valid json }").unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(
            matches!(&err, QuestError::ConfigParseError { path, message } if *path == config_path && !message.is_empty()),
            "Expected ConfigParseError with correct path, got: {err:?}"
        );
    }

    #[test]
    fn test_load_from_file_nonexistent_returns_default() {
        let config = Config::load_from_file(&PathBuf::from("/nonexistent/path/quest.json")).unwrap();
        assert_eq!(config.audio_dir, "uploads");
        assert_eq!(config.max_question_attempts, 10);
    }

    #[test]
    fn test_load_from_dir_finds_quest_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("quest.json"), r#"{"audioDir": "clips"}"#).unwrap();

        let config = Config::load_from_dir(dir.path()).unwrap();
        assert_eq!(config.audio_dir, "clips");
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("quest.json");
        std::fs::write(&config_path, r#"{"maxQuestionAttempts": 0}"#).unwrap();

        let err = Config::load_from_file(&config_path).unwrap_err();
        assert!(matches!(err, QuestError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_validation_zero_attempts() {
        let config = Config {
            max_question_attempts: 0,
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert!(
            matches!(&err, QuestError::ConfigValidationError { message, suggestion }
                if message.contains("maxQuestionAttempts") && suggestion.contains("maxQuestionAttempts")),
            "Expected ConfigValidationError about maxQuestionAttempts, got: {err:?}"
        );
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let config = Config {
            generation: GenerationConfig {
                timeout_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("generation.timeoutSecs"));

        let config = Config {
            speech: SpeechConfig {
                synthesis_timeout_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("speech.synthesisTimeoutSecs"));
    }

    #[test]
    fn test_config_validation_empty_paths_and_commands() {
        let config = Config {
            audio_dir: "   ".into(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("audioDir"));

        let config = Config {
            generation: GenerationConfig {
                backend: GenerationBackend::Cli,
                command: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("generation.command"));

        // An empty command is fine while the HTTP backend is selected.
        let config = Config {
            generation: GenerationConfig {
                command: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_logs_inside_audio_dir() {
        for (audio_dir, log_dir) in [
            (".", "."),
            (".", "./"),
            ("uploads", "uploads"),
            ("uploads", "./uploads/"),
            ("uploads", "uploads/logs"),
            ("/srv/quest", "/srv/quest/audit/../"),
        ] {
            let config = Config {
                audio_dir: audio_dir.into(),
                log_dir: log_dir.into(),
                ..Default::default()
            };
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, QuestError::ConfigValidationError { .. }),
                "audioDir={audio_dir} logDir={log_dir}"
            );
            assert!(err.to_string().contains("logDir"));
            assert!(err.to_string().contains("Suggestion:"));
        }
    }

    #[test]
    fn test_config_validation_accepts_separate_dirs() {
        for (audio_dir, log_dir) in [
            ("uploads", "."),
            ("uploads", "logs"),
            ("/srv/quest/uploads", "/srv/quest"),
            ("/srv/quest/uploads", "/srv/quest/uploads-log"),
        ] {
            let config = Config {
                audio_dir: audio_dir.into(),
                log_dir: log_dir.into(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "audioDir={audio_dir} logDir={log_dir}"
            );
        }
    }

    #[test]
    fn test_load_from_file_rejects_shared_audio_and_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"audioDir": ".", "logDir": "."}"#).unwrap();

        let err = Config::load_from_file(&path).unwrap_err();
        assert!(matches!(err, QuestError::ConfigValidationError { .. }));
    }
}
