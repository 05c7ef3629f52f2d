//! Speech adapters backed by command-line tools.
//!
//! - Synthesis: `edge-tts --voice <voice> --text <text> --write-media <file>`
//! - Recognition: `whisper <file> --model <model> --output_format txt
//!   --output_dir <scratch> [--language <code>]`, after which the transcript
//!   is read back from `<scratch>/<stem>.txt`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::{CommandSpec, GatewayError, SpeechGateway};

/// Settings for the `edge-tts` synthesizer.
#[derive(Debug, Clone)]
pub struct EdgeTtsOptions {
    /// Program name or path.
    pub command: String,
    /// Time budget per narration.
    pub timeout: Duration,
}

impl Default for EdgeTtsOptions {
    fn default() -> Self {
        Self {
            command: "edge-tts".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Settings for the `whisper` recognizer.
#[derive(Debug, Clone)]
pub struct WhisperOptions {
    /// Program name or path.
    pub command: String,
    /// Recognition model name (e.g. `base`).
    pub model: String,
    /// Directory whisper writes its transcript files into.
    pub scratch_dir: PathBuf,
    /// Time budget per transcription.
    pub timeout: Duration,
}

impl Default for WhisperOptions {
    fn default() -> Self {
        Self {
            command: "whisper".to_string(),
            model: "base".to_string(),
            scratch_dir: std::env::temp_dir().join("quest-whisper"),
            timeout: Duration::from_secs(120),
        }
    }
}

/// [`SpeechGateway`] implemented on top of `edge-tts` and `whisper`.
#[derive(Debug, Clone, Default)]
pub struct CommandSpeechGateway {
    tts: EdgeTtsOptions,
    whisper: WhisperOptions,
}

impl CommandSpeechGateway {
    /// Creates a gateway from explicit tool settings.
    #[must_use]
    pub const fn new(tts: EdgeTtsOptions, whisper: WhisperOptions) -> Self {
        Self { tts, whisper }
    }

    fn synthesis_spec(&self, text: &str, voice: &str, output: &Path) -> CommandSpec {
        // Attached values: narration text may itself start with '-'.
        CommandSpec::new(&self.tts.command)
            .with_args(["--voice", voice])
            .with_arg(format!("--text={text}"))
            .with_arg(format!("--write-media={}", output.display()))
            .with_timeout(self.tts.timeout)
    }

    fn transcription_spec(&self, audio: &Path, language_hint: Option<&str>) -> CommandSpec {
        let mut spec = CommandSpec::new(&self.whisper.command)
            .with_arg(audio.to_string_lossy())
            .with_args(["--model", self.whisper.model.as_str()])
            .with_args(["--output_format", "txt", "--output_dir"])
            .with_arg(self.whisper.scratch_dir.to_string_lossy())
            .with_args(["--verbose", "False", "--fp16", "False"])
            .with_timeout(self.whisper.timeout);
        if let Some(language) = language_hint {
            spec = spec.with_args(["--language", language]);
        }
        spec
    }

    fn transcript_path(&self, audio: &Path) -> PathBuf {
        let stem = audio
            .file_stem()
            .map_or_else(|| "transcript".into(), |s| s.to_string_lossy());
        self.whisper.scratch_dir.join(format!("{stem}.txt"))
    }
}

#[async_trait]
impl SpeechGateway for CommandSpeechGateway {
    #[instrument(skip(self, text), fields(voice = %voice, output = %output.display(), text_len = text.len()))]
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        output: &Path,
    ) -> Result<(), GatewayError> {
        self.synthesis_spec(text, voice, output).run().await?;

        let written = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(GatewayError::InvalidResponse(format!(
                "{} produced no audio at {}",
                self.tts.command,
                output.display()
            )));
        }

        debug!(bytes = written, "Narration written");
        Ok(())
    }

    #[instrument(skip(self), fields(audio = %audio.display()))]
    async fn transcribe(
        &self,
        audio: &Path,
        language_hint: Option<&str>,
    ) -> Result<String, GatewayError> {
        tokio::fs::create_dir_all(&self.whisper.scratch_dir).await?;

        self.transcription_spec(audio, language_hint).run().await?;

        let transcript_path = self.transcript_path(audio);
        let text = tokio::fs::read_to_string(&transcript_path)
            .await
            .map_err(|e| {
                GatewayError::InvalidResponse(format!(
                    "missing transcript {}: {e}",
                    transcript_path.display()
                ))
            })?;

        if let Err(e) = tokio::fs::remove_file(&transcript_path).await {
            warn!(path = %transcript_path.display(), error = %e, "Failed to remove transcript file");
        }

        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        debug!(chars = text.len(), "Transcription finished");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> CommandSpeechGateway {
        CommandSpeechGateway::new(
            EdgeTtsOptions::default(),
            WhisperOptions {
                scratch_dir: PathBuf::from("/tmp/quest-scratch"),
                ..WhisperOptions::default()
            },
        )
    }

    #[test]
    fn synthesis_spec_passes_voice_text_and_target() {
        let spec = gateway().synthesis_spec(
            "Wie komme ich zum Bahnhof?",
            "de-DE-KatjaNeural",
            Path::new("uploads/question_1_17.mp3"),
        );
        assert_eq!(spec.program, "edge-tts");
        assert_eq!(
            spec.args,
            vec![
                "--voice",
                "de-DE-KatjaNeural",
                "--text=Wie komme ich zum Bahnhof?",
                "--write-media=uploads/question_1_17.mp3",
            ]
        );
        assert_eq!(spec.timeout, Duration::from_secs(60));
    }

    #[test]
    fn synthesis_spec_keeps_leading_dash_text_attached() {
        let spec = gateway().synthesis_spec(
            "-- Is breakfast included?",
            "en-US-JennyNeural",
            Path::new("uploads/question_2_18.mp3"),
        );
        assert!(spec
            .args
            .contains(&"--text=-- Is breakfast included?".to_string()));
        assert!(!spec.args.iter().any(|arg| arg == "--text"));
        assert!(!spec.args.iter().any(|arg| arg.starts_with("-- Is")));
    }

    #[test]
    fn transcription_spec_adds_language_only_when_hinted() {
        let audio = Path::new("uploads/answer_1_17.webm");

        let hinted = gateway().transcription_spec(audio, Some("fr"));
        assert!(hinted.args.ends_with(&["--language".to_string(), "fr".to_string()]));

        let unhinted = gateway().transcription_spec(audio, None);
        assert!(!unhinted.args.contains(&"--language".to_string()));
        assert_eq!(unhinted.args[0], "uploads/answer_1_17.webm");
        assert!(unhinted.args.contains(&"/tmp/quest-scratch".to_string()));
    }

    #[test]
    fn transcript_path_uses_audio_stem() {
        let path = gateway().transcript_path(Path::new("uploads/answer_2_99.webm"));
        assert_eq!(path, PathBuf::from("/tmp/quest-scratch/answer_2_99.txt"));
    }

    #[test]
    fn default_options() {
        let whisper = WhisperOptions::default();
        assert_eq!(whisper.command, "whisper");
        assert_eq!(whisper.model, "base");
        assert_eq!(whisper.timeout, Duration::from_secs(120));
        assert!(whisper.scratch_dir.ends_with("quest-whisper"));
    }
}
