//! QUEST CLI
//!
//! Main entry point for serving the QUEST practice session over HTTP.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use quest_gateway::{
    CommandSpeechGateway, OllamaCliGenerator, OllamaHttpGenerator, SpeechGateway, TextGenerator,
};
use quest_orchestrator::{
    create_router, AppState, Config, GenerationBackend, GenerationConfig, CONFIG_FILE_NAME,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 5000;

/// Default interface for the HTTP API server.
const DEFAULT_HOST: &str = "127.0.0.1";

/// QUEST - Oral Language Practice
///
/// Generates spoken practice questions on a topic, transcribes recorded
/// answers and returns spoken, rubric-based feedback.
#[derive(Parser, Debug)]
#[command(name = "quest")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: quest.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Interface to bind the HTTP API server to
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Port for the HTTP API server
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory for generated and uploaded audio
    #[arg(short, long, value_name = "DIR")]
    audio_dir: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing subscriber with appropriate filter
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("QUEST starting");
    tracing::debug!(config = ?args.config, "Config file");

    match serve(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Loads the configuration, wires the gateways and serves until Ctrl+C.
async fn serve(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides
    if let Some(ref audio_dir) = args.audio_dir {
        config.audio_dir.clone_from(audio_dir);
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    let generator = build_generator(&config.generation)?;
    let speech: Arc<dyn SpeechGateway> = Arc::new(CommandSpeechGateway::new(
        config.speech.edge_tts_options(),
        config.speech.whisper_options(),
    ));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .map_err(|e| {
            anyhow::anyhow!(
                "Invalid listen address '{}:{}': {e}\n\nSuggestion: Pass an IP address to --host",
                args.host,
                args.port
            )
        })?;

    let router = create_router(AppState::new(config, generator, speech));

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("QUEST stopped");
    Ok(())
}

/// Resolves when Ctrl+C is received.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
        Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use {CONFIG_FILE_NAME} defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Builds the text generator for the configured backend.
fn build_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn TextGenerator>> {
    let generator: Arc<dyn TextGenerator> = match config.backend {
        GenerationBackend::Http => Arc::new(
            OllamaHttpGenerator::new(&config.url, &config.model, config.timeout()).map_err(
                |e| anyhow::anyhow!("Failed to create generation client: {e}"),
            )?,
        ),
        GenerationBackend::Cli => Arc::new(OllamaCliGenerator::new(
            &config.command,
            &config.model,
            config.timeout(),
        )),
    };
    Ok(generator)
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Audio directory: {}", config.audio_dir);
    println!("  Log directory: {}", config.log_dir);
    println!("  Default language: {}", config.default_language);
    println!("  Max question attempts: {}", config.max_question_attempts);
    println!(
        "  Generation: {:?} ({}), timeout {}s",
        config.generation.backend, config.generation.model, config.generation.timeout_secs
    );
    println!(
        "  Speech: {} / {} ({})",
        config.speech.tts_command, config.speech.whisper_command, config.speech.whisper_model
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["quest"]).unwrap();
        assert_eq!(args.host, "127.0.0.1");
        assert_eq!(args.port, 5000);
        assert!(args.config.is_none());
        assert!(args.audio_dir.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_overrides() {
        let args = Args::try_parse_from([
            "quest",
            "--config",
            "custom.json",
            "--host",
            "0.0.0.0",
            "-p",
            "8080",
            "--audio-dir",
            "/tmp/audio",
            "-v",
        ])
        .unwrap();
        assert_eq!(args.config.as_deref(), Some("custom.json"));
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8080);
        assert_eq!(args.audio_dir.as_deref(), Some("/tmp/audio"));
        assert!(args.verbose);
    }

    #[test]
    fn test_load_config_missing_file_is_an_error() {
        let err = load_config(Some("/nonexistent/quest.json")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_build_generator_for_each_backend() {
        let mut config = GenerationConfig::default();
        assert!(build_generator(&config).is_ok());

        config.backend = GenerationBackend::Cli;
        assert!(build_generator(&config).is_ok());
    }
}
