//! End-to-end integration tests for the QUEST HTTP surface.
//!
//! These tests serve the real router on an ephemeral port with scripted
//! gateways and drive a whole practice session through an HTTP client.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quest_gateway::testing::{FakeSpeech, ScriptedGenerator};
use quest_orchestrator::{create_router, AppState, Config, GenerationBackend, Language};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

const FEEDBACK_DE: &str = "**Genauigkeit:** Korrekt.\n**Flüssigkeit:** Gut.\n\
                           **Interaktion:** Höflich.\n**Kohärenz:** Klar.\n\
                           **Spektrum:** Ausreichend.\n**Gesamtniveau (GER):** A2\n\
                           **Verbesserungsvorschläge:** Nenne die Uhrzeit.";

/// Path to the test fixtures.
fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// A running test server and the directory holding its files.
struct TestServer {
    base_url: String,
    client: reqwest::Client,
    dir: TempDir,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Request failed");
        let status = response.status();
        let body = response.json().await.expect("Response is not JSON");
        (status, body)
    }

    async fn status(&self) -> Value {
        self.client
            .get(self.url("/status"))
            .send()
            .await
            .expect("Request failed")
            .json()
            .await
            .expect("Response is not JSON")
    }

    fn audio_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    fn log(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).unwrap_or_default()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawns the router on an ephemeral port.
async fn spawn_test_server(generator: ScriptedGenerator, speech: FakeSpeech) -> TestServer {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = Config {
        audio_dir: dir.path().join("uploads").to_string_lossy().into_owned(),
        log_dir: dir.path().to_string_lossy().into_owned(),
        ..Config::default()
    };
    let state = AppState::new(config, Arc::new(generator), Arc::new(speech));
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    TestServer {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build client"),
        dir,
        handle,
    }
}

fn recording(bytes: &[u8], filename: &str, language: Option<&str>) -> Form {
    let form = Form::new().part(
        "audio",
        Part::bytes(bytes.to_vec()).file_name(filename.to_string()),
    );
    match language {
        Some(code) => form.text("language", code.to_string()),
        None => form,
    }
}

/// Tests a complete session: question, recording, feedback, reset.
#[tokio::test]
async fn test_full_practice_session() {
    let server = spawn_test_server(
        ScriptedGenerator::with_replies(["\"Wann fährt der nächste Zug nach Hamburg?\"", FEEDBACK_DE]),
        FakeSpeech::transcribing("Der nächste Zug fährt um zehn Uhr."),
    )
    .await;

    // Idle at start
    let status = server.status().await;
    assert_eq!(status["stage"], "idle");

    // Question
    let (code, question) = server
        .post_json("/generate_question", &json!({"topic": "Bahnhof", "language": "de"}))
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(question["question"], "Wann fährt der nächste Zug nach Hamburg?");
    assert_eq!(question["sequence"], 1);

    let audio_name = question["audio"].as_str().expect("audio name").to_string();
    let audio = server
        .client
        .get(server.url(&format!("/audio/{audio_name}")))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(audio.status(), StatusCode::OK);
    let bytes = audio.bytes().await.expect("audio body");
    assert_eq!(
        &bytes[..],
        "FAKEAUDIO:de-DE-KatjaNeural:Wann fährt der nächste Zug nach Hamburg?".as_bytes()
    );

    // Answer
    let response = server
        .client
        .post(server.url("/transcribe"))
        .multipart(recording(b"webm-bytes", "antwort.webm", Some("de")))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::OK);
    let transcript: Value = response.json().await.expect("Response is not JSON");
    assert_eq!(transcript["transcription"], "Der nächste Zug fährt um zehn Uhr.");
    assert_eq!(transcript["speech_detected"], true);
    let saved = transcript["saved_audio"].as_str().expect("saved audio");
    assert!(server.audio_dir().join(saved).exists());

    // Feedback, in the question's language
    let (code, feedback) = server
        .post_json(
            "/feedback",
            &json!({"transcription": transcript["transcription"]}),
        )
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(feedback["feedback"], FEEDBACK_DE);
    assert_eq!(feedback["question"], question["question"]);
    assert_eq!(feedback["sequence"], 1);

    let status = server.status().await;
    assert_eq!(status["stage"], "answered");
    assert_eq!(status["question_language"], "de");

    // Audit logs
    assert_eq!(
        server.log("questions_log.txt"),
        "Question 1: Wann fährt der nächste Zug nach Hamburg?\n"
    );
    assert_eq!(
        server.log("responses_log.txt"),
        "Answer to question 1: Der nächste Zug fährt um zehn Uhr.\n"
    );
    assert!(server
        .log("feedback_log.txt")
        .starts_with("Feedback for question 1: **Genauigkeit:**"));

    // Reset
    let (code, cleared) = server.post_json("/clear", &json!({})).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(
        cleared,
        json!({"question": "", "transcription": "", "feedback": "", "topic": ""})
    );

    let status = server.status().await;
    assert_eq!(status["stage"], "idle");
    assert_eq!(status["sequence_number"], 0);
    assert_eq!(status["asked_count"], 0);

    let remaining = std::fs::read_dir(server.audio_dir())
        .map(Iterator::count)
        .unwrap_or(0);
    assert_eq!(remaining, 0);

    let audio = server
        .client
        .get(server.url(&format!("/audio/{audio_name}")))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(audio.status(), StatusCode::NOT_FOUND);
}

/// Tests that concurrent question requests are serialized.
#[tokio::test]
async fn test_concurrent_questions_get_distinct_sequence_numbers() {
    let server = spawn_test_server(
        ScriptedGenerator::with_replies(["Is breakfast included?", "Is there parking?"])
            .with_delay(Duration::from_millis(30)),
        FakeSpeech::new(),
    )
    .await;
    let body = json!({"topic": "hotel", "language": "en"});

    let (first, second) = tokio::join!(
        server.post_json("/generate_question", &body),
        server.post_json("/generate_question", &body),
    );

    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);
    let mut sequences = [
        first.1["sequence"].as_u64().expect("sequence"),
        second.1["sequence"].as_u64().expect("sequence"),
    ];
    sequences.sort_unstable();
    assert_eq!(sequences, [1, 2]);
    assert_ne!(first.1["question"], second.1["question"]);

    let status = server.status().await;
    assert_eq!(status["sequence_number"], 2);
    assert_eq!(status["stage"], "question_ready");
}

/// Tests that a repeated question is never issued twice.
#[tokio::test]
async fn test_repeated_questions_exhaust_attempts() {
    let server = spawn_test_server(
        ScriptedGenerator::repeating("Où est la gare ?"),
        FakeSpeech::new(),
    )
    .await;
    let body = json!({"topic": "gare", "language": "fr"});

    let (code, _) = server.post_json("/generate_question", &body).await;
    assert_eq!(code, StatusCode::OK);

    let (code, error) = server.post_json("/generate_question", &body).await;
    assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error["kind"], "no_novel_question");
    assert_eq!(
        error["error"],
        "Impossible de générer une nouvelle question. Veuillez essayer un autre thème."
    );

    // The first question is still active
    let status = server.status().await;
    assert_eq!(status["active_question"], "Où est la gare ?");
    assert_eq!(status["sequence_number"], 1);
}

/// Tests the errors a client sees when calling out of order.
#[tokio::test]
async fn test_client_errors() {
    let server = spawn_test_server(ScriptedGenerator::new(), FakeSpeech::new()).await;

    let (code, error) = server
        .post_json("/feedback", &json!({"transcription": "Hallo"}))
        .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(error["kind"], "state_conflict");
    assert_eq!(error["error"], "Es wurde noch keine Frage gestellt.");

    let (code, error) = server
        .post_json("/generate_question", &json!({"language": "en"}))
        .await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "Please enter a topic first.");

    let response = server
        .client
        .post(server.url("/transcribe"))
        .multipart(Form::new().text("language", "fr"))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: Value = response.json().await.expect("Response is not JSON");
    assert_eq!(error["error"], "Aucun fichier audio transmis.");
}

/// Tests that an unknown language still runs with fallback voices.
#[tokio::test]
async fn test_unknown_language_falls_back() {
    let server = spawn_test_server(
        ScriptedGenerator::with_replies(["¿Dónde está el andén?", "**Accuracy:** ok"]),
        FakeSpeech::new(),
    )
    .await;

    let (code, question) = server
        .post_json("/generate_question", &json!({"topic": "tren", "language": "es"}))
        .await;
    assert_eq!(code, StatusCode::OK);

    let audio = server
        .client
        .get(server.url(&format!(
            "/audio/{}",
            question["audio"].as_str().expect("audio name")
        )))
        .send()
        .await
        .expect("Request failed")
        .text()
        .await
        .expect("audio body");
    assert!(audio.starts_with("FAKEAUDIO:en-US-JennyNeural:"));

    let (code, feedback) = server
        .post_json(
            "/feedback",
            &json!({"transcription": "En el andén dos.", "language": "es"}),
        )
        .await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(feedback["feedback"], "**Accuracy:** ok");

    let status = server.status().await;
    assert_eq!(status["question_language"], Value::Null);
}

/// Tests that the sample config loads successfully.
#[test]
fn test_sample_config_loads() {
    let config_path = fixture_path().join("quest.json");
    assert!(
        config_path.exists(),
        "Config fixture not found at: {config_path:?}"
    );

    let config = Config::load_from_file(&config_path).expect("Failed to load config");

    assert_eq!(config.audio_dir, "uploads");
    assert_eq!(config.log_dir, "logs");
    assert_eq!(config.max_question_attempts, 5);
    assert_eq!(config.default_language, Language::English);
    assert_eq!(config.max_upload_bytes, 1_048_576);
    assert_eq!(config.generation.backend, GenerationBackend::Cli);
    assert_eq!(config.generation.model, "mistral");
    assert_eq!(config.generation.timeout_secs, 30);
    assert_eq!(config.speech.whisper_model, "small");
    assert_eq!(config.speech.tts_command, "edge-tts");
    assert_eq!(config.speech.transcription_timeout_secs, 90);
}
