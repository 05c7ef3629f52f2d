//! HTTP API endpoints for the QUEST orchestrator.
//!
//! This module provides the REST API used by the browser client.
//!
//! # Endpoints
//!
//! - `POST /generate_question` - Generate and narrate a new question
//! - `POST /transcribe` - Upload and transcribe a recorded answer
//! - `POST /feedback` - Evaluate an answer against the active question
//! - `POST /clear` - Reset the session and delete all audio
//! - `GET /status` - Get the current session state
//! - `GET /audio/{name}` - Download a generated or uploaded audio file
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use quest_gateway::{CommandSpeechGateway, OllamaCliGenerator};
//! use quest_orchestrator::{create_router, AppState, Config};
//!
//! # async fn example() {
//! let config = Config::default();
//! let generator = Arc::new(OllamaCliGenerator::new(
//!     "ollama",
//!     "llama3.2",
//!     config.generation.timeout(),
//! ));
//! let state = AppState::new(config, generator, Arc::new(CommandSpeechGateway::default()));
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use quest_gateway::{SpeechGateway, TextGenerator};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    Config, ErrorKind, FeedbackOutcome, Language, Orchestrator, QuestError, QuestionOutcome,
    RequestedLanguage, SessionSnapshot, TranscriptionOutcome, ValidationIssue,
};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /generate_question`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateQuestionRequest {
    /// Topic the question should be about.
    #[serde(default)]
    pub topic: Option<String>,
    /// Language code, e.g. `de`.
    #[serde(default)]
    pub language: Option<String>,
}

/// Request body for `POST /feedback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackRequest {
    /// The learner's (possibly edited) answer.
    #[serde(default)]
    pub transcription: Option<String>,
    /// Language code; defaults to the question's language.
    #[serde(default)]
    pub language: Option<String>,
}

/// Response body for `POST /clear`.
///
/// Every field is empty; the client uses it to reset its form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearResponse {
    /// Cleared question.
    pub question: String,
    /// Cleared transcription.
    pub transcription: String,
    /// Cleared feedback.
    pub feedback: String,
    /// Cleared topic.
    pub topic: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Localized description of the error.
    pub error: String,
    /// Machine-readable error category.
    pub kind: ErrorKind,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration for the server.
    pub config: Config,
    /// The session orchestrator.
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Creates a new `AppState` with an idle session.
    #[must_use]
    pub fn new(
        config: Config,
        generator: Arc<dyn TextGenerator>,
        speech: Arc<dyn SpeechGateway>,
    ) -> Self {
        let orchestrator = Orchestrator::from_config(&config, generator, speech);
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Converts an orchestrator error into a localized API error.
    fn reject(&self, err: QuestError, language: &RequestedLanguage) -> ApiError {
        let language = self.orchestrator.message_language(language);
        ApiError::from_quest(&err, language)
    }

    /// Converts an unreadable JSON body into a localized validation error.
    fn reject_body(&self, rejection: &JsonRejection) -> ApiError {
        warn!(
            status = %rejection.status(),
            error = %rejection.body_text(),
            "Malformed request body"
        );
        let language = self.orchestrator.message_language(&RequestedLanguage::Unspecified);
        ApiError::malformed(StatusCode::BAD_REQUEST, language)
    }

    /// Converts a broken multipart stream into a localized validation error.
    ///
    /// Keeps the multipart status so oversized uploads still report 413.
    fn reject_upload(&self, err: &MultipartError) -> ApiError {
        warn!(error = %err, "Malformed upload");
        let language = self.orchestrator.message_language(&RequestedLanguage::Unspecified);
        ApiError::malformed(err.status(), language)
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// Maps a `QuestError` to a status code and localized body.
    ///
    /// Validation and lifecycle conflicts are the caller's fault (400);
    /// everything else is reported as a server failure (500).
    #[must_use]
    pub fn from_quest(err: &QuestError, language: Language) -> Self {
        let status = if err.is_client_error() {
            warn!(error = %err, "Request rejected");
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %err, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        Self {
            status,
            body: ErrorResponse {
                error: err.user_message(language),
                kind: err.kind(),
            },
        }
    }

    fn malformed(status: StatusCode, language: Language) -> Self {
        let err = QuestError::validation(ValidationIssue::MalformedRequest);
        Self {
            status,
            body: ErrorResponse {
                error: err.user_message(language),
                kind: err.kind(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// # Arguments
///
/// * `state` - The shared application state
///
/// # Returns
///
/// An axum `Router` configured with:
/// - The session routes at the root
/// - Static serving of `audioDir` under `/audio`
/// - An upload size limit of `maxUploadBytes`
/// - CORS middleware for the browser client
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS for the browser client (allow all origins)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let audio = ServeDir::new(&state.config.audio_dir);
    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/generate_question", post(handle_generate_question))
        .route("/transcribe", post(handle_transcribe))
        .route("/feedback", post(handle_feedback))
        .route("/clear", post(handle_clear))
        .route("/status", get(handle_status))
        .nest_service("/audio", audio)
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `POST /generate_question`.
async fn handle_generate_question(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateQuestionRequest>, JsonRejection>,
) -> Result<Json<QuestionOutcome>, ApiError> {
    let Json(request) = payload.map_err(|rejection| state.reject_body(&rejection))?;
    let language = RequestedLanguage::parse(request.language.as_deref());
    let topic = request.topic.unwrap_or_default();
    info!(topic = %topic, language = ?language, "Question requested");

    match state
        .orchestrator
        .generate_question(&topic, &language)
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err(state.reject(e, &language)),
    }
}

/// Handler for `POST /transcribe`.
///
/// Expects a multipart form with an `audio` file field and an optional
/// `language` text field. Other fields are ignored.
async fn handle_transcribe(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TranscriptionOutcome>, ApiError> {
    let mut audio: Option<(Option<String>, Vec<u8>)> = None;
    let mut language_code: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| state.reject_upload(&e))?
    {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some("audio") => {
                let filename = field.file_name().map(ToString::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| state.reject_upload(&e))?;
                audio = Some((filename, bytes.to_vec()));
            }
            Some("language") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| state.reject_upload(&e))?;
                language_code = Some(text);
            }
            _ => {}
        }
    }

    let language = RequestedLanguage::parse(language_code.as_deref());
    let Some((filename, bytes)) = audio else {
        let err = QuestError::validation(ValidationIssue::MissingAudio);
        return Err(state.reject(err, &language));
    };
    info!(bytes = bytes.len(), language = ?language, "Answer uploaded");

    match state
        .orchestrator
        .transcribe_answer(&bytes, filename.as_deref(), &language)
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err(state.reject(e, &language)),
    }
}

/// Handler for `POST /feedback`.
async fn handle_feedback(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackOutcome>, ApiError> {
    let Json(request) = payload.map_err(|rejection| state.reject_body(&rejection))?;
    let language = RequestedLanguage::parse(request.language.as_deref());
    let transcription = request.transcription.unwrap_or_default();
    info!(chars = transcription.len(), language = ?language, "Feedback requested");

    match state
        .orchestrator
        .produce_feedback(&transcription, &language)
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err(state.reject(e, &language)),
    }
}

/// Handler for `POST /clear`.
async fn handle_clear(State(state): State<Arc<AppState>>) -> Json<ClearResponse> {
    let outcome = state.orchestrator.reset().await;
    info!(removed = outcome.removed_artifacts, "Session cleared");
    Json(ClearResponse::default())
}

/// Handler for `GET /status`.
async fn handle_status(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.orchestrator.snapshot())
}
