//! HTTP chat server.
//!
//! Serves a single chat session over a JSON API: upload a PDF, ask
//! questions about it, listen to the latest answer and download the
//! transcript.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/document` | Multipart PDF upload (field `file`) |
//! | `DELETE` | `/document` | Forget the document and the conversation |
//! | `POST`   | `/chat/ask` | Ask a question about the document |
//! | `GET`    | `/chat/history` | Turns, latest first |
//! | `DELETE` | `/chat/history` | Clear the conversation |
//! | `GET`    | `/chat/export` | Transcript as a `text/plain` attachment |
//! | `GET`    | `/chat/audio` | Latest answer as an audio data URI |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_document", "message": "no document has been processed yet; upload a PDF first" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `no_document` (409),
//! `upstream_unavailable` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser page served
//! from elsewhere can drive the chat.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ChatError;
use crate::extract::is_pdf_upload;
use crate::session::{AskOutcome, ChatSession, HistoryEntry, Services, UploadSummary};
use crate::store::StoreError;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Shared application state. The mutex admits one interaction at a time.
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<ChatSession>>,
}

/// Starts the chat server on `[server].bind` and runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let services = Services::from_config(config)?;
    let session = ChatSession::new(config.clone(), services);
    let app = router(session);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("ChatMuse listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router around a session.
pub fn router(session: ChatSession) -> Router {
    let state = AppState {
        session: Arc::new(Mutex::new(session)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/document",
            post(handle_upload)
                .delete(handle_new_document)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/chat/ask", post(handle_ask))
        .route("/chat/history", get(handle_history).delete(handle_clear_chat))
        .route("/chat/export", get(handle_export))
        .route("/chat/audio", get(handle_audio))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    app_error(StatusCode::NOT_FOUND, "not_found", message)
}

fn upstream(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_GATEWAY, "upstream_unavailable", message)
}

/// Map a session error onto the error contract by walking its cause chain
/// for a typed error.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let (status, code) = err
            .chain()
            .find_map(|cause| {
                if let Some(chat) = cause.downcast_ref::<ChatError>() {
                    return Some(match chat {
                        ChatError::NoDocument => (StatusCode::CONFLICT, "no_document"),
                        ChatError::EmptyDocument(_) | ChatError::Pdf(_) => {
                            (StatusCode::BAD_REQUEST, "bad_request")
                        }
                        ChatError::Upstream { .. } => {
                            (StatusCode::BAD_GATEWAY, "upstream_unavailable")
                        }
                        ChatError::ModelMismatch { .. } => {
                            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                        }
                    });
                }
                cause.downcast_ref::<StoreError>().map(|store| match store {
                    StoreError::CollectionNotFound(_) => (StatusCode::CONFLICT, "no_document"),
                    StoreError::Connectivity { .. } | StoreError::Api { .. } => {
                        (StatusCode::BAD_GATEWAY, "upstream_unavailable")
                    }
                    StoreError::DimensionMismatch { .. } | StoreError::InvalidResponse(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                    }
                })
            })
            .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "internal"));

        let message = format!("{:#}", err);
        if status.is_server_error() {
            warn!("Request failed: {}", message);
        }
        app_error(status, code, message)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /document ============

/// Handler for `POST /document`.
///
/// Reads the `file` field of a multipart form. Anything that is not a PDF
/// (by content type or extension) is rejected before the session is touched.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadSummary>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
        if !is_pdf_upload(&file_name, field.content_type()) {
            return Err(bad_request(format!("'{}' is not a PDF", file_name)));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("Failed to read file: {e}")))?;

        info!("Upload '{}' ({} bytes)", file_name, bytes.len());
        let mut session = state.session.lock().await;
        let summary = session.upload_pdf(&file_name, &bytes).await?;
        return Ok(Json(summary));
    }

    Err(bad_request("No file provided (expected multipart field 'file')"))
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
}

/// Handler for `DELETE /document`.
async fn handle_new_document(State(state): State<AppState>) -> Json<StatusResponse> {
    state.session.lock().await.new_document();
    Json(StatusResponse {
        status: "reset".to_string(),
    })
}

// ============ /chat ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    /// `answered`, `duplicate` or `ignored`.
    status: String,
    question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    audio: Option<String>,
}

/// Handler for `POST /chat/ask`.
///
/// A voice rendering failure does not fail the request; the answer is
/// returned without audio.
async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let mut session = state.session.lock().await;
    let question = req.question.trim().to_string();

    let response = match session.ask(&question).await? {
        AskOutcome::Ignored => AskResponse {
            status: "ignored".to_string(),
            question,
            answer: None,
            audio: None,
        },
        AskOutcome::Duplicate => AskResponse {
            status: "duplicate".to_string(),
            question,
            answer: None,
            audio: None,
        },
        AskOutcome::Answered(turn) => AskResponse {
            status: "answered".to_string(),
            audio: session.try_speak_latest().await,
            question: turn.question,
            answer: Some(turn.answer),
        },
    };

    Ok(Json(response))
}

#[derive(Serialize)]
struct HistoryResponse {
    pdf_processed: bool,
    turns: Vec<HistoryEntry>,
}

/// Handler for `GET /chat/history`.
async fn handle_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let session = state.session.lock().await;
    Json(HistoryResponse {
        pdf_processed: session.state().pdf_processed,
        turns: session.history_view(),
    })
}

/// Handler for `DELETE /chat/history`.
async fn handle_clear_chat(State(state): State<AppState>) -> Json<StatusResponse> {
    state.session.lock().await.clear_chat();
    Json(StatusResponse {
        status: "cleared".to_string(),
    })
}

/// Handler for `GET /chat/export`.
async fn handle_export(State(state): State<AppState>) -> Result<Response, AppError> {
    let export = state
        .session
        .lock()
        .await
        .export_history()
        .ok_or_else(|| not_found("no chat history to export"))?;

    let disposition = format!("attachment; filename=\"{}\"", export.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.contents,
    )
        .into_response())
}

#[derive(Serialize)]
struct AudioResponse {
    audio: Option<String>,
}

/// Handler for `GET /chat/audio`.
async fn handle_audio(State(state): State<AppState>) -> Result<Json<AudioResponse>, AppError> {
    let session = state.session.lock().await;
    let audio = session
        .speak_latest()
        .await
        .map_err(|e| upstream(format!("{:#}", e)))?;
    Ok(Json(AudioResponse { audio }))
}
