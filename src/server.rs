//! JSON HTTP API over the chat controller.
//!
//! Each browser tab or client creates its own session; history lives in
//! server memory until the session is deleted or the process exits.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/sessions` | Start a session, returns its id |
//! | `DELETE` | `/sessions/{id}` | End a session |
//! | `POST`   | `/sessions/{id}/turns` | Ask a question |
//! | `GET`    | `/sessions/{id}/history` | All turns so far |
//! | `GET`    | `/sessions/{id}/export.txt` | Plain-text transcript |
//! | `GET`    | `/sessions/{id}/export.csv` | CSV log |
//! | `POST`   | `/documents` | Upload and index files |
//! | `POST`   | `/index/rebuild` | Rebuild from the data directory |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream` (502),
//! `internal` (500).
//!
//! A server answers one question at a time: turns queue on a single gate.
//! The session table lock is only held to look a session up, so creating,
//! deleting and reading other sessions never waits on the model.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::chat::{AnswerMode, ChatController};
use crate::config::Config;
use crate::index::IndexClient;
use crate::ingest::{ingest_uploads, rebuild_from_directory};
use crate::models::{Document, UploadedFile};
use crate::session::{ChatSession, TurnPhase};

/// Characters of each retrieved document returned as a citation excerpt.
const EXCERPT_CHARS: usize = 300;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    controller: Arc<ChatController>,
    index: IndexClient,
    data_dir: PathBuf,
    sessions: Arc<Mutex<HashMap<String, SharedSession>>>,
    turn_gate: Arc<Mutex<()>>,
}

type SharedSession = Arc<Mutex<ChatSession>>;

impl AppState {
    pub fn new(controller: ChatController, index: IndexClient, data_dir: PathBuf) -> Self {
        Self {
            controller: Arc::new(controller),
            index,
            data_dir,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            turn_gate: Arc::new(Mutex::new(())),
        }
    }

    async fn session(&self, id: &str) -> Result<SharedSession, AppError> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| session_not_found(id))
    }
}

/// Connect to the configured backends and serve until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let (controller, index) = ChatController::from_config(config).await?;
    let state = AppState::new(controller, index, config.ingest.data_dir.clone());
    serve(state, &config.server.bind).await
}

/// Serve `state` on `bind_addr`.
pub async fn serve(state: AppState, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "chat server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route("/sessions/{id}/turns", post(handle_turn))
        .route("/sessions/{id}/history", get(handle_history))
        .route("/sessions/{id}/export.txt", get(handle_export_txt))
        .route("/sessions/{id}/export.csv", get(handle_export_csv))
        .route("/documents", post(handle_upload))
        .route("/index/rebuild", post(handle_rebuild))
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
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Embedding, vector store or model failures.
fn upstream_error(err: anyhow::Error) -> AppError {
    warn!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream",
        message: format!("{:#}", err),
    }
}

fn internal_error(err: anyhow::Error) -> AppError {
    warn!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: format!("{:#}", err),
    }
}

fn session_not_found(id: &str) -> AppError {
    not_found(format!("no session with id: {}", id))
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

// ============ Sessions ============

#[derive(Serialize)]
struct SessionCreated {
    session_id: String,
    greeting: String,
}

async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionCreated>) {
    let id = uuid::Uuid::new_v4().to_string();
    state
        .sessions
        .lock()
        .await
        .insert(id.clone(), Arc::new(Mutex::new(ChatSession::new())));
    info!(session = %id, "session started");
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: id,
            greeting: "Hello! Ask me anything about Ancient Greece.".to_string(),
        }),
    )
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .lock()
        .await
        .remove(&id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| session_not_found(&id))
}

// ============ POST /sessions/{id}/turns ============

#[derive(Deserialize)]
struct TurnRequest {
    question: String,
    #[serde(default = "default_rag")]
    rag: bool,
}

fn default_rag() -> bool {
    true
}

#[derive(Serialize)]
struct SourceView {
    source: String,
    excerpt: String,
}

impl From<&Document> for SourceView {
    fn from(doc: &Document) -> Self {
        Self {
            source: doc.source().to_string(),
            excerpt: doc.excerpt(EXCERPT_CHARS),
        }
    }
}

#[derive(Serialize)]
struct TurnResponse {
    turn: usize,
    question: String,
    answer: String,
    timestamp: String,
    latency_ms: u64,
    sources: Vec<SourceView>,
}

async fn handle_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let session = state.session(&id).await?;
    let _turn = state.turn_gate.lock().await;
    let mut session = session.lock().await;
    let outcome = state
        .controller
        .handle_turn(&mut session, question, AnswerMode::from_rag_flag(req.rag))
        .await
        .map_err(upstream_error)?;

    Ok(Json(TurnResponse {
        turn: outcome.turn_index,
        question: question.to_string(),
        answer: outcome.answer,
        timestamp: outcome.timestamp,
        latency_ms: outcome.latency.as_millis() as u64,
        sources: outcome.retrieved_docs.iter().map(SourceView::from).collect(),
    }))
}

// ============ GET /sessions/{id}/history ============

#[derive(Serialize)]
struct TurnView {
    question: String,
    answer: String,
    timestamp: String,
    answered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<SourceView>>,
}

#[derive(Serialize)]
struct HistoryResponse {
    phase: TurnPhase,
    turns: Vec<TurnView>,
}

async fn handle_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    let turns = session
        .history()
        .iter()
        .map(|turn| TurnView {
            question: turn.question.clone(),
            answer: turn.answer().to_string(),
            timestamp: turn.timestamp.clone(),
            answered: turn.is_answered(),
            latency_ms: turn.latency().map(|d| d.as_millis() as u64),
            sources: turn
                .retrieved_docs()
                .map(|docs| docs.iter().map(SourceView::from).collect()),
        })
        .collect();
    Ok(Json(HistoryResponse {
        phase: session.phase(),
        turns,
    }))
}

// ============ Exports ============

async fn handle_export_txt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(attachment(
        "text/plain; charset=utf-8",
        "chat_history.txt",
        session.export_transcript(),
    ))
}

async fn handle_export_csv(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(attachment(
        "text/csv; charset=utf-8",
        "chat_log.csv",
        session.export_csv().map_err(internal_error)?,
    ))
}

fn attachment(content_type: &'static str, filename: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct UploadRequest {
    files: Vec<UploadFileBody>,
}

#[derive(Deserialize)]
struct UploadFileBody {
    name: String,
    content_base64: String,
}

#[derive(Serialize)]
struct UploadResponse {
    files: usize,
    indexed: usize,
    skipped: Vec<String>,
}

async fn handle_upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<UploadResponse>, AppError> {
    if req.files.is_empty() {
        return Err(bad_request("files must not be empty"));
    }
    let mut files = Vec::with_capacity(req.files.len());
    for f in req.files {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(f.content_base64.as_bytes())
            .map_err(|e| bad_request(format!("{}: invalid base64: {}", f.name, e)))?;
        files.push(UploadedFile::new(f.name, bytes));
    }

    let summary = ingest_uploads(&state.index, &files)
        .await
        .map_err(upstream_error)?;
    Ok(Json(UploadResponse {
        files: summary.files,
        indexed: summary.indexed,
        skipped: summary.skipped,
    }))
}

// ============ POST /index/rebuild ============

#[derive(Serialize)]
struct RebuildResponse {
    indexed: usize,
}

async fn handle_rebuild(
    State(state): State<AppState>,
) -> Result<Json<RebuildResponse>, AppError> {
    let indexed = rebuild_from_directory(&state.index, &state.data_dir)
        .await
        .map_err(upstream_error)?;
    Ok(Json(RebuildResponse { indexed }))
}
