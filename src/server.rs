//! HTTP surface for the answer pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/ask` | Answer a question; responds with a server-sent event stream |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # `POST /ask`
//!
//! Request body:
//!
//! ```json
//! { "message": "What happened at City Hall yesterday?", "history": [], "show_steps": true }
//! ```
//!
//! The response is `text/event-stream`. Each pipeline update arrives as an
//! `update` event whose data is `{"answer": "...", "steps": [...]}`; the
//! `answer` field is always the complete rewritten answer so far, never a
//! diff. The stream ends with one `done` event, or with one `error` event
//! carrying the error body below. Closing the connection cancels the run.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Request validation errors are returned as a plain `400` before the stream
//! opens. Run failures use the pipeline error codes (`intent_extraction`,
//! `retrieval`, `generation_stream`) inside the `error` event.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! chat widgets.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::DeweyError;
use crate::models::ConversationTurn;
use crate::pipeline::Pipeline;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Pipeline,
}

/// Build the router without binding. Used by [`run_server`] and by tests.
pub fn router(pipeline: Pipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ask", post(handle_ask))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config, pipeline: Pipeline) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "HTTP server listening");
    println!("Dewey listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
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

impl ErrorBody {
    fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

impl From<&DeweyError> for ErrorBody {
    fn from(err: &DeweyError) -> Self {
        ErrorBody::new(err.code(), err.to_string())
    }
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    body: ErrorBody,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        body: ErrorBody::new("bad_request", message),
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

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
struct AskRequest {
    message: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
    #[serde(default = "default_show_steps")]
    show_steps: bool,
}

fn default_show_steps() -> bool {
    true
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    debug!(history = request.history.len(), show_steps = request.show_steps, "ask");

    let mut updates = Box::pin(
        state
            .pipeline
            .process(message, &request.history, request.show_steps),
    );

    let events = async_stream::stream! {
        while let Some(item) = updates.next().await {
            match item {
                Ok(update) => yield Event::default().event("update").json_data(&update),
                Err(e) => {
                    yield Event::default().event("error").json_data(ErrorBody::from(&e));
                    return;
                }
            }
        }
        yield Ok(Event::default().event("done").data("{}"));
    };

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
