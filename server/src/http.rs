//! HTTP routes over the registry.
//!
//! | route                     | success                    | failure                      |
//! |---------------------------|----------------------------|------------------------------|
//! | `GET /info`               | project name and version   |                              |
//! | `GET /resolve/{name}`     | `TermRecord`               | 404 unknown, 500 fault       |
//! | `GET /resolve/{name}/doc` | `TermDoc`                  | 404 unknown, 500 fault       |
//! | `POST /assign`            | `{"result":"complete"}`    | 409 existing line, 500 fault |
//!
//! Registry calls are synchronous and run on the blocking pool, one task per
//! request.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{ConnectInfo, Json, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use lexicon_registry::{Lexicon, LexiconError, TermStore};
use lexicon_types::{Ack, TermDefinition, TermDoc, TermName, TermRecord};

const PROJECT_NAME: &str = "Lexicon";

pub fn router<S: TermStore + 'static>(lexicon: Arc<Lexicon<S>>) -> Router {
    Router::new()
        .route("/info", get(info))
        .route("/resolve/{name}", get(resolve_term::<S>))
        .route("/resolve/{name}/doc", get(resolve_doc::<S>))
        .route("/assign", post(assign_term::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(lexicon)
}

#[derive(Debug, Serialize)]
struct Info {
    project_name: &'static str,
    version: &'static str,
}

async fn info() -> Json<Info> {
    Json(Info {
        project_name: PROJECT_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn resolve_term<S: TermStore + 'static>(
    State(lexicon): State<Arc<Lexicon<S>>>,
    Path(name): Path<String>,
) -> Result<Json<TermRecord>, ApiError> {
    let name = TermName::new(name).map_err(|_| ApiError::BlankName)?;
    let record = on_registry(&lexicon, move |lex| lex.resolve(&name)).await?;
    Ok(Json(record))
}

async fn resolve_doc<S: TermStore + 'static>(
    State(lexicon): State<Arc<Lexicon<S>>>,
    Path(name): Path<String>,
) -> Result<Json<TermDoc>, ApiError> {
    let name = TermName::new(name).map_err(|_| ApiError::BlankName)?;
    let doc = on_registry(&lexicon, move |lex| lex.resolve_doc(&name)).await?;
    Ok(Json(doc))
}

async fn assign_term<S: TermStore + 'static>(
    State(lexicon): State<Arc<Lexicon<S>>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(mut term): Json<TermDefinition>,
) -> Result<Json<Ack>, ApiError> {
    term.ip_addr = Some(peer.ip().to_string());
    let ack = on_registry(&lexicon, move |lex| lex.assign(&term)).await?;
    Ok(Json(ack))
}

async fn on_registry<S, T, F>(lexicon: &Arc<Lexicon<S>>, op: F) -> Result<T, ApiError>
where
    S: TermStore + 'static,
    T: Send + 'static,
    F: FnOnce(&Lexicon<S>) -> Result<T, LexiconError> + Send + 'static,
{
    let lexicon = Arc::clone(lexicon);
    let outcome = tokio::task::spawn_blocking(move || op(&lexicon))
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?;
    Ok(outcome?)
}

#[derive(Debug)]
enum ApiError {
    Lexicon(LexiconError),
    BlankName,
    Task(String),
}

impl From<LexiconError> for ApiError {
    fn from(err: LexiconError) -> Self {
        Self::Lexicon(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Lexicon(LexiconError::Conflict { line }) => {
                (StatusCode::CONFLICT, line).into_response()
            }
            ApiError::Lexicon(err) => {
                let status = if err.is_server_fault() {
                    StatusCode::INTERNAL_SERVER_ERROR
                } else {
                    StatusCode::NOT_FOUND
                };
                let message = match err {
                    LexiconError::IntegrityViolation { .. } => {
                        "the lexicon holds conflicting definitions for this term".to_string()
                    }
                    other => other.to_string(),
                };
                error_body(status, message)
            }
            ApiError::BlankName => error_body(
                StatusCode::BAD_REQUEST,
                "term name must not be empty".to_string(),
            ),
            ApiError::Task(detail) => {
                tracing::error!(error = %detail, "Registry task failed");
                error_body(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "registry task failed".to_string(),
                )
            }
        }
    }
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
