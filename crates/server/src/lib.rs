//! HTTP endpoints for the book catalog.
//!
//! Each `POST` handler extracts the form fields, hands one
//! [`OperationRequest`] to the [`LedgerBridge`] and writes its normalized
//! response:
//!
//! | Outcome | Status | Body                                   |
//! |---------|--------|----------------------------------------|
//! | success | 200    | `{"response": <record or ack marker>}` |
//! | failure | 400    | the fault message as a JSON string     |
//!
//! The `GET` routes serve static pages from the configured pages directory.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::{any::Any, io::ErrorKind, path::PathBuf, sync::Arc};

use axum::{
    Json, Router,
    extract::{Form, State, rejection::FormRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use bookledger_bridge::{
    Book, BridgeConfig, CallContext, ConfigError, GatewayError, LedgerBridge, MemoryNetwork,
    NormalizedResponse, OperationRequest, ResponseStatus,
};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tower_http::{catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:8080";

/// Maximum accepted form body, in bytes.
pub const MAX_FORM_BYTES: usize = 16 * 1024;

/// Errors raised while starting the server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServerError {
    /// Bridge or network configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Binding or serving failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ledger network could not be prepared.
    #[error("ledger error: {0}")]
    Ledger(#[from] GatewayError),
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Bridge every operation runs through.
    pub bridge: Arc<LedgerBridge>,
    /// Directory holding `index.html`, `querybook.html` and `createbook.html`.
    pub pages_dir: PathBuf,
}

impl AppState {
    /// Creates handler state.
    #[must_use]
    pub fn new(bridge: Arc<LedgerBridge>, pages_dir: impl Into<PathBuf>) -> Self {
        Self { bridge, pages_dir: pages_dir.into() }
    }
}

/// Form fields of a book lookup.
#[derive(Debug, Deserialize)]
pub struct QueryBookForm {
    /// Title to look up.
    pub bookname: String,
    /// Location to look in.
    pub location: String,
}

/// Form fields of a book registration.
#[derive(Debug, Deserialize)]
pub struct CreateBookForm {
    /// Title of the book.
    pub bookname: String,
    /// Author of the book.
    pub author: String,
    /// Publisher of the book.
    pub publisher: String,
    /// Location holding the copy.
    pub location: String,
    /// Library holding the copy.
    pub library: String,
}

impl From<CreateBookForm> for Book {
    fn from(form: CreateBookForm) -> Self {
        Book {
            book_name: form.bookname,
            author: form.author,
            publisher: form.publisher,
            location: form.location,
            library: form.library,
        }
    }
}

/// Builds the in-process ledger network the binary serves from.
///
/// The network gets the channels declared by the configured profile plus the
/// configured channel. With `seed`, the sample catalog is committed to that
/// channel first, as the contract's `initLedger` would.
///
/// # Errors
///
/// Returns [`ServerError::Ledger`] if the sample catalog cannot be committed.
pub fn development_network(
    config: &BridgeConfig,
    seed: bool,
) -> Result<MemoryNetwork, ServerError> {
    let network = MemoryNetwork::from_profile(config.network(), config.contract());
    network.create_channel(config.channel());
    tracing::warn!(
        channel = config.channel(),
        contract = config.contract(),
        "no external ledger client is linked: serving from the IN-PROCESS development network; \
         state is NOT persisted and is lost on exit"
    );
    if seed {
        network.init_ledger(config.channel())?;
        tracing::info!(
            channel = config.channel(),
            records = network.record_count(config.channel()),
            "sample catalog committed"
        );
    }
    Ok(network)
}

/// Builds the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_page))
        .route("/healthz", get(healthz))
        .route("/api/querybook", get(querybook_page).post(query_book))
        .route("/api/querybook/", get(querybook_page).post(query_book))
        .route("/api/createbook", get(createbook_page).post(create_book))
        .route("/api/createbook/", get(createbook_page).post(create_book))
        .layer(RequestBodyLimitLayer::new(MAX_FORM_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `router(state)` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns an error if the server fails while accepting connections.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn index_page(State(state): State<AppState>) -> Response {
    page(&state, "index.html").await
}

async fn querybook_page(State(state): State<AppState>) -> Response {
    page(&state, "querybook.html").await
}

async fn createbook_page(State(state): State<AppState>) -> Response {
    page(&state, "createbook.html").await
}

async fn page(state: &AppState, name: &str) -> Response {
    let path = state.pages_dir.join(name);
    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "page not found");
            StatusCode::NOT_FOUND.into_response()
        },
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read page");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

async fn query_book(
    State(state): State<AppState>,
    form: Result<Form<QueryBookForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return reject_form(&rejection),
    };
    let request = OperationRequest::query_book(form.bookname, form.location);
    respond(state.bridge.execute(&request, &CallContext::new()).await)
}

async fn create_book(
    State(state): State<AppState>,
    form: Result<Form<CreateBookForm>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(rejection) => return reject_form(&rejection),
    };
    let request = OperationRequest::create_book(form.into());
    respond(state.bridge.execute(&request, &CallContext::new()).await)
}

fn reject_form(rejection: &FormRejection) -> Response {
    tracing::debug!(error = %rejection, "rejected form");
    (StatusCode::BAD_REQUEST, Json(Value::String(rejection.body_text()))).into_response()
}

/// Answers a request whose handler panicked, in the same shape as any other
/// failure.
fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned());
    tracing::error!(panic = %detail, "request handler panicked");
    (StatusCode::BAD_REQUEST, Json(Value::String(format!("request handler panicked: {detail}"))))
        .into_response()
}

/// Writes a bridge response as HTTP.
#[must_use]
pub fn respond(response: NormalizedResponse) -> Response {
    match response.status() {
        ResponseStatus::Ok => {
            (StatusCode::OK, Json(json!({ "response": response.into_body() }))).into_response()
        },
        ResponseStatus::RequestError => {
            (StatusCode::BAD_REQUEST, Json(response.into_body())).into_response()
        },
    }
}
