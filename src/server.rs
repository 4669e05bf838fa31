//! HTTP server proxying the Notion API for the notes front-end.
//!
//! The front-end never talks to Notion directly: it passes the user's
//! access token to these routes, which forward the call and reshape the
//! response.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/notion/callback` | OAuth code exchange, redirects to the app |
//! | `GET`  | `/api/notion/connection` | Whether the bearer token is valid |
//! | `GET`  | `/api/notion/databases` | Databases shared with the integration |
//! | `GET`  | `/api/notion/databases/{id}` | One database's id and title |
//! | `GET`  | `/api/notion/workspace` | Workspace name and icon |
//! | `POST` | `/api/notion/save-notes` | Create or append to a page |
//! | `POST` | `/api/notes/blocks` | Convert content to blocks without saving |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "unauthorized", "message": "No authorization header" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `upstream_error` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser front-end
//! can be served from a different origin.

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use notes_export_core::models::{Block, Note};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::credentials::{NotionConnection, NotionCredentials};
use crate::export::{
    build_blocks, save_notes, DatabaseSchema, ExportMode, ExportOptions, ExportRequest, SaveTarget,
};
use crate::notion::{check_connection, NotionApi, NotionClient, NotionError};
use crate::oauth::{callback_redirect, handle_callback};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Build the router with all routes and CORS.
pub fn router(config: Config) -> Router {
    let state = AppState {
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/notion/callback", get(handle_oauth_callback))
        .route("/api/notion/connection", get(handle_connection))
        .route("/api/notion/databases", get(handle_list_databases))
        .route("/api/notion/databases/{id}", get(handle_get_database))
        .route("/api/notion/workspace", get(handle_workspace))
        .route("/api/notion/save-notes", post(handle_save_notes))
        .route("/api/notes/blocks", post(handle_convert))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&config.server.bind).await?;
    serve(listener, config.clone()).await
}

/// Serve on an already-bound listener.
pub async fn serve(listener: TcpListener, config: Config) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = router(config);
    info!("notes-export server listening on http://{}", addr);
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

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
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

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

fn upstream_error(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_GATEWAY, "upstream_error", message)
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

/// Map a failure from the Notion layer onto a response.
///
/// Notion's own 400/401/404 are passed through; every other upstream
/// failure becomes a 502.
fn classify_error(context: &str, err: anyhow::Error) -> AppError {
    let msg = format!("{}: {:#}", context, err);
    error!(error = %msg, "request failed");

    if let Some(notion_err) = err.downcast_ref::<NotionError>() {
        return match notion_err {
            NotionError::Status { status: 400, .. } => bad_request(msg),
            NotionError::Status { status: 401, .. } => unauthorized(msg),
            NotionError::Status { status: 404, .. } => not_found(msg),
            _ => upstream_error(msg),
        };
    }

    if msg.contains("No title property") || msg.contains("markdown") {
        bad_request(msg)
    } else {
        internal(msg)
    }
}

/// Credentials from `Authorization: Bearer <token>`.
fn bearer_credentials(headers: &HeaderMap) -> Result<NotionCredentials, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| unauthorized("No authorization header"))?
        .to_str()
        .map_err(|_| unauthorized("Malformed authorization header"))?;
    NotionCredentials::from_bearer(header).map_err(|e| unauthorized(e.to_string()))
}

fn client_for(state: &AppState, credentials: NotionCredentials) -> Result<NotionClient, AppError> {
    NotionClient::new(&state.config.notion, credentials).map_err(|e| internal(format!("{:#}", e)))
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

// ============ GET /api/notion/callback ============

#[derive(Deserialize)]
struct CallbackParams {
    code: Option<String>,
}

async fn handle_oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let outcome = handle_callback(
        &state.config.notion,
        &state.config.oauth,
        params.code.as_deref(),
    )
    .await;
    Redirect::temporary(&callback_redirect(&state.config.oauth.app_url, &outcome))
}

// ============ GET /api/notion/connection ============

async fn handle_connection(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let client = client_for(&state, bearer_credentials(&headers)?)?;
    let connected = check_connection(&client).await;
    Ok(Json(json!({ "connected": connected })))
}

// ============ GET /api/notion/databases ============

async fn handle_list_databases(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let client = client_for(&state, bearer_credentials(&headers)?)?;
    let databases = client
        .search_databases()
        .await
        .map_err(|e| classify_error("Failed to fetch databases", e))?;
    Ok(Json(json!({ "databases": databases })))
}

// ============ GET /api/notion/databases/{id} ============

async fn handle_get_database(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let client = client_for(&state, bearer_credentials(&headers)?)?;
    let database = client
        .retrieve_database(&id)
        .await
        .map_err(|e| classify_error("Failed to fetch database", e))?;
    Ok(Json(json!({ "database": database.summary() })))
}

// ============ GET /api/notion/workspace ============

async fn handle_workspace(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let client = client_for(&state, bearer_credentials(&headers)?)?;
    let user = client
        .me()
        .await
        .map_err(|e| classify_error("Failed to fetch workspace", e))?;
    Ok(Json(json!({ "workspace": user.workspace() })))
}

// ============ POST /api/notion/save-notes ============

#[derive(Deserialize)]
struct SaveNotesBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    access_token: Option<String>,
    database_id: Option<String>,
    page_id: Option<String>,
    mode: Option<String>,
    #[serde(default, rename = "databaseSchema", alias = "database_schema")]
    database_schema: Option<DatabaseSchema>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveNotesResponse {
    success: bool,
    page_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

fn export_options(state: &AppState, mode: Option<&str>) -> Result<ExportOptions, AppError> {
    let options = ExportOptions::from_config(&state.config.export)
        .map_err(|e| internal(format!("{:#}", e)))?;
    match mode {
        Some(m) => {
            let mode: ExportMode = m.parse().map_err(|e: anyhow::Error| bad_request(e.to_string()))?;
            Ok(options.with_mode(mode))
        }
        None => Ok(options),
    }
}

async fn handle_save_notes(
    State(state): State<AppState>,
    Json(body): Json<SaveNotesBody>,
) -> Result<Json<SaveNotesResponse>, AppError> {
    let (Some(token), Some(database_id)) = (body.access_token, body.database_id) else {
        return Err(bad_request("Missing Notion credentials"));
    };
    let connection = NotionConnection {
        credentials: NotionCredentials::new(token).map_err(|e| bad_request(e.to_string()))?,
        database_id,
    };

    let options = export_options(&state, body.mode.as_deref())?;
    let target = match body.page_id.filter(|p| !p.is_empty()) {
        Some(page_id) => SaveTarget::ExistingPage { page_id },
        None => SaveTarget::NewPage {
            database_id: connection.database_id.clone(),
        },
    };
    let request = ExportRequest {
        title: body.title,
        content: body.content,
        database_schema: body.database_schema,
    };

    let client = client_for(&state, connection.credentials)?;
    let outcome = save_notes(&client, &request, &target, &options)
        .await
        .map_err(|e| classify_error("Failed to save to Notion", e))?;

    Ok(Json(SaveNotesResponse {
        success: true,
        page_id: outcome.page_id,
        url: outcome.url,
    }))
}

// ============ POST /api/notes/blocks ============

#[derive(Deserialize)]
struct ConvertBody {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    notes: Vec<Note>,
    mode: Option<String>,
}

#[derive(Serialize)]
struct ConvertResponse {
    blocks: Vec<Block>,
}

async fn handle_convert(
    State(state): State<AppState>,
    Json(body): Json<ConvertBody>,
) -> Result<Json<ConvertResponse>, AppError> {
    let options = export_options(&state, body.mode.as_deref())?;
    let mut notes = body.notes;
    if let Some(content) = body.content {
        notes.insert(0, Note::new(content));
    }
    let blocks = build_blocks(&notes, &options)
        .map_err(|e| classify_error("Failed to convert notes", e))?;
    Ok(Json(ConvertResponse { blocks }))
}
