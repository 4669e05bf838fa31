//! Exercises the Notion client, the export orchestrator, and the HTTP server
//! against an in-process stand-in for the Notion REST API.

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use notes_export::config::{Config, NotionConfig};
use notes_export::credentials::NotionCredentials;
use notes_export::export::{
    save_notes, DatabaseSchema, ExportMode, ExportOptions, ExportRequest, SaveTarget,
};
use notes_export::models::Block;
use notes_export::notion::{check_connection, NotionApi, NotionClient};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const TOKEN: &str = "ntn_test";

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    authorization: Option<String>,
    notion_version: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct MockState {
    requests: Arc<Mutex<Vec<Recorded>>>,
    me_failures: Arc<AtomicUsize>,
    /// Page creations that succeed but answer only after the client gave up.
    slow_pages: Arc<AtomicUsize>,
    append_failures: Arc<AtomicUsize>,
}

/// Decrement `counter` if it is positive; true when it was.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl MockState {
    fn record(&self, method: &str, path: String, headers: &HeaderMap, body: Value) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Recorded {
            method: method.to_string(),
            path,
            authorization: header(AUTHORIZATION.as_str()),
            notion_version: header("notion-version"),
            body,
        });
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized_body() -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "object": "error", "status": 401, "code": "unauthorized" })),
    )
}

async fn mock_me(State(state): State<MockState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    state.record("GET", "users/me".to_string(), &headers, Value::Null);
    if take_one(&state.me_failures) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "object": "error", "status": 503 })),
        );
    }
    if !authorized(&headers) {
        return unauthorized_body();
    }
    (
        StatusCode::OK,
        Json(json!({
            "object": "user",
            "id": "bot-1",
            "name": "Notes Export",
            "type": "bot",
            "bot": { "workspace_name": "Acme", "workspace_icon": "https://acme.test/icon.png" }
        })),
    )
}

async fn mock_search(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("POST", "search".to_string(), &headers, body.clone());
    if !authorized(&headers) {
        return unauthorized_body();
    }
    let page = match body.get("start_cursor").and_then(|c| c.as_str()) {
        None => json!({
            "object": "list",
            "results": [{ "object": "database", "id": "db1", "title": [{ "plain_text": "Meetings" }] }],
            "has_more": true,
            "next_cursor": "cursor-2"
        }),
        Some(_) => json!({
            "object": "list",
            "results": [{ "object": "database", "id": "db2", "title": [] }],
            "has_more": false,
            "next_cursor": null
        }),
    };
    (StatusCode::OK, Json(page))
}

async fn mock_database(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    state.record("GET", format!("databases/{}", id), &headers, Value::Null);
    if !authorized(&headers) {
        return unauthorized_body();
    }
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "object": "error", "status": 404, "code": "object_not_found" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "object": "database",
            "id": id,
            "title": [{ "plain_text": "Meetings" }],
            "properties": {
                "Date": { "id": "a", "type": "date" },
                "Name": { "id": "title", "type": "title" }
            }
        })),
    )
}

async fn mock_create_page(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("POST", "pages".to_string(), &headers, body);
    if !authorized(&headers) {
        return unauthorized_body();
    }
    if take_one(&state.slow_pages) {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    (
        StatusCode::OK,
        Json(json!({ "object": "page", "id": "page-1", "url": "https://www.notion.so/page-1" })),
    )
}

async fn mock_append(
    State(state): State<MockState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("PATCH", format!("blocks/{}/children", id), &headers, body);
    if !authorized(&headers) {
        return unauthorized_body();
    }
    if take_one(&state.append_failures) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "object": "error", "status": 503 })),
        );
    }
    (StatusCode::OK, Json(json!({ "object": "list", "results": [] })))
}

async fn mock_token(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.record("POST", "oauth/token".to_string(), &headers, body);
    (
        StatusCode::OK,
        Json(json!({ "access_token": "ntn_oauth", "workspace_name": "Acme" })),
    )
}

/// Start the fake Notion API; returns its `api_base` and recorded state.
async fn start_mock_notion() -> (String, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/v1/users/me", get(mock_me))
        .route("/v1/search", post(mock_search))
        .route("/v1/databases/{id}", get(mock_database))
        .route("/v1/pages", post(mock_create_page))
        .route("/v1/blocks/{id}/children", patch(mock_append))
        .route("/v1/oauth/token", post(mock_token))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/v1", addr), state)
}

fn notion_config(api_base: &str, max_retries: u32) -> NotionConfig {
    NotionConfig {
        api_base: api_base.to_string(),
        max_retries,
        timeout_secs: 5,
        ..NotionConfig::default()
    }
}

fn client(api_base: &str, token: &str) -> NotionClient {
    NotionClient::new(
        &notion_config(api_base, 0),
        NotionCredentials::new(token).unwrap(),
    )
    .unwrap()
}

/// Start the notes-export server pointed at the fake Notion API.
async fn start_app(api_base: &str) -> String {
    let mut config = Config::minimal();
    config.notion = notion_config(api_base, 0);
    config.oauth.client_id = Some("client-id".to_string());
    config.oauth.client_secret = Some("client-secret".to_string());
    config.oauth.app_url = "http://app.test".to_string();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        notes_export::server::serve(listener, config).await.unwrap();
    });
    format!("http://{}", addr)
}

// ============ Client ============

#[tokio::test]
async fn test_search_follows_cursor() {
    let (api_base, state) = start_mock_notion().await;
    let databases = client(&api_base, TOKEN).search_databases().await.unwrap();

    assert_eq!(databases.len(), 2);
    assert_eq!(databases[0].id, "db1");
    assert_eq!(databases[0].title, "Meetings");
    assert_eq!(databases[1].title, "Untitled");

    let searches: Vec<Recorded> = state
        .requests()
        .into_iter()
        .filter(|r| r.path == "search")
        .collect();
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[0].body["filter"]["value"], "database");
    assert!(searches[0].body.get("start_cursor").is_none());
    assert_eq!(searches[1].body["start_cursor"], "cursor-2");
}

#[tokio::test]
async fn test_requests_carry_auth_and_version() {
    let (api_base, state) = start_mock_notion().await;
    let user = client(&api_base, TOKEN).me().await.unwrap();
    assert_eq!(user.workspace().name, "Acme");

    let recorded = &state.requests()[0];
    assert_eq!(recorded.authorization.as_deref(), Some("Bearer ntn_test"));
    assert_eq!(recorded.notion_version.as_deref(), Some("2022-06-28"));
}

#[tokio::test]
async fn test_connection_check() {
    let (api_base, _state) = start_mock_notion().await;
    assert!(check_connection(&client(&api_base, TOKEN)).await);
    assert!(!check_connection(&client(&api_base, "ntn_revoked")).await);
}

#[tokio::test]
async fn test_retries_server_errors() {
    let (api_base, state) = start_mock_notion().await;
    state.me_failures.store(1, Ordering::SeqCst);

    let retrying = NotionClient::new(
        &notion_config(&api_base, 1),
        NotionCredentials::new(TOKEN).unwrap(),
    )
    .unwrap();
    let user = retrying.me().await.unwrap();
    assert_eq!(user.id, "bot-1");
    assert_eq!(state.requests().len(), 2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let (api_base, state) = start_mock_notion().await;
    let retrying = NotionClient::new(
        &notion_config(&api_base, 3),
        NotionCredentials::new(TOKEN).unwrap(),
    )
    .unwrap();

    assert!(retrying.retrieve_database("missing").await.is_err());
    assert_eq!(state.requests().len(), 1);
}

#[tokio::test]
async fn test_timed_out_create_is_not_resent() {
    let (api_base, state) = start_mock_notion().await;
    state.slow_pages.store(1, Ordering::SeqCst);

    let config = NotionConfig {
        timeout_secs: 1,
        ..notion_config(&api_base, 3)
    };
    let writer = NotionClient::new(&config, NotionCredentials::new(TOKEN).unwrap()).unwrap();

    let result = writer
        .create_page("db1", "Name", "Standup", &[Block::paragraph("notes")])
        .await;
    assert!(result.is_err(), "timed-out create should surface an error");

    let pages = state
        .requests()
        .into_iter()
        .filter(|r| r.path == "pages")
        .count();
    assert_eq!(pages, 1, "create_page must not be sent twice");
}

#[tokio::test]
async fn test_failed_append_is_not_resent() {
    let (api_base, state) = start_mock_notion().await;
    state.append_failures.store(1, Ordering::SeqCst);

    let writer = NotionClient::new(
        &notion_config(&api_base, 3),
        NotionCredentials::new(TOKEN).unwrap(),
    )
    .unwrap();

    let err = writer
        .append_children("page-1", &[Block::paragraph("notes")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("503"));
    assert_eq!(state.requests().len(), 1);
}

// ============ Export ============

#[tokio::test]
async fn test_save_looks_up_title_property() {
    let (api_base, state) = start_mock_notion().await;
    let request = ExportRequest {
        title: "Standup".to_string(),
        content: "# Standup\n\n- ship release\n- update docs".to_string(),
        database_schema: None,
    };
    let options = ExportOptions {
        mode: ExportMode::Structured,
        max_chunk_chars: 2000,
    };
    let target = SaveTarget::NewPage {
        database_id: "db1".to_string(),
    };

    let outcome = save_notes(&client(&api_base, TOKEN), &request, &target, &options)
        .await
        .unwrap();
    assert_eq!(outcome.page_id, "page-1");
    assert_eq!(outcome.url.as_deref(), Some("https://www.notion.so/page-1"));
    assert_eq!(outcome.blocks_written, 3);

    let requests = state.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "databases/db1");
    let page = &requests[1].body;
    assert_eq!(page["parent"]["database_id"], "db1");
    assert_eq!(
        page["properties"]["Name"]["title"][0]["text"]["content"],
        "Standup"
    );
    assert_eq!(page["children"][0]["type"], "heading_1");
    assert_eq!(page["children"][1]["type"], "bulleted_list_item");
}

#[tokio::test]
async fn test_save_batches_large_pages() {
    let (api_base, state) = start_mock_notion().await;
    let content = (0..150)
        .map(|i| format!("p{:03}", i))
        .collect::<Vec<_>>()
        .join("\n\n");
    let request = ExportRequest {
        title: "Long".to_string(),
        content,
        database_schema: Some(DatabaseSchema {
            title_property_name: "Title".to_string(),
        }),
    };
    let options = ExportOptions {
        mode: ExportMode::Chunked,
        max_chunk_chars: 5,
    };
    let target = SaveTarget::NewPage {
        database_id: "db1".to_string(),
    };

    let outcome = save_notes(&client(&api_base, TOKEN), &request, &target, &options)
        .await
        .unwrap();
    assert_eq!(outcome.blocks_written, 150);

    let requests = state.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "pages");
    assert!(requests[0].body["properties"]["Title"].is_object());
    assert_eq!(requests[0].body["children"].as_array().unwrap().len(), 100);
    assert_eq!(requests[1].method, "PATCH");
    assert_eq!(requests[1].path, "blocks/page-1/children");
    let appended = requests[1].body["children"].as_array().unwrap();
    assert_eq!(appended.len(), 50);
    assert_eq!(
        appended[0]["paragraph"]["rich_text"][0]["text"]["content"],
        "p100"
    );
}

#[tokio::test]
async fn test_append_to_existing_page() {
    let (api_base, state) = start_mock_notion().await;
    let request = ExportRequest {
        title: String::new(),
        content: "Follow-up notes".to_string(),
        database_schema: None,
    };
    let target = SaveTarget::ExistingPage {
        page_id: "page-9".to_string(),
    };
    let options = ExportOptions {
        mode: ExportMode::Chunked,
        max_chunk_chars: 2000,
    };

    let outcome = save_notes(&client(&api_base, TOKEN), &request, &target, &options)
        .await
        .unwrap();
    assert_eq!(outcome.page_id, "page-9");
    assert!(outcome.url.is_none());

    let requests = state.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "blocks/page-9/children");
}

// ============ Server ============

#[tokio::test]
async fn test_server_save_notes() {
    let (api_base, state) = start_mock_notion().await;
    let app = start_app(&api_base).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/notion/save-notes", app))
        .json(&json!({
            "title": "Standup",
            "content": "## Agenda\n\n- budget",
            "access_token": TOKEN,
            "database_id": "db1",
            "mode": "markdown",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["pageId"], "page-1");
    assert_eq!(body["url"], "https://www.notion.so/page-1");

    let pages: Vec<Recorded> = state
        .requests()
        .into_iter()
        .filter(|r| r.path == "pages")
        .collect();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].body["children"][0]["type"], "heading_2");
}

#[tokio::test]
async fn test_server_save_notes_requires_credentials() {
    let (api_base, state) = start_mock_notion().await;
    let app = start_app(&api_base).await;

    let response = reqwest::Client::new()
        .post(format!("{}/api/notion/save-notes", app))
        .json(&json!({ "title": "Standup", "content": "text" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
    assert_eq!(body["error"]["message"], "Missing Notion credentials");
    assert!(state.requests().is_empty());
}

#[tokio::test]
async fn test_server_requires_bearer() {
    let (api_base, _state) = start_mock_notion().await;
    let app = start_app(&api_base).await;

    let response = reqwest::get(format!("{}/api/notion/databases", app))
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[tokio::test]
async fn test_server_lists_databases_and_workspace() {
    let (api_base, _state) = start_mock_notion().await;
    let app = start_app(&api_base).await;
    let http = reqwest::Client::new();

    let body: Value = http
        .get(format!("{}/api/notion/databases", app))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["databases"][0], json!({ "id": "db1", "title": "Meetings" }));
    assert_eq!(body["databases"][1]["title"], "Untitled");

    let body: Value = http
        .get(format!("{}/api/notion/workspace", app))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["workspace"]["name"], "Acme");
    assert_eq!(body["workspace"]["icon"], "https://acme.test/icon.png");

    let body: Value = http
        .get(format!("{}/api/notion/connection", app))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["connected"], true);
}

#[tokio::test]
async fn test_server_passes_through_not_found() {
    let (api_base, _state) = start_mock_notion().await;
    let app = start_app(&api_base).await;

    let response = reqwest::Client::new()
        .get(format!("{}/api/notion/databases/missing", app))
        .bearer_auth(TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_server_oauth_callback() {
    let (api_base, state) = start_mock_notion().await;
    let app = start_app(&api_base).await;
    let http = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = http
        .get(format!("{}/api/notion/callback?code=abc", app))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 307);
    assert_eq!(
        response.headers()["location"],
        "http://app.test/?access_token=ntn_oauth"
    );

    let exchange = &state.requests()[0];
    assert_eq!(exchange.path, "oauth/token");
    assert_eq!(exchange.body["grant_type"], "authorization_code");
    assert_eq!(exchange.body["code"], "abc");
    assert_eq!(
        exchange.body["redirect_uri"],
        "http://app.test/api/notion/callback"
    );
    assert_eq!(
        exchange.authorization.as_deref(),
        Some("Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=")
    );

    let response = http
        .get(format!("{}/api/notion/callback", app))
        .send()
        .await
        .unwrap();
    assert_eq!(
        response.headers()["location"],
        "http://app.test/?error=no_code"
    );
}

#[tokio::test]
async fn test_server_converts_blocks() {
    let (api_base, _state) = start_mock_notion().await;
    let app = start_app(&api_base).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/notes/blocks", app))
        .json(&json!({ "content": "## Hi\n\nthere", "mode": "markdown" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let blocks = body["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["type"], "heading_2");
    assert_eq!(blocks[1]["paragraph"]["rich_text"][0]["text"]["content"], "there");
}
