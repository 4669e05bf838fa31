//! Notion REST client.
//!
//! [`NotionApi`] is the seam the export orchestrator and HTTP server talk to.
//! [`NotionClient`] implements it over `reqwest`, sending the bearer token and
//! `Notion-Version` header on every call.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) → retry
//! - HTTP 5xx (server error) and network errors → retry reads only
//! - Connection failures → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Page creation and block appends are not idempotent. Once such a request
//! may have reached Notion (a timeout, a dropped response, a 5xx) it is not
//! sent again.

use anyhow::{Context, Result};
use async_trait::async_trait;
use notes_export_core::models::Block;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NotionConfig;
use crate::credentials::NotionCredentials;

/// Typed failure from the Notion API, recoverable from an `anyhow::Error`
/// via `downcast_ref` so callers can map upstream statuses.
#[derive(Debug, thiserror::Error)]
pub enum NotionError {
    #[error("Notion API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Notion request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid Notion response: {0}")]
    InvalidResponse(String),
}

/// The authenticated user (for integrations, a bot user).
#[derive(Debug, Clone, Deserialize)]
pub struct NotionUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bot: Option<BotInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotInfo {
    #[serde(default)]
    pub workspace_name: Option<String>,
    #[serde(default)]
    pub workspace_icon: Option<String>,
}

/// Workspace details shown after connecting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub name: String,
    pub icon: Option<String>,
}

impl NotionUser {
    pub fn workspace(&self) -> Workspace {
        let bot = self.bot.clone().unwrap_or_default();
        Workspace {
            name: bot
                .workspace_name
                .unwrap_or_else(|| "Notion Workspace".to_string()),
            icon: bot.workspace_icon,
        }
    }
}

/// A database as listed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSummary {
    pub id: String,
    pub title: String,
}

/// A retrieved database with the name of its title property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub id: String,
    pub title: String,
    pub title_property: Option<String>,
}

impl Database {
    pub fn summary(&self) -> DatabaseSummary {
        DatabaseSummary {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// A newly created page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPage {
    pub id: String,
    pub url: Option<String>,
}

/// Operations the exporter and proxy routes need from Notion.
#[async_trait]
pub trait NotionApi: Send + Sync {
    /// `GET /users/me`.
    async fn me(&self) -> Result<NotionUser>;

    /// All databases shared with the integration (`POST /search`, paginated).
    async fn search_databases(&self) -> Result<Vec<DatabaseSummary>>;

    /// `GET /databases/{id}`.
    async fn retrieve_database(&self, database_id: &str) -> Result<Database>;

    /// `POST /pages` with the title property set and initial children.
    async fn create_page(
        &self,
        database_id: &str,
        title_property: &str,
        title: &str,
        children: &[Block],
    ) -> Result<CreatedPage>;

    /// `PATCH /blocks/{id}/children`.
    async fn append_children(&self, block_id: &str, children: &[Block]) -> Result<()>;
}

/// Check that a token is accepted by Notion.
pub async fn check_connection(api: &dyn NotionApi) -> bool {
    match api.me().await {
        Ok(_) => true,
        Err(e) => {
            debug!(error = %e, "Notion connection check failed");
            false
        }
    }
}

/// Whether a request may be sent again after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Replay {
    /// Reads and searches: repeating has no side effects.
    Safe,
    /// Writes: repeat only when Notion never saw the request.
    UnsentOnly,
}

impl Replay {
    fn after_status(self, status: reqwest::StatusCode) -> bool {
        status.as_u16() == 429 || (self == Replay::Safe && status.is_server_error())
    }

    fn after_transport(self, err: &reqwest::Error) -> bool {
        self == Replay::Safe || err.is_connect()
    }
}

/// HTTP implementation of [`NotionApi`].
pub struct NotionClient {
    http: reqwest::Client,
    api_base: String,
    version: String,
    max_retries: u32,
    credentials: NotionCredentials,
}

impl NotionClient {
    pub fn new(config: &NotionConfig, credentials: NotionCredentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            version: config.version.clone(),
            max_retries: config.max_retries,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    /// Send one request with retry/backoff and return the JSON body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        replay: Replay,
    ) -> Result<Value, NotionError> {
        let url = self.url(path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            debug!(%method, %url, attempt, "Notion request");
            let mut req = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(self.credentials.access_token())
                .header("Notion-Version", &self.version);
            if let Some(body) = body {
                req = req.json(body);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = NotionError::Status {
                        status: status.as_u16(),
                        body: body_text,
                    };

                    if replay.after_status(status) {
                        warn!(%url, status = status.as_u16(), attempt, "Notion request failed, retrying");
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    if !replay.after_transport(&e) {
                        return Err(NotionError::Transport(e));
                    }
                    warn!(%url, error = %e, attempt, "Notion request failed, retrying");
                    last_err = Some(NotionError::Transport(e));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| NotionError::InvalidResponse("no attempts were made".to_string())))
    }
}

#[async_trait]
impl NotionApi for NotionClient {
    async fn me(&self) -> Result<NotionUser> {
        let json = self.request(Method::GET, "users/me", None, Replay::Safe).await?;
        serde_json::from_value(json).context("Invalid users/me response")
    }

    async fn search_databases(&self) -> Result<Vec<DatabaseSummary>> {
        let mut databases = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut body = json!({
                "filter": { "property": "object", "value": "database" },
            });
            if let Some(c) = &cursor {
                body["start_cursor"] = json!(c);
            }

            let json = self
                .request(Method::POST, "search", Some(&body), Replay::Safe)
                .await?;
            let results = json
                .get("results")
                .and_then(|r| r.as_array())
                .ok_or_else(|| {
                    NotionError::InvalidResponse("search response missing results".to_string())
                })?;

            for db in results {
                databases.push(DatabaseSummary {
                    id: string_field(db, "id")?,
                    title: plain_title(db),
                });
            }

            match next_cursor(&json) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(databases)
    }

    async fn retrieve_database(&self, database_id: &str) -> Result<Database> {
        let path = format!("databases/{}", database_id);
        let json = self.request(Method::GET, &path, None, Replay::Safe).await?;
        parse_database(&json)
    }

    async fn create_page(
        &self,
        database_id: &str,
        title_property: &str,
        title: &str,
        children: &[Block],
    ) -> Result<CreatedPage> {
        let mut properties = serde_json::Map::new();
        properties.insert(
            title_property.to_string(),
            json!({ "title": [{ "text": { "content": title } }] }),
        );
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
            "children": children,
        });

        let json = self
            .request(Method::POST, "pages", Some(&body), Replay::UnsentOnly)
            .await?;
        Ok(CreatedPage {
            id: string_field(&json, "id")?,
            url: json.get("url").and_then(|u| u.as_str()).map(str::to_string),
        })
    }

    async fn append_children(&self, block_id: &str, children: &[Block]) -> Result<()> {
        let path = format!("blocks/{}/children", block_id);
        let body = json!({ "children": children });
        self.request(Method::PATCH, &path, Some(&body), Replay::UnsentOnly)
            .await?;
        Ok(())
    }
}

fn string_field(value: &Value, field: &str) -> Result<String> {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| NotionError::InvalidResponse(format!("missing '{}'", field)).into())
}

/// First title fragment's plain text, or `"Untitled"`.
fn plain_title(db: &Value) -> String {
    db.get("title")
        .and_then(|t| t.get(0))
        .and_then(|t| t.get("plain_text"))
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or("Untitled")
        .to_string()
}

fn next_cursor(json: &Value) -> Option<String> {
    if !json.get("has_more").and_then(|h| h.as_bool()).unwrap_or(false) {
        return None;
    }
    json.get("next_cursor")
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

#[derive(Deserialize)]
struct PropertySchema {
    #[serde(rename = "type")]
    kind: String,
}

/// Parse a database object, locating the property whose type is `title`.
pub fn parse_database(json: &Value) -> Result<Database> {
    let properties: HashMap<String, PropertySchema> = match json.get("properties") {
        Some(p) => serde_json::from_value(p.clone()).context("Invalid database properties")?,
        None => HashMap::new(),
    };
    let title_property = properties
        .into_iter()
        .find(|(_, prop)| prop.kind == "title")
        .map(|(name, _)| name);

    Ok(Database {
        id: string_field(json, "id")?,
        title: plain_title(json),
        title_property,
    })
}
