//! TOML configuration parsing and validation.
//!
//! ```toml
//! [notion]
//! api_base = "https://api.notion.com/v1"
//! version = "2022-06-28"
//! timeout_secs = 30
//! max_retries = 3
//!
//! [oauth]
//! app_url = "http://localhost:3000"
//! # client_id / client_secret fall back to NOTION_CLIENT_ID / NOTION_CLIENT_SECRET
//!
//! [export]
//! mode = "chunked"
//! max_chunk_chars = 2000
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```
//!
//! Every section is optional; [`Config::minimal`] is what an empty file yields.

use anyhow::{Context, Result};
use notes_export_core::chunk::DEFAULT_MAX_CHUNK_CHARS;
use serde::Deserialize;
use std::path::Path;

use crate::export::ExportMode;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotionConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub version: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            version: default_notion_version(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.notion.com/v1".to_string()
}
fn default_notion_version() -> String {
    "2022-06-28".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Public URL of the front-end; the callback redirects here.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            app_url: default_app_url(),
        }
    }
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

impl OAuthConfig {
    /// Client id from the file, else `NOTION_CLIENT_ID`.
    pub fn client_id(&self) -> Option<String> {
        self.client_id
            .clone()
            .or_else(|| std::env::var("NOTION_CLIENT_ID").ok())
    }

    /// Client secret from the file, else `NOTION_CLIENT_SECRET`.
    pub fn client_secret(&self) -> Option<String> {
        self.client_secret
            .clone()
            .or_else(|| std::env::var("NOTION_CLIENT_SECRET").ok())
    }

    pub fn redirect_uri(&self) -> String {
        format!("{}/api/notion/callback", self.app_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            max_chunk_chars: default_max_chunk_chars(),
        }
    }
}

fn default_mode() -> String {
    "chunked".to_string()
}
fn default_max_chunk_chars() -> usize {
    DEFAULT_MAX_CHUNK_CHARS
}

impl ExportConfig {
    pub fn mode(&self) -> Result<ExportMode> {
        self.mode.parse()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

impl Config {
    /// All defaults. Used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    if config.export.max_chunk_chars == 0 {
        anyhow::bail!("export.max_chunk_chars must be > 0");
    }

    config
        .export
        .mode()
        .with_context(|| "Invalid export.mode")?;

    if config.notion.timeout_secs == 0 {
        anyhow::bail!("notion.timeout_secs must be > 0");
    }

    if !config.notion.api_base.starts_with("http://")
        && !config.notion.api_base.starts_with("https://")
    {
        anyhow::bail!(
            "notion.api_base must be an http(s) URL, got '{}'",
            config.notion.api_base
        );
    }

    Ok(())
}
