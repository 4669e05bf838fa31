//! Explicit Notion credentials.
//!
//! Tokens are always passed in by the caller: from an `Authorization`
//! header or request body in the server, from `NOTION_TOKEN` in the CLI.
//! Nothing here reads or caches state globally.

use anyhow::{bail, Result};
use std::fmt;

/// Environment variable the CLI reads the integration token from.
pub const TOKEN_ENV: &str = "NOTION_TOKEN";

/// A Notion access token (OAuth or internal integration).
#[derive(Clone, PartialEq, Eq)]
pub struct NotionCredentials {
    access_token: String,
}

impl NotionCredentials {
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            bail!("access token must not be empty");
        }
        Ok(Self { access_token })
    }

    /// Parse an `Authorization: Bearer <token>` header value.
    pub fn from_bearer(header: &str) -> Result<Self> {
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .unwrap_or(header);
        Self::new(token.trim())
    }

    pub fn from_env() -> Result<Self> {
        match std::env::var(TOKEN_ENV) {
            Ok(token) => Self::new(token),
            Err(_) => bail!("{} environment variable not set", TOKEN_ENV),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for NotionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionCredentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// A saved connection: which token to use and which database to write into.
#[derive(Debug, Clone)]
pub struct NotionConnection {
    pub credentials: NotionCredentials,
    pub database_id: String,
}
