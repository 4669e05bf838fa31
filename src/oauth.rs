//! Notion OAuth authorization-code exchange.
//!
//! The callback route receives `?code=…` from Notion, trades it for an
//! access token at `{api_base}/oauth/token` using HTTP Basic client
//! authentication, and redirects the browser back to the front-end with
//! either `?access_token=…` or `?error=…`.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{NotionConfig, OAuthConfig};

/// Result of handling the OAuth callback, as reported to the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Token(String),
    NoCode,
    AuthFailed,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    workspace_name: Option<String>,
}

/// `Basic base64(client_id:client_secret)`.
pub fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", client_id, client_secret))
    )
}

/// Exchange an authorization code for an access token.
pub async fn exchange_code(notion: &NotionConfig, oauth: &OAuthConfig, code: &str) -> Result<String> {
    let (Some(client_id), Some(client_secret)) = (oauth.client_id(), oauth.client_secret()) else {
        bail!("Missing OAuth client credentials (NOTION_CLIENT_ID / NOTION_CLIENT_SECRET)");
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(notion.timeout_secs))
        .build()?;

    let url = format!("{}/oauth/token", notion.api_base.trim_end_matches('/'));
    let body = json!({
        "grant_type": "authorization_code",
        "code": code,
        "redirect_uri": oauth.redirect_uri(),
    });

    let response = client
        .post(&url)
        .header("Accept", "application/json")
        .header("Authorization", basic_auth_header(&client_id, &client_secret))
        .json(&body)
        .send()
        .await
        .context("Token exchange request failed")?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        bail!("Failed to exchange code for token: {} {}", status, body_text);
    }

    let token: TokenResponse = response
        .json()
        .await
        .context("Invalid token exchange response")?;
    info!(
        workspace = token.workspace_name.as_deref().unwrap_or("unknown"),
        "Notion OAuth token obtained"
    );
    Ok(token.access_token)
}

/// Run the full callback: missing code, exchange failure, or success.
pub async fn handle_callback(
    notion: &NotionConfig,
    oauth: &OAuthConfig,
    code: Option<&str>,
) -> CallbackOutcome {
    let Some(code) = code.filter(|c| !c.is_empty()) else {
        return CallbackOutcome::NoCode;
    };
    match exchange_code(notion, oauth, code).await {
        Ok(token) => CallbackOutcome::Token(token),
        Err(e) => {
            warn!(error = %e, "Notion OAuth error");
            CallbackOutcome::AuthFailed
        }
    }
}

/// Front-end URL to redirect to after the callback.
pub fn callback_redirect(app_url: &str, outcome: &CallbackOutcome) -> String {
    let (key, value) = match outcome {
        CallbackOutcome::Token(token) => ("access_token", token.as_str()),
        CallbackOutcome::NoCode => ("error", "no_code"),
        CallbackOutcome::AuthFailed => ("error", "auth_failed"),
    };
    match Url::parse(app_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair(key, value);
            url.to_string()
        }
        Err(_) => format!("{}?{}={}", app_url, key, value),
    }
}
