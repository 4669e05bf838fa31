//! # notes-export
//!
//! Export meeting notes to Notion.
//!
//! Note text is turned into Notion blocks by [`notes_export_core`] (chunking,
//! Markdown mapping, or flattening) and written to a page through the
//! [`notion`] client. The [`server`] module exposes the same operations as a
//! small HTTP API for the browser front-end, including the OAuth callback.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ CLI / HTTP   │──▶│ export (modes,   │──▶│ Notion API   │
//! │ (notex)      │   │ batching)        │   │ (reqwest)    │
//! └──────────────┘   └────────┬─────────┘   └──────────────┘
//!                             ▼
//!                   ┌──────────────────┐
//!                   │ notes-export-core│
//!                   │ chunk / markdown │
//!                   │ blocks / flatten │
//!                   └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`credentials`] | Explicit access-token and connection objects |
//! | [`notion`] | `NotionApi` trait and reqwest client with retry |
//! | [`oauth`] | OAuth authorization-code exchange and redirects |
//! | [`export`] | Export orchestrator: modes, batching, create/append |
//! | [`server`] | Axum routes proxying the Notion API |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod credentials;
pub mod export;
pub mod logging;
pub mod notion;
pub mod oauth;
pub mod server;

pub use notes_export_core::{blocks, chunk, flatten, markdown, models};
