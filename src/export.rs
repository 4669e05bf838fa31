//! Export orchestrator: note text in, Notion page out.
//!
//! Builds blocks in one of three modes and writes them to Notion, either as
//! a new page in a database or appended to an existing page.
//!
//! | Mode | Source | Output |
//! |------|--------|--------|
//! | `chunked` | [`chunk_text`] | one paragraph per ≤ N-char chunk |
//! | `markdown` | [`to_blocks`] | headings, paragraphs, bulleted items |
//! | `flat` | [`markdown_to_flat_block`] | one paragraph per note, markup stripped |
//!
//! Notion accepts at most [`MAX_BLOCKS_PER_REQUEST`] children per call, so
//! longer block lists are sent as a create followed by appends.

use anyhow::{bail, Context, Result};
use notes_export_core::blocks::to_blocks;
use notes_export_core::chunk::chunk_text;
use notes_export_core::flatten::markdown_to_flat_block;
use notes_export_core::models::{Block, Note};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::notion::NotionApi;

/// Notion's limit on children in a single create or append request.
pub const MAX_BLOCKS_PER_REQUEST: usize = 100;

/// How note text becomes blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    #[default]
    Chunked,
    Structured,
    Flat,
}

impl FromStr for ExportMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chunked" => Ok(ExportMode::Chunked),
            "markdown" | "structured" => Ok(ExportMode::Structured),
            "flat" => Ok(ExportMode::Flat),
            other => bail!(
                "Unknown export mode: '{}'. Must be chunked, markdown, or flat.",
                other
            ),
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExportMode::Chunked => "chunked",
            ExportMode::Structured => "markdown",
            ExportMode::Flat => "flat",
        };
        f.write_str(s)
    }
}

/// Block-building settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub mode: ExportMode,
    pub max_chunk_chars: usize,
}

impl ExportOptions {
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        Ok(Self {
            mode: config.mode()?,
            max_chunk_chars: config.max_chunk_chars,
        })
    }

    pub fn with_mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Known shape of the target database, so the title property need not be looked up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseSchema {
    #[serde(rename = "titlePropertyName", alias = "title_property_name")]
    pub title_property_name: String,
}

/// What to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub title: String,
    pub content: String,
    pub database_schema: Option<DatabaseSchema>,
}

/// Where to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    NewPage { database_id: String },
    ExistingPage { page_id: String },
}

/// Result of a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub page_id: String,
    pub url: Option<String>,
    pub blocks_written: usize,
}

/// Turn notes into blocks according to `options.mode`.
///
/// Blocks too long for one Notion block are spilled into siblings.
pub fn build_blocks(notes: &[Note], options: &ExportOptions) -> Result<Vec<Block>> {
    let blocks: Vec<Block> = match options.mode {
        ExportMode::Chunked => notes
            .iter()
            .flat_map(|note| chunk_text(&note.text, options.max_chunk_chars))
            .map(Block::paragraph)
            .collect(),
        ExportMode::Structured => {
            let mapped = to_blocks(notes).context("Failed to convert markdown to blocks")?;
            if !mapped.ignored.is_empty() {
                let kinds: Vec<&str> = mapped.ignored.iter().map(|k| k.as_str()).collect();
                warn!(ignored = ?kinds, "markdown constructs without a block mapping were skipped");
            }
            mapped.into_blocks()
        }
        ExportMode::Flat => notes
            .iter()
            .map(|note| markdown_to_flat_block(&note.text))
            .collect(),
    };
    Ok(blocks.into_iter().flat_map(Block::split_to_fit).collect())
}

/// Build blocks for `request` and write them to `target`.
pub async fn save_notes(
    api: &dyn NotionApi,
    request: &ExportRequest,
    target: &SaveTarget,
    options: &ExportOptions,
) -> Result<SaveOutcome> {
    let blocks = build_blocks(&[Note::new(request.content.as_str())], options)?;
    let mut batches = blocks.chunks(MAX_BLOCKS_PER_REQUEST);

    let (page_id, url) = match target {
        SaveTarget::ExistingPage { page_id } => (page_id.clone(), None),
        SaveTarget::NewPage { database_id } => {
            let title_property = match &request.database_schema {
                Some(schema) => schema.title_property_name.clone(),
                None => resolve_title_property(api, database_id).await?,
            };
            let first = batches.next().unwrap_or(&[]);
            let page = api
                .create_page(database_id, &title_property, &request.title, first)
                .await
                .context("Failed to create Notion page")?;
            (page.id, page.url)
        }
    };

    for batch in batches {
        api.append_children(&page_id, batch)
            .await
            .with_context(|| format!("Failed to append blocks to page {}", page_id))?;
    }

    info!(
        page_id = %page_id,
        blocks = blocks.len(),
        mode = %options.mode,
        "saved notes to Notion"
    );

    Ok(SaveOutcome {
        page_id,
        url,
        blocks_written: blocks.len(),
    })
}

async fn resolve_title_property(api: &dyn NotionApi, database_id: &str) -> Result<String> {
    let database = api
        .retrieve_database(database_id)
        .await
        .with_context(|| format!("Failed to retrieve database {}", database_id))?;
    match database.title_property {
        Some(name) => Ok(name),
        None => bail!("No title property found in database {}", database_id),
    }
}
