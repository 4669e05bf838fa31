//! Core data models: notes in, Notion blocks out.
//!
//! [`Block`] is the closed set of block kinds this crate produces. Its wire
//! form is the Notion page-content schema, produced by [`Block::to_notion`]
//! and used by the `Serialize` impl so blocks can be sent as-is.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};

/// Maximum length of a single Notion rich-text `content` string.
pub const RICH_TEXT_LIMIT: usize = 2000;

/// Maximum number of rich-text objects Notion accepts in one block.
pub const MAX_RICH_TEXT_SEGMENTS: usize = 100;

/// Longest text a single block can carry.
pub const MAX_BLOCK_CHARS: usize = RICH_TEXT_LIMIT * MAX_RICH_TEXT_SEGMENTS;

/// A note as supplied by the caller. Held only for the duration of an export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Note {
    pub text: String,
}

impl Note {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Heading level accepted by the Notion API (`heading_1` to `heading_3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    /// Map a Markdown heading depth onto a Notion level.
    ///
    /// Depths below 1 become `H1`; depths 4 through 6 collapse into `H3`.
    pub fn from_depth(depth: u8) -> Self {
        match depth {
            0 | 1 => HeadingLevel::H1,
            2 => HeadingLevel::H2,
            _ => HeadingLevel::H3,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            HeadingLevel::H1 => 1,
            HeadingLevel::H2 => 2,
            HeadingLevel::H3 => 3,
        }
    }

    fn block_type(self) -> &'static str {
        match self {
            HeadingLevel::H1 => "heading_1",
            HeadingLevel::H2 => "heading_2",
            HeadingLevel::H3 => "heading_3",
        }
    }
}

/// A structured content unit in Notion's page-content schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Paragraph { text: String },
    Heading { level: HeadingLevel, text: String },
    BulletedListItem { text: String },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Block::Paragraph { text: text.into() }
    }

    pub fn heading(level: HeadingLevel, text: impl Into<String>) -> Self {
        Block::Heading {
            level,
            text: text.into(),
        }
    }

    pub fn bulleted(text: impl Into<String>) -> Self {
        Block::BulletedListItem { text: text.into() }
    }

    /// The Notion `type` discriminator for this block.
    pub fn block_type(&self) -> &'static str {
        match self {
            Block::Paragraph { .. } => "paragraph",
            Block::Heading { level, .. } => level.block_type(),
            Block::BulletedListItem { .. } => "bulleted_list_item",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Block::Paragraph { text }
            | Block::Heading { text, .. }
            | Block::BulletedListItem { text } => text,
        }
    }

    /// Split a block whose text exceeds [`MAX_BLOCK_CHARS`] into consecutive
    /// blocks of the same kind. Blocks that fit are returned unchanged.
    pub fn split_to_fit(self) -> Vec<Block> {
        if self.text().chars().count() <= MAX_BLOCK_CHARS {
            return vec![self];
        }
        split_chars(self.text(), MAX_BLOCK_CHARS)
            .into_iter()
            .map(|piece| self.with_text(piece))
            .collect()
    }

    fn with_text(&self, text: &str) -> Block {
        match self {
            Block::Paragraph { .. } => Block::paragraph(text),
            Block::Heading { level, .. } => Block::heading(*level, text),
            Block::BulletedListItem { .. } => Block::bulleted(text),
        }
    }

    /// Encode as a Notion block object.
    ///
    /// Text longer than [`MAX_BLOCK_CHARS`] yields more rich-text segments
    /// than Notion accepts; run [`Block::split_to_fit`] first.
    ///
    /// ```rust
    /// use notes_export_core::models::Block;
    ///
    /// let value = Block::paragraph("hi").to_notion();
    /// assert_eq!(value["type"], "paragraph");
    /// assert_eq!(value["paragraph"]["rich_text"][0]["text"]["content"], "hi");
    /// ```
    pub fn to_notion(&self) -> Value {
        let block_type = self.block_type();
        let mut value = json!({
            "object": "block",
            "type": block_type,
        });
        value[block_type] = json!({ "rich_text": rich_text(self.text()) });
        value
    }
}

impl Serialize for Block {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_notion().serialize(serializer)
    }
}

/// Build a rich-text array, splitting text that exceeds [`RICH_TEXT_LIMIT`].
pub fn rich_text(text: &str) -> Vec<Value> {
    split_chars(text, RICH_TEXT_LIMIT)
        .into_iter()
        .map(|segment| json!({ "type": "text", "text": { "content": segment } }))
        .collect()
}

/// Split on char boundaries into pieces of at most `limit` chars.
/// Always returns at least one (possibly empty) piece.
fn split_chars(text: &str, limit: usize) -> Vec<&str> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == limit {
            pieces.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    pieces.push(&text[start..]);
    pieces
}
