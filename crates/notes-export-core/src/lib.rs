//! # Notes Export Core
//!
//! Pure transformation logic for notes-export: paragraph chunking, Markdown
//! parsing into a closed syntax tree, mapping onto Notion blocks, and the
//! HTML-flattening fallback path.
//!
//! This crate contains no tokio, reqwest, or other I/O dependencies. Every
//! function takes its input by reference and returns a fresh result.
//!
//! ```text
//! note text ──▶ markdown::parse ──▶ SyntaxTree ──▶ blocks::to_blocks ──▶ Vec<Block>
//!     │
//!     ├──────▶ chunk::chunk_text ──▶ Vec<String> ──▶ one paragraph per chunk
//!     │
//!     └──────▶ flatten::markdown_to_flat_block ──▶ single paragraph
//! ```

pub mod blocks;
pub mod chunk;
pub mod error;
pub mod flatten;
pub mod markdown;
pub mod models;

pub use error::ConvertError;
pub use models::{Block, HeadingLevel, Note};
