//! Error type for the conversion core.

use thiserror::Error;

/// Failure while turning note text into blocks.
///
/// The chunker never fails: an oversized word becomes an oversized chunk
/// rather than an error. Unsupported Markdown node kinds are not errors
/// either; they are reported through [`crate::blocks::MappedBlocks::ignored`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// The Markdown source could not be turned into a syntax tree.
    #[error("unparsable markdown: {reason}")]
    UnparsableMarkdown { reason: String },
}

impl ConvertError {
    pub fn unparsable(reason: impl Into<String>) -> Self {
        Self::UnparsableMarkdown {
            reason: reason.into(),
        }
    }
}
