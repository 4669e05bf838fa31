//! Block mapper: syntax tree to Notion blocks.
//!
//! Walks each note's [`SyntaxTree`] in document order and emits one
//! [`Block`] per paragraph, heading, and list item. Lists are flattened
//! depth-first, so a nested item follows its parent. Ordered lists become
//! bulleted items. Inline formatting is dropped: only the text values of a
//! node's direct inline children are kept.
//!
//! Heading depths 4 through 6 are clamped to `heading_3`, the deepest level
//! Notion accepts.
//!
//! Node kinds without a mapping are collected in [`MappedBlocks::ignored`].
//!
//! A parse failure on any note aborts the whole batch.

use tracing::debug;

use crate::error::ConvertError;
use crate::markdown::{self, concat_text, IgnoredKind, List, Node, SyntaxTree};
use crate::models::{Block, HeadingLevel, Note};

/// Blocks produced for a batch of notes, plus the node kinds that were skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MappedBlocks {
    pub blocks: Vec<Block>,
    pub ignored: Vec<IgnoredKind>,
}

impl MappedBlocks {
    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

/// Convert a batch of notes into blocks, concatenated in input order.
///
/// ```rust
/// use notes_export_core::blocks::to_blocks;
/// use notes_export_core::models::{Block, HeadingLevel, Note};
///
/// let mapped = to_blocks(&[Note::new("# Title\n\nBody text")]).unwrap();
/// assert_eq!(
///     mapped.blocks,
///     vec![Block::heading(HeadingLevel::H1, "Title"), Block::paragraph("Body text")]
/// );
/// ```
pub fn to_blocks(notes: &[Note]) -> Result<MappedBlocks, ConvertError> {
    let mut mapped = MappedBlocks::default();
    for (index, note) in notes.iter().enumerate() {
        let tree = markdown::parse(&note.text).inspect_err(|e| {
            debug!(note = index, error = %e, "note failed to parse, aborting batch");
        })?;
        map_tree(&tree, &mut mapped);
    }
    if !mapped.ignored.is_empty() {
        debug!(
            count = mapped.ignored.len(),
            "skipped markdown nodes with no block mapping"
        );
    }
    Ok(mapped)
}

/// Append the blocks for one syntax tree.
pub fn map_tree(tree: &SyntaxTree, mapped: &mut MappedBlocks) {
    for node in tree.iter() {
        match node {
            Node::Paragraph { children } => {
                mapped.blocks.push(Block::paragraph(concat_text(children)));
            }
            Node::Heading { depth, children } => {
                mapped.blocks.push(Block::heading(
                    HeadingLevel::from_depth(*depth),
                    concat_text(children),
                ));
            }
            Node::List(list) => map_list(list, mapped),
            Node::Ignored(kind) => mapped.ignored.push(*kind),
        }
    }
}

fn map_list(list: &List, mapped: &mut MappedBlocks) {
    for item in &list.items {
        mapped.blocks.push(Block::bulleted(concat_text(&item.children)));
        mapped.ignored.extend(item.ignored.iter().copied());
        for sublist in &item.sublists {
            map_list(sublist, mapped);
        }
    }
}
