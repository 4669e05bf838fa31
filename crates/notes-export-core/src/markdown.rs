//! Markdown parser adapter.
//!
//! Wraps [`pulldown_cmark`] and folds its flat event stream into a
//! [`SyntaxTree`]: a sequence of top-level [`Node`]s drawn from a closed set
//! of kinds. Paragraphs, headings, and lists are kept with their inline
//! content. Every other block construct is kept only as an
//! [`IgnoredKind`] marker so downstream code can report what it skipped.
//!
//! # Limits
//!
//! Input larger than [`MAX_MARKDOWN_BYTES`] or nested deeper than
//! [`MAX_NESTING_DEPTH`] is rejected with [`ConvertError::UnparsableMarkdown`].
//!
//! # Example
//!
//! ```rust
//! use notes_export_core::markdown::{parse, Node};
//!
//! let tree = parse("# Title\n\nBody").unwrap();
//! assert!(matches!(tree.nodes[0], Node::Heading { depth: 1, .. }));
//! assert!(matches!(tree.nodes[1], Node::Paragraph { .. }));
//! ```

use pulldown_cmark::{Event, Options, Parser, Tag};

use crate::error::ConvertError;

/// Maximum accepted Markdown source size (1 MiB).
pub const MAX_MARKDOWN_BYTES: usize = 1024 * 1024;

/// Maximum nesting of lists and inline wrappers.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Parsed Markdown document: top-level nodes in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyntaxTree {
    pub nodes: Vec<Node>,
}

impl SyntaxTree {
    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// A top-level block node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Paragraph { children: Vec<Inline> },
    /// ATX or setext heading; `depth` is 1 through 6.
    Heading { depth: u8, children: Vec<Inline> },
    List(List),
    /// A block construct with no block mapping.
    Ignored(IgnoredKind),
}

/// Ordered or unordered list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct List {
    pub ordered: bool,
    pub items: Vec<ListItem>,
}

/// One list item: its inline content plus any nested lists.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListItem {
    pub children: Vec<Inline>,
    pub sublists: Vec<List>,
    /// Block constructs inside the item that were skipped.
    pub ignored: Vec<IgnoredKind>,
}

/// Block constructs that are recognized but not mapped to blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoredKind {
    CodeBlock,
    BlockQuote,
    Table,
    ThematicBreak,
    Html,
    FootnoteDefinition,
    Other,
}

impl IgnoredKind {
    fn from_tag(tag: &Tag<'_>) -> Self {
        match tag {
            Tag::CodeBlock(_) => IgnoredKind::CodeBlock,
            Tag::BlockQuote(_) => IgnoredKind::BlockQuote,
            Tag::Table(_) => IgnoredKind::Table,
            Tag::HtmlBlock => IgnoredKind::Html,
            Tag::FootnoteDefinition(_) => IgnoredKind::FootnoteDefinition,
            _ => IgnoredKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoredKind::CodeBlock => "code_block",
            IgnoredKind::BlockQuote => "block_quote",
            IgnoredKind::Table => "table",
            IgnoredKind::ThematicBreak => "thematic_break",
            IgnoredKind::Html => "html",
            IgnoredKind::FootnoteDefinition => "footnote_definition",
            IgnoredKind::Other => "other",
        }
    }
}

/// Inline content of a paragraph, heading, or list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Code(String),
    Html(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Strikethrough(Vec<Inline>),
    Link { url: String, children: Vec<Inline> },
    Image { url: String, alt: String },
    HardBreak,
}

impl Inline {
    /// The literal text value carried by this node, if any.
    ///
    /// Only leaf nodes with a value (text, inline code, inline HTML) have
    /// one. Formatting wrappers, images, and breaks return `None`.
    pub fn text_value(&self) -> Option<&str> {
        match self {
            Inline::Text(value) | Inline::Code(value) | Inline::Html(value) => Some(value),
            Inline::Emphasis(_)
            | Inline::Strong(_)
            | Inline::Strikethrough(_)
            | Inline::Link { .. }
            | Inline::Image { .. }
            | Inline::HardBreak => None,
        }
    }
}

/// Concatenate the text values of the direct children.
pub fn concat_text(children: &[Inline]) -> String {
    children.iter().filter_map(Inline::text_value).collect()
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_FOOTNOTES
}

/// Parse Markdown text into a [`SyntaxTree`].
pub fn parse(markdown: &str) -> Result<SyntaxTree, ConvertError> {
    if markdown.len() > MAX_MARKDOWN_BYTES {
        return Err(ConvertError::unparsable(format!(
            "input is {} bytes, limit is {}",
            markdown.len(),
            MAX_MARKDOWN_BYTES
        )));
    }

    let mut events = Parser::new_ext(markdown, parser_options());
    let mut nodes = Vec::new();

    while let Some(event) = events.next() {
        let node = match event {
            Event::Start(Tag::Paragraph) => Node::Paragraph {
                children: parse_inlines(&mut events, 1)?,
            },
            Event::Start(Tag::Heading { level, .. }) => Node::Heading {
                depth: level as u8,
                children: parse_inlines(&mut events, 1)?,
            },
            Event::Start(Tag::List(start)) => {
                Node::List(parse_list(&mut events, start.is_some(), 1)?)
            }
            Event::Start(tag) => {
                let kind = IgnoredKind::from_tag(&tag);
                skip_container(&mut events)?;
                Node::Ignored(kind)
            }
            Event::End(_) => return Err(unbalanced()),
            Event::Rule => Node::Ignored(IgnoredKind::ThematicBreak),
            Event::Html(_) | Event::InlineHtml(_) => Node::Ignored(IgnoredKind::Html),
            _ => Node::Ignored(IgnoredKind::Other),
        };
        nodes.push(node);
    }

    Ok(SyntaxTree { nodes })
}

fn unbalanced() -> ConvertError {
    ConvertError::unparsable("unbalanced event stream")
}

fn check_depth(depth: usize) -> Result<(), ConvertError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ConvertError::unparsable(format!(
            "nesting deeper than {} levels",
            MAX_NESTING_DEPTH
        )));
    }
    Ok(())
}

/// Consume events up to and including the `End` that closes the container
/// whose `Start` was just read.
fn skip_container<'a, I>(events: &mut I) -> Result<(), ConvertError>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut open = 1usize;
    for event in events.by_ref() {
        match event {
            Event::Start(_) => open += 1,
            Event::End(_) => {
                open -= 1;
                if open == 0 {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
    Err(unbalanced())
}

/// Read inline events until the `End` closing the current container.
fn parse_inlines<'a, I>(events: &mut I, depth: usize) -> Result<Vec<Inline>, ConvertError>
where
    I: Iterator<Item = Event<'a>>,
{
    check_depth(depth)?;
    let mut out = Vec::new();
    loop {
        let event = events.next().ok_or_else(unbalanced)?;
        if let Event::End(_) = event {
            return Ok(out);
        }
        if let Some(Event::Start(_)) = push_inline(event, &mut out, events, depth)? {
            skip_container(events)?;
        }
    }
}

/// Append `event` to `out` if it is inline content.
///
/// Returns the event back when it is not inline so the caller can decide.
fn push_inline<'a, I>(
    event: Event<'a>,
    out: &mut Vec<Inline>,
    events: &mut I,
    depth: usize,
) -> Result<Option<Event<'a>>, ConvertError>
where
    I: Iterator<Item = Event<'a>>,
{
    match event {
        Event::Text(text) => push_text(out, &text),
        Event::SoftBreak => push_text(out, "\n"),
        Event::HardBreak => out.push(Inline::HardBreak),
        Event::Code(code) => out.push(Inline::Code(code.into_string())),
        Event::InlineHtml(html) => out.push(Inline::Html(html.into_string())),
        Event::Start(Tag::Emphasis) => {
            out.push(Inline::Emphasis(parse_inlines(events, depth + 1)?));
        }
        Event::Start(Tag::Strong) => {
            out.push(Inline::Strong(parse_inlines(events, depth + 1)?));
        }
        Event::Start(Tag::Strikethrough) => {
            out.push(Inline::Strikethrough(parse_inlines(events, depth + 1)?));
        }
        Event::Start(Tag::Link { dest_url, .. }) => {
            let children = parse_inlines(events, depth + 1)?;
            out.push(Inline::Link {
                url: dest_url.into_string(),
                children,
            });
        }
        Event::Start(Tag::Image { dest_url, .. }) => {
            let alt = concat_text(&parse_inlines(events, depth + 1)?);
            out.push(Inline::Image {
                url: dest_url.into_string(),
                alt,
            });
        }
        Event::Start(tag) => return Ok(Some(Event::Start(tag))),
        Event::End(tag) => return Ok(Some(Event::End(tag))),
        // Footnote references, task markers, math: no inline mapping.
        _ => {}
    }
    Ok(None)
}

/// Append text, merging with a preceding text node.
fn push_text(out: &mut Vec<Inline>, text: &str) {
    if let Some(Inline::Text(last)) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(Inline::Text(text.to_string()));
    }
}

fn parse_list<'a, I>(events: &mut I, ordered: bool, depth: usize) -> Result<List, ConvertError>
where
    I: Iterator<Item = Event<'a>>,
{
    check_depth(depth)?;
    let mut list = List {
        ordered,
        items: Vec::new(),
    };
    loop {
        match events.next().ok_or_else(unbalanced)? {
            Event::Start(Tag::Item) => list.items.push(parse_item(events, depth)?),
            Event::Start(_) => skip_container(events)?,
            Event::End(_) => return Ok(list),
            _ => {}
        }
    }
}

fn parse_item<'a, I>(events: &mut I, depth: usize) -> Result<ListItem, ConvertError>
where
    I: Iterator<Item = Event<'a>>,
{
    let mut item = ListItem::default();
    loop {
        let event = events.next().ok_or_else(unbalanced)?;
        match event {
            Event::End(_) => return Ok(item),
            // Loose items wrap their text in paragraphs.
            Event::Start(Tag::Paragraph) | Event::Start(Tag::Heading { .. }) => {
                let inlines = parse_inlines(events, depth + 1)?;
                if !item.children.is_empty() {
                    push_text(&mut item.children, "\n");
                }
                for inline in inlines {
                    match inline {
                        Inline::Text(text) => push_text(&mut item.children, &text),
                        other => item.children.push(other),
                    }
                }
            }
            Event::Start(Tag::List(start)) => {
                item.sublists
                    .push(parse_list(events, start.is_some(), depth + 1)?);
            }
            Event::Rule => item.ignored.push(IgnoredKind::ThematicBreak),
            other => {
                if let Some(Event::Start(tag)) =
                    push_inline(other, &mut item.children, events, depth)?
                {
                    item.ignored.push(IgnoredKind::from_tag(&tag));
                    skip_container(events)?;
                }
            }
        }
    }
}
