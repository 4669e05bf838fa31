//! Single-shot flattening path.
//!
//! Renders Markdown to HTML, rewrites `<img>` tags back into Markdown image
//! syntax, strips every other tag, and wraps the remaining text in a single
//! paragraph block. All structure is lost; this path exists for quick page
//! creation where fidelity does not matter and is independent of the
//! [`crate::markdown`] adapter.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Parser};
use regex::Regex;

use crate::models::Block;

static IMG_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<img\s+(?:[^>]*?\s+)?src="([^"]*)"(?:\s+(?:[^>]*?\s+)?alt="([^"]*)")?\s*/?>"#)
        .expect("img pattern is valid")
});

static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Render Markdown as HTML.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new(markdown));
    out
}

/// Turn `<img>` tags into `![alt](src)` and strip all other tags.
///
/// ```rust
/// use notes_export_core::flatten::html_to_markdown;
///
/// let text = html_to_markdown(r#"<p>See <img src="a.png" alt="chart" /></p>"#);
/// assert_eq!(text, "See ![chart](a.png)");
/// ```
pub fn html_to_markdown(html: &str) -> String {
    let with_images = IMG_TAG.replace_all(html, |caps: &regex::Captures<'_>| {
        let src = caps.get(1).map_or("", |m| m.as_str());
        let alt = caps.get(2).map_or("", |m| m.as_str());
        format!("![{}]({})", alt, src)
    });
    ANY_TAG.replace_all(&with_images, "").into_owned()
}

/// Undo the entity escaping applied by the HTML renderer.
fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Flatten Markdown into plain text.
pub fn flatten_markdown(markdown: &str) -> String {
    let html = markdown_to_html(markdown);
    unescape_entities(html_to_markdown(&html).trim_end())
}

/// Flatten Markdown into one paragraph block.
pub fn markdown_to_flat_block(markdown: &str) -> Block {
    Block::paragraph(flatten_markdown(markdown))
}
