//! Paragraph-boundary text chunker.
//!
//! Splits note text into chunks that respect a maximum length so each chunk
//! fits in a single Notion rich-text object. Splitting occurs on paragraph
//! boundaries (`\n\n`) to keep paragraphs intact whenever they fit.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` paragraph boundaries, dropping blank paragraphs.
//! 2. Accumulate paragraphs into a buffer until adding the next paragraph
//!    (plus its `\n\n` separator) would exceed `max_chars`.
//! 3. When exceeded, flush the buffer as a chunk.
//! 4. If the paragraph alone exceeds `max_chars`, pack its space-separated
//!    words greedily, flushing whenever the next word would not fit. Runs
//!    of spaces collapse to a single separator.
//! 5. Flush whatever remains.
//!
//! Lengths are counted in `char`s. A single word longer than `max_chars`
//! is emitted whole as its own chunk; that is the one case in which a chunk
//! may exceed the limit.
//!
//! # Example
//!
//! ```rust
//! use notes_export_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 2000);
//! assert_eq!(chunks, vec!["Hello world.\n\nSecond paragraph."]);
//! ```

/// Notion's per-rich-text content limit, used as the default chunk size.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 2000;

const PARAGRAPH_SEPARATOR: &str = "\n\n";
const WORD_SEPARATOR: &str = " ";

/// Split text into chunks on paragraph boundaries, respecting `max_chars`.
///
/// Returns an empty vector for empty or whitespace-only input.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = Accumulator::default();

    for para in text.split(PARAGRAPH_SEPARATOR) {
        if para.trim().is_empty() {
            continue;
        }

        let para_len = para.chars().count();
        if buf.len_with(para_len, PARAGRAPH_SEPARATOR) <= max_chars {
            buf.push(para, para_len, PARAGRAPH_SEPARATOR);
            continue;
        }

        buf.flush_into(&mut chunks);

        if para_len > max_chars {
            for word in para.split(WORD_SEPARATOR) {
                if word.is_empty() {
                    continue;
                }
                let word_len = word.chars().count();
                if !buf.is_empty() && buf.len_with(word_len, WORD_SEPARATOR) > max_chars {
                    buf.flush_into(&mut chunks);
                }
                buf.push(word, word_len, WORD_SEPARATOR);
            }
        } else {
            buf.push(para, para_len, PARAGRAPH_SEPARATOR);
        }
    }

    buf.flush_into(&mut chunks);
    chunks
}

/// Chunk buffer that tracks its length in chars.
#[derive(Default)]
struct Accumulator {
    text: String,
    chars: usize,
}

impl Accumulator {
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length the buffer would have after appending `piece_len` chars.
    fn len_with(&self, piece_len: usize, separator: &str) -> usize {
        if self.is_empty() {
            piece_len
        } else {
            self.chars + separator.len() + piece_len
        }
    }

    fn push(&mut self, piece: &str, piece_len: usize, separator: &str) {
        self.chars = self.len_with(piece_len, separator);
        if !self.is_empty() {
            self.text.push_str(separator);
        }
        self.text.push_str(piece);
    }

    fn flush_into(&mut self, chunks: &mut Vec<String>) {
        if !self.is_empty() {
            chunks.push(std::mem::take(&mut self.text));
        }
        self.chars = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 2000).is_empty());
        assert!(chunk_text("\n\n\n\n", 2000).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        assert_eq!(chunk_text("a b c", 2000), vec!["a b c"]);
    }

    #[test]
    fn test_multiple_paragraphs_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = chunk_text(text, 2000);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_paragraphs_split_when_pair_exceeds_limit() {
        let p1 = "a".repeat(10);
        let p2 = "b".repeat(10);
        // 10 + 2 + 10 = 22 > 21, but each paragraph fits on its own.
        let chunks = chunk_text(&format!("{}\n\n{}", p1, p2), 21);
        assert_eq!(chunks, vec![p1, p2]);
    }

    #[test]
    fn test_separator_counts_toward_limit() {
        let chunks = chunk_text("aaaa\n\nbbbb", 10);
        assert_eq!(chunks, vec!["aaaa\n\nbbbb"]);
        let chunks = chunk_text("aaaa\n\nbbbb", 9);
        assert_eq!(chunks, vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn test_oversized_word_is_its_own_chunk() {
        let chunks = chunk_text("abcdefghijklmnop", 10);
        assert_eq!(chunks, vec!["abcdefghijklmnop"]);

        let chunks = chunk_text("hi abcdefghijklmnop yo", 10);
        assert_eq!(chunks, vec!["hi", "abcdefghijklmnop", "yo"]);
    }

    #[test]
    fn test_long_paragraph_packs_words() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = chunk_text(text, 15);
        for c in &chunks {
            assert!(c.chars().count() <= 15, "chunk too long: {:?}", c);
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_words_carry_into_next_paragraph() {
        // The tail of a split paragraph stays in the buffer and the next
        // short paragraph joins it.
        let text = "aaaa bbbb cccc\n\ndd";
        let chunks = chunk_text(text, 10);
        assert_eq!(chunks, vec!["aaaa bbbb", "cccc\n\ndd"]);
    }

    #[test]
    fn test_short_paragraph_flushed_before_word_packing() {
        let chunks = chunk_text("aa\n\nbbbb cccc dddd", 10);
        assert_eq!(chunks, vec!["aa", "bbbb cccc", "dddd"]);
    }

    #[test]
    fn test_repeated_spaces_leave_no_trailing_space() {
        let chunks = chunk_text("aaaa  bbbb cc", 5);
        assert_eq!(chunks, vec!["aaaa", "bbbb", "cc"]);
        for c in &chunks {
            assert_eq!(c.trim(), c.as_str());
        }
    }

    #[test]
    fn test_limit_holds_except_single_words() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} has a few words in it.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        for max in [12, 30, 100, 500] {
            for c in chunk_text(&text, max) {
                let single_word = !c.contains(' ') && !c.contains('\n');
                assert!(c.chars().count() <= max || single_word);
            }
        }
    }

    #[test]
    fn test_rejoin_preserves_paragraph_content() {
        let paragraphs: Vec<String> = (0..25)
            .map(|i| format!("Speaker {} said something worth keeping.", i))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = chunk_text(&text, 120);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.join("\n\n"), text);
    }

    #[test]
    fn test_blank_paragraphs_dropped() {
        let chunks = chunk_text("alpha\n\n\n\n  \n\nbeta", 2000);
        assert_eq!(chunks, vec!["alpha\n\nbeta"]);
    }

    #[test]
    fn test_multibyte_counts_chars() {
        let text = "┌──┐ │ok│ └──┘";
        let chunks = chunk_text(text, 4);
        assert_eq!(chunks, vec!["┌──┐", "│ok│", "└──┘"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        assert_eq!(chunk_text(text, 8), chunk_text(text, 8));
    }
}
