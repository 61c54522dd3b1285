//! Line-oriented chunking of a document into overlapping windows.
//!
//! Lines are accumulated into a buffer until the next line would push the
//! buffer past the chunk size. The buffer is then closed as a chunk and the
//! next one is seeded with the tail of the closed buffer, so a sentence cut
//! at a window boundary is still visible from both sides.
//!
//! All lengths are measured in characters, not bytes.

use serde::Serialize;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap carried from one chunk into the next, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Chunking parameters.
///
/// # Examples
///
/// ```
/// use docask::chunking::{ChunkingConfig, DEFAULT_CHUNK_SIZE};
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Characters copied from the end of a closed chunk into the next one.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        chunk_text(text, self.chunk_size, self.overlap)
    }
}

/// A chunk of text from a larger document.
///
/// Produced by [`chunk_text`]. `index` is the position in document order and
/// always equals the chunk's position in the returned vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// The chunk text content.
    pub text: String,
    /// Zero-based chunk index within the document.
    pub index: usize,
}

impl Chunk {
    /// Length of the chunk text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Split text into line-aligned, overlapping chunks.
///
/// Blank lines are dropped and every kept line is trimmed. A line is never
/// split: a single line longer than `chunk_size` becomes (part of) one
/// oversized chunk.
///
/// # Examples
///
/// ```
/// use docask::chunking::chunk_text;
///
/// let chunks = chunk_text("alpha beta\ngamma delta\nepsilon", 20, 5);
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[0].text, "alpha beta");
/// assert_eq!(chunks[1].text, " beta gamma delta");
/// assert_eq!(chunks[2].text, "delta epsilon");
/// ```
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let mut pieces: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let line_len = line.chars().count();

        if current_len > 0 && current_len + line_len + 1 > chunk_size {
            let seed = tail_chars(&current, overlap).to_string();
            pieces.push(std::mem::take(&mut current));

            current_len = seed.chars().count();
            current = seed;
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
        } else if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }

        current.push_str(line);
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        pieces.push(current);
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk { text, index })
        .collect()
}

/// The last `count` characters of `text` (all of it when shorter).
fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_single_chunk() {
        let chunks = chunk_text(
            "Hello, world!",
            DEFAULT_CHUNK_SIZE,
            DEFAULT_CHUNK_OVERLAP,
        );
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn long_single_line_is_never_split() {
        let text = "x".repeat(1200);
        let chunks = chunk_text(&text, 500, 50);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn lines_are_joined_until_the_size_is_reached() {
        let chunks = chunk_text("alpha beta\ngamma delta", 30, 5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "alpha beta\ngamma delta");
    }

    #[test]
    fn split_seeds_next_chunk_with_overlap() {
        let chunks = chunk_text("alpha beta\ngamma delta\nepsilon", 20, 5);
        let texts: Vec<&str> =
            chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["alpha beta", " beta gamma delta", "delta epsilon"]
        );
    }

    #[test]
    fn blank_lines_and_padding_are_dropped() {
        let chunks = chunk_text("\n\n   first  \n\t\n  second\r\n\n", 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "first\nsecond");
    }

    #[test]
    fn empty_and_blank_text_yield_no_chunks() {
        assert!(chunk_text("", 500, 50).is_empty());
        assert!(chunk_text(" \n\t\n   ", 500, 50).is_empty());
    }

    #[test]
    fn oversized_line_after_populated_buffer_starts_new_chunk() {
        let long = "y".repeat(40);
        let text = format!("short line\n{long}\nend");
        let chunks = chunk_text(&text, 20, 4);

        assert_eq!(chunks[0].text, "short line");
        assert_eq!(chunks[1].text, format!("line {long}"));
        assert_eq!(chunks[2].text, "yyyy end");
    }

    #[test]
    fn zero_overlap_seeds_with_line_only() {
        let chunks = chunk_text("aaaa\nbbbb\ncccc", 6, 0);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["aaaa", "bbbb", "cccc"]);
    }

    #[test]
    fn indices_are_contiguous() {
        let text = (0..200)
            .map(|i| format!("řádek číslo {i} s nějakým textem"))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = chunk_text(&text, 120, 20);

        assert!(chunks.len() > 10);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert!(!chunk.text.trim().is_empty());
        }
    }

    #[test]
    fn overlap_counts_characters_not_bytes() {
        // Every char in the first line is two bytes in UTF-8.
        let chunks = chunk_text("ěščřžýáíé\nnext line", 12, 3);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text, "áíé next line");
    }

    #[test]
    fn tail_chars_handles_short_input() {
        assert_eq!(tail_chars("abc", 5), "abc");
        assert_eq!(tail_chars("abcdef", 2), "ef");
        assert_eq!(tail_chars("abc", 0), "");
        assert_eq!(tail_chars("žluť", 2), "uť");
    }

    #[test]
    fn config_chunk_uses_its_parameters() {
        let config = ChunkingConfig {
            chunk_size: 20,
            overlap: 5,
        };
        let chunks = config.chunk("alpha beta\ngamma delta\nepsilon");
        assert_eq!(chunks.len(), 3);
    }
}
