//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`] - splits on paragraphs, then lines, then words,
//!   then characters, merging pieces back up to the chunk size with overlap
//! - [`FixedSizeChunker`] - splits by character count with a fixed overlap
//!
//! All sizes are counted in characters, not bytes, so CJK text is measured the
//! same way as Latin text and slicing never lands inside a code point.

use std::collections::VecDeque;

use crate::document::{Chunk, Document};

/// Separators tried in order by [`RecursiveChunker`]. The empty separator
/// splits into single characters.
const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the ingestion pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Build chunks from raw texts, inheriting the document's metadata.
///
/// Chunk IDs are `{document_id}_{chunk_index}`.
fn into_chunks(document: &Document, texts: Vec<String>) -> Vec<Chunk> {
    texts
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut metadata = document.metadata.clone();
            metadata.insert("chunk_index".to_string(), i.to_string());
            Chunk {
                id: format!("{}_{i}", document.id),
                text,
                embedding: Vec::new(),
                metadata,
                document_id: document.id.clone(),
            }
        })
        .collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits text into fixed-size windows by character count.
///
/// Consecutive windows share exactly `chunk_overlap` characters.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(500, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let chars: Vec<char> = document.text.chars().collect();
        if chars.is_empty() || self.chunk_size == 0 {
            return Vec::new();
        }

        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut texts = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            texts.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        into_chunks(document, texts)
    }
}

/// Splits text hierarchically and merges the pieces back into chunks.
///
/// The text is split on the first separator it contains (paragraph break,
/// line break, space, or single characters). Pieces shorter than
/// `chunk_size` are merged greedily; longer pieces are split again with the
/// remaining separators. When a merged chunk is emitted, the next one starts
/// with trailing pieces of it, up to `chunk_overlap` characters. Every chunk
/// is at most `chunk_size` characters and is trimmed of surrounding
/// whitespace.
///
/// # Example
///
/// ```rust,ignore
/// use ragchat::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - maximum number of characters carried into the next chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if self.chunk_size == 0 {
            return Vec::new();
        }
        self.split_recursive(text, &DEFAULT_SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator present in the text; "" always matches.
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.extend(self.merge(&[piece]));
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily merge pieces into chunks of at most `chunk_size` characters,
    /// carrying up to `chunk_overlap` characters of trailing pieces forward.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        push_trimmed(&mut chunks, &window);

        // A single piece longer than chunk_size only reaches here when no
        // separator is left; cut it by characters.
        chunks
            .into_iter()
            .flat_map(|chunk| {
                if char_len(&chunk) <= self.chunk_size {
                    vec![chunk]
                } else {
                    let chars: Vec<char> = chunk.chars().collect();
                    chars.chunks(self.chunk_size).map(|c| c.iter().collect()).collect()
                }
            })
            .collect()
    }
}

fn push_trimmed(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let text: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split text at a separator while keeping the separator attached to the
/// preceding segment. The empty separator yields single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect();
    }

    let mut result = Vec::new();
    let mut start = 0;
    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        result.push(&text[start..]);
    }
    result
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }
        into_chunks(document, self.split_text(&document.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("word{i:03}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn recursive_chunks_respect_size_and_overlap() {
        let chunker = RecursiveChunker::new(100, 20);
        let chunks = chunker.split_text(&words(80));

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 100, "chunk too long: {}", char_len(chunk));
        }
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').next_back().unwrap();
            assert!(pair[1].starts_with(last_word) || pair[1].contains(last_word));
        }
    }

    #[test]
    fn recursive_prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}", "a".repeat(40), "b".repeat(40));
        let chunks = RecursiveChunker::new(50, 10).split_text(&text);
        assert_eq!(chunks, vec!["a".repeat(40), "b".repeat(40)]);
    }

    #[test]
    fn recursive_handles_cjk_without_spaces() {
        let text = "北京是中国的首都。".repeat(30);
        let chunks = RecursiveChunker::new(50, 5).split_text(&text);

        assert!(chunks.len() >= 5);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 50);
        }
        let rejoined: usize = chunks.iter().map(|c| char_len(c)).sum();
        assert!(rejoined >= char_len(&text));
    }

    #[test]
    fn fixed_size_overlap_is_exact() {
        let document = Document::new("doc", "abcdefghij");
        let chunks = FixedSizeChunker::new(4, 1).chunk(&document);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
        assert_eq!(chunks[2].id, "doc_2");
        assert_eq!(chunks[2].metadata["chunk_index"], "2");
    }

    #[test]
    fn chunks_inherit_source_metadata() {
        let document =
            Document::new("notes.md", "short text").with_metadata("source", "kb/notes.md");
        let chunks = RecursiveChunker::new(500, 50).chunk(&document);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source(), Some("kb/notes.md"));
        assert!(chunks[0].embedding.is_empty());
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let document = Document::new("empty", "");
        assert!(RecursiveChunker::new(500, 50).chunk(&document).is_empty());
        assert!(FixedSizeChunker::new(500, 50).chunk(&document).is_empty());
    }
}
