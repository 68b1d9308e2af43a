//! Text clean-up applied to loaded documents before chunking.
//!
//! Extracted PDF and DOCX text is full of hard line breaks inside sentences.
//! Between two non-CJK characters such a break is dropped; CJK text keeps its
//! breaks. Only the first break of a run is dropped, so a blank line between
//! paragraphs survives as a single `\n` for the chunker to split on. Bullet
//! glyphs are removed and doubled spaces collapsed. The result is a heuristic
//! clean-up, not a lossless transform.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::document::Document;

/// A line break with a non-CJK character on each side.
static INCIDENTAL_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\u{4e00}-\u{9fff}]\n[^\u{4e00}-\u{9fff}]").expect("static regex is valid")
});

const BULLET: char = '•';

/// Clean up raw document text.
pub fn normalize_text(text: &str) -> String {
    let joined =
        INCIDENTAL_BREAK.replace_all(text, |caps: &Captures<'_>| caps[0].replacen('\n', "", 1));
    joined.replace(BULLET, "").replace("  ", " ")
}

/// Normalize a document's text in place.
pub fn normalize(document: &mut Document) {
    document.text = normalize_text(&document.text);
}
