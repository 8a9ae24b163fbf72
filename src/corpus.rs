// src/corpus.rs
//
// Source-document loading for the training harness.
//
// A source article is a plain-text file whose chapters are separated by a
// fixed literal delimiter. When the delimiter is absent we fall back to
// blank-line segmentation so ad-hoc fixtures still load. Chapters are
// trimmed; empty segments are dropped; order is preserved (it is the
// traversal order of an episode).

use std::fs;
use std::path::Path;

use crate::error::{PrecisError, Result};

/// Literal delimiter between chapters in a source article.
pub const CHAPTER_SEPARATOR: &str = "[----------------------------------------------------->";

/// Split raw article text into ordered, trimmed, non-empty chapters.
pub fn split_chapters(text: &str) -> Vec<String> {
    let raw: Vec<&str> = if text.contains(CHAPTER_SEPARATOR) {
        text.split(CHAPTER_SEPARATOR).collect()
    } else {
        text.split("\n\n").collect()
    };

    raw.iter()
        .map(|segment| segment.trim())
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .collect()
}

/// Load an article file and return its chapters.
///
/// Errors on I/O failure or when the file yields no chapters at all.
pub fn load_chapters(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let chapters = split_chapters(&text);
    if chapters.is_empty() {
        return Err(PrecisError::configuration(format!(
            "article '{}' contains no non-empty chapters",
            path.display()
        )));
    }
    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_delimiter() {
        let text = format!(
            "  first chapter  {sep}\nsecond chapter\n{sep}{sep}third",
            sep = CHAPTER_SEPARATOR
        );
        let chapters = split_chapters(&text);
        assert_eq!(chapters, vec!["first chapter", "second chapter", "third"]);
    }

    #[test]
    fn test_blank_line_fallback() {
        let chapters = split_chapters("alpha\n\nbeta\n\n\n\ngamma");
        assert_eq!(chapters, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_empty_segments_dropped_and_order_kept() {
        let text = format!(
            "{sep}   {sep}one{sep}\t\n{sep}two",
            sep = CHAPTER_SEPARATOR
        );
        let chapters = split_chapters(&text);
        assert_eq!(chapters, vec!["one", "two"]);
    }

    #[test]
    fn test_load_chapters_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "   \n\n   ").unwrap();
        assert!(load_chapters(&path).is_err());
    }

    #[test]
    fn test_load_chapters_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("article.txt");
        std::fs::write(&path, format!("AAA{}BBB", CHAPTER_SEPARATOR)).unwrap();
        let chapters = load_chapters(&path).unwrap();
        assert_eq!(chapters, vec!["AAA", "BBB"]);
    }
}
