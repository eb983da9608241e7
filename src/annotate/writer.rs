//! @acp:module "Source Writer"
//! @acp:summary "Apply byte-range edits to source text, preview them as diffs, write them back"
//! @acp:domain annotate
//! @acp:layer service

use std::ops::Range;
use std::path::Path;

use similar::TextDiff;
use tracing::warn;

use crate::error::Result;

/// Replace `start..end` with `text`. An empty range is an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEdit {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl SourceEdit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            text: text.into(),
        }
    }

    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            start: range.start,
            end: range.end,
            text: text.into(),
        }
    }
}

/// @acp:summary "Apply non-overlapping edits in ascending source order"
///
/// Insertions sort before a replacement starting at the same offset.
/// An edit overlapping an earlier one is dropped.
pub fn apply_edits(source: &str, edits: &[SourceEdit]) -> String {
    let mut sorted: Vec<&SourceEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| (e.start, e.end));

    let extra: usize = sorted.iter().map(|e| e.text.len()).sum();
    let mut out = String::with_capacity(source.len() + extra);
    let mut cursor = 0;
    for edit in sorted {
        if edit.start < cursor || edit.end > source.len() {
            warn!("Dropping overlapping edit at {}..{}", edit.start, edit.end);
            continue;
        }
        out.push_str(&source[cursor..edit.start]);
        out.push_str(&edit.text);
        cursor = edit.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Unified diff between the original and annotated text.
pub fn unified_diff(path: &Path, before: &str, after: &str) -> String {
    let name = path.display().to_string();
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{}", name), &format!("b/{}", name))
        .to_string()
}

pub fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_apply_edits_in_order() {
        let source = "def f(a):\n    \"\"\"Doc (int).\"\"\"\n";
        let edits = vec![
            SourceEdit::replace(17..27, "Doc."),
            SourceEdit::insert(10, "    # type: (int) -> None\n"),
            SourceEdit::insert(0, "from typing import List\n"),
        ];
        assert_eq!(
            apply_edits(source, &edits),
            "from typing import List\ndef f(a):\n    # type: (int) -> None\n    \"\"\"Doc.\"\"\"\n"
        );
    }

    #[test]
    fn test_insertion_before_replacement_at_same_offset() {
        let edits = vec![SourceEdit::replace(0..3, "xyz"), SourceEdit::insert(0, ">")];
        assert_eq!(apply_edits("abc!", &edits), ">xyz!");
    }

    #[test]
    fn test_overlapping_edit_is_dropped() {
        let edits = vec![SourceEdit::replace(0..3, "X"), SourceEdit::replace(2..4, "Y")];
        assert_eq!(apply_edits("abcd", &edits), "Xd");
    }

    #[test]
    fn test_unified_diff() {
        let diff = unified_diff(Path::new("m.py"), "a\nb\n", "a\nc\n");
        assert!(diff.starts_with("--- a/m.py\n+++ b/m.py\n"));
        assert!(diff.contains("-b\n+c\n"));
        assert!(unified_diff(Path::new("m.py"), "same\n", "same\n").is_empty());
    }
}
