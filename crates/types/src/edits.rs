//! Text edit types for quick fixes.

use crate::OffsetRange;

/// A text edit representing a change to apply to source code.
///
/// Text edits use byte offsets into the document text they were computed
/// against, and are converted to line/column ranges when presenting to LSP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Byte offset range to replace
    pub offset_range: OffsetRange,
    /// The text to replace the range with (empty string means deletion)
    pub new_text: String,
}

impl TextEdit {
    #[must_use]
    pub fn new(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self {
            offset_range: OffsetRange::new(start, end),
            new_text: new_text.into(),
        }
    }

    #[must_use]
    pub fn delete(start: usize, end: usize) -> Self {
        Self::new(start, end, String::new())
    }

    /// Create an insertion edit (insert text at position without removing anything).
    #[must_use]
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Self {
            offset_range: OffsetRange::at(position),
            new_text: text.into(),
        }
    }

    #[must_use]
    pub fn is_insertion(&self) -> bool {
        self.offset_range.is_empty() && !self.new_text.is_empty()
    }
}

/// A proposed source edit that resolves one diagnostic.
///
/// Code fixes have a human-readable label and one or more text edits
/// that should be applied together atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFix {
    /// Human-readable description of what the fix does
    pub label: String,
    /// The text edits to apply, ordered by start offset
    pub edits: Vec<TextEdit>,
}

impl CodeFix {
    #[must_use]
    pub fn new(label: impl Into<String>, mut edits: Vec<TextEdit>) -> Self {
        edits.sort_by_key(|edit| edit.offset_range);
        Self {
            label: label.into(),
            edits,
        }
    }

    #[must_use]
    pub fn replace(
        label: impl Into<String>,
        start: usize,
        end: usize,
        new_text: impl Into<String>,
    ) -> Self {
        Self::new(label, vec![TextEdit::new(start, end, new_text)])
    }

    /// Apply the edits to `text`, returning the rewritten source.
    ///
    /// Returns `None` if any edit is out of bounds, splits a UTF-8 character,
    /// or overlaps a previous edit.
    #[must_use]
    pub fn apply(&self, text: &str) -> Option<String> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for edit in &self.edits {
            let OffsetRange { start, end } = edit.offset_range;
            if start < cursor || end < start {
                return None;
            }
            out.push_str(text.get(cursor..start)?);
            text.get(start..end)?;
            out.push_str(&edit.new_text);
            cursor = end;
        }
        out.push_str(text.get(cursor..)?);
        Some(out)
    }
}
