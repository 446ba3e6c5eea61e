//! Offset ↔ line/column conversion.

use std::collections::HashMap;

use bsl_types::{OffsetRange, Position, Range};

/// A non-ASCII character on a line, as byte columns relative to the line start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WideChar {
    start: u32,
    end: u32,
}

impl WideChar {
    const fn len(self) -> u32 {
        self.end - self.start
    }

    /// Length in UTF-16 code units.
    const fn wide_len(self) -> u32 {
        if self.len() == 4 {
            2
        } else {
            1
        }
    }
}

/// Line index for a text.
///
/// Maps byte offsets to line/UTF-16 column positions and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Byte offset of the start of each line
    line_starts: Vec<usize>,
    /// Non-ASCII characters per line, ordered by column
    wide_chars: HashMap<u32, Vec<WideChar>>,
    len: usize,
}

impl LineIndex {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut wide_chars: HashMap<u32, Vec<WideChar>> = HashMap::new();
        let mut line = 0u32;
        let mut line_start = 0usize;

        for (i, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(i + 1);
                line += 1;
                line_start = i + 1;
                continue;
            }
            if !c.is_ascii() {
                let start = (i - line_start) as u32;
                wide_chars.entry(line).or_default().push(WideChar {
                    start,
                    end: start + c.len_utf8() as u32,
                });
            }
        }

        Self {
            line_starts,
            wide_chars,
            len: text.len(),
        }
    }

    /// Get the byte offset of the start of a line
    #[must_use]
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte offset where the content of `line` ends (before its `\n`).
    fn line_end(&self, line: usize) -> usize {
        self.line_starts
            .get(line + 1)
            .map_or(self.len, |next| next - 1)
    }

    /// Convert a byte offset to an editor position.
    ///
    /// Offsets past the end of the text are clamped.
    #[must_use]
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = self
            .line_starts
            .binary_search(&offset)
            .unwrap_or_else(|i| i.saturating_sub(1));
        let col = (offset - self.line_starts[line]) as u32;

        let mut character = col;
        if let Some(chars) = self.wide_chars.get(&(line as u32)) {
            for c in chars {
                if c.end <= col {
                    character -= c.len() - c.wide_len();
                } else {
                    break;
                }
            }
        }
        Position::new(line as u32, character)
    }

    /// Convert an editor position to a byte offset.
    ///
    /// Returns `None` if the position does not exist in this text: the line
    /// is past the end, the column is past the end of the line, or the column
    /// falls inside a character.
    #[must_use]
    pub fn offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let start = self.line_start(line)?;

        let mut col = position.character;
        if let Some(chars) = self.wide_chars.get(&position.line) {
            for c in chars {
                if col > c.start {
                    col = col.checked_add(c.len() - c.wide_len())?;
                } else {
                    break;
                }
            }
            if chars.iter().any(|c| c.start < col && col < c.end) {
                return None;
            }
        }

        let offset = start + col as usize;
        (offset <= self.line_end(line)).then_some(offset)
    }

    #[must_use]
    pub fn range(&self, range: OffsetRange) -> Range {
        Range::new(self.position(range.start), self.position(range.end))
    }

    /// Convert an editor range back to byte offsets, if both ends still exist.
    #[must_use]
    pub fn offset_range(&self, range: Range) -> Option<OffsetRange> {
        let start = self.offset(range.start)?;
        let end = self.offset(range.end)?;
        (start <= end).then_some(OffsetRange::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index_new() {
        let index = LineIndex::new("line 1\nline 2\nline 3");

        assert_eq!(index.line_count(), 3);
        assert_eq!(index.line_start(0), Some(0));
        assert_eq!(index.line_start(1), Some(7));
        assert_eq!(index.line_start(2), Some(14));
    }

    #[test]
    fn test_position_ascii() {
        let index = LineIndex::new("line 1\nline 2\nline 3");

        assert_eq!(index.position(0), Position::new(0, 0));
        assert_eq!(index.position(5), Position::new(0, 5));
        assert_eq!(index.position(7), Position::new(1, 0));
        assert_eq!(index.position(10), Position::new(1, 3));
        assert_eq!(index.position(14), Position::new(2, 0));
    }

    #[test]
    fn test_position_cyrillic_counts_utf16_units() {
        // each Cyrillic letter is 2 bytes in UTF-8 and 1 unit in UTF-16
        let text = "А = Б;\nЭтаФорма.Х";
        let index = LineIndex::new(text);

        let semicolon = text.find(';').unwrap();
        assert_eq!(index.position(semicolon), Position::new(0, 5));
        let dot = text.find('.').unwrap();
        assert_eq!(index.position(dot), Position::new(1, 8));
    }

    #[test]
    fn test_offset_round_trip_with_surrogate_pair() {
        let text = "a😀b";
        let index = LineIndex::new(text);
        let b = text.find('b').unwrap();

        assert_eq!(index.position(b), Position::new(0, 3));
        assert_eq!(index.offset(Position::new(0, 3)), Some(b));
        // column 2 is in the middle of the emoji
        assert_eq!(index.offset(Position::new(0, 2)), None);
    }

    #[test]
    fn test_offset_rejects_positions_that_do_not_exist() {
        let index = LineIndex::new("ab\ncd");

        assert_eq!(index.offset(Position::new(0, 2)), Some(2));
        assert_eq!(index.offset(Position::new(0, 3)), None);
        assert_eq!(index.offset(Position::new(1, 2)), Some(5));
        assert_eq!(index.offset(Position::new(2, 0)), None);
    }

    #[test]
    fn test_offset_range() {
        let text = "Если А Тогда";
        let index = LineIndex::new(text);
        let range = index.range(OffsetRange::new(0, "Если".len()));

        assert_eq!(range, Range::new(Position::new(0, 0), Position::new(0, 4)));
        assert_eq!(
            index.offset_range(range),
            Some(OffsetRange::new(0, "Если".len()))
        );
    }

    #[test]
    fn test_offset_rejects_column_near_u32_max() {
        let index = LineIndex::new("Б😀 = 1;");

        assert_eq!(index.offset(Position::new(0, u32::MAX)), None);
        let range = Range::new(Position::new(0, 0), Position::new(0, u32::MAX));
        assert_eq!(index.offset_range(range), None);
    }
}
