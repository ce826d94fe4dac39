//! Position, interval and location value types.
//!
//! Positions are zero-based `(line, column)` pairs; the column counts
//! characters from the start of the line. An [`Interval`] is closed: `end` is
//! the position of the last character it covers, so a one-character token has
//! `start == end`.
//!
//! Every position is computed from raw byte offsets through a [`TextIndex`],
//! which treats `\n`, `\r\n` and a lone `\r` as one line break each. A
//! document mixing ending styles therefore gets the same line numbers an
//! editor shows. Other Unicode separators (form feed, `U+2028`, ...) stay
//! inside their line.

use std::{borrow::Borrow, fmt, ops::Range, sync::Arc};

use ropey::Rope;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Position {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // one-based, the way editors print positions
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A closed span `[start, end]` inside one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    start: Position,
    end: Position,
}

impl Interval {
    /// Returns `None` when `end` comes before `start`.
    pub fn new(start: Position, end: Position) -> Option<Interval> {
        (start <= end).then_some(Interval { start, end })
    }

    pub fn point(position: Position) -> Interval {
        Interval {
            start: position,
            end: position,
        }
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn end(&self) -> Position {
        self.end
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }

    pub fn encloses(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Stable key of a document, usually its URI.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(Arc<str>);

impl DocumentId {
    pub fn new(id: impl Into<Arc<str>>) -> DocumentId {
        DocumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(value: &str) -> Self {
        DocumentId::new(value)
    }
}

impl From<String> for DocumentId {
    fn from(value: String) -> Self {
        DocumentId::new(value)
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An interval in a specific document. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub document: DocumentId,
    pub interval: Interval,
}

impl Location {
    pub fn new(document: DocumentId, interval: Interval) -> Location {
        Location { document, interval }
    }

    pub fn contains(&self, document: &DocumentId, position: Position) -> bool {
        self.document == *document && self.interval.contains(position)
    }

    /// `document:line:col-line:col`, one-based, for logs and messages.
    pub fn compact(&self) -> String {
        format!("{}:{}", self.document, self.interval)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compact())
    }
}

/// Anything that carries a [`Location`].
pub trait Located {
    fn location(&self) -> &Location;

    fn covers(&self, document: &DocumentId, position: Position) -> bool {
        self.location().contains(document, position)
    }
}

impl Located for Location {
    fn location(&self) -> &Location {
        self
    }
}

/// Maps byte offsets of one document's text to positions and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextIndex {
    rope: Rope,
}

impl TextIndex {
    pub fn new(text: &str) -> TextIndex {
        TextIndex {
            rope: Rope::from_str(text),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Position of the character starting at `byte`. Offsets past the end
    /// clamp to the end of the text.
    pub fn position(&self, byte: usize) -> Position {
        let char_idx = self.rope.byte_to_char(byte.min(self.rope.len_bytes()));
        self.char_position(char_idx)
    }

    /// Closed interval over the characters of `range`; an empty range maps to
    /// the single point at its start.
    pub fn interval(&self, range: Range<usize>) -> Interval {
        let start = self.position(range.start);
        let end_byte = range.end.min(self.rope.len_bytes());
        if end_byte <= range.start {
            return Interval::point(start);
        }

        let last_char = self.rope.byte_to_char(end_byte).saturating_sub(1);
        let end = self.char_position(last_char).max(start);
        Interval { start, end }
    }

    /// Byte offset of `position`. A column one past the last character of a
    /// line is accepted (cursor at end of line).
    pub fn byte_offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return None;
        }

        let line_start = self.rope.line_to_char(line);
        let line_len = self.rope.line(line).len_chars();
        let column = position.column as usize;
        if column > line_len {
            return None;
        }

        Some(self.rope.char_to_byte(line_start + column))
    }

    /// `position` with its column counted in UTF-16 code units, the way
    /// editors count by default. Columns past the end of the line clamp to
    /// it; positions on lines past the end are returned unchanged.
    pub fn utf16_position(&self, position: Position) -> Position {
        let Some((line_start, line_len)) = self.line_chars(position.line) else {
            return position;
        };

        let char_idx = line_start + (position.column as usize).min(line_len);
        let column = self.rope.char_to_utf16_cu(char_idx) - self.rope.char_to_utf16_cu(line_start);
        Position::new(position.line, column as u32)
    }

    /// Inverse of [`TextIndex::utf16_position`].
    pub fn position_from_utf16(&self, position: Position) -> Position {
        let Some((line_start, line_len)) = self.line_chars(position.line) else {
            return position;
        };

        let first = self.rope.char_to_utf16_cu(line_start);
        let last = self.rope.char_to_utf16_cu(line_start + line_len);
        let unit = (first + position.column as usize).min(last);
        let column = self.rope.utf16_cu_to_char(unit) - line_start;
        Position::new(position.line, column as u32)
    }

    /// First char index and length in chars of `line`.
    fn line_chars(&self, line: u32) -> Option<(usize, usize)> {
        let line = line as usize;
        (line < self.rope.len_lines())
            .then(|| (self.rope.line_to_char(line), self.rope.line(line).len_chars()))
    }

    fn char_position(&self, char_idx: usize) -> Position {
        let line = self.rope.char_to_line(char_idx);
        let column = char_idx - self.rope.line_to_char(line);
        Position::new(line as u32, column as u32)
    }
}
