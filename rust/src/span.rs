//! Source locations.
//!
//! Tokens and syntax nodes carry a byte-offset [`Span`]. Facts and
//! diagnostics expose line/column [`Position`]s computed through a
//! [`LineIndex`] built once per file.

use serde::Serialize;
use std::ops::Range;

/// Half-open byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    start: u32,
    end: u32,
}

impl Span {
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn start(self) -> u32 {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> u32 {
        self.end
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// True if `other` lies entirely inside `self`.
    #[must_use]
    pub const fn contains(self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    #[must_use]
    pub const fn as_range(self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Slices `source` by this span, returning `""` if out of bounds.
    #[must_use]
    pub fn text(self, source: &str) -> &str {
        source.get(self.as_range()).unwrap_or("")
    }
}

impl From<Range<usize>> for Span {
    // Files over 4GB are not supported.
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start as u32, range.end as u32)
    }
}

impl From<Span> for Range<usize> {
    fn from(span: Span) -> Self {
        span.as_range()
    }
}

/// Line (1-based) and column (0-based, counted in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column + 1)
    }
}

/// A span resolved to start/end positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct SourceRange {
    pub start: Position,
    pub end: Position,
}

/// Byte offsets of line starts, for offset → position lookups.
#[derive(Debug, Clone)]
pub struct LineIndex<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    pub fn new(source: &'src str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            source,
            line_starts,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    pub fn position(&self, offset: u32) -> Position {
        let offset = (offset as usize).min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        // Offsets produced by the lexer always fall on char boundaries.
        let column = self
            .source
            .get(line_start..offset)
            .map_or(offset - line_start, |s| s.chars().count());
        Position::new(line + 1, column)
    }

    pub fn range(&self, span: Span) -> SourceRange {
        SourceRange {
            start: self.position(span.start()),
            end: self.position(span.end()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive_of_both_ends() {
        let outer = Span::new(5, 20);
        assert!(outer.contains(Span::new(5, 10)));
        assert!(outer.contains(Span::new(15, 20)));
        assert!(outer.contains(outer));
        assert!(!Span::new(5, 10).contains(outer));
    }

    #[test]
    fn positions_are_line_one_based_column_zero_based() {
        let src = "ab\ncd\n\nxé z";
        let index = LineIndex::new(src);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.position(0), Position::new(1, 0));
        assert_eq!(index.position(4), Position::new(2, 1));
        assert_eq!(index.position(6), Position::new(3, 0));
        // `é` is two bytes but one column.
        let z = src.find('z').unwrap() as u32;
        assert_eq!(index.position(z), Position::new(4, 3));
    }

    #[test]
    fn text_out_of_bounds_is_empty() {
        assert_eq!(Span::new(2, 4).text("abcdef"), "cd");
        assert_eq!(Span::new(2, 40).text("abcdef"), "");
    }
}
