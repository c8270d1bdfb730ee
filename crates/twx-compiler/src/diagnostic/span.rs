//! Source location tracking.

/// A byte range in a source file together with its starting position.
///
/// Rows and columns are zero-based, as tree-sitter reports them. Nodes that
/// were synthesized rather than parsed carry [`Span::SYNTHETIC`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub const SYNTHETIC: Span = Span {
        start: usize::MAX,
        end: usize::MAX,
        line: 0,
        column: 0,
        end_line: 0,
        end_column: 0,
    };

    pub fn new(start: usize, end: usize, line: usize, column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start,
            end,
            line,
            column,
            end_line,
            end_column,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.start == usize::MAX
    }

    /// Returns the slice of `source` covered by this span, if any.
    pub fn text<'a>(&self, source: &'a str) -> Option<&'a str> {
        if self.is_synthetic() {
            return None;
        }
        source.get(self.start..self.end)
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::SYNTHETIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_span_has_no_text() {
        assert!(Span::SYNTHETIC.is_synthetic());
        assert_eq!(Span::SYNTHETIC.text("abc"), None);
    }

    #[test]
    fn test_span_text() {
        let span = Span::new(4, 9, 0, 4, 0, 9);
        assert_eq!(span.text("let color = 1"), Some("color"));
    }
}
