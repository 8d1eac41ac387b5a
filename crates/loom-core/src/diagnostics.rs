//! Source text ownership, byte-offset → (line, column) resolution, and the
//! diagnostic accumulator used by every pipeline stage. Diagnostics are
//! collected as they're found (never abort parsing or codegen) and rendered
//! only once, at the end, against the owning `Source`.

use std::fmt::Write as _;

/// A half-open byte range `[l, r)` into a [`Source`]'s text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRange {
    pub l: u32,
    pub r: u32,
}

impl SourceRange {
    #[must_use]
    pub fn new(l: u32, r: u32) -> Self {
        debug_assert!(l <= r);
        Self { l, r }
    }

    /// A zero-width range at `at`, used for synthesized nodes with no real
    /// source text of their own (e.g. a missing `else` branch).
    #[must_use]
    pub fn point(at: u32) -> Self {
        Self { l: at, r: at }
    }

    #[must_use]
    pub fn join(self, other: Self) -> Self {
        Self {
            l: self.l.min(other.l),
            r: self.r.max(other.r),
        }
    }
}

/// A 1-based (line, column) position, as rendered in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: u32,
    pub col: u32,
}

/// Owns the source text and resolves byte offsets to line/column positions.
pub struct Source {
    text: String,
    /// Byte offset of the start of each line (line 0 starts at offset 0).
    line_starts: Vec<u32>,
}

impl Source {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0u32];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(u32::try_from(i + 1).expect("source longer than u32::MAX"));
            }
        }
        Self { text, line_starts }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn slice(&self, range: SourceRange) -> &str {
        &self.text[range.l as usize..range.r as usize]
    }

    /// Resolves a byte offset to a 1-based line/column pair. Column counts
    /// bytes, not Unicode scalar values, matching the original byte-oriented
    /// scanner.
    #[must_use]
    pub fn line_col(&self, offset: u32) -> LineCol {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.line_starts[line_idx];
        LineCol {
            line: u32::try_from(line_idx + 1).unwrap(),
            col: offset - line_start + 1,
        }
    }
}

/// One recorded diagnostic: a message anchored to a source range.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub range: SourceRange,
    pub message: String,
}

/// Accumulates diagnostics across lexing, parsing, codegen, and evaluation.
/// Never aborts the pipeline stage that's pushing into it; the caller decides
/// whether accumulated diagnostics should suppress later stages (see
/// [`crate::eval`]).
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, range: SourceRange, message: impl Into<String>) {
        self.items.push(Diagnostic {
            range,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn items(&self) -> &[Diagnostic] {
        &self.items
    }

    /// Renders every diagnostic against `source` as
    /// `<l>:<c>..<l>:<c> near '<text>'\n  <message>\n`, concatenated in
    /// occurrence order.
    #[must_use]
    pub fn render(&self, source: &Source) -> String {
        let mut out = String::new();
        for d in &self.items {
            let start = source.line_col(d.range.l);
            let end = source.line_col(d.range.r);
            let text = source.slice(d.range);
            let _ = writeln!(
                out,
                "{}:{}..{}:{} near '{}'",
                start.line, start.col, end.line, end.col, text
            );
            let _ = writeln!(out, "  {}", d.message);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_first_line() {
        let src = Source::new("abc\ndef\n");
        assert_eq!(src.line_col(0), LineCol { line: 1, col: 1 });
        assert_eq!(src.line_col(2), LineCol { line: 1, col: 3 });
    }

    #[test]
    fn line_col_second_line() {
        let src = Source::new("abc\ndef\n");
        assert_eq!(src.line_col(4), LineCol { line: 2, col: 1 });
        assert_eq!(src.line_col(6), LineCol { line: 2, col: 3 });
    }

    #[test]
    fn render_format() {
        let src = Source::new("let a = ;");
        let mut diags = Diagnostics::new();
        diags.push(SourceRange::new(8, 9), "expected expression");
        let rendered = diags.render(&src);
        assert_eq!(rendered, "1:9..1:10 near ';'\n  expected expression\n");
    }
}
