//! Error types for the compiler: source positions, ranges, diagnostics and
//! the per-invocation [`ErrorCollector`].

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};
use std::ops::Add;
use std::sync::Arc;

/// Name printed in front of diagnostics that carry no source range.
pub const TOOL_NAME: &str = "mcc";

const ERROR_COLOR: &str = "\x1B[31m";
const WARN_COLOR: &str = "\x1B[33m";
const RESET_COLOR: &str = "\x1B[0m";
const BOLD: &str = "\x1B[1m";

/// A single character location. Immutable; [`Position::next`] returns a new one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file: Arc<str>,
    pub line: usize,
    pub col: usize,
    pub full_line: Arc<str>,
}

impl Position {
    pub fn new(file: Arc<str>, line: usize, col: usize, full_line: Arc<str>) -> Self {
        Self {
            file,
            line,
            col,
            full_line,
        }
    }

    /// The position one column to the right.
    pub fn next(&self) -> Self {
        Self {
            col: self.col + 1,
            ..self.clone()
        }
    }
}

/// An inclusive span between two positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn at(p: Position) -> Self {
        Self {
            start: p.clone(),
            end: p,
        }
    }

    /// Range from the start of `self` to the end of `other`.
    pub fn join(&self, other: &Range) -> Range {
        Range {
            start: self.start.clone(),
            end: other.end.clone(),
        }
    }

    /// The source text covered by this range when it sits on a single line.
    pub fn text(&self) -> Option<String> {
        if self.start.line != self.end.line || self.start.file != self.end.file {
            return None;
        }
        let chars: Vec<char> = self.start.full_line.chars().collect();
        let from = self.start.col.checked_sub(1)?;
        let to = self.end.col.min(chars.len());
        (from < to).then(|| chars[from..to].iter().collect())
    }
}

impl Add for &Range {
    type Output = Range;

    fn add(self, rhs: &Range) -> Range {
        self.join(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lex,
    Parse,
    Semantic,
    Io,
}

/// A diagnostic produced by any phase of the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub message: String,
    pub range: Option<Range>,
    pub warning: bool,
    pub kind: ErrorKind,
}

impl CompileError {
    fn with_kind(kind: ErrorKind, message: impl Into<String>, range: Option<Range>) -> Self {
        Self {
            message: message.into(),
            range,
            warning: false,
            kind,
        }
    }

    pub fn lex(message: impl Into<String>, range: Range) -> Self {
        Self::with_kind(ErrorKind::Lex, message, Some(range))
    }

    pub fn parse(message: impl Into<String>, range: Option<Range>) -> Self {
        Self::with_kind(ErrorKind::Parse, message, range)
    }

    pub fn semantic(message: impl Into<String>, range: Option<Range>) -> Self {
        Self::with_kind(ErrorKind::Semantic, message, range)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Io, message, None)
    }

    /// Downgrade this diagnostic to a warning.
    pub fn into_warning(mut self) -> Self {
        self.warning = true;
        self
    }

    /// Whether `self` should be listed before `other`.
    ///
    /// Un-ranged diagnostics come first; ranged ones in the same file are
    /// ordered by `(line, col)`. Diagnostics from different files are
    /// unordered.
    pub fn precedes(&self, other: &CompileError) -> bool {
        match (&self.range, &other.range) {
            (None, other) => other.is_some(),
            (Some(_), None) => false,
            (Some(a), Some(b)) => {
                if a.start.file != b.start.file {
                    return false;
                }
                (a.start.line, a.start.col).cmp(&(b.start.line, b.start.col)) == Ordering::Less
            }
        }
    }

    /// Render with ANSI colors, the offending line, and a range indicator.
    pub fn render(&self) -> String {
        let color = if self.warning { WARN_COLOR } else { ERROR_COLOR };
        let issue = if self.warning { "warning" } else { "error" };

        let Some(range) = &self.range else {
            return format!(
                "{BOLD}{TOOL_NAME}: {color}{issue}:{RESET_COLOR} {}",
                self.message
            );
        };

        let mut indicator = String::from(WARN_COLOR);
        indicator.push_str(&" ".repeat(range.start.col.saturating_sub(1)));
        if range.start.line == range.end.line && range.start.file == range.end.file {
            if range.end.col == range.start.col {
                indicator.push('^');
            } else {
                let width = (range.end.col + 1).saturating_sub(range.start.col);
                indicator.push_str(&"-".repeat(width));
            }
        } else {
            let width = (range.start.full_line.chars().count() + 1).saturating_sub(range.start.col);
            indicator.push_str(&"-".repeat(width));
        }
        indicator.push_str(RESET_COLOR);

        format!(
            "{BOLD}{}:{}:{}: {color}{issue}:{RESET_COLOR} {}\n  {}\n  {indicator}",
            range.start.file, range.start.line, range.start.col, self.message, range.start.full_line,
        )
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let issue = if self.warning { "warning" } else { "error" };
        match &self.range {
            Some(r) => write!(
                f,
                "{}:{}:{}: {issue}: {}",
                r.start.file, r.start.line, r.start.col, self.message
            ),
            None => write!(f, "{TOOL_NAME}: {issue}: {}", self.message),
        }
    }
}

impl std::error::Error for CompileError {}

/// Collected diagnostics for one compiler invocation, kept sorted.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    issues: Vec<CompileError>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a diagnostic, keeping the list in diagnostic order.
    ///
    /// A diagnostic equal to one already collected (same message, range,
    /// severity and kind, e.g. from a loop body) is silently dropped, so
    /// [`ErrorCollector::error_count`] counts distinct errors.
    pub fn add(&mut self, issue: CompileError) {
        if self.issues.contains(&issue) {
            return;
        }
        let at = self
            .issues
            .iter()
            .position(|existing| issue.precedes(existing))
            .unwrap_or(self.issues.len());
        self.issues.insert(at, issue);
    }

    /// True iff nothing of error severity has been collected.
    pub fn ok(&self) -> bool {
        self.issues.iter().all(|issue| issue.warning)
    }

    pub fn issues(&self) -> &[CompileError] {
        &self.issues
    }

    /// Number of distinct error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|issue| !issue.warning).count()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Reset between independent runs (tests).
    pub fn clear(&mut self) {
        self.issues.clear();
    }

    /// Print every diagnostic, in order.
    pub fn show(&self, out: &mut impl Write) -> io::Result<()> {
        for issue in &self.issues {
            writeln!(out, "{}", issue.render())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(file: &str, line: usize, col: usize) -> Position {
        Position::new(file.into(), line, col, "note a = 5;".into())
    }

    fn at(file: &str, line: usize, col: usize) -> Option<Range> {
        Some(Range::at(pos(file, line, col)))
    }

    #[test]
    fn position_next_advances_column() {
        let p = pos("a.mc", 3, 7);
        let q = p.next();
        assert_eq!(q.col, 8);
        assert_eq!(q.line, 3);
        assert_eq!(p.col, 7);
    }

    #[test]
    fn range_join_spans_both() {
        let a = Range::at(pos("a.mc", 1, 1));
        let b = Range::at(pos("a.mc", 1, 4));
        let joined = &a + &b;
        assert_eq!(joined.start.col, 1);
        assert_eq!(joined.end.col, 4);
        assert_eq!(joined.text().as_deref(), Some("note"));
    }

    #[test]
    fn unranged_sorts_first() {
        let mut errors = ErrorCollector::new();
        errors.add(CompileError::semantic("later", at("a.mc", 2, 1)));
        errors.add(CompileError::io("no range"));
        assert_eq!(errors.issues()[0].message, "no range");
    }

    #[test]
    fn ranged_sort_by_line_then_column() {
        let mut errors = ErrorCollector::new();
        errors.add(CompileError::semantic("c", at("a.mc", 3, 1)));
        errors.add(CompileError::semantic("b", at("a.mc", 1, 9)));
        errors.add(CompileError::semantic("a", at("a.mc", 1, 2)));
        let order: Vec<&str> = errors.issues().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn exact_repeats_are_dropped() {
        let mut errors = ErrorCollector::new();
        errors.add(CompileError::semantic("x", at("a.mc", 1, 1)));
        errors.add(CompileError::semantic("x", at("a.mc", 1, 1)));
        errors.add(CompileError::semantic("x", at("a.mc", 2, 1)));
        errors.add(CompileError::semantic("x", at("a.mc", 1, 1)).into_warning());
        assert_eq!(errors.issues().len(), 3);
        assert_eq!(errors.error_count(), 2);
    }

    #[test]
    fn different_files_are_unordered() {
        let a = CompileError::semantic("a", at("a.mc", 9, 1));
        let b = CompileError::semantic("b", at("b.mc", 1, 1));
        assert!(!a.precedes(&b));
        assert!(!b.precedes(&a));
    }

    #[test]
    fn warnings_do_not_fail() {
        let mut errors = ErrorCollector::new();
        errors.add(CompileError::semantic("careful", None).into_warning());
        assert!(errors.ok());
        errors.add(CompileError::semantic("broken", None));
        assert!(!errors.ok());
        assert_eq!(errors.error_count(), 1);
        errors.clear();
        assert!(errors.is_empty());
    }

    #[test]
    fn display_forms() {
        let ranged = CompileError::semantic("bad", at("a.mc", 2, 5));
        assert_eq!(ranged.to_string(), "a.mc:2:5: error: bad");
        let bare = CompileError::io("gone").into_warning();
        assert_eq!(bare.to_string(), "mcc: warning: gone");
    }

    #[test]
    fn render_draws_indicator() {
        let range = Range::new(pos("a.mc", 1, 6), pos("a.mc", 1, 6));
        let rendered = CompileError::parse("expected ';'", Some(range)).render();
        assert!(rendered.contains("a.mc:1:6:"));
        assert!(rendered.contains("note a = 5;"));
        assert!(rendered.contains("     ^"));
    }
}
