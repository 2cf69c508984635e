//! Structured parse failures.

use crate::dsl::error::{CompileError, Range};
use crate::dsl::token::Token;

/// How a failure message refers to the token at the failing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// `<message> at '<token>'`
    At,
    /// `<message>, got '<token>'`
    Got,
    /// `<message> after '<previous token>'`
    After,
}

/// A failed grammar rule. `index` is how far into the token stream the
/// rule got, which is what ranks competing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub index: usize,
    pub mode: ErrorMode,
}

impl ParseError {
    pub fn new(message: impl Into<String>, index: usize, mode: ErrorMode) -> Self {
        Self {
            message: message.into(),
            index,
            mode,
        }
    }

    /// Phrase this failure against the token stream it came from.
    pub fn to_compile_error(&self, tokens: &[Token]) -> CompileError {
        let message = &self.message;
        if tokens.is_empty() {
            return CompileError::parse(format!("{message} at beginning of source"), None);
        }

        let (index, mode) = if self.index >= tokens.len() {
            (tokens.len(), ErrorMode::After)
        } else if self.index == 0 && self.mode == ErrorMode::After {
            (0, ErrorMode::Got)
        } else {
            (self.index, self.mode)
        };

        match mode {
            ErrorMode::At => {
                let token = &tokens[index];
                CompileError::parse(
                    format!("{message} at '{token}'"),
                    Some(token.range.clone()),
                )
            }
            ErrorMode::Got => {
                let token = &tokens[index];
                CompileError::parse(
                    format!("{message}, got '{token}'"),
                    Some(token.range.clone()),
                )
            }
            ErrorMode::After => {
                let previous = &tokens[index - 1];
                CompileError::parse(
                    format!("{message} after '{previous}'"),
                    Some(Range::at(previous.range.end.next())),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::error::ErrorCollector;
    use crate::dsl::lexer::tokenize;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source, "test.mc", &mut ErrorCollector::new())
    }

    #[test]
    fn at_and_got_forms() {
        let tokens = tokens("note a;");
        let at = ParseError::new("unexpected token", 1, ErrorMode::At).to_compile_error(&tokens);
        assert_eq!(at.message, "unexpected token at 'a'");
        let got = ParseError::new("expected expression", 2, ErrorMode::Got).to_compile_error(&tokens);
        assert_eq!(got.message, "expected expression, got ';'");
        assert_eq!(got.range.map(|r| r.start.col), Some(7));
    }

    #[test]
    fn past_the_end_uses_after() {
        let tokens = tokens("a = 5");
        let err = ParseError::new("expected ';'", 3, ErrorMode::Got).to_compile_error(&tokens);
        assert_eq!(err.message, "expected ';' after '5'");
        assert_eq!(err.range.map(|r| r.start.col), Some(6));
    }

    #[test]
    fn after_at_start_becomes_got() {
        let tokens = tokens("x");
        let err = ParseError::new("expected ';'", 0, ErrorMode::After).to_compile_error(&tokens);
        assert_eq!(err.message, "expected ';', got 'x'");
    }

    #[test]
    fn empty_source() {
        let err = ParseError::new("expected expression", 0, ErrorMode::Got).to_compile_error(&[]);
        assert_eq!(err.message, "expected expression at beginning of source");
        assert!(err.range.is_none());
    }
}
