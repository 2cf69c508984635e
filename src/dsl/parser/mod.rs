//! Backtracking recursive-descent parser for `.mc` programs.
//!
//! Every rule is a function `(index) -> Result<(node, next_index), ParseError>`
//! over an immutable token slice. Rules with several productions try each
//! one through [`Parser::attempt`], which swallows the failure and keeps the
//! one that got furthest into the input. If the whole parse fails, that
//! furthest failure is the single diagnostic reported.
//!
//! - `stmt`: statements, compound blocks and the block-item loop
//! - `decl`: declarations and the inside-out declarator sub-parser
//! - `expr`: the precedence ladder

mod decl;
mod error;
mod expr;
mod stmt;

use tracing::debug;

pub use error::{ErrorMode, ParseError};

use super::ast::{Expr, ExprId, ExprKind, Program};
use super::error::{CompileError, ErrorCollector, Range};
use super::token::{Token, TokenKind};

pub(crate) type ParseResult<T> = Result<(T, usize), ParseError>;

/// Parse `tokens`, reporting the best failure to `errors` when nothing parses.
pub fn parse(tokens: &[Token], errors: &mut ErrorCollector) -> Option<Program> {
    match Parser::new(tokens).parse() {
        Ok(program) => Some(program),
        Err(e) => {
            errors.add(e);
            None
        }
    }
}

pub struct Parser<'t> {
    tokens: &'t [Token],
    best_error: Option<ParseError>,
    next_id: u32,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            best_error: None,
            next_id: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Program, CompileError> {
        self.best_error = None;
        if let Some((program, _)) = self.attempt(|p| p.parse_root(0)) {
            debug!(items = program.items.len(), "parsed");
            return Ok(program);
        }
        let best = self
            .best_error
            .take()
            .unwrap_or_else(|| ParseError::new("unexpected token", 0, ErrorMode::At));
        Err(best.to_compile_error(self.tokens))
    }

    fn parse_root(&mut self, index: usize) -> ParseResult<Program> {
        let (items, index) = self.parse_block_items(index);
        if index < self.tokens.len() {
            return Err(ParseError::new("unexpected token", index, ErrorMode::At));
        }
        Ok((Program { items }, index))
    }

    /// Run one alternative. On failure, remember it if it is the furthest
    /// so far.
    fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> ParseResult<T>) -> Option<(T, usize)> {
        match rule(self) {
            Ok(done) => Some(done),
            Err(e) => {
                self.log_error(e);
                None
            }
        }
    }

    fn log_error(&mut self, e: ParseError) {
        let better = self
            .best_error
            .as_ref()
            .map_or(true, |best| e.index >= best.index);
        if better {
            self.best_error = Some(e);
        }
    }

    fn token(&self, index: usize) -> Option<&'t Token> {
        self.tokens.get(index)
    }

    fn token_is(&self, index: usize, kind: TokenKind) -> bool {
        self.token(index).is_some_and(|t| t.kind == kind)
    }

    fn expect(&self, index: usize, kind: TokenKind, mode: ErrorMode) -> Result<usize, ParseError> {
        if self.token_is(index, kind) {
            Ok(index + 1)
        } else {
            Err(ParseError::new(format!("expected '{}'", kind.text()), index, mode))
        }
    }

    /// Range covering `tokens[start..end]`, clamped to the stream.
    fn span(&self, start: usize, end: usize) -> Range {
        let last = self.tokens.len().saturating_sub(1);
        let end_index = end.saturating_sub(1).min(last);
        let start_index = start.min(end_index);
        &self.tokens[start_index].range + &self.tokens[end_index].range
    }

    fn token_range(&self, index: usize) -> Range {
        let last = self.tokens.len().saturating_sub(1);
        self.tokens[index.min(last)].range.clone()
    }

    fn node(&mut self, kind: ExprKind, start: usize, end: usize) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        Expr {
            id,
            kind,
            range: self.span(start, end),
        }
    }
}
