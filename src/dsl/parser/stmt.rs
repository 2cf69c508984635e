//! Statement rules and the block-item loop shared by the root and blocks.

use super::{ErrorMode, ParseResult, Parser};
use crate::dsl::ast::{Stmt, StmtKind};
use crate::dsl::token::TokenKind;

type StmtRule<'t> = fn(&mut Parser<'t>, usize) -> ParseResult<Stmt>;

impl<'t> Parser<'t> {
    /// Repeatedly try a statement, then a declaration, until neither parses.
    pub(super) fn parse_block_items(&mut self, mut index: usize) -> (Vec<Stmt>, usize) {
        let mut items = Vec::new();
        loop {
            if let Some((item, next)) = self.attempt(|p| p.parse_statement(index)) {
                items.push(item);
                index = next;
                continue;
            }
            if let Some((item, next)) = self.attempt(|p| p.parse_declaration(index)) {
                items.push(item);
                index = next;
                continue;
            }
            break;
        }
        (items, index)
    }

    pub(super) fn parse_statement(&mut self, index: usize) -> ParseResult<Stmt> {
        let alternatives: [StmtRule<'t>; 5] = [
            Self::parse_break,
            Self::parse_continue,
            Self::parse_if,
            Self::parse_while,
            Self::parse_compound,
        ];
        for rule in alternatives {
            if let Some(done) = self.attempt(|p| rule(p, index)) {
                return Ok(done);
            }
        }
        self.parse_expr_statement(index)
    }

    fn stmt(&self, kind: StmtKind, start: usize, end: usize) -> ParseResult<Stmt> {
        Ok((
            Stmt {
                kind,
                range: self.span(start, end),
            },
            end,
        ))
    }

    fn parse_compound(&mut self, start: usize) -> ParseResult<Stmt> {
        let index = self.expect(start, TokenKind::LBrace, ErrorMode::Got)?;
        let (items, index) = self.parse_block_items(index);
        let index = self.expect(index, TokenKind::RBrace, ErrorMode::Got)?;
        self.stmt(StmtKind::Compound(items), start, index)
    }

    fn parse_break(&mut self, start: usize) -> ParseResult<Stmt> {
        let index = self.expect(start, TokenKind::Break, ErrorMode::Got)?;
        let index = self.expect(index, TokenKind::Semicolon, ErrorMode::After)?;
        self.stmt(StmtKind::Break, start, index)
    }

    fn parse_continue(&mut self, start: usize) -> ParseResult<Stmt> {
        let index = self.expect(start, TokenKind::Continue, ErrorMode::Got)?;
        let index = self.expect(index, TokenKind::Semicolon, ErrorMode::After)?;
        self.stmt(StmtKind::Continue, start, index)
    }

    fn parse_if(&mut self, start: usize) -> ParseResult<Stmt> {
        let index = self.expect(start, TokenKind::If, ErrorMode::Got)?;
        let index = self.expect(index, TokenKind::LParen, ErrorMode::After)?;
        let (cond, index) = self.parse_expression(index)?;
        let index = self.expect(index, TokenKind::RParen, ErrorMode::After)?;
        let (then, mut index) = self.parse_statement(index)?;

        let otherwise = if self.token_is(index, TokenKind::Else) {
            let (stmt, next) = self.parse_statement(index + 1)?;
            index = next;
            Some(Box::new(stmt))
        } else {
            None
        };

        let kind = StmtKind::If {
            cond,
            then: Box::new(then),
            otherwise,
        };
        self.stmt(kind, start, index)
    }

    fn parse_while(&mut self, start: usize) -> ParseResult<Stmt> {
        let index = self.expect(start, TokenKind::While, ErrorMode::Got)?;
        let index = self.expect(index, TokenKind::LParen, ErrorMode::After)?;
        let (cond, index) = self.parse_expression(index)?;
        let index = self.expect(index, TokenKind::RParen, ErrorMode::After)?;
        let (body, index) = self.parse_statement(index)?;
        let kind = StmtKind::While {
            cond,
            body: Box::new(body),
        };
        self.stmt(kind, start, index)
    }

    fn parse_expr_statement(&mut self, start: usize) -> ParseResult<Stmt> {
        if self.token_is(start, TokenKind::Semicolon) {
            return self.stmt(StmtKind::Empty, start, start + 1);
        }
        let (expr, index) = self.parse_expression(start)?;
        let index = self.expect(index, TokenKind::Semicolon, ErrorMode::After)?;
        self.stmt(StmtKind::Expr(expr), start, index)
    }
}
