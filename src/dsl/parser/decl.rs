//! Declarations and the declarator sub-parser.
//!
//! A declarator is read in two passes: a forward scan finds where it ends,
//! then a backward recursive parse builds the tree from the outside in, so
//! `a[2][3]` becomes `Array(3, Array(2, Identifier(a)))`.

use super::{ErrorMode, ParseError, ParseResult, Parser};
use crate::dsl::ast::{Declaration, Declarator, Stmt, StmtKind};
use crate::dsl::token::{Token, TokenKind};

const MISMATCHED_BRACKETS: &str = "mismatched square brackets in declaration";

impl<'t> Parser<'t> {
    pub(super) fn parse_declaration(&mut self, start: usize) -> ParseResult<Stmt> {
        let (specs, mut index) = self.parse_decl_specifiers(start)?;

        if self.token_is(index, TokenKind::Semicolon) {
            let decl = Declaration {
                specs,
                decls: Vec::new(),
                inits: Vec::new(),
            };
            return self.stmt_decl(decl, start, index + 1);
        }

        let mut decls = Vec::new();
        let mut inits = Vec::new();
        loop {
            let (decl, next) = self.parse_declarator(index)?;
            decls.push(decl);
            index = next;

            if self.token_is(index, TokenKind::Assign) {
                let (init, next) = self.parse_assignment(index + 1)?;
                inits.push(Some(init));
                index = next;
            } else {
                inits.push(None);
            }

            if self.token_is(index, TokenKind::Comma) {
                index += 1;
            } else {
                break;
            }
        }

        let index = self.expect(index, TokenKind::Semicolon, ErrorMode::After)?;
        self.stmt_decl(Declaration { specs, decls, inits }, start, index)
    }

    fn stmt_decl(&self, decl: Declaration, start: usize, end: usize) -> ParseResult<Stmt> {
        let stmt = Stmt {
            kind: StmtKind::Declaration(decl),
            range: self.span(start, end),
        };
        Ok((stmt, end))
    }

    fn parse_decl_specifiers(&self, mut index: usize) -> ParseResult<Vec<Token>> {
        let mut specs = Vec::new();
        while let Some(token) = self.token(index).filter(|t| t.kind.is_type_specifier()) {
            specs.push(token.clone());
            index += 1;
        }
        if specs.is_empty() {
            return Err(ParseError::new(
                "expected declaration specifier",
                index,
                ErrorMode::At,
            ));
        }
        Ok((specs, index))
    }

    pub(super) fn parse_declarator(&mut self, start: usize) -> ParseResult<Declarator> {
        let end = self.find_decl_end(start)?;
        let decl = self.parse_declarator_span(start, end)?;
        Ok((decl, end))
    }

    fn find_decl_end(&self, mut index: usize) -> Result<usize, ParseError> {
        loop {
            if self.token_is(index, TokenKind::Identifier) {
                index += 1;
            } else if self.token_is(index, TokenKind::LBracket) {
                index = self.find_pair_forward(index)? + 1;
            } else {
                return Ok(index);
            }
        }
    }

    fn find_pair_forward(&self, index: usize) -> Result<usize, ParseError> {
        let mut depth = 0i32;
        for (i, token) in self.tokens.iter().enumerate().skip(index) {
            match token.kind {
                TokenKind::LBracket => depth += 1,
                TokenKind::RBracket => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                return Ok(i);
            }
        }
        Err(ParseError::new(MISMATCHED_BRACKETS, index, ErrorMode::At))
    }

    fn find_pair_backward(&self, index: usize) -> Result<usize, ParseError> {
        let mut depth = 0i32;
        for i in (0..=index).rev() {
            match self.tokens[i].kind {
                TokenKind::RBracket => depth += 1,
                TokenKind::LBracket => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                return Ok(i);
            }
        }
        Err(ParseError::new(MISMATCHED_BRACKETS, index, ErrorMode::At))
    }

    /// Parse the declarator occupying `tokens[start..end]`.
    fn parse_declarator_span(&mut self, start: usize, end: usize) -> Result<Declarator, ParseError> {
        if start == end {
            return Ok(Declarator::Identifier {
                name: None,
                range: self.token_range(start),
            });
        }

        let tokens = self.tokens;
        let first = &tokens[start];
        if start + 1 == end && first.kind == TokenKind::Identifier {
            return Ok(Declarator::Identifier {
                name: Some(first.content.clone()),
                range: first.range.clone(),
            });
        }

        if tokens[end - 1].kind == TokenKind::RBracket {
            let open = self.find_pair_backward(end - 1)?;
            let size = if open + 2 == end {
                None
            } else {
                let (size, index) = self.parse_expression(open + 1)?;
                if index != end - 1 {
                    return Err(ParseError::new(
                        "unexpected token in array size",
                        index,
                        ErrorMode::After,
                    ));
                }
                Some(Box::new(size))
            };
            let child = self.parse_declarator_span(start, open)?;
            return Ok(Declarator::Array {
                size,
                child: Box::new(child),
                range: self.span(start, end),
            });
        }

        Err(ParseError::new(
            "faulty declaration syntax",
            start,
            ErrorMode::At,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{parse_err, parse_ok};
    use crate::dsl::ast::{Declaration, Declarator, ExprKind, Program, StmtKind};
    use crate::dsl::token::TokenKind;

    fn declaration(program: &Program) -> &Declaration {
        match &program.items[0].kind {
            StmtKind::Declaration(decl) => decl,
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    fn size_of(decl: &Declarator) -> Option<&str> {
        match decl {
            Declarator::Array { size: Some(e), .. } => match &e.kind {
                ExprKind::Number(n) => Some(n.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    #[test]
    fn plain_identifier() {
        let program = parse_ok("note b;");
        let decl = declaration(&program);
        assert_eq!(decl.specs[0].kind, TokenKind::Note);
        assert!(matches!(
            &decl.decls[0],
            Declarator::Identifier { name: Some(n), .. } if n == "b"
        ));
        assert_eq!(decl.inits, vec![None]);
    }

    #[test]
    fn array_declarator() {
        let program = parse_ok("note a[3];");
        let decl = &declaration(&program).decls[0];
        assert_eq!(size_of(decl), Some("3"));
        let Declarator::Array { child, .. } = decl else {
            panic!("expected array");
        };
        assert!(matches!(
            child.as_ref(),
            Declarator::Identifier { name: Some(n), .. } if n == "a"
        ));
    }

    #[test]
    fn multi_dimensional_nests_inside_out() {
        let program = parse_ok("chord grid[2][3];");
        let outer = &declaration(&program).decls[0];
        assert_eq!(size_of(outer), Some("3"));
        let Declarator::Array { child, .. } = outer else {
            panic!("expected array");
        };
        assert_eq!(size_of(child), Some("2"));
        assert_eq!(outer.name(), Some("grid"));
    }

    #[test]
    fn unsized_array_and_initializers() {
        let program = parse_ok("note a[] = {1, 2}, b, c = 4;");
        let decl = declaration(&program);
        assert_eq!(decl.decls.len(), 3);
        assert!(matches!(decl.decls[0], Declarator::Array { size: None, .. }));
        assert!(decl.inits[0].is_some());
        assert!(decl.inits[1].is_none());
        assert!(decl.inits[2].is_some());
    }

    #[test]
    fn specifiers_only() {
        let program = parse_ok("piece;");
        let decl = declaration(&program);
        assert!(decl.decls.is_empty());
    }

    #[test]
    fn several_specifiers_are_collected() {
        let program = parse_ok("note chord x;");
        assert_eq!(declaration(&program).specs.len(), 2);
    }

    #[test]
    fn missing_name_is_anonymous() {
        let program = parse_ok("note = 3;");
        let decl = declaration(&program);
        assert!(matches!(decl.decls[0], Declarator::Identifier { name: None, .. }));
    }

    #[test]
    fn mismatched_brackets() {
        let err = parse_err("note a[3;");
        assert_eq!(err.message, "mismatched square brackets in declaration at '['");
    }

    #[test]
    fn junk_in_array_size() {
        let err = parse_err("note a[3 4];");
        assert_eq!(err.message, "unexpected token in array size after '3'");
    }
}
