//! Expression rules, lowest precedence first.

use super::{ErrorMode, ParseError, ParseResult, Parser};
use crate::dsl::ast::{AssignOp, BinaryOp, Expr, ExprKind, IncDec, UnaryOp};
use crate::dsl::token::TokenKind;

type ExprRule<'t> = fn(&mut Parser<'t>, usize) -> ParseResult<Expr>;

const LOGICAL_OR: &[(TokenKind, BinaryOp)] = &[(TokenKind::OrOr, BinaryOp::Or)];
const LOGICAL_AND: &[(TokenKind, BinaryOp)] = &[(TokenKind::AndAnd, BinaryOp::And)];
const EQUALITY: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::EqEq, BinaryOp::Eq),
    (TokenKind::NotEq, BinaryOp::Ne),
];
const RELATIONAL: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Lt, BinaryOp::Lt),
    (TokenKind::Gt, BinaryOp::Gt),
    (TokenKind::LtEq, BinaryOp::Le),
    (TokenKind::GtEq, BinaryOp::Ge),
];
const BITWISE: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Shl, BinaryOp::Shl),
    (TokenKind::Shr, BinaryOp::Shr),
    (TokenKind::Pipe, BinaryOp::BitOr),
    (TokenKind::Amp, BinaryOp::BitAnd),
];
const ADDITIVE: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Plus, BinaryOp::Add),
    (TokenKind::Minus, BinaryOp::Sub),
];
const MULTIPLICATIVE: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Star, BinaryOp::Mul),
    (TokenKind::Slash, BinaryOp::Div),
    (TokenKind::Percent, BinaryOp::Mod),
    (TokenKind::At, BinaryOp::Combine),
];

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Assign => AssignOp::Assign,
        TokenKind::PlusAssign => AssignOp::Compound(BinaryOp::Add),
        TokenKind::MinusAssign => AssignOp::Compound(BinaryOp::Sub),
        TokenKind::StarAssign => AssignOp::Compound(BinaryOp::Mul),
        TokenKind::SlashAssign => AssignOp::Compound(BinaryOp::Div),
        TokenKind::PercentAssign => AssignOp::Compound(BinaryOp::Mod),
        _ => return None,
    })
}

impl<'t> Parser<'t> {
    /// `assignment (',' assignment)*`
    pub(super) fn parse_expression(&mut self, start: usize) -> ParseResult<Expr> {
        let (first, mut index) = self.parse_assignment(start)?;
        if !self.token_is(index, TokenKind::Comma) {
            return Ok((first, index));
        }

        let mut exprs = vec![first];
        while self.token_is(index, TokenKind::Comma) {
            let (next, after) = self.parse_assignment(index + 1)?;
            exprs.push(next);
            index = after;
        }
        Ok((self.node(ExprKind::Multi(exprs), start, index), index))
    }

    /// Right-associative. The left side may be any non-assignment
    /// expression; the evaluator rejects the ones that aren't assignable.
    pub(super) fn parse_assignment(&mut self, start: usize) -> ParseResult<Expr> {
        let (left, index) = self.parse_logical_or(start)?;
        let Some(op) = self.token(index).and_then(|t| assign_op(t.kind)) else {
            return Ok((left, index));
        };
        let (right, index) = self.parse_assignment(index + 1)?;
        let kind = ExprKind::Assign {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        Ok((self.node(kind, start, index), index))
    }

    fn parse_logical_or(&mut self, start: usize) -> ParseResult<Expr> {
        self.parse_series(start, Self::parse_logical_and, LOGICAL_OR)
    }

    fn parse_logical_and(&mut self, start: usize) -> ParseResult<Expr> {
        self.parse_series(start, Self::parse_equality, LOGICAL_AND)
    }

    fn parse_equality(&mut self, start: usize) -> ParseResult<Expr> {
        self.parse_series(start, Self::parse_relational, EQUALITY)
    }

    fn parse_relational(&mut self, start: usize) -> ParseResult<Expr> {
        self.parse_series(start, Self::parse_bitwise, RELATIONAL)
    }

    fn parse_bitwise(&mut self, start: usize) -> ParseResult<Expr> {
        self.parse_series(start, Self::parse_additive, BITWISE)
    }

    fn parse_additive(&mut self, start: usize) -> ParseResult<Expr> {
        self.parse_series(start, Self::parse_multiplicative, ADDITIVE)
    }

    fn parse_multiplicative(&mut self, start: usize) -> ParseResult<Expr> {
        self.parse_series(start, Self::parse_unary, MULTIPLICATIVE)
    }

    /// Left-associative fold of `base (op base)*`.
    fn parse_series(
        &mut self,
        start: usize,
        base: ExprRule<'t>,
        ops: &[(TokenKind, BinaryOp)],
    ) -> ParseResult<Expr> {
        let (mut cur, mut index) = base(self, start)?;
        loop {
            let Some(&(_, op)) = self
                .token(index)
                .and_then(|t| ops.iter().find(|(kind, _)| *kind == t.kind))
            else {
                return Ok((cur, index));
            };
            let (right, next) = base(self, index + 1)?;
            index = next;
            let kind = ExprKind::Binary {
                op,
                left: Box::new(cur),
                right: Box::new(right),
            };
            cur = self.node(kind, start, index);
        }
    }

    fn parse_unary(&mut self, start: usize) -> ParseResult<Expr> {
        let Some(token) = self.token(start) else {
            return self.parse_postfix(start);
        };
        let (operand, index) = match token.kind {
            TokenKind::Incr
            | TokenKind::Decr
            | TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Tilde
            | TokenKind::Play
            | TokenKind::Score => self.parse_unary(start + 1)?,
            _ => return self.parse_postfix(start),
        };
        let operand = Box::new(operand);
        let kind = match token.kind {
            TokenKind::Incr => ExprKind::IncDec {
                op: IncDec::Incr,
                prefix: true,
                operand,
            },
            TokenKind::Decr => ExprKind::IncDec {
                op: IncDec::Decr,
                prefix: true,
                operand,
            },
            TokenKind::Plus => ExprKind::Unary {
                op: UnaryOp::Plus,
                operand,
            },
            TokenKind::Minus => ExprKind::Unary {
                op: UnaryOp::Neg,
                operand,
            },
            TokenKind::Tilde => ExprKind::Unary {
                op: UnaryOp::Compl,
                operand,
            },
            TokenKind::Play => ExprKind::Play(operand),
            _ => ExprKind::Score(operand),
        };
        Ok((self.node(kind, start, index), index))
    }

    fn parse_postfix(&mut self, start: usize) -> ParseResult<Expr> {
        let (mut cur, mut index) = self.parse_primary(start)?;
        loop {
            let kind = match self.token(index).map(|t| t.kind) {
                Some(TokenKind::LBracket) => {
                    let (arg, next) = self.parse_expression(index + 1)?;
                    index = self.expect(next, TokenKind::RBracket, ErrorMode::Got)?;
                    ExprKind::Subscript {
                        base: Box::new(cur),
                        index: Box::new(arg),
                    }
                }
                Some(TokenKind::Dot) => {
                    let (suffix, next) = self.parse_primary(index + 1)?;
                    index = next;
                    ExprKind::Binary {
                        op: BinaryOp::Dot,
                        left: Box::new(cur),
                        right: Box::new(suffix),
                    }
                }
                Some(kind @ (TokenKind::Incr | TokenKind::Decr)) => {
                    index += 1;
                    ExprKind::IncDec {
                        op: if kind == TokenKind::Incr {
                            IncDec::Incr
                        } else {
                            IncDec::Decr
                        },
                        prefix: false,
                        operand: Box::new(cur),
                    }
                }
                _ => return Ok((cur, index)),
            };
            cur = self.node(kind, start, index);
        }
    }

    fn parse_primary(&mut self, start: usize) -> ParseResult<Expr> {
        let Some(token) = self.token(start) else {
            return Err(ParseError::new("expected expression", start, ErrorMode::Got));
        };
        let kind = match token.kind {
            TokenKind::LParen => {
                let (inner, index) = self.parse_expression(start + 1)?;
                let index = self.expect(index, TokenKind::RParen, ErrorMode::Got)?;
                return Ok((self.node(ExprKind::Paren(Box::new(inner)), start, index), index));
            }
            TokenKind::LBrace => return self.parse_args(start),
            TokenKind::Number => ExprKind::Number(token.content.clone()),
            TokenKind::Identifier => ExprKind::Identifier(token.content.clone()),
            TokenKind::Str => ExprKind::Str(token.chars.clone()),
            TokenKind::Char => ExprKind::Char(token.chars.first().copied().unwrap_or(0)),
            _ => return Err(ParseError::new("expected expression", start, ErrorMode::Got)),
        };
        Ok((self.node(kind, start, start + 1), start + 1))
    }

    /// `{` `}` or `{` assignment (`,` assignment)* `}`
    fn parse_args(&mut self, start: usize) -> ParseResult<Expr> {
        let mut index = self.expect(start, TokenKind::LBrace, ErrorMode::Got)?;
        let mut args = Vec::new();
        if !self.token_is(index, TokenKind::RBrace) {
            loop {
                let (arg, next) = self.parse_assignment(index)?;
                args.push(arg);
                index = next;
                if self.token_is(index, TokenKind::Comma) {
                    index += 1;
                } else {
                    break;
                }
            }
        }
        let index = self.expect(index, TokenKind::RBrace, ErrorMode::Got)?;
        Ok((self.node(ExprKind::Args(args), start, index), index))
    }
}
