//! Abstract Syntax Tree for `.mc` programs.
//!
//! Every expression carries an [`ExprId`] unique within one parse, which the
//! evaluator uses as the key of its place cache.

use std::fmt;

use super::error::Range;
use super::token::Token;

/// Identity of an expression node within a single [`Program`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// A parsed translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub items: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Decimal digits as written.
    Number(String),
    /// Code of a character literal (0 for an empty one).
    Char(u32),
    /// Character codes, NUL-terminated.
    Str(Vec<u32>),
    Identifier(String),
    Paren(Box<Expr>),
    /// `a, b, c`: evaluates each, yields the last.
    Multi(Vec<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Assign {
        op: AssignOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    IncDec {
        op: IncDec,
        prefix: bool,
        operand: Box<Expr>,
    },
    Subscript {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `{a, b, ...}` list literal.
    Args(Vec<Expr>),
    /// `play expr`: export/emit the operand.
    Play(Box<Expr>),
    /// `score expr`: render the operand as a score.
    Score(Box<Expr>),
}

impl Expr {
    /// Whether this expression can denote a storage location.
    pub fn is_lvalue_capable(&self) -> bool {
        match &self.kind {
            ExprKind::Identifier(_) | ExprKind::Str(_) | ExprKind::Subscript { .. } => true,
            ExprKind::Paren(inner) => inner.is_lvalue_capable(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    /// `@`
    Combine,
    /// `.` joins two operands into a decimal fraction.
    Dot,
    Shl,
    Shr,
    BitOr,
    BitAnd,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Combine => "@",
            BinaryOp::Dot => ".",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitOr => "|",
            BinaryOp::BitAnd => "&",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `=` or one of the compound forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Compound(BinaryOp),
}

impl AssignOp {
    pub fn symbol(self) -> String {
        match self {
            AssignOp::Assign => "=".to_string(),
            AssignOp::Compound(op) => format!("{}=", op.symbol()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Compl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDec {
    Incr,
    Decr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Declaration(Declaration),
    Compound(Vec<Stmt>),
    Empty,
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Break,
    Continue,
}

/// One declaration line: type specifiers and parallel declarator and
/// initializer lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub specs: Vec<Token>,
    pub decls: Vec<Declarator>,
    pub inits: Vec<Option<Expr>>,
}

/// Inside-out declarator tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Declarator {
    Identifier {
        name: Option<String>,
        range: Range,
    },
    Array {
        size: Option<Box<Expr>>,
        child: Box<Declarator>,
        range: Range,
    },
}

impl Declarator {
    pub fn range(&self) -> &Range {
        match self {
            Declarator::Identifier { range, .. } | Declarator::Array { range, .. } => range,
        }
    }

    /// The innermost declared name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Declarator::Identifier { name, .. } => name.as_deref(),
            Declarator::Array { child, .. } => child.name(),
        }
    }
}
