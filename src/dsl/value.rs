//! Runtime payloads and the host operations the evaluator folds with.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

use super::ast::{BinaryOp, UnaryOp};
use super::types::MusicType;
use crate::music::theory::MusicObject;

/// Longest list or string (in bytes) a constant expression may build.
pub const MAX_ELEMENTS: usize = 1 << 20;

/// What a value actually holds at compile time.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Unset,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<Payload>),
    Music(MusicObject),
}

/// Which kind of literal produced a value, if any. Literal-ness drives the
/// coercion applied when assigning into `note`/`chord` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Str,
    List,
}

/// An evaluated expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub ty: MusicType,
    pub literal: Option<LiteralKind>,
    pub payload: Payload,
}

impl Value {
    pub fn integer_literal(v: i64) -> Self {
        Self {
            ty: MusicType::Integer,
            literal: Some(LiteralKind::Integer),
            payload: Payload::Int(v),
        }
    }

    /// A string literal; `chars` carries its trailing NUL.
    pub fn string_literal(chars: &[u32]) -> Self {
        let text_len = chars.len().saturating_sub(1);
        let text = chars[..text_len]
            .iter()
            .map(|&c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect();
        Self {
            ty: MusicType::array_of(MusicType::Char, Some(chars.len())),
            literal: Some(LiteralKind::Str),
            payload: Payload::Text(text),
        }
    }

    pub fn list_literal(items: Vec<Payload>) -> Self {
        Self {
            ty: MusicType::Generic,
            literal: Some(LiteralKind::List),
            payload: Payload::List(items),
        }
    }

    pub fn generic(payload: Payload) -> Self {
        Self {
            ty: MusicType::Generic,
            literal: None,
            payload,
        }
    }
}

/// Failure of a host operation on two payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OpError {
    #[error("invalid operands")]
    InvalidOperands,
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in constant expression")]
    Overflow,
    #[error("negative shift count")]
    NegativeShift,
    #[error("repeated value is too large")]
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("subscripted value is not an array")]
    NotIndexable,
    #[error("array index out of range")]
    OutOfRange,
    #[error("array subscript is not an integer")]
    NotInteger,
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl Payload {
    fn num(&self) -> Option<Num> {
        match self {
            Payload::Int(i) => Some(Num::Int(*i)),
            Payload::Bool(b) => Some(Num::Int(i64::from(*b))),
            Payload::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Payload::Int(i) => Some(*i),
            Payload::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn is_music(&self) -> bool {
        matches!(self, Payload::Music(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Payload::Unset => false,
            Payload::Int(i) => *i != 0,
            Payload::Float(f) => *f != 0.0,
            Payload::Bool(b) => *b,
            Payload::Text(s) => !s.is_empty(),
            Payload::List(items) => !items.is_empty(),
            Payload::Music(_) => true,
        }
    }

    /// Equality with numbers compared by value across int and float.
    pub fn loose_eq(&self, other: &Payload) -> bool {
        match (self.num(), other.num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
            _ => self == other,
        }
    }

    /// Element `index` of a list, a string, a chord's notes or a piece's
    /// tracks. Negative indices count from the end.
    pub fn index(&self, index: i64) -> Result<Payload, IndexError> {
        match self {
            Payload::List(items) => Ok(items[normalize(index, items.len())?].clone()),
            Payload::Text(s) => {
                let chars: Vec<char> = s.chars().collect();
                Ok(Payload::Text(chars[normalize(index, chars.len())?].to_string()))
            }
            Payload::Music(MusicObject::Chord(chord)) => {
                let note = &chord.notes[normalize(index, chord.notes.len())?];
                Ok(Payload::Music(MusicObject::Note(note.clone())))
            }
            Payload::Music(MusicObject::Piece(piece)) => {
                let track = &piece.tracks[normalize(index, piece.tracks.len())?];
                Ok(Payload::Music(MusicObject::Chord(track.clone())))
            }
            _ => Err(IndexError::NotIndexable),
        }
    }

    /// Mutable element of a list.
    pub fn element_mut(&mut self, index: i64) -> Result<&mut Payload, IndexError> {
        match self {
            Payload::List(items) => {
                let at = normalize(index, items.len())?;
                Ok(&mut items[at])
            }
            _ => Err(IndexError::NotIndexable),
        }
    }
}

fn normalize(index: i64, len: usize) -> Result<usize, IndexError> {
    let len = i64::try_from(len).map_err(|_| IndexError::OutOfRange)?;
    let at = if index < 0 { index + len } else { index };
    if (0..len).contains(&at) {
        usize::try_from(at).map_err(|_| IndexError::OutOfRange)
    } else {
        Err(IndexError::OutOfRange)
    }
}

/// Fold a binary operator over two non-music payloads. Logical operators
/// short-circuit in the evaluator and never reach here.
pub fn binary(op: BinaryOp, l: &Payload, r: &Payload) -> Result<Payload, OpError> {
    use BinaryOp::*;
    match op {
        Eq => Ok(Payload::Bool(l.loose_eq(r))),
        Ne => Ok(Payload::Bool(!l.loose_eq(r))),
        Lt | Gt | Le | Ge => compare(op, l, r),
        Dot => dot(l, r),
        Shl | Shr | BitOr | BitAnd => bitwise(op, l, r),
        Add | Sub | Mul | Div | Mod => arithmetic(op, l, r),
        Combine | And | Or => Err(OpError::InvalidOperands),
    }
}

pub fn unary(op: UnaryOp, v: &Payload) -> Result<Payload, OpError> {
    match (op, v.num()) {
        (UnaryOp::Plus, Some(Num::Int(i))) => Ok(Payload::Int(i)),
        (UnaryOp::Plus, Some(Num::Float(f))) => Ok(Payload::Float(f)),
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Payload::Int).ok_or(OpError::Overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Payload::Float(-f)),
        (UnaryOp::Compl, Some(Num::Int(i))) => Ok(Payload::Int(!i)),
        _ => Err(OpError::InvalidOperands),
    }
}

fn arithmetic(op: BinaryOp, l: &Payload, r: &Payload) -> Result<Payload, OpError> {
    if let (Some(a), Some(b)) = (l.num(), r.num()) {
        return numeric(op, a, b);
    }
    match (op, l, r) {
        (BinaryOp::Add, Payload::Text(a), Payload::Text(b)) => Ok(Payload::Text(format!("{a}{b}"))),
        (BinaryOp::Add, Payload::List(a), Payload::List(b)) => {
            Ok(Payload::List(a.iter().chain(b).cloned().collect()))
        }
        (BinaryOp::Mul, Payload::Text(s), n) | (BinaryOp::Mul, n, Payload::Text(s)) => {
            let n = n.as_int().ok_or(OpError::InvalidOperands)?;
            let count = repeat_count(n);
            repeated_len(s.len(), count)?;
            Ok(Payload::Text(s.repeat(count)))
        }
        (BinaryOp::Mul, Payload::List(items), n) | (BinaryOp::Mul, n, Payload::List(items)) => {
            let n = n.as_int().ok_or(OpError::InvalidOperands)?;
            let total = repeated_len(items.len(), repeat_count(n))?;
            Ok(Payload::List(items.iter().cycle().take(total).cloned().collect()))
        }
        _ => Err(OpError::InvalidOperands),
    }
}

fn repeat_count(n: i64) -> usize {
    usize::try_from(n.max(0)).unwrap_or(usize::MAX)
}

fn repeated_len(len: usize, count: usize) -> Result<usize, OpError> {
    len.checked_mul(count)
        .filter(|total| *total <= MAX_ELEMENTS)
        .ok_or(OpError::TooLarge)
}

fn numeric(op: BinaryOp, a: Num, b: Num) -> Result<Payload, OpError> {
    if let (Num::Int(x), Num::Int(y)) = (a, b) {
        let out = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div => {
                if y == 0 {
                    return Err(OpError::DivisionByZero);
                }
                return Ok(Payload::Float(x as f64 / y as f64));
            }
            BinaryOp::Mod => {
                if y == 0 {
                    return Err(OpError::DivisionByZero);
                }
                x.checked_rem(y)
                    .map(|m| if m != 0 && (m < 0) != (y < 0) { m + y } else { m })
            }
            _ => return Err(OpError::InvalidOperands),
        };
        return out.map(Payload::Int).ok_or(OpError::Overflow);
    }

    let (x, y) = (a.as_f64(), b.as_f64());
    let out = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div if y == 0.0 => return Err(OpError::DivisionByZero),
        BinaryOp::Div => x / y,
        BinaryOp::Mod if y == 0.0 => return Err(OpError::DivisionByZero),
        BinaryOp::Mod => {
            let m = x % y;
            if m != 0.0 && (m < 0.0) != (y < 0.0) {
                m + y
            } else {
                m
            }
        }
        _ => return Err(OpError::InvalidOperands),
    };
    Ok(Payload::Float(out))
}

fn compare(op: BinaryOp, l: &Payload, r: &Payload) -> Result<Payload, OpError> {
    let ordering = match (l.num(), r.num(), l, r) {
        (Some(Num::Int(a)), Some(Num::Int(b)), _, _) => Some(a.cmp(&b)),
        (Some(a), Some(b), _, _) => a.as_f64().partial_cmp(&b.as_f64()),
        (_, _, Payload::Text(a), Payload::Text(b)) => Some(a.cmp(b)),
        _ => return Err(OpError::InvalidOperands),
    };
    // NaN compares false both ways.
    let Some(ordering) = ordering else {
        return Ok(Payload::Bool(false));
    };
    let result = match op {
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Le => ordering != Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(Payload::Bool(result))
}

/// `l . r` reads the two operands side by side as a decimal number.
fn dot(l: &Payload, r: &Payload) -> Result<Payload, OpError> {
    let scalar = |p: &Payload| match p {
        Payload::Int(_) | Payload::Float(_) | Payload::Text(_) => Some(p.to_string()),
        _ => None,
    };
    let (Some(a), Some(b)) = (scalar(l), scalar(r)) else {
        return Err(OpError::InvalidOperands);
    };
    format!("{a}.{b}")
        .parse::<f64>()
        .map(Payload::Float)
        .map_err(|_| OpError::InvalidOperands)
}

fn bitwise(op: BinaryOp, l: &Payload, r: &Payload) -> Result<Payload, OpError> {
    let (Some(x), Some(y)) = (l.as_int(), r.as_int()) else {
        return Err(OpError::InvalidOperands);
    };
    let out = match op {
        BinaryOp::BitOr => x | y,
        BinaryOp::BitAnd => x & y,
        BinaryOp::Shl => {
            if y < 0 {
                return Err(OpError::NegativeShift);
            }
            let shift = u32::try_from(y).map_err(|_| OpError::Overflow)?;
            let shifted = x.checked_shl(shift).ok_or(OpError::Overflow)?;
            if shifted >> shift != x {
                return Err(OpError::Overflow);
            }
            shifted
        }
        _ => {
            if y < 0 {
                return Err(OpError::NegativeShift);
            }
            match u32::try_from(y).ok().and_then(|s| x.checked_shr(s)) {
                Some(v) => v,
                None if x < 0 => -1,
                None => 0,
            }
        }
    };
    Ok(Payload::Int(out))
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Unset => f.write_str("<unset>"),
            Payload::Int(i) => write!(f, "{i}"),
            Payload::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{x:.1}"),
            Payload::Float(x) => write!(f, "{x}"),
            Payload::Bool(b) => write!(f, "{b}"),
            Payload::Text(s) => f.write_str(s),
            Payload::List(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("}")
            }
            Payload::Music(obj) => write!(f, "{obj}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn float(p: Result<Payload, OpError>) -> f64 {
        match p {
            Ok(Payload::Float(f)) => f,
            other => panic!("expected float, got {other:?}"),
        }
    }

    #[test]
    fn integer_arithmetic() {
        assert_eq!(
            binary(BinaryOp::Add, &Payload::Int(2), &Payload::Int(3)),
            Ok(Payload::Int(5))
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Payload::Int(4), &Payload::Bool(true)),
            Ok(Payload::Int(4))
        );
        assert_eq!(
            binary(BinaryOp::Add, &Payload::Int(i64::MAX), &Payload::Int(1)),
            Err(OpError::Overflow)
        );
    }

    #[test]
    fn division_is_true_division() {
        assert_approx_eq!(float(binary(BinaryOp::Div, &Payload::Int(7), &Payload::Int(2))), 3.5);
        assert_eq!(
            binary(BinaryOp::Div, &Payload::Int(1), &Payload::Int(0)),
            Err(OpError::DivisionByZero)
        );
    }

    #[test]
    fn modulo_follows_divisor_sign() {
        assert_eq!(
            binary(BinaryOp::Mod, &Payload::Int(-7), &Payload::Int(3)),
            Ok(Payload::Int(2))
        );
        assert_eq!(
            binary(BinaryOp::Mod, &Payload::Int(7), &Payload::Int(-3)),
            Ok(Payload::Int(-2))
        );
        assert_approx_eq!(
            float(binary(BinaryOp::Mod, &Payload::Float(-1.5), &Payload::Int(1))),
            0.5
        );
    }

    #[test]
    fn dot_builds_decimal() {
        assert_approx_eq!(float(binary(BinaryOp::Dot, &Payload::Int(1), &Payload::Int(25))), 1.25);
        assert_eq!(
            binary(BinaryOp::Dot, &Payload::Float(1.5), &Payload::Int(2)),
            Err(OpError::InvalidOperands)
        );
    }

    #[test]
    fn comparisons_yield_bools() {
        assert_eq!(
            binary(BinaryOp::Lt, &Payload::Int(1), &Payload::Float(1.5)),
            Ok(Payload::Bool(true))
        );
        assert_eq!(
            binary(BinaryOp::Eq, &Payload::Int(2), &Payload::Float(2.0)),
            Ok(Payload::Bool(true))
        );
        assert_eq!(
            binary(BinaryOp::Ge, &Payload::Text("b".into()), &Payload::Text("a".into())),
            Ok(Payload::Bool(true))
        );
        assert_eq!(
            binary(BinaryOp::Lt, &Payload::Unset, &Payload::Int(1)),
            Err(OpError::InvalidOperands)
        );
    }

    #[test]
    fn bitwise_and_shifts() {
        assert_eq!(
            binary(BinaryOp::Shl, &Payload::Int(1), &Payload::Int(4)),
            Ok(Payload::Int(16))
        );
        assert_eq!(
            binary(BinaryOp::Shr, &Payload::Int(-8), &Payload::Int(100)),
            Ok(Payload::Int(-1))
        );
        assert_eq!(
            binary(BinaryOp::Shl, &Payload::Int(1), &Payload::Int(-1)),
            Err(OpError::NegativeShift)
        );
        assert_eq!(
            binary(BinaryOp::BitOr, &Payload::Int(5), &Payload::Int(2)),
            Ok(Payload::Int(7))
        );
    }

    #[test]
    fn sequences_concatenate_and_repeat() {
        assert_eq!(
            binary(BinaryOp::Add, &Payload::Text("C".into()), &Payload::Text("4".into())),
            Ok(Payload::Text("C4".into()))
        );
        assert_eq!(
            binary(
                BinaryOp::Mul,
                &Payload::List(vec![Payload::Int(1)]),
                &Payload::Int(3)
            ),
            Ok(Payload::List(vec![Payload::Int(1); 3]))
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Payload::Int(-2), &Payload::Text("ab".into())),
            Ok(Payload::Text(String::new()))
        );
    }

    #[test]
    fn oversized_repetition_is_an_error() {
        let huge = Payload::Int(i64::from(i32::MAX) * i64::from(i32::MAX));
        assert_eq!(
            binary(BinaryOp::Mul, &Payload::Text("ab".into()), &huge),
            Err(OpError::TooLarge)
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Payload::List(vec![Payload::Int(1)]), &huge),
            Err(OpError::TooLarge)
        );
        assert_eq!(
            binary(
                BinaryOp::Mul,
                &Payload::List(vec![Payload::Int(1); 2]),
                &Payload::Int(1 << 20)
            ),
            Err(OpError::TooLarge)
        );
        // An empty list stays empty however often it repeats.
        assert_eq!(
            binary(BinaryOp::Mul, &Payload::List(Vec::new()), &huge),
            Ok(Payload::List(Vec::new()))
        );
    }

    #[test]
    fn unary_ops() {
        assert_eq!(unary(UnaryOp::Neg, &Payload::Int(3)), Ok(Payload::Int(-3)));
        assert_eq!(unary(UnaryOp::Compl, &Payload::Int(0)), Ok(Payload::Int(-1)));
        assert_eq!(
            unary(UnaryOp::Neg, &Payload::Text("x".into())),
            Err(OpError::InvalidOperands)
        );
    }

    #[test]
    fn indexing() {
        let list = Payload::List(vec![Payload::Int(1), Payload::Int(2)]);
        assert_eq!(list.index(-1), Ok(Payload::Int(2)));
        assert_eq!(list.index(2), Err(IndexError::OutOfRange));
        assert_eq!(Payload::Text("ab".into()).index(0), Ok(Payload::Text("a".into())));
        assert_eq!(Payload::Int(3).index(0), Err(IndexError::NotIndexable));
    }

    #[test]
    fn string_literal_drops_terminator() {
        let v = Value::string_literal(&[104, 105, 0]);
        assert_eq!(v.payload, Payload::Text("hi".into()));
        assert_eq!(v.ty, MusicType::array_of(MusicType::Char, Some(3)));
        assert_eq!(v.literal, Some(LiteralKind::Str));
    }

    #[test]
    fn display() {
        assert_eq!(Payload::Float(6.0).to_string(), "6.0");
        assert_eq!(
            Payload::List(vec![Payload::Int(1), Payload::Text("C".into())]).to_string(),
            "{1, C}"
        );
    }
}
