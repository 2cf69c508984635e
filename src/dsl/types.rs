//! Type tags carried by evaluated values and variable slots.

use std::fmt;

/// Closed set of value types. Compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MusicType {
    Note,
    Chord,
    Piece,
    Setting,
    Integer,
    Char,
    /// Result of folding an operator; the payload decides what it is.
    Generic,
    Array(Box<MusicType>, Option<usize>),
}

impl MusicType {
    pub fn array_of(element: MusicType, size: Option<usize>) -> Self {
        MusicType::Array(Box::new(element), size)
    }

    /// Identical tags are compatible; arrays also need compatible elements
    /// and equal or unspecified sizes.
    pub fn compatible(&self, other: &MusicType) -> bool {
        match (self, other) {
            (MusicType::Array(a, n), MusicType::Array(b, m)) => {
                a.compatible(b) && (n.is_none() || m.is_none() || n == m)
            }
            (MusicType::Array(..), _) | (_, MusicType::Array(..)) => false,
            _ => self == other,
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, MusicType::Integer | MusicType::Char)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, MusicType::Array(..))
    }

    /// Element type of an array; other types have no elements.
    pub fn element(&self) -> Option<&MusicType> {
        match self {
            MusicType::Array(el, _) => Some(el),
            _ => None,
        }
    }
}

impl fmt::Display for MusicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MusicType::Note => f.write_str("note"),
            MusicType::Chord => f.write_str("chord"),
            MusicType::Piece => f.write_str("piece"),
            MusicType::Setting => f.write_str("setting"),
            MusicType::Integer => f.write_str("int"),
            MusicType::Char => f.write_str("char"),
            MusicType::Generic => f.write_str("value"),
            MusicType::Array(el, Some(n)) => write!(f, "{el}[{n}]"),
            MusicType::Array(el, None) => write!(f, "{el}[]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_compatibility() {
        assert!(MusicType::Note.compatible(&MusicType::Note));
        assert!(!MusicType::Note.compatible(&MusicType::Chord));
        assert!(!MusicType::Integer.compatible(&MusicType::Char));
    }

    #[test]
    fn array_compatibility() {
        let sized = MusicType::array_of(MusicType::Note, Some(3));
        let unsized_ = MusicType::array_of(MusicType::Note, None);
        let other = MusicType::array_of(MusicType::Note, Some(4));
        assert!(sized.compatible(&unsized_));
        assert!(!sized.compatible(&other));
        assert!(!sized.compatible(&MusicType::Note));
        assert!(!MusicType::array_of(MusicType::Chord, None).compatible(&unsized_));
    }

    #[test]
    fn classification() {
        assert!(MusicType::Char.is_integral());
        assert!(!MusicType::Generic.is_integral());
        assert_eq!(
            MusicType::array_of(MusicType::Chord, Some(2)).element(),
            Some(&MusicType::Chord)
        );
        assert_eq!(
            MusicType::array_of(MusicType::array_of(MusicType::Note, Some(3)), Some(2)).to_string(),
            "note[3][2]"
        );
    }
}
