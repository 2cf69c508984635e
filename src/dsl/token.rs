//! Token types and the fixed keyword/symbol registry.

use std::fmt;

use super::error::Range;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier name, number digits, decoded string text, or the kind's
    /// own text for keywords and symbols.
    pub content: String,
    /// Character codes of a quoted literal (strings carry a trailing 0).
    pub chars: Vec<u32>,
    /// Raw source text of a quoted literal, quotes included.
    pub rep: String,
    pub range: Range,
}

impl Token {
    pub fn new(kind: TokenKind, range: Range) -> Self {
        Self {
            kind,
            content: kind.text().to_string(),
            chars: Vec::new(),
            rep: String::new(),
            range,
        }
    }

    pub fn with_content(kind: TokenKind, content: impl Into<String>, range: Range) -> Self {
        Self {
            kind,
            content: content.into(),
            chars: Vec::new(),
            rep: String::new(),
            range,
        }
    }

    pub fn quoted(kind: TokenKind, chars: Vec<u32>, rep: String, range: Range) -> Self {
        let content = chars
            .iter()
            .take_while(|&&c| c != 0)
            .filter_map(|&c| char::from_u32(c))
            .collect();
        Self {
            kind,
            content,
            chars,
            rep,
            range,
        }
    }

    /// The text shown to users for this token.
    pub fn display_text(&self) -> &str {
        if self.rep.is_empty() {
            &self.content
        } else {
            &self.rep
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_text())
    }
}

/// The kind of token. Compared by tag, never by text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Type specifiers
    Note,
    Chord,
    Piece,
    Setting,

    // Keywords
    Play,
    Print,
    Score,
    While,
    Case,
    If,
    Else,
    Break,
    Continue,

    // Symbols
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    At,
    Incr,
    Decr,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    EqEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Amp,
    Pound,
    Pipe,
    Shl,
    Shr,
    Tilde,
    DQuote,
    SQuote,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Dot,
    Arrow,

    // Literals
    Identifier,
    Number,
    Str,
    Char,
}

/// Keyword kinds, matched against whole chunks.
pub const KEYWORDS: &[TokenKind] = &[
    TokenKind::Note,
    TokenKind::Chord,
    TokenKind::Piece,
    TokenKind::Setting,
    TokenKind::Play,
    TokenKind::Print,
    TokenKind::Score,
    TokenKind::While,
    TokenKind::Case,
    TokenKind::If,
    TokenKind::Else,
    TokenKind::Break,
    TokenKind::Continue,
];

/// Symbol kinds, longest text first so the first match is the longest.
pub const SYMBOLS: &[TokenKind] = &[
    TokenKind::Incr,
    TokenKind::Decr,
    TokenKind::PlusAssign,
    TokenKind::MinusAssign,
    TokenKind::StarAssign,
    TokenKind::SlashAssign,
    TokenKind::PercentAssign,
    TokenKind::EqEq,
    TokenKind::NotEq,
    TokenKind::AndAnd,
    TokenKind::OrOr,
    TokenKind::LtEq,
    TokenKind::GtEq,
    TokenKind::Shl,
    TokenKind::Shr,
    TokenKind::Arrow,
    TokenKind::Plus,
    TokenKind::Minus,
    TokenKind::Star,
    TokenKind::Slash,
    TokenKind::Percent,
    TokenKind::At,
    TokenKind::Assign,
    TokenKind::Bang,
    TokenKind::Lt,
    TokenKind::Gt,
    TokenKind::Amp,
    TokenKind::Pound,
    TokenKind::Pipe,
    TokenKind::Tilde,
    TokenKind::DQuote,
    TokenKind::SQuote,
    TokenKind::LParen,
    TokenKind::RParen,
    TokenKind::LBrace,
    TokenKind::RBrace,
    TokenKind::LBracket,
    TokenKind::RBracket,
    TokenKind::Comma,
    TokenKind::Semicolon,
    TokenKind::Dot,
];

/// Kinds that may begin a declaration.
pub const TYPE_SPECIFIERS: &[TokenKind] = &[
    TokenKind::Note,
    TokenKind::Chord,
    TokenKind::Piece,
    TokenKind::Setting,
];

impl TokenKind {
    /// Source text of a keyword or symbol; a descriptive name otherwise.
    pub fn text(self) -> &'static str {
        use TokenKind::*;
        match self {
            Note => "note",
            Chord => "chord",
            Piece => "piece",
            Setting => "setting",
            Play => "play",
            Print => "print",
            Score => "score",
            While => "while",
            Case => "case",
            If => "if",
            Else => "else",
            Break => "break",
            Continue => "continue",
            Plus => "+",
            Minus => "-",
            Star => "*",
            Slash => "/",
            Percent => "%",
            At => "@",
            Incr => "++",
            Decr => "--",
            Assign => "=",
            PlusAssign => "+=",
            MinusAssign => "-=",
            StarAssign => "*=",
            SlashAssign => "/=",
            PercentAssign => "%=",
            EqEq => "==",
            NotEq => "!=",
            AndAnd => "&&",
            OrOr => "||",
            Bang => "!",
            Lt => "<",
            Gt => ">",
            LtEq => "<=",
            GtEq => ">=",
            Amp => "&",
            Pound => "#",
            Pipe => "|",
            Shl => "<<",
            Shr => ">>",
            Tilde => "~",
            DQuote => "\"",
            SQuote => "'",
            LParen => "(",
            RParen => ")",
            LBrace => "{",
            RBrace => "}",
            LBracket => "[",
            RBracket => "]",
            Comma => ",",
            Semicolon => ";",
            Dot => ".",
            Arrow => "->",
            Identifier => "identifier",
            Number => "number",
            Str => "string",
            Char => "char_string",
        }
    }

    pub fn is_type_specifier(self) -> bool {
        TYPE_SPECIFIERS.contains(&self)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_longest_first() {
        let lengths: Vec<usize> = SYMBOLS.iter().map(|k| k.text().len()).collect();
        let mut sorted = lengths.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(lengths, sorted);
    }

    #[test]
    fn keywords_are_words() {
        for kind in KEYWORDS {
            assert!(kind.text().chars().all(|c| c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn type_specifiers() {
        assert!(TokenKind::Chord.is_type_specifier());
        assert!(!TokenKind::Play.is_type_specifier());
    }
}
