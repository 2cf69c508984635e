//! Lexer for `.mc` source.
//!
//! Works one (joined) line at a time. A lexical error drops the rest of
//! the offending line and lexing resumes on the next one.

use std::sync::Arc;

use tracing::debug;

use super::error::{CompileError, ErrorCollector, Position, Range};
use super::token::{Token, TokenKind, KEYWORDS, SYMBOLS};

/// A source character tagged with where it came from.
#[derive(Debug, Clone)]
struct Tagged {
    c: char,
    p: Position,
}

type Line = Vec<Tagged>;

pub struct Lexer {
    file: Arc<str>,
    lines: Vec<Line>,
    in_comment: bool,
}

impl Lexer {
    pub fn new(source: &str, file: &str) -> Self {
        let file: Arc<str> = file.into();
        let mut lines = split_tagged_lines(source, &file);
        join_continued_lines(&mut lines);
        Self {
            file,
            lines,
            in_comment: false,
        }
    }

    /// Tokenize the whole source. Lexical errors go to `errors`.
    pub fn tokenize(&mut self, errors: &mut ErrorCollector) -> Vec<Token> {
        let mut tokens = Vec::new();
        let lines = std::mem::take(&mut self.lines);
        for line in &lines {
            match self.tokenize_line(line, errors) {
                Ok(mut line_tokens) => tokens.append(&mut line_tokens),
                Err(e) => errors.add(e),
            }
        }
        debug!(file = %self.file, count = tokens.len(), "lexed");
        tokens
    }

    fn tokenize_line(
        &mut self,
        line: &[Tagged],
        errors: &mut ErrorCollector,
    ) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        let mut in_comment = self.in_comment;
        let mut start = 0;
        let mut end = 0;

        while end < line.len() {
            let symbol = match_symbol_at(line, end);
            let next_symbol = match_symbol_at(line, end + 1);

            if in_comment {
                if symbol == Some(TokenKind::Star) && next_symbol == Some(TokenKind::Slash) {
                    in_comment = false;
                    start = end + 2;
                } else {
                    start = end + 1;
                }
                end = start;
            } else if symbol == Some(TokenKind::Slash) && next_symbol == Some(TokenKind::Star) {
                add_chunk(&line[start..end], &mut tokens)?;
                in_comment = true;
                start = end + 2;
                end = start;
            } else if symbol == Some(TokenKind::Slash) && next_symbol == Some(TokenKind::Slash) {
                break;
            } else if line[end].c.is_whitespace() {
                add_chunk(&line[start..end], &mut tokens)?;
                start = end + 1;
                end = start;
            } else if matches!(symbol, Some(TokenKind::DQuote | TokenKind::SQuote)) {
                add_chunk(&line[start..end], &mut tokens)?;
                let token = read_quoted(line, end, symbol == Some(TokenKind::DQuote), errors)?;
                start = end + token.rep.chars().count();
                end = start;
                tokens.push(token);
            } else if let Some(kind) = symbol {
                add_chunk(&line[start..end], &mut tokens)?;
                let len = kind.text().chars().count();
                let range = Range::new(line[end].p.clone(), line[end + len - 1].p.clone());
                tokens.push(Token::new(kind, range));
                start = end + len;
                end = start;
            } else {
                end += 1;
            }
        }
        if !in_comment {
            add_chunk(&line[start..end], &mut tokens)?;
        }

        self.in_comment = in_comment;
        Ok(tokens)
    }
}

/// Tokenize `source` in one call.
pub fn tokenize(source: &str, file: &str, errors: &mut ErrorCollector) -> Vec<Token> {
    Lexer::new(source, file).tokenize(errors)
}

fn split_tagged_lines(source: &str, file: &Arc<str>) -> Vec<Line> {
    source
        .lines()
        .enumerate()
        .map(|(index, text)| {
            let full_line: Arc<str> = text.into();
            text.chars()
                .enumerate()
                .map(|(col, c)| Tagged {
                    c,
                    p: Position::new(file.clone(), index + 1, col + 1, full_line.clone()),
                })
                .collect()
        })
        .collect()
}

/// Fold each line ending in `\` into the one after it. A `\` on the last
/// line is dropped.
fn join_continued_lines(lines: &mut Vec<Line>) {
    let mut i = 0;
    while i < lines.len() {
        if lines[i].last().map(|t| t.c) == Some('\\') {
            lines[i].pop();
            if i + 1 < lines.len() {
                let next = lines.remove(i + 1);
                lines[i].extend(next);
                continue;
            }
        }
        i += 1;
    }
}

fn match_symbol_at(line: &[Tagged], start: usize) -> Option<TokenKind> {
    SYMBOLS.iter().copied().find(|kind| {
        let text = kind.text();
        let len = text.chars().count();
        start + len <= line.len()
            && line[start..start + len]
                .iter()
                .map(|t| t.c)
                .eq(text.chars())
    })
}

fn chunk_text(chunk: &[Tagged]) -> String {
    chunk.iter().map(|t| t.c).collect()
}

/// Classify a chunk of non-space, non-symbol characters.
fn add_chunk(chunk: &[Tagged], tokens: &mut Vec<Token>) -> Result<(), CompileError> {
    let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
        return Ok(());
    };
    let range = Range::new(first.p.clone(), last.p.clone());
    let text = chunk_text(chunk);

    if let Some(kind) = KEYWORDS.iter().copied().find(|k| k.text() == text) {
        tokens.push(Token::new(kind, range));
    } else if text.chars().all(|c| c.is_ascii_digit()) {
        tokens.push(Token::with_content(TokenKind::Number, text, range));
    } else if is_identifier(&text) {
        tokens.push(Token::with_content(TokenKind::Identifier, text, range));
    } else {
        return Err(CompileError::lex(
            format!("unrecognized token at '{text}'"),
            range,
        ));
    }
    Ok(())
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn simple_escape(c: char) -> Option<u32> {
    Some(match c {
        '\'' => 39,
        '"' => 34,
        '?' => 63,
        '\\' => 92,
        'a' => 7,
        'b' => 8,
        'f' => 12,
        'n' => 10,
        'r' => 13,
        't' => 9,
        'v' => 11,
        _ => return None,
    })
}

/// Read a quoted literal whose opening quote sits at `open`.
fn read_quoted(
    line: &[Tagged],
    open: usize,
    is_string: bool,
    errors: &mut ErrorCollector,
) -> Result<Token, CompileError> {
    let delim = if is_string { '"' } else { '\'' };
    let at = |i: usize| line.get(i).map(|t| t.c);
    let mut chars = Vec::new();
    let mut i = open + 1;

    let close = loop {
        let Some(c) = at(i) else {
            return Err(CompileError::lex(
                "missing terminating quote",
                Range::at(line[open].p.clone()),
            ));
        };
        if c == delim {
            break i;
        }
        if c != '\\' {
            chars.push(c as u32);
            i += 1;
            continue;
        }
        match at(i + 1) {
            Some(e) if simple_escape(e).is_some() => {
                chars.extend(simple_escape(e));
                i += 2;
            }
            Some(d) if d.is_digit(8) => {
                let mut value = 0;
                let mut digits = 0;
                i += 1;
                while digits < 3 {
                    match at(i).and_then(|c| c.to_digit(8)) {
                        Some(v) => value = value * 8 + v,
                        None => break,
                    }
                    digits += 1;
                    i += 1;
                }
                chars.push(value);
            }
            Some('x') if at(i + 2).is_some_and(|c| c.is_ascii_hexdigit()) => {
                let mut value: u32 = 0;
                i += 2;
                while let Some(v) = at(i).and_then(|c| c.to_digit(16)) {
                    value = value.wrapping_mul(16).wrapping_add(v);
                    i += 1;
                }
                chars.push(value);
            }
            _ => {
                chars.push('\\' as u32);
                i += 1;
            }
        }
    };

    let range = Range::new(line[open].p.clone(), line[close].p.clone());
    let rep = chunk_text(&line[open..=close]);

    if is_string {
        chars.push(0);
        return Ok(Token::quoted(TokenKind::Str, chars, rep, range));
    }
    match chars.len() {
        0 => errors.add(CompileError::lex("empty character constant", range.clone())),
        1 => {}
        _ => errors.add(CompileError::lex(
            "multiple characters in character constant",
            range.clone(),
        )),
    }
    Ok(Token::quoted(TokenKind::Char, chars, rep, range))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, ErrorCollector) {
        let mut errors = ErrorCollector::new();
        let tokens = tokenize(source, "test.mc", &mut errors);
        (tokens, errors)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_declaration() {
        use TokenKind::*;
        assert_eq!(
            kinds("note a = 5;"),
            vec![Note, Identifier, Assign, Number, Semicolon]
        );
    }

    #[test]
    fn lex_longest_symbol() {
        assert_eq!(kinds("=="), vec![TokenKind::EqEq]);
        assert_eq!(kinds("a<<=b").len(), 4);
        assert_eq!(kinds("a<<=b")[1], TokenKind::Shl);
        assert_eq!(kinds("x->y")[1], TokenKind::Arrow);
    }

    #[test]
    fn lex_keywords_need_whole_chunk() {
        assert_eq!(kinds("notes"), vec![TokenKind::Identifier]);
        assert_eq!(kinds("while"), vec![TokenKind::While]);
    }

    #[test]
    fn lex_positions() {
        let (tokens, _) = lex("note  abc;\n  play abc;");
        let abc = &tokens[1];
        assert_eq!(abc.range.start.col, 7);
        assert_eq!(abc.range.end.col, 9);
        let play = &tokens[3];
        assert_eq!(play.range.start.line, 2);
        assert_eq!(play.range.start.col, 3);
    }

    #[test]
    fn range_text_matches_display_text() {
        let (tokens, errors) = lex("chord c[2] = {\"C\", 'x'}; a += 10; /* x */ b--;");
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 19);
        for token in &tokens {
            assert_eq!(token.range.text().as_deref(), Some(token.display_text()));
        }
    }

    #[test]
    fn lex_comments() {
        assert_eq!(kinds("a // b c"), vec![TokenKind::Identifier]);
        assert_eq!(
            kinds("a /* b */ c"),
            vec![TokenKind::Identifier, TokenKind::Identifier]
        );
        assert_eq!(
            kinds("a /* b\n c */ d"),
            vec![TokenKind::Identifier, TokenKind::Identifier]
        );
        assert_eq!(kinds("a/* ++ */+b").len(), 3);
    }

    #[test]
    fn lex_line_continuation() {
        let (tokens, _) = lex("no\\\nte a;");
        assert_eq!(tokens[0].kind, TokenKind::Note);
        assert_eq!(tokens[0].range.end.line, 2);
    }

    #[test]
    fn lex_trailing_continuation_dropped() {
        let (tokens, errors) = lex("a;\\");
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn lex_string_escapes() {
        let (tokens, errors) = lex(r#""a\n\101\x41\q""#);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].chars, vec![97, 10, 65, 65, 92, 113, 0]);
        assert_eq!(tokens[0].rep, r#""a\n\101\x41\q""#);
    }

    #[test]
    fn lex_escaped_quote_inside_string() {
        let (tokens, _) = lex(r#""say \"hi\"""#);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].content, "say \"hi\"");
    }

    #[test]
    fn lex_char_literals() {
        let (tokens, errors) = lex("'a'");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Char);
        assert_eq!(tokens[0].chars, vec![97]);

        let (tokens, errors) = lex("''");
        assert_eq!(tokens.len(), 1);
        assert_eq!(errors.issues()[0].message, "empty character constant");

        let (_, errors) = lex("'ab'");
        assert_eq!(
            errors.issues()[0].message,
            "multiple characters in character constant"
        );
    }

    #[test]
    fn lex_unterminated_quote() {
        let (tokens, errors) = lex("a = \"abc;\nb;");
        assert_eq!(errors.error_count(), 1);
        let issue = &errors.issues()[0];
        assert_eq!(issue.message, "missing terminating quote");
        assert_eq!(issue.range.as_ref().map(|r| r.start.col), Some(5));
        // First line is dropped entirely.
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].content, "b");
    }

    #[test]
    fn lex_unrecognized_token() {
        let (tokens, errors) = lex("note 9a;\nnote b;");
        assert_eq!(errors.issues()[0].message, "unrecognized token at '9a'");
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn lex_empty_input() {
        let (tokens, errors) = lex("");
        assert!(tokens.is_empty());
        assert!(errors.is_empty());
    }
}
