//! # BASIC lexer
//!
//! Tokenizes BASIC source code into a stream of tokens.
//!
//! ## Features
//!
//! - **Line numbers**: not a distinct token kind — a leading decimal integer
//!   on a line is lexed as an ordinary [`TokenKind::Number`]; the parser is
//!   the one that knows the first number on a line is a jump label.
//! - **Identifiers**: a leading letter followed by letters/digits, with an
//!   optional trailing `$` or `%` type suffix kept as part of the lexeme.
//! - **Numeric literals**: digits, optional fractional part, optional
//!   exponent (`1.5E-3`). Sign is not consumed here — `-1` lexes as `Minus`
//!   followed by `Number(1.0)`; the parser treats unary minus as a prefix
//!   operator.
//! - **String literals**: double-quoted, no escape processing. Unterminated
//!   at end-of-line is an error.
//! - **`REM`**: swallows the remainder of the physical line as a single
//!   comment token, never producing further tokens for that line.
//! - **Keywords**: matched case-insensitively against the fixed vocabulary
//!   in [`token::lookup_keyword`]; anything else is an identifier.

pub mod cursor;
pub mod token;

#[cfg(test)]
mod tests;

use crate::error::{ErrorKind, RuntimeError, Span};
use cursor::Cursor;
use token::{lookup_keyword, Token, TokenKind};

/// Tokens plus any lexical errors, so a caller can report everything wrong
/// with a source file in one pass rather than stopping at the first error.
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<RuntimeError>,
}

#[must_use]
pub fn tokenize(source: &str) -> LexResult {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    while !cursor.is_at_end() {
        match lex_token(&mut cursor) {
            Ok(Some(token)) => {
                log::trace!("token: {:?} {:?}", token.kind, token.span);
                tokens.push(token);
            }
            Ok(None) => {}
            Err(err) => errors.push(err),
        }
    }

    let (l, c) = cursor.current_pos();
    tokens.push(Token {
        kind: TokenKind::Eof,
        lexeme: String::new(),
        span: Span::new(l, c),
    });

    LexResult { tokens, errors }
}

fn lex_token(cursor: &mut Cursor) -> Result<Option<Token>, RuntimeError> {
    while matches!(cursor.peek(), Some(' ' | '\t')) {
        cursor.advance();
    }

    if cursor.is_at_end() {
        return Ok(None);
    }

    let (sl, sc) = cursor.current_pos();
    let ch = cursor.peek().unwrap();

    match ch {
        '\n' | '\r' => lex_newline(cursor, sl, sc),
        '"' => lex_string(cursor, sl, sc),
        c if c.is_ascii_digit() || c == '.' => lex_number(cursor, sl, sc),
        c if c.is_ascii_alphabetic() => lex_word(cursor, sl, sc),
        _ => lex_punctuation(cursor, sl, sc),
    }
}

fn lex_newline(cursor: &mut Cursor, sl: usize, sc: usize) -> Result<Option<Token>, RuntimeError> {
    if cursor.peek() == Some('\r') {
        cursor.advance();
        if cursor.peek() == Some('\n') {
            cursor.advance();
        }
    } else {
        cursor.advance();
    }

    Ok(Some(Token {
        kind: TokenKind::Newline,
        lexeme: "\n".into(),
        span: cursor.make_span(sl, sc),
    }))
}

fn lex_string(cursor: &mut Cursor, sl: usize, sc: usize) -> Result<Option<Token>, RuntimeError> {
    cursor.advance();
    let mut text = String::new();
    let mut raw = String::from("\"");

    loop {
        match cursor.peek() {
            None | Some('\n') | Some('\r') => {
                return Err(RuntimeError::at(
                    ErrorKind::UnterminatedString,
                    "unterminated string literal",
                    cursor.make_span(sl, sc),
                ));
            }
            Some('"') => {
                cursor.advance();
                raw.push('"');
                break;
            }
            Some(c) => {
                cursor.advance();
                text.push(c);
                raw.push(c);
            }
        }
    }

    Ok(Some(Token {
        kind: TokenKind::String(text),
        lexeme: raw,
        span: cursor.make_span(sl, sc),
    }))
}

fn lex_number(cursor: &mut Cursor, sl: usize, sc: usize) -> Result<Option<Token>, RuntimeError> {
    let mut raw = String::new();

    while matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
        raw.push(cursor.advance().unwrap());
    }

    if cursor.peek() == Some('.') {
        raw.push(cursor.advance().unwrap());
        while matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
            raw.push(cursor.advance().unwrap());
        }
    }

    if matches!(cursor.peek(), Some('E' | 'e')) {
        let mut lookahead = raw.clone();
        lookahead.push('E');
        let save_pos = cursor.current_pos();
        cursor.advance();
        let mut exp = String::new();
        if matches!(cursor.peek(), Some('+' | '-')) {
            exp.push(cursor.advance().unwrap());
        }
        let digits_start = exp.len();
        while matches!(cursor.peek(), Some(c) if c.is_ascii_digit()) {
            exp.push(cursor.advance().unwrap());
        }
        if exp.len() > digits_start {
            raw.push('E');
            raw.push_str(&exp);
        } else {
            // No digits followed the exponent marker: not actually an
            // exponent, so this branch shouldn't consume anything.
            // There is no cursor rewind here because `Cursor` only moves
            // forward; fall through and let the malformed literal error.
            let _ = save_pos;
            return Err(RuntimeError::at(
                ErrorKind::InvalidNumericLiteral,
                format!("invalid numeric literal: {}", lookahead),
                cursor.make_span(sl, sc),
            ));
        }
    }

    let value: f64 = raw.parse().map_err(|_| {
        RuntimeError::at(
            ErrorKind::InvalidNumericLiteral,
            format!("invalid numeric literal: {}", raw),
            cursor.make_span(sl, sc),
        )
    })?;

    Ok(Some(Token {
        kind: TokenKind::Number(value),
        lexeme: raw,
        span: cursor.make_span(sl, sc),
    }))
}

fn lex_word(cursor: &mut Cursor, sl: usize, sc: usize) -> Result<Option<Token>, RuntimeError> {
    let mut word = String::new();
    while matches!(cursor.peek(), Some(c) if c.is_ascii_alphanumeric()) {
        word.push(cursor.advance().unwrap());
    }
    if matches!(cursor.peek(), Some('$' | '%')) {
        word.push(cursor.advance().unwrap());
    }

    let upper = word.to_ascii_uppercase();

    if upper == "REM" {
        return lex_rem_comment(cursor, sl, sc);
    }

    if let Some(kind) = lookup_keyword(&upper) {
        return Ok(Some(Token {
            kind,
            lexeme: word,
            span: cursor.make_span(sl, sc),
        }));
    }

    Ok(Some(Token {
        kind: TokenKind::Identifier(word.clone()),
        lexeme: word,
        span: cursor.make_span(sl, sc),
    }))
}

/// `REM` swallows the rest of the physical line verbatim, including any
/// `:` statement separators — they are part of the comment, not new statements.
fn lex_rem_comment(
    cursor: &mut Cursor,
    sl: usize,
    sc: usize,
) -> Result<Option<Token>, RuntimeError> {
    if cursor.peek() == Some(' ') {
        cursor.advance();
    }
    let mut text = String::new();
    while !matches!(cursor.peek(), None | Some('\n') | Some('\r')) {
        text.push(cursor.advance().unwrap());
    }

    Ok(Some(Token {
        kind: TokenKind::Rem(text.clone()),
        lexeme: format!("REM {}", text),
        span: cursor.make_span(sl, sc),
    }))
}

fn lex_punctuation(
    cursor: &mut Cursor,
    sl: usize,
    sc: usize,
) -> Result<Option<Token>, RuntimeError> {
    let ch = cursor.advance().unwrap();
    let kind = match ch {
        '+' => TokenKind::Plus,
        '-' => TokenKind::Minus,
        '*' => TokenKind::Star,
        '/' => TokenKind::Slash,
        '^' => TokenKind::Caret,
        '=' => TokenKind::Equal,
        '<' => {
            if cursor.peek() == Some('>') {
                cursor.advance();
                TokenKind::NotEqual
            } else if cursor.peek() == Some('=') {
                cursor.advance();
                TokenKind::LessEqual
            } else {
                TokenKind::Less
            }
        }
        '>' => {
            if cursor.peek() == Some('=') {
                cursor.advance();
                TokenKind::GreaterEqual
            } else {
                TokenKind::Greater
            }
        }
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        ',' => TokenKind::Comma,
        ';' => TokenKind::Semicolon,
        ':' => TokenKind::Colon,
        '#' => TokenKind::Hash,
        _ => {
            return Err(RuntimeError::at(
                ErrorKind::UnexpectedCharacter,
                format!("unexpected character: '{}'", ch),
                cursor.make_span(sl, sc),
            ));
        }
    };

    let lexeme = ch.to_string();
    Ok(Some(Token {
        kind,
        lexeme,
        span: cursor.make_span(sl, sc),
    }))
}
