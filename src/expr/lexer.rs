//! Lexer for the metric expression micro-syntax.
//!
//! Token forms: `${ID}` / `${ID.modifier}` references, bare metric ids
//! matching the fixed id shape (shorthand for `${ID.current}`), numeric
//! literals, and the arithmetic operators `+ - * / ( )`.

use regex::Regex;
use std::sync::LazyLock;

use crate::model::TimeModifier;

use super::ExprError;

/// The fixed metric id shape: two uppercase letters followed by four digits
/// (e.g. `KD1008`). Only tokens of this shape are accepted as bare
/// references outside `${}`.
static METRIC_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}[0-9]{4}$").unwrap());

/// Check a token against the bare metric id shape.
pub fn is_metric_id(s: &str) -> bool {
    METRIC_ID_PATTERN.is_match(s)
}

/// A lexical token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal, lexeme preserved verbatim.
    Number(String),
    /// Metric reference with its (defaulted) time modifier.
    Ref { id: String, modifier: TimeModifier },
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Tokenize an expression source string.
pub fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        match bytes[i] {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'+' => {
                tokens.push((Token::Plus, start));
                i += 1;
            }
            b'-' => {
                tokens.push((Token::Minus, start));
                i += 1;
            }
            b'*' => {
                tokens.push((Token::Star, start));
                i += 1;
            }
            b'/' => {
                tokens.push((Token::Slash, start));
                i += 1;
            }
            b'(' => {
                tokens.push((Token::LParen, start));
                i += 1;
            }
            b')' => {
                tokens.push((Token::RParen, start));
                i += 1;
            }
            b'0'..=b'9' => {
                let mut seen_dot = false;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit() || (bytes[i] == b'.' && !seen_dot))
                {
                    if bytes[i] == b'.' {
                        seen_dot = true;
                    }
                    i += 1;
                }
                tokens.push((Token::Number(src[start..i].to_string()), start));
            }
            b'$' => {
                if i + 1 >= bytes.len() || bytes[i + 1] != b'{' {
                    return Err(ExprError::UnexpectedChar { ch: '$', pos: start });
                }
                i += 2;
                let body_start = i;
                while i < bytes.len() && bytes[i] != b'}' {
                    i += 1;
                }
                if i >= bytes.len() {
                    return Err(ExprError::UnterminatedReference { pos: start });
                }
                let body = &src[body_start..i];
                i += 1;
                tokens.push((parse_reference(body, start)?, start));
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let ident = &src[start..i];
                if !is_metric_id(ident) {
                    return Err(ExprError::UnknownIdentifier {
                        name: ident.to_string(),
                        pos: start,
                    });
                }
                tokens.push((
                    Token::Ref {
                        id: ident.to_string(),
                        modifier: TimeModifier::Current,
                    },
                    start,
                ));
            }
            other => {
                return Err(ExprError::UnexpectedChar {
                    ch: other as char,
                    pos: start,
                })
            }
        }
    }

    Ok(tokens)
}

/// Parse the inside of a `${...}` reference: `ID` or `ID.modifier`.
fn parse_reference(body: &str, pos: usize) -> Result<Token, ExprError> {
    let (id, modifier) = match body.split_once('.') {
        Some((id, suffix)) => {
            let modifier = TimeModifier::parse(suffix).ok_or_else(|| ExprError::UnknownModifier {
                name: suffix.to_string(),
                pos,
            })?;
            (id, modifier)
        }
        None => (body, TimeModifier::Current),
    };
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(ExprError::InvalidReference {
            body: body.to_string(),
            pos,
        });
    }
    Ok(Token::Ref {
        id: id.to_string(),
        modifier,
    })
}
