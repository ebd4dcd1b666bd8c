//! Tokenizer: DSL source text to tokens
//!
//! A deterministic, character-driven scanner — no regex engine — so that
//! error offsets are stable and reproducible across runs.

use super::token::{Token, TokenKind};
use crate::error::{EngineError, ParseErrorKind, Result, SourceSpan};

/// Hard limit on DSL source length.
pub const MAX_SOURCE_LEN: usize = 64 * 1024;

pub struct Lexer<'a> {
    chars: Vec<char>,
    source: &'a str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Result<Self> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(EngineError::resource_limit(
                crate::error::ResourceLimitKind::SourceLength,
                format!(
                    "expression source is {} bytes, max is {}",
                    source.len(),
                    MAX_SOURCE_LEN
                ),
            ));
        }
        Ok(Self {
            chars: source.chars().collect(),
            source,
            pos: 0,
            line: 1,
            col: 1,
        })
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn here(&self) -> SourceSpan {
        SourceSpan::new(self.line, self.col, self.pos)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Tokenizes the entire source, returning the ordered token sequence
    /// terminated by `EOF`.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let span = self.here();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, span));
                break;
            };

            let kind = match c {
                '(' => {
                    self.advance();
                    TokenKind::LParen
                }
                ')' => {
                    self.advance();
                    TokenKind::RParen
                }
                '[' => {
                    self.advance();
                    TokenKind::LBracket
                }
                ']' => {
                    self.advance();
                    TokenKind::RBracket
                }
                ',' => {
                    self.advance();
                    TokenKind::Comma
                }
                '=' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::Eq
                    } else {
                        return Err(self.unexpected_char('=', span));
                    }
                }
                '!' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::NotEq
                    } else {
                        return Err(self.unexpected_char('!', span));
                    }
                }
                '>' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::GtEq
                    } else {
                        TokenKind::Gt
                    }
                }
                '<' => {
                    self.advance();
                    if self.peek() == Some('=') {
                        self.advance();
                        TokenKind::LtEq
                    } else {
                        TokenKind::Lt
                    }
                }
                '"' => self.scan_string(span)?,
                c if c.is_ascii_digit() => self.scan_number(),
                c if is_ident_start(c) => self.scan_ident(),
                other => return Err(self.unexpected_char(other, span)),
            };
            tokens.push(Token::new(kind, span));
        }
        Ok(tokens)
    }

    fn unexpected_char(&self, c: char, span: SourceSpan) -> EngineError {
        EngineError::parse_error(
            span,
            ParseErrorKind::UnexpectedToken,
            "a valid token",
            format!("'{c}'"),
            None,
        )
    }

    fn scan_string(&mut self, start: SourceSpan) -> Result<TokenKind> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(EngineError::parse_error(
                        start,
                        ParseErrorKind::InvalidValue,
                        "closing '\"'",
                        "end of input",
                        Some("unterminated string literal".to_string()),
                    ))
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some(other) => {
                        return Err(EngineError::parse_error(
                            start,
                            ParseErrorKind::InvalidValue,
                            "a valid escape sequence",
                            format!("'\\{other}'"),
                            None,
                        ))
                    }
                    None => {
                        return Err(EngineError::parse_error(
                            start,
                            ParseErrorKind::InvalidValue,
                            "escape sequence",
                            "end of input",
                            None,
                        ))
                    }
                },
                Some(c) => value.push(c),
            }
        }
        Ok(TokenKind::Str(value))
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if is_float {
            TokenKind::Float(text.parse().unwrap_or(0.0))
        } else {
            TokenKind::Int(text.parse().unwrap_or(0))
        }
    }

    fn scan_ident(&mut self) -> TokenKind {
        let start = self.pos;
        let mut dotted = false;
        loop {
            match self.peek() {
                Some(c) if is_ident_continue(c) => {
                    self.advance();
                }
                Some('.') if matches!(self.peek_at(1), Some(c) if is_ident_start(c)) => {
                    dotted = true;
                    self.advance();
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.as_str() {
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "matches" => TokenKind::Matches,
            "trace" => TokenKind::Trace,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ if dotted => TokenKind::DottedIdent(text),
            _ => TokenKind::Ident(text),
        }
    }

    /// Exposes the original source for diagnostics that want to slice it.
    pub fn source(&self) -> &'a str {
        self.source
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
