//! Module `scanner` implements a one‑pass, streaming lexer for the Lox language.
//!
//! It transforms a source string into a sequence of [`Token`]s, skipping whitespace
//! and comments, and emitting exactly one `EOF` token at the end. Designed as a `FusedIterator`,
//! it can be chained safely with other iterator adapters.
//!
//! # Public API
//!
//! - `Scanner::new(src: &'a str) -> Scanner<'a>`
//!   Create a new lexer over the input buffer.
//!
//! - `impl Iterator for Scanner<'a>`
//!   Yields `Result<Token, LoxError>` on each `.next()`, where `Ok(token)` is a scanned token
//!   and `Err` reports a lexing error with line information.  Scanning always resumes after
//!   an error, so a caller that drains the iterator sees every lexical error in the source.
//!
//! - `scan_tokens(src: &str) -> (Vec<Token>, Vec<LoxError>)`
//!   Drains a scanner, splitting tokens from errors.
//!
//! # Token Recognition
//!
//! - Single‑character tokens: `(`, `)`, `{`, `}`, `,`, `.`, `-`, `+`, `;`, `*`.
//! - Two‑character operators (maximal munch): `!=`, `==`, `<=`, `>=`.
//! - String literals: `"` … `"`, allowing multi‑line and reporting unterminated errors.
//! - Numeric literals: integer and optional fractional part.  No sign, exponent or hex.
//! - Identifiers/keywords: alphanumeric/_ sequences, resolved via a perfect‑hash `KEYWORDS` map.
//! - Comments: `//` to end of line, skipped in bulk via `memchr`.
//!
//! # Example
//!
//! ```rust
//! use lox::scanner::Scanner;
//!
//! let mut scanner = Scanner::new("print 123; // example");
//! for result in &mut scanner {
//!     match result {
//!         Ok(token) => println!("{}", token),
//!         Err(err) => eprintln!("{}", err),
//!     }
//! }
//! ```

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use log::{info, trace};
use memchr::{memchr, memchr_iter};
use phf::phf_map;
use std::iter::FusedIterator;

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// Streaming lexer over one source text.  Each call to `next` yields one
/// token or one lexical error; exactly one `EOF` token closes the stream.
pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    /// First byte of the lexeme being scanned.
    start: usize,
    /// One past the last byte consumed.
    curr: usize,
    line: usize,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            bytes: src.as_bytes(),
            start: 0,
            curr: 0,
            line: 1,
            done: false,
        }
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.bytes.len()
    }

    /// Current byte, or `0` past the end.
    #[inline(always)]
    fn peek(&self) -> u8 {
        self.bytes.get(self.curr).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn peek_next(&self) -> u8 {
        self.bytes.get(self.curr + 1).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b: u8 = self.peek();
        self.curr += 1;
        b
    }

    /// Consume `expected` if it is next.
    #[inline(always)]
    fn eat(&mut self, expected: u8) -> bool {
        let hit: bool = !self.is_at_end() && self.peek() == expected;
        if hit {
            self.curr += 1;
        }
        hit
    }

    /// `single`, or `double` when followed by `=` (`!` / `!=`, …).
    #[inline(always)]
    fn with_equal(&mut self, double: TokenType, single: TokenType) -> TokenType {
        if self.eat(b'=') {
            double
        } else {
            single
        }
    }

    /// Skip whitespace, newlines and `//` comments before the next lexeme.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\r' | b'\t' => self.curr += 1,
                b'\n' => {
                    self.line += 1;
                    self.curr += 1;
                }
                b'/' if self.peek_next() == b'/' => {
                    // Stop on the newline so the branch above counts it.
                    self.curr = match memchr(b'\n', &self.bytes[self.curr..]) {
                        Some(offset) => self.curr + offset,
                        None => self.bytes.len(),
                    };
                }
                _ => return,
            }
        }
    }

    /// Scan the lexeme starting at `self.start`.
    fn scan_token(&mut self) -> Result<TokenType> {
        let kind: TokenType = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,
            b'/' => TokenType::SLASH,

            b'!' => self.with_equal(TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.with_equal(TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.with_equal(TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.with_equal(TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'"' => self.string()?,
            b'0'..=b'9' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.identifier(),

            _ => {
                // Consume the whole code point so slicing stays on char boundaries.
                let ch: char = self.src[self.start..].chars().next().unwrap_or('\u{fffd}');
                self.curr = self.start + ch.len_utf8();

                return Err(LoxError::lex(
                    self.line,
                    format!("Unexpected character: {}", ch),
                ));
            }
        };

        Ok(kind)
    }

    /// String literal; the opening quote is already consumed.  Newlines inside
    /// the literal are kept and counted.
    fn string(&mut self) -> Result<TokenType> {
        match memchr(b'"', &self.bytes[self.curr..]) {
            Some(offset) => {
                let body: &str = &self.src[self.curr..self.curr + offset];
                self.line += memchr_iter(b'\n', body.as_bytes()).count();
                self.curr += offset + 1;

                Ok(TokenType::STRING(body.to_owned()))
            }
            None => {
                self.line += memchr_iter(b'\n', &self.bytes[self.curr..]).count();
                self.curr = self.bytes.len();

                Err(LoxError::lex(self.line, "Unterminated string."))
            }
        }
    }

    /// `123` or `3.14`.  A trailing `.` is left for the next token.
    fn number(&mut self) -> TokenType {
        self.digits();

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.curr += 1;
            self.digits();
        }

        // Only ASCII digits and at most one interior '.' were consumed.
        let value: f64 = self.src[self.start..self.curr].parse().unwrap_or(0.0);
        TokenType::NUMBER(value)
    }

    fn digits(&mut self) {
        while self.peek().is_ascii_digit() {
            self.curr += 1;
        }
    }

    fn identifier(&mut self) -> TokenType {
        while matches!(self.peek(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.curr += 1;
        }

        KEYWORDS
            .get(&self.bytes[self.start..self.curr])
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        self.skip_trivia();

        if self.is_at_end() {
            self.done = true;
            return Some(Ok(Token::new(TokenType::EOF, "", self.line)));
        }

        self.start = self.curr;

        Some(self.scan_token().map(|kind| {
            trace!("Scanned {:?} on line {}", kind, self.line);
            Token::new(kind, &self.src[self.start..self.curr], self.line)
        }))
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scan the whole of `src`, collecting every token (ending with `EOF`) and
/// every lexical error.
pub fn scan_tokens(src: &str) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for result in Scanner::new(src) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} token(s) with {} error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}
