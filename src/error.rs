//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime) convert their internal
//! failure modes into one of the variants defined here.  Static errors are
//! collected and handed back together as [`LoxError::Static`], so a single run
//! can report every lexical, syntax and resolution problem it found.
//!
//! The module **does not** print diagnostics itself

use std::io;
use thiserror::Error;

use log::debug;

use crate::token::{Token, TokenType};

/// Exit status for scripts with lexical, syntax or resolution errors.
pub const EXIT_STATIC: i32 = 65;

/// Exit status for an uncaught runtime error.
pub const EXIT_RUNTIME: i32 = 70;

/// Exit status for I/O failures while running a script.
pub const EXIT_IO: i32 = 74;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        /// ` at 'lexeme'` or ` at end`.
        location: String,
    },

    /// Static‑analysis or resolution failure (e.g. early‑binding errors).
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error.
    #[error("{message}\n[line {line}]")]
    Runtime { message: String, line: usize },

    /// Every static error found in one run, in source order.
    #[error("{}", render_all(.0))]
    Static(Vec<LoxError>),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            line: token.line,
            location: location_of(token),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            line: token.line,
            location: location_of(token),
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime { message, line }
    }

    /// Process exit status a CLI should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Lex { .. }
            | LoxError::Parse { .. }
            | LoxError::Resolve { .. }
            | LoxError::Static(_) => EXIT_STATIC,
            LoxError::Runtime { .. } => EXIT_RUNTIME,
            LoxError::Io(_) => EXIT_IO,
        }
    }

    /// Number of individual diagnostics carried by this error.
    pub fn count(&self) -> usize {
        match self {
            LoxError::Static(errors) => errors.iter().map(LoxError::count).sum(),
            _ => 1,
        }
    }

    /// Flattens this error into its individual diagnostics.
    pub fn into_diagnostics(self) -> Vec<LoxError> {
        match self {
            LoxError::Static(errors) => errors
                .into_iter()
                .flat_map(LoxError::into_diagnostics)
                .collect(),
            other => vec![other],
        }
    }
}

fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

fn render_all(errors: &[LoxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
