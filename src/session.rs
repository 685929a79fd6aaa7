//! The full pipeline: scanner → parser → resolver → interpreter.
//!
//! A [`Session`] keeps its interpreter and resolver between runs, so the REPL
//! can feed it one line at a time while globals persist.

use std::io::{self, Write};

use log::info;

use crate::ast::Stmt;
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::scan_tokens;

/// Scan and parse `source`.  Every lexical and syntax error is reported
/// together, in that order, as one [`LoxError::Static`].
pub fn parse_program(source: &str) -> Result<Vec<Stmt>> {
    let (tokens, mut errors) = scan_tokens(source);

    match Parser::new(tokens).parse() {
        Ok(program) if errors.is_empty() => Ok(program),
        Ok(_) => Err(LoxError::Static(errors)),
        Err(parse_errors) => {
            errors.extend(parse_errors.into_diagnostics());
            Err(LoxError::Static(errors))
        }
    }
}

pub struct Session<W: Write = io::Stdout> {
    resolver: Resolver,
    interpreter: Interpreter<W>,
}

impl Session<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Session<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Session<W> {
    pub fn with_output(out: W) -> Self {
        let interpreter: Interpreter<W> = Interpreter::with_output(out);
        let mut resolver = Resolver::new();

        for name in interpreter.globals().names() {
            resolver.known_global(name);
        }

        Self {
            resolver,
            interpreter,
        }
    }

    /// Run one source text.  Static errors suppress execution entirely; a
    /// runtime error stops execution at the failing statement.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let program: Vec<Stmt> = parse_program(source)?;
        self.resolver.resolve(&program)?;

        info!("Executing {} statement(s)", program.len());
        self.interpreter.interpret(&program)
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn into_output(self) -> W {
        self.interpreter.into_output()
    }
}
