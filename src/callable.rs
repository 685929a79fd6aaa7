//! Things that can be called: native functions, user functions (closures)
//! and classes (see [`crate::class`]).

use std::fmt;
use std::io::Write;
use std::rc::Rc;

use chrono::Utc;
use log::debug;

use crate::ast::FunctionDecl;
use crate::environment::{Env, Environment};
use crate::error::{LoxError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::value::Value;

/// Common interface of every callable value.  `line` is the line of the
/// call's closing parenthesis, used for errors raised by the callee itself.
pub trait Callable {
    fn arity(&self) -> usize;

    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value>;
}

/// A function implemented by the host.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&[Value]) -> std::result::Result<Value, String>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call<W: Write>(
        &self,
        _interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);

        (self.func)(&arguments).map_err(|message| LoxError::runtime(line, message))
    }
}

/// The natives installed in every fresh global scope.
pub fn natives() -> Vec<NativeFunction> {
    vec![NativeFunction {
        name: "clock",
        arity: 0,
        func: |_args: &[Value]| {
            let millis: i64 = Utc::now().timestamp_millis();
            Ok(Value::Number(millis as f64 / 1000.0))
        },
    }]
}

/// A user‑defined function or method together with the environment it closes
/// over.
pub struct Function {
    pub declaration: Rc<FunctionDecl>,

    /// `None` when declared at top level (the closure is the globals).
    pub closure: Option<Env>,

    /// `init` methods always return their instance.
    pub is_initializer: bool,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Option<Env>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    /// A copy of this method whose closure binds `this` (slot 0 of a fresh
    /// environment) to `instance`.
    pub fn bind(&self, instance: Value) -> Function {
        let environment: Env = Environment::new(self.closure.clone());
        environment.borrow_mut().define(instance);

        Function::new(
            Rc::clone(&self.declaration),
            Some(environment),
            self.is_initializer,
        )
    }

    fn bound_this(&self) -> Result<Value> {
        let this = crate::token::Token::synthetic("this", self.declaration.name.line);

        match &self.closure {
            Some(closure) => Environment::get_at(closure, 0, 0, &this),
            None => Err(LoxError::runtime(
                this.line,
                "Internal error: initializer is not bound to an instance.",
            )),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

impl Callable for Function {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<W>,
        arguments: Vec<Value>,
        _line: usize,
    ) -> Result<Value> {
        debug!(
            "Calling '{}' with {} argument(s)",
            self.name(),
            arguments.len()
        );

        let environment: Env = Environment::new(self.closure.clone());
        {
            let mut frame = environment.borrow_mut();
            for argument in arguments {
                frame.define(argument);
            }
        }

        let flow: Flow = interpreter.execute_block(&self.declaration.body, environment)?;

        if self.is_initializer {
            return self.bound_this();
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}
