//! Tree‑walking evaluator.
//!
//! Statements run against the current environment: `None` means top level
//! (the [`Globals`]), `Some(env)` a local scope.  Local variables are read
//! through the `(depth, slot)` bindings the resolver wrote into the AST.
//!
//! `return` does not unwind through the error path: [`Interpreter::execute`]
//! yields a [`Flow`] that every statement form propagates until the enclosing
//! call consumes it.  `Err` is reserved for runtime errors, which halt the run.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Binding, ClassDecl, Expr, LiteralValue, Stmt};
use crate::callable::{natives, Callable, Function};
use crate::class::{Class, Instance};
use crate::environment::{Env, Environment, Globals};
use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Fell off the end; continue with the next statement.
    Normal,

    /// A `return` was executed; unwind to the nearest call.
    Return(Value),
}

/// Deepest call nesting a program may reach before it fails with
/// "Stack overflow.".
pub const MAX_CALL_DEPTH: usize = 1024;

pub struct Interpreter<W: Write = io::Stdout> {
    globals: Globals,
    environment: Option<Env>,
    call_depth: usize,
    out: W,
}

impl Interpreter<io::Stdout> {
    /// Creates an interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// Creates an interpreter whose `print` output goes to `out`, with the
    /// native functions (such as `clock`) defined as globals.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let mut globals = Globals::default();

        for native in natives() {
            debug!("Defining native function '{}'", native.name);
            globals.define(native.name, Value::Native(Rc::new(native)));
        }

        Self {
            globals,
            environment: None,
            call_depth: 0,
            out,
        }
    }

    /// The sink `print` writes to.
    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Interprets a list of statements (a "program").  Effects of statements
    /// before a runtime error are kept.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        // A failure can leave us inside a block; the next run starts at top level.
        let result: Result<()> = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt).map(|_| ()));
        self.environment = None;
        self.call_depth = 0;
        self.out.flush()?;

        if result.is_ok() {
            info!("Interpretation completed successfully");
        }

        result
    }

    // ───────────────────────────── statements ─────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}'", name.lexeme);
                self.define(&name.lexeme, value);
                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                let environment: Env = Environment::new(self.environment.clone());
                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Ok(Flow::Normal)
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);
                let function = Function::new(
                    Rc::clone(declaration),
                    self.environment.clone(),
                    false,
                );
                self.define(&declaration.name.lexeme, Value::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Ok(Flow::Return(value))
            }

            Stmt::Class(declaration) => self.execute_class(declaration),
        }
    }

    /// Runs `statements` in `environment`, restoring the current environment
    /// afterwards whether they succeed, return or fail.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: Env) -> Result<Flow> {
        let previous: Option<Env> = self.environment.replace(environment);

        let mut result: Result<Flow> = Ok(Flow::Normal);
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    fn execute_class(&mut self, declaration: &ClassDecl) -> Result<Flow> {
        debug!("Declaring class '{}'", declaration.name.lexeme);

        let superclass: Option<Rc<Class>> = match &declaration.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                _ => {
                    return Err(LoxError::runtime(
                        expr.line(),
                        "Superclass must be a class.",
                    ))
                }
            },
            None => None,
        };

        // Methods of a subclass close over an extra scope holding `super`.
        let method_env: Option<Env> = match &superclass {
            Some(class) => {
                let env: Env = Environment::new(self.environment.clone());
                env.borrow_mut().define(Value::Class(Rc::clone(class)));
                Some(env)
            }
            None => self.environment.clone(),
        };

        let methods: HashMap<String, Rc<Function>> = declaration
            .methods
            .iter()
            .map(|method| {
                let is_initializer: bool = method.name.lexeme == "init";
                let function =
                    Function::new(Rc::clone(method), method_env.clone(), is_initializer);
                (method.name.lexeme.clone(), Rc::new(function))
            })
            .collect();

        let class = Class {
            name: declaration.name.lexeme.clone(),
            superclass,
            methods,
        };

        self.define(&declaration.name.lexeme, Value::Class(Rc::new(class)));
        Ok(Flow::Normal)
    }

    // ───────────────────────────── expressions ────────────────────────────

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Variable { name, binding } => self.look_up(name, binding.get()),

            Expr::Assign {
                name,
                value,
                binding,
            } => {
                let value: Value = self.evaluate(value)?;
                self.assign(name, binding.get(), value.clone())?;
                Ok(value)
            }

            Expr::Unary { operator, right } => {
                let right: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::MINUS => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator.line, "Operand must be a number.")),
                    },
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(invalid_operator(operator)),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;
                let right: Value = self.evaluate(right)?;
                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };

                if short_circuit {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call_value(callee, values, paren)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value: Value = self.evaluate(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    Ok(value)
                }
                _ => Err(LoxError::runtime(name.line, "Only instances have fields.")),
            },

            Expr::This { keyword, binding } => self.look_up(keyword, binding.get()),

            Expr::Super {
                keyword,
                method,
                binding,
            } => self.evaluate_super(keyword, method, binding.get()),
        }
    }

    /// `super.method`: the superclass sits in the scope the resolver bound
    /// `super` to, and `this` in the scope just inside it.
    fn evaluate_super(&mut self, keyword: &Token, method: &Token, binding: Binding) -> Result<Value> {
        let Binding::Local { depth, slot } = binding else {
            return Err(LoxError::runtime(
                keyword.line,
                "Internal error: 'super' was not resolved.",
            ));
        };

        let env: Env = self.current_env(keyword)?;
        let superclass: Value = Environment::get_at(&env, depth, slot, keyword)?;
        let this_token = Token::synthetic("this", keyword.line);
        let this: Value = Environment::get_at(&env, depth.saturating_sub(1), 0, &this_token)?;

        let Value::Class(superclass) = superclass else {
            return Err(LoxError::runtime(
                keyword.line,
                "Internal error: 'super' is not bound to a class.",
            ));
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(this)))),
            None => Err(LoxError::runtime(
                method.line,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    fn call_value(&mut self, callee: Value, arguments: Vec<Value>, paren: &Token) -> Result<Value> {
        match callee {
            Value::Native(native) => self.invoke(native.as_ref(), arguments, paren),
            Value::Function(function) => self.invoke(function.as_ref(), arguments, paren),
            Value::Class(class) => self.invoke(&class, arguments, paren),
            other => {
                debug!("Attempted to call a {}", other.type_name());
                Err(LoxError::runtime(
                    paren.line,
                    "Can only call functions and classes.",
                ))
            }
        }
    }

    fn invoke<C: Callable>(&mut self, callee: &C, arguments: Vec<Value>, paren: &Token) -> Result<Value> {
        if arguments.len() != callee.arity() {
            return Err(LoxError::runtime(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    callee.arity(),
                    arguments.len()
                ),
            ));
        }

        if self.call_depth >= MAX_CALL_DEPTH {
            debug!("Call depth limit of {} reached", MAX_CALL_DEPTH);
            return Err(LoxError::runtime(paren.line, "Stack overflow."));
        }

        self.call_depth += 1;
        let result: Result<Value> = callee.call(self, arguments, paren.line);
        self.call_depth -= 1;

        result
    }

    // ───────────────────────────── variables ──────────────────────────────

    fn define(&mut self, name: &str, value: Value) {
        match &self.environment {
            Some(env) => {
                env.borrow_mut().define(value);
            }
            None => self.globals.define(name, value),
        }
    }

    fn current_env(&self, name: &Token) -> Result<Env> {
        self.environment.clone().ok_or_else(|| {
            LoxError::runtime(
                name.line,
                format!("Internal error: '{}' resolved as local at top level.", name.lexeme),
            )
        })
    }

    fn look_up(&self, name: &Token, binding: Binding) -> Result<Value> {
        match binding {
            Binding::Global => self.globals.get(name),
            Binding::Local { depth, slot } => {
                Environment::get_at(&self.current_env(name)?, depth, slot, name)
            }
        }
    }

    fn assign(&mut self, name: &Token, binding: Binding, value: Value) -> Result<()> {
        match binding {
            Binding::Global => self.globals.assign(name, value),
            Binding::Local { depth, slot } => {
                Environment::assign_at(&self.current_env(name)?, depth, slot, name, value)
            }
        }
    }
}

fn invalid_operator(operator: &Token) -> LoxError {
    LoxError::runtime(
        operator.line,
        format!("Invalid operator '{}'.", operator.lexeme),
    )
}

/// Arithmetic, comparison and equality.  Division follows IEEE‑754, so
/// dividing by zero yields an infinity or NaN rather than an error.
fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    let numbers = |left: &Value, right: &Value| match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.")),
    };

    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            _ => Err(LoxError::runtime(
                operator.line,
                "Operands must be two numbers or two strings.",
            )),
        },
        TokenType::MINUS => numbers(&left, &right).map(|(a, b)| Value::Number(a - b)),
        TokenType::STAR => numbers(&left, &right).map(|(a, b)| Value::Number(a * b)),
        TokenType::SLASH => numbers(&left, &right).map(|(a, b)| Value::Number(a / b)),
        TokenType::GREATER => numbers(&left, &right).map(|(a, b)| Value::Bool(a > b)),
        TokenType::GREATER_EQUAL => numbers(&left, &right).map(|(a, b)| Value::Bool(a >= b)),
        TokenType::LESS => numbers(&left, &right).map(|(a, b)| Value::Bool(a < b)),
        TokenType::LESS_EQUAL => numbers(&left, &right).map(|(a, b)| Value::Bool(a <= b)),
        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),
        _ => Err(invalid_operator(operator)),
    }
}
