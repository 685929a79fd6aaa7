//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (a stack of name → [`Local`] maps, tracking the slot
//!    each local occupies and whether its initializer has finished).
//! 2. Report static errors (self‑reference in an initializer, redeclaration,
//!    misplaced `return`/`this`/`super`).  Errors are collected; the walk goes on.
//! 3. Write a [`Binding`] into *each* variable occurrence: a local at
//!    `(depth, slot)`, or a global left to dynamic lookup.
//!
//! Slots are handed out per scope in declaration order.  The interpreter
//! defines locals in exactly that order, which is what makes slot indices
//! valid at runtime.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Binding, ClassDecl, Expr, FunctionDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::token::Token;
use log::{debug, info};

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body are we in?  Used to validate `this`/`super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// A local declared in some scope.
#[derive(Copy, Clone, Debug)]
struct Local {
    slot: usize,
    ready: bool, // false between declaration and end of initializer
}

type Scope = HashMap<String, Local>;

/// Resolver: tracks scopes, enforces static rules, and records binding
/// distances in the AST.
///
/// A resolver may be reused across runs that share one interpreter (the REPL);
/// it remembers which globals earlier runs declared.
pub struct Resolver {
    scopes: Vec<Scope>,
    globals: HashMap<String, bool>, // top-level `var`s: false while initializing
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<LoxError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            globals: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Tell the resolver about a global defined outside Lox source (a native).
    pub fn known_global(&mut self, name: &str) {
        self.globals.insert(name.to_string(), true);
    }

    /// Walk all top‑level statements.  Fails with [`LoxError::Static`] holding
    /// every resolution error; the global declarations of a failed run are
    /// forgotten, since it will not execute.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        let known_globals: HashMap<String, bool> = self.globals.clone();

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.scopes.clear();
        self.current_function = FunctionType::None;
        self.current_class = ClassType::None;

        if self.errors.is_empty() {
            Ok(())
        } else {
            info!("Resolve pass found {} error(s)", self.errors.len());
            self.globals = known_globals;
            Err(LoxError::Static(std::mem::take(&mut self.errors)))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Function(declaration) => {
                // the name is visible *inside* its own body, for recursion
                self.declare(&declaration.name);
                self.define(&declaration.name);
                self.resolve_function(declaration, FunctionType::Function);
            }

            Stmt::Class(declaration) => self.resolve_class(declaration),

            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch.as_deref() {
                    self.resolve_stmt(else_branch);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_class(&mut self, declaration: &ClassDecl) {
        let enclosing_class: ClassType = self.current_class;
        self.current_class = ClassType::Class;

        self.declare(&declaration.name);
        self.define(&declaration.name);

        if let Some(superclass) = &declaration.superclass {
            if let Expr::Variable { name, .. } = superclass {
                if name.lexeme == declaration.name.lexeme {
                    self.error(name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.bind_implicit("super");
        }

        self.begin_scope();
        self.bind_implicit("this");

        for method in &declaration.methods {
            let kind: FunctionType = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if declaration.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Variable { name, binding } => {
                let initializing: bool = self.is_initializing(name);
                self.resolve_local(name, binding);

                if initializing && self.unbound(name, binding) {
                    self.error(name, "Can't read local variable in its own initializer.");
                }
            }

            Expr::Assign {
                name,
                value,
                binding,
            } => {
                let initializing: bool = self.is_initializing(name);
                self.resolve_expr(value);
                self.resolve_local(name, binding);

                if initializing && self.unbound(name, binding) {
                    self.error(name, "Can't assign to local variable in its own initializer.");
                }
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            Expr::This { keyword, binding } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }
                self.resolve_local(keyword, binding);
            }

            Expr::Super {
                keyword, binding, ..
            } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "Can't use 'super' outside of a class.")
                    }
                    ClassType::Class => {
                        self.error(keyword, "Can't use 'super' in a class with no superclass.")
                    }
                    ClassType::Subclass => {}
                }
                self.resolve_local(keyword, binding);
            }
        }
    }

    /// Inside its own initializer a variable is hidden.  A reference there is
    /// legal only when it resolved to an enclosing local or to a global that is
    /// already defined.
    fn unbound(&self, name: &Token, binding: &Cell<Binding>) -> bool {
        binding.get() == Binding::Global && self.globals.get(&name.lexeme) != Some(&true)
    }

    /// Is `name` declared but not yet initialized in the innermost scope (or,
    /// at top level, among the globals)?
    fn is_initializing(&self, name: &Token) -> bool {
        match self.scopes.last() {
            Some(scope) => scope.get(&name.lexeme).is_some_and(|local| !local.ready),
            None => self.globals.get(&name.lexeme) == Some(&false),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function’s parameters + body.
    fn resolve_function(&mut self, declaration: &Rc<FunctionDecl>, kind: FunctionType) {
        let enclosing: FunctionType = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &declaration.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&declaration.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            // Top level: redeclaring a global is allowed.
            self.globals.entry(name.lexeme.clone()).or_insert(false);
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }

        let slot: usize = scope.len();
        scope.insert(name.lexeme.clone(), Local { slot, ready: false });
    }

    fn define(&mut self, name: &Token) {
        match self.scopes.last_mut() {
            Some(scope) => {
                if let Some(local) = scope.get_mut(&name.lexeme) {
                    local.ready = true;
                }
            }
            None => {
                self.globals.insert(name.lexeme.clone(), true);
            }
        }
    }

    /// Bind `this`/`super` as slot 0 of the scope just opened.
    fn bind_implicit(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Local { slot: 0, ready: true });
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as either:
    ///  - a local at depth `d`, slot `s`, or
    ///  - a global if not found in *any* scope.
    ///
    /// Locals still being initialized are skipped.
    fn resolve_local(&mut self, name: &Token, binding: &Cell<Binding>) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if let Some(local) = scope.get(&name.lexeme).filter(|local| local.ready) {
                debug!(
                    "Resolved '{}' at depth {}, slot {}",
                    name.lexeme, depth, local.slot
                );
                binding.set(Binding::Local {
                    depth,
                    slot: local.slot,
                });
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
        binding.set(Binding::Global);
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::resolve(token, message));
    }
}
