//! Abstract syntax tree for Lox programs.
//!
//! Nodes are immutable after parsing with one exception: every node that
//! names a variable (`Variable`, `Assign`, `This`, `Super`, and a class's
//! superclass reference) carries a [`Binding`] cell that the resolver fills
//! in before evaluation.  The interpreter reads the binding directly and never
//! searches scopes by name for locals.

use std::cell::Cell;
use std::rc::Rc;

use crate::token::Token;

/// Where a name lives at runtime, as computed by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Binding {
    /// Not found in any local scope: looked up by name among the globals.
    #[default]
    Global,

    /// `depth` environments up the chain (0 = innermost), at index `slot`.
    Local { depth: usize, slot: usize },
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// The boolean constant `true`.
    True,

    /// The boolean constant `false`.
    False,

    /// The `nil` literal.
    Nil,
}

/// **Abstract‑Syntax‑Tree node** representing every kind of *expression*
/// in Lox.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Variable access.
    Variable { name: Token, binding: Cell<Binding> },

    /// Assignment expression: `identifier "=" expression`
    Assign {
        name: Token,
        value: Box<Expr>,
        binding: Cell<Binding>,
    },

    /// Infix binary operator expression
    /// *Example:* `a + b`, `x <= y`
    Binary {
        left: Box<Expr>,
        /// Operator token such as `+`, `*`, `==`, …
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token, // `AND` or `OR`
        right: Box<Expr>,
    },

    /// Prefix unary operator expression
    /// *Example:* `!isReady` or `-42`
    Unary { operator: Token, right: Box<Expr> },

    /// Function‑ or method‑call expression
    /// *Example:* `clock()` or `add(1, 2)`
    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// The 'this' keyword inside a method.
    This {
        keyword: Token,
        binding: Cell<Binding>,
    },

    /// `super.method` inside a subclass method.
    Super {
        keyword: Token,
        method: Token,
        binding: Cell<Binding>,
    },

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping(Box<Expr>),
}

impl Expr {
    /// Build an unresolved variable reference.
    pub fn variable(name: Token) -> Self {
        Expr::Variable {
            name,
            binding: Cell::new(Binding::Global),
        }
    }

    /// Best source line for diagnostics about this expression.
    pub fn line(&self) -> usize {
        match self {
            Expr::Literal(_) => 0,
            Expr::Variable { name, .. } | Expr::Assign { name, .. } => name.line,
            Expr::Binary { operator, .. }
            | Expr::Logical { operator, .. }
            | Expr::Unary { operator, .. } => operator.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Get { name, .. } | Expr::Set { name, .. } => name.line,
            Expr::This { keyword, .. } | Expr::Super { keyword, .. } => keyword.line,
            Expr::Grouping(inner) => inner.line(),
        }
    }
}

/// A function or method declaration.  Shared (`Rc`) between the AST and
/// every closure created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Token,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<Token>,

    /// Body executed when the function is called.
    pub body: Vec<Stmt>,
}

/// `class Name < Super { methods… }`
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: Token,

    /// Always an [`Expr::Variable`] when present.
    pub superclass: Option<Expr>,

    pub methods: Vec<Rc<FunctionDecl>>,
}

/// **Abstract‑Syntax‑Tree node** for *statements*.  A program is a sequence
/// of these nodes returned by [`crate::parser::Parser::parse`].
///
/// `for` loops have no node of their own: the parser desugars them into
/// `Block`/`While`.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print(Expr),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    /// Function declaration ‑ becomes a first‑class callable value.
    Function(Rc<FunctionDecl>),

    /// `return` statement inside a function body.
    Return {
        /// The `return` keyword token (for error locations).
        keyword: Token,

        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },

    Class(ClassDecl),
}
