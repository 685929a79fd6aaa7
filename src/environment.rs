//! Variable storage.
//!
//! Locals live in a chain of slot‑indexed [`Environment`]s: the resolver
//! assigns each local declaration a `(depth, slot)` pair, and the interpreter
//! pushes values in the same order it declares them, so a lookup is a walk of
//! `depth` parent links plus one vector index.  Parent links are fixed at
//! creation, which keeps the chain acyclic.
//!
//! Globals are keyed by name in [`Globals`] and looked up dynamically, which is
//! what allows top‑level code to refer to functions declared further down.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{LoxError, Result};
use crate::token::Token;
use crate::value::Value;

/// Shared handle to a local environment.  Call frames and closures each hold
/// one; the environment is dropped with the last of them.
pub type Env = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    slots: Vec<Value>,
    enclosing: Option<Env>,
}

impl Environment {
    /// Create a new environment whose parent is `enclosing` (`None` = the
    /// globals).
    pub fn new(enclosing: Option<Env>) -> Env {
        Rc::new(RefCell::new(Environment {
            slots: Vec::new(),
            enclosing,
        }))
    }

    /// Bind the next slot.  Returns the slot index.
    pub fn define(&mut self, value: Value) -> usize {
        self.slots.push(value);
        self.slots.len() - 1
    }

    fn ancestor(env: &Env, depth: usize) -> Option<Env> {
        let mut current: Env = Rc::clone(env);

        for _ in 0..depth {
            let parent: Env = current.borrow().enclosing.clone()?;
            current = parent;
        }

        Some(current)
    }

    /// Read the value at `slot` of the environment `depth` links up.
    pub fn get_at(env: &Env, depth: usize, slot: usize, name: &Token) -> Result<Value> {
        Self::ancestor(env, depth)
            .and_then(|target| {
                let target = target.borrow();
                target.slots.get(slot).cloned()
            })
            .ok_or_else(|| unbound(name, depth, slot))
    }

    /// Overwrite the value at `slot` of the environment `depth` links up.
    pub fn assign_at(
        env: &Env,
        depth: usize,
        slot: usize,
        name: &Token,
        value: Value,
    ) -> Result<()> {
        let target: Env = Self::ancestor(env, depth).ok_or_else(|| unbound(name, depth, slot))?;
        let mut target = target.borrow_mut();

        match target.slots.get_mut(slot) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(unbound(name, depth, slot)),
        }
    }
}

fn unbound(name: &Token, depth: usize, slot: usize) -> LoxError {
    LoxError::runtime(
        name.line,
        format!(
            "Internal error: no binding for '{}' at depth {}, slot {}.",
            name.lexeme, depth, slot
        ),
    )
}

/// The global scope: the root of every environment chain.
#[derive(Debug, Default)]
pub struct Globals {
    values: HashMap<String, Value>,
}

impl Globals {
    /// Bind (or rebind) a global.  Redefinition is allowed at top level.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value> {
        self.values
            .get(&name.lexeme)
            .cloned()
            .ok_or_else(|| undefined(name))
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        match self.values.get_mut(&name.lexeme) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(undefined(name)),
        }
    }

    /// Names of every global currently bound.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(name.line, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(lexeme: &str) -> Token {
        Token::synthetic(lexeme, 1)
    }

    #[test]
    fn slots_are_found_through_parent_links() {
        let outer: Env = Environment::new(None);
        outer.borrow_mut().define(Value::Number(1.0));

        let inner: Env = Environment::new(Some(outer.clone()));
        inner.borrow_mut().define(Value::Number(2.0));

        assert_eq!(
            Environment::get_at(&inner, 0, 0, &name("b")).unwrap(),
            Value::Number(2.0)
        );
        assert_eq!(
            Environment::get_at(&inner, 1, 0, &name("a")).unwrap(),
            Value::Number(1.0)
        );

        Environment::assign_at(&inner, 1, 0, &name("a"), Value::Bool(true)).unwrap();
        assert_eq!(
            Environment::get_at(&outer, 0, 0, &name("a")).unwrap(),
            Value::Bool(true)
        );
    }

    #[test]
    fn mismatched_depth_is_an_error() {
        let env: Env = Environment::new(None);
        env.borrow_mut().define(Value::Nil);

        assert!(Environment::get_at(&env, 1, 0, &name("x")).is_err());
        assert!(Environment::get_at(&env, 0, 3, &name("x")).is_err());
    }

    #[test]
    fn undefined_global_names_the_variable() {
        let mut globals = Globals::default();
        let err = globals.get(&name("missing")).unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 1]");

        assert!(globals.assign(&name("missing"), Value::Nil).is_err());

        globals.define("present", Value::Nil);
        assert_eq!(globals.names().collect::<Vec<_>>(), vec!["present"]);
        assert!(globals.assign(&name("present"), Value::Number(4.0)).is_ok());
        assert_eq!(globals.get(&name("present")).unwrap(), Value::Number(4.0));
    }
}
