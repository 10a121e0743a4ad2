//! Runtime scope chain.
//!
//! Environments are shared (`Rc<RefCell<…>>`): a block or call owns the one
//! it creates, and every closure made while it was current keeps it alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::RuntimeFault;
use crate::token::{Identifier, SourceLocation};
use crate::value::Value;

/// Shared handle to an environment.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
    allow_redefinition: bool,
}

impl Environment {
    /// A root environment (the globals).
    pub fn new(allow_redefinition: bool) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
            allow_redefinition,
        }
    }

    /// A child scope.  The redefinition toggle is inherited so it stays
    /// uniform across the whole chain.
    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        let allow_redefinition = enclosing.borrow().allow_redefinition;

        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
            allow_redefinition,
        }
    }

    pub fn shared(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn set_allow_redefinition(&mut self, allow: bool) {
        self.allow_redefinition = allow;
    }

    /// Bind `name` in *this* scope.  Fails if the name is already bound here
    /// and redefinition is disabled.
    pub fn define(&mut self, name: &Identifier, value: Value) -> Result<(), RuntimeFault> {
        if !self.allow_redefinition && self.values.contains_key(&name.name) {
            return Err(RuntimeFault::Redefinition {
                name: name.name.clone(),
                location: name.location.clone(),
            });
        }

        self.values.insert(name.name.clone(), value);
        Ok(())
    }

    /// Bind without the redefinition check.  Used for parameters, natives and
    /// the `this` / `super` pseudo‑variables.
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Drop every binding of this scope.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Look `name` up, walking outwards through the chain.
    pub fn get(&self, name: &Identifier) -> Result<Value, RuntimeFault> {
        if let Some(value) = self.values.get(&name.name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(RuntimeFault::UndefinedVariable {
                name: name.name.clone(),
                location: name.location.clone(),
            })
        }
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign(&mut self, name: &Identifier, value: Value) -> Result<(), RuntimeFault> {
        if let Some(slot) = self.values.get_mut(&name.name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(RuntimeFault::UndefinedVariable {
                name: name.name.clone(),
                location: name.location.clone(),
            })
        }
    }

    /// The environment exactly `distance` hops up from `env`.
    pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..distance {
            let next: EnvRef = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Read `name` from the scope `distance` hops up.  A miss means the
    /// resolver and the evaluator disagree, which is an internal fault.
    pub fn get_at(
        env: &EnvRef,
        distance: usize,
        name: &str,
        location: &SourceLocation,
    ) -> Result<Value, RuntimeFault> {
        debug!("get_at distance={} name={}", distance, name);

        let target: EnvRef = Self::ancestor(env, distance).ok_or_else(|| {
            RuntimeFault::internal(
                location.clone(),
                format!("No environment at distance {} for '{}'.", distance, name),
            )
        })?;

        let value: Option<Value> = target.borrow().values.get(name).cloned();

        value.ok_or_else(|| {
            RuntimeFault::internal(
                location.clone(),
                format!("'{}' is not bound at distance {}.", name, distance),
            )
        })
    }

    /// Write `name` in the scope `distance` hops up.
    pub fn assign_at(
        env: &EnvRef,
        distance: usize,
        name: &str,
        value: Value,
        location: &SourceLocation,
    ) -> Result<(), RuntimeFault> {
        debug!("assign_at distance={} name={}", distance, name);

        let target: EnvRef = Self::ancestor(env, distance).ok_or_else(|| {
            RuntimeFault::internal(
                location.clone(),
                format!("No environment at distance {} for '{}'.", distance, name),
            )
        })?;

        let mut scope = target.borrow_mut();

        match scope.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(RuntimeFault::internal(
                location.clone(),
                format!("'{}' is not bound at distance {}.", name, distance),
            )),
        }
    }
}
