//! Static resolver pass for the **Lox** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (a stack of name → [`VarState`] maps).
//! 2. Report static errors (redeclaration, forward‑read in initializer, invalid
//!    `return` / `this` / `super`, self‑inheritance) and unused‑local warnings.
//! 3. Record, inline on each variable node, how many environments separate the
//!    use from its declaration.  Nodes left empty are globals.
//!
//! Problems are collected, never fail‑fast: one pass reports all of them.

use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Depth, Expr, FunctionDecl, Stmt};
use crate::error::{LoxError, Warning};
use crate::token::{Identifier, SourceLocation};

/// Resolve `statements` in place.  Returns every error and warning found.
pub fn resolve(statements: &[Stmt], allow_redefinition: bool) -> (Vec<LoxError>, Vec<Warning>) {
    let mut resolver = Resolver::new(allow_redefinition);
    resolver.resolve(statements);
    resolver.finish()
}

/// What kind of function body we are in.  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// What kind of class body we are in.  Used to validate `this` / `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

#[derive(Debug)]
struct VarState {
    location: SourceLocation,
    /// `false` between declaration and the end of the initializer.
    defined: bool,
    read: bool,
    /// Parameters and `this` / `super` are exempt from unused warnings.
    track_unused: bool,
}

pub struct Resolver {
    scopes: Vec<HashMap<String, VarState>>,
    /// Top‑level names declared during this pass.
    globals: HashMap<String, SourceLocation>,
    allow_redefinition: bool,
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<LoxError>,
    warnings: Vec<Warning>,
}

impl Resolver {
    pub fn new(allow_redefinition: bool) -> Self {
        info!("Resolver instantiated");

        Resolver {
            scopes: Vec::new(),
            globals: HashMap::new(),
            allow_redefinition,
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(&mut self, statements: &[Stmt]) {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    /// Resolve a lone expression at top level.
    pub fn resolve_expression(&mut self, expr: &Expr) {
        self.resolve_expr(expr);
    }

    pub fn finish(self) -> (Vec<LoxError>, Vec<Warning>) {
        info!(
            "Resolve pass finished: {} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        );

        (self.errors, self.warnings)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        debug!("Resolving stmt at {}", stmt.location());

        match stmt {
            Stmt::Expression(expr) | Stmt::Print { expr, .. } => self.resolve_expr(expr),

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }
                self.define(name);
            }

            Stmt::Block { statements, .. } => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Break { .. } => {}

            Stmt::Function(decl) => {
                // the name is visible inside its own body
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(name);
                }
                self.resolve_function(decl, FunctionType::Function);
            }

            Stmt::Return { value, location } => {
                if self.current_function == FunctionType::None {
                    self.error(location, "Cannot return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(location, "Cannot return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.resolve_class(name, superclass.as_ref(), methods),
        }
    }

    fn resolve_class(
        &mut self,
        name: &Identifier,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) {
        let enclosing_class = mem::replace(&mut self.current_class, ClassType::Class);

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable { name: sc_name, .. } = superclass {
                if sc_name.name == name.name {
                    self.error(&sc_name.location, "A class cannot inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            self.begin_scope();
            self.declare_builtin("super", name.location.clone());
        }

        self.begin_scope();
        self.declare_builtin("this", name.location.clone());

        for method in methods {
            let kind = if method.display_name() == "init" {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal { .. } => {}

            Expr::Grouping { expr: inner, .. } => self.resolve_expr(inner),

            Expr::Unary { right, .. } => self.resolve_expr(right),

            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Sequence { exprs, .. } => {
                for e in exprs {
                    self.resolve_expr(e);
                }
            }

            Expr::Variable { name, depth } => {
                let in_own_initializer = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.name))
                    .is_some_and(|state| !state.defined);

                if in_own_initializer {
                    self.error(
                        &name.location,
                        "Cannot read local variable in its own initializer.",
                    );
                }

                self.resolve_local(&name.name, depth, true);
            }

            Expr::Assign { name, value, depth } => {
                // RHS first, then bind the target
                self.resolve_expr(value);
                self.resolve_local(&name.name, depth, false);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Lambda(decl) => self.resolve_function(decl, FunctionType::Function),

            Expr::Get { object, .. } => self.resolve_expr(object),

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { location, depth } => {
                if self.current_class == ClassType::None {
                    self.error(location, "Cannot use 'this' outside of a class.");
                    return;
                }

                self.resolve_local("this", depth, true);
            }

            Expr::Super { location, depth, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(location, "Cannot use 'super' outside of a class.");
                        return;
                    }
                    ClassType::Class => {
                        self.error(location, "Cannot use 'super' in a class with no superclass.");
                        return;
                    }
                    ClassType::Subclass => {}
                }

                self.resolve_local("super", depth, true);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// One scope holds both the parameters and the body.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing = mem::replace(&mut self.current_function, kind);

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
            self.exempt(&param.name);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
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

    /// Pop the innermost scope, warning about locals nobody read.
    fn end_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };

        let mut unused: Vec<(String, SourceLocation)> = scope
            .into_iter()
            .filter(|(_, state)| state.track_unused && !state.read)
            .map(|(name, state)| (name, state.location))
            .collect();
        unused.sort_by_key(|(_, location)| (location.line, location.column));

        for (name, location) in unused {
            debug!("Unused local '{}' at {}", name, location);
            self.warnings.push(Warning::new(
                location,
                format!("Local variable '{}' is never read.", name),
            ));
        }
    }

    fn declare(&mut self, name: &Identifier) {
        let Some(scope) = self.scopes.last_mut() else {
            self.declare_global(name);
            return;
        };

        if scope.contains_key(&name.name) {
            self.errors.push(LoxError::resolve(
                name.location.clone(),
                "Variable with this name already declared in this scope.",
            ));
            return;
        }

        scope.insert(
            name.name.clone(),
            VarState {
                location: name.location.clone(),
                defined: false,
                read: false,
                track_unused: true,
            },
        );
    }

    /// Top‑level duplicates only matter when the host forbids redefinition.
    fn declare_global(&mut self, name: &Identifier) {
        if self.allow_redefinition {
            return;
        }

        if let Some(first) = self.globals.get(&name.name) {
            let message = format!(
                "Variable '{}' is already declared at {}.",
                name.name, first
            );
            self.errors
                .push(LoxError::resolve(name.location.clone(), message));
            return;
        }

        self.globals
            .insert(name.name.clone(), name.location.clone());
    }

    fn define(&mut self, name: &Identifier) {
        if let Some(state) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(&name.name))
        {
            state.defined = true;
        }
    }

    fn exempt(&mut self, name: &str) {
        if let Some(state) = self.scopes.last_mut().and_then(|scope| scope.get_mut(name)) {
            state.track_unused = false;
        }
    }

    fn declare_builtin(&mut self, name: &str, location: SourceLocation) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                VarState {
                    location,
                    defined: true,
                    read: true,
                    track_unused: false,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record the occurrence as a local at some distance, or leave the slot
    /// empty for a global.
    fn resolve_local(&mut self, name: &str, depth: &Depth, is_read: bool) {
        for (distance, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(state) = scope.get_mut(name) {
                debug!("Resolved '{}' at depth {}", name, distance);
                if is_read {
                    state.read = true;
                }
                depth.set(Some(distance));
                return;
            }
        }

        debug!("Resolved '{}' as global", name);
        depth.set(None);
    }

    fn error(&mut self, location: &SourceLocation, message: &str) {
        self.errors
            .push(LoxError::resolve(location.clone(), message));
    }
}
