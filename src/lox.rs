//! Embedding API: one [`Lox`] value owns an interpreter and pushes source text
//! through scan → parse → resolve → execute.
//!
//! Static problems come back as a batch, runtime problems as at most one
//! fault.  Nothing here prints; hosts decide how to report a [`RunReport`].

use std::io::Write;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::ast::Stmt;
use crate::error::{LoxError, RuntimeFault, Warning};
use crate::interpreter::Interpreter;
use crate::parser;
use crate::resolver::{self, Resolver};
use crate::scanner;
use crate::value::Value;

/// Host‑side knobs.
#[derive(Debug, Clone)]
pub struct LoxConfig {
    /// Let `var` / `fun` / `class` rebind an existing global.
    pub allow_redefinition: bool,
    /// Scan, parse and resolve, but never execute.
    pub dry_run: bool,
    /// Stamped into every source location.
    pub file: Rc<str>,
}

impl Default for LoxConfig {
    fn default() -> Self {
        Self {
            allow_redefinition: false,
            dry_run: false,
            file: Rc::from("<script>"),
        }
    }
}

/// Everything one [`Lox::run`] produced.
#[derive(Debug, Default)]
pub struct RunReport {
    pub errors: Vec<LoxError>,
    pub warnings: Vec<Warning>,
    pub fault: Option<RuntimeFault>,
}

impl RunReport {
    /// No errors and no fault.  Warnings don't count.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.fault.is_none()
    }
}

/// Why [`Lox::evaluate`] produced no value.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("program has {} static error(s)", .0.len())]
    Static(Vec<LoxError>),

    #[error(transparent)]
    Fault(#[from] RuntimeFault),
}

pub struct Lox {
    config: LoxConfig,
    interpreter: Interpreter,
}

impl Lox {
    /// A host printing to stdout.
    pub fn new(config: LoxConfig) -> Self {
        let interpreter = Interpreter::new(config.allow_redefinition);

        Self {
            config,
            interpreter,
        }
    }

    /// A host printing to `output`.
    pub fn with_output(config: LoxConfig, output: Box<dyn Write>) -> Self {
        let interpreter = Interpreter::with_output(output, config.allow_redefinition);

        Self {
            config,
            interpreter,
        }
    }

    pub fn config(&self) -> &LoxConfig {
        &self.config
    }

    pub fn set_allow_redefinition(&mut self, allow: bool) {
        self.config.allow_redefinition = allow;
        self.interpreter.set_allow_redefinition(allow);
    }

    /// Drop all user globals.
    pub fn clear(&mut self) {
        self.interpreter.clear_globals();
    }

    /// Run a whole program against the persistent global state.
    pub fn run(&mut self, source: &str) -> RunReport {
        info!("Running {} byte(s) from {}", source.len(), self.config.file);

        let mut report = RunReport::default();

        let Some(statements) = self.front_end(source, &mut report) else {
            return report;
        };

        if self.config.dry_run {
            info!("Dry run: skipping execution");
            return report;
        }

        if let Err(fault) = self.interpreter.interpret(&statements) {
            debug!("Run stopped by fault: {}", fault);
            report.fault = Some(fault);
        }

        report
    }

    /// Like [`run`](Self::run), but a program that is a single expression
    /// statement yields that expression's value.  Anything else runs and
    /// yields `nil`.
    pub fn evaluate(&mut self, source: &str) -> Result<Value, EvalError> {
        let mut report = RunReport::default();

        let statements = self.front_end(source, &mut report);
        let statements = match statements {
            Some(statements) if report.errors.is_empty() => statements,
            _ => return Err(EvalError::Static(report.errors)),
        };

        if self.config.dry_run {
            return Ok(Value::Nil);
        }

        match statements.as_slice() {
            [Stmt::Expression(expr)] => self
                .interpreter
                .evaluate(expr)
                .map_err(|e| EvalError::Fault(e.into_fault())),

            _ => {
                self.interpreter.interpret(&statements)?;
                Ok(Value::Nil)
            }
        }
    }

    /// Evaluate `source` as one bare expression (no trailing `;`).
    pub fn evaluate_expression(&mut self, source: &str) -> Result<Value, EvalError> {
        let (tokens, lex_errors) = scanner::scan(source, Rc::clone(&self.config.file));
        if !lex_errors.is_empty() {
            return Err(EvalError::Static(lex_errors));
        }

        let expr = parser::parse_expression(&tokens).map_err(|e| EvalError::Static(vec![e]))?;

        let mut resolver = Resolver::new(self.config.allow_redefinition);
        resolver.resolve_expression(&expr);
        let (resolve_errors, _) = resolver.finish();
        if !resolve_errors.is_empty() {
            return Err(EvalError::Static(resolve_errors));
        }

        if self.config.dry_run {
            return Ok(Value::Nil);
        }

        self.interpreter
            .evaluate(&expr)
            .map_err(|e| EvalError::Fault(e.into_fault()))
    }

    /// Scan, parse and resolve.  `None` means nothing may run; the reasons
    /// are already in `report`.
    fn front_end(&self, source: &str, report: &mut RunReport) -> Option<Vec<Stmt>> {
        let (tokens, lex_errors) = scanner::scan(source, Rc::clone(&self.config.file));
        report.errors.extend(lex_errors);

        let (statements, parse_errors) = parser::parse(&tokens);
        report.errors.extend(parse_errors);

        let statements = statements?;

        let (resolve_errors, warnings) =
            resolver::resolve(&statements, self.config.allow_redefinition);
        report.warnings = warnings;

        if !resolve_errors.is_empty() {
            info!(
                "Resolver found {} error(s); not executing",
                resolve_errors.len()
            );
            report.errors.extend(resolve_errors);
            return None;
        }

        Some(statements)
    }
}
