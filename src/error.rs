//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! Three severities travel separately:
//!
//! * [`LoxError`]: lexical, syntax and static‑analysis problems.  They are
//!   collected over a whole pass and handed back as a batch.
//! * [`Warning`]: advisory findings from the resolver that never block
//!   execution.
//! * [`RuntimeFault`]: raised while evaluating.  The first uncaught fault stops
//!   the run.
//!
//! The module **does not** print diagnostics itself.

use thiserror::Error;

use log::info;

use crate::token::SourceLocation;

/// Static error produced before execution.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error.
    #[error("{location}: Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        location: SourceLocation,
    },

    /// Syntactic (parser) error.
    #[error("{location}: Error: {message}")]
    Parse {
        message: String,
        location: SourceLocation,
    },

    /// Static‑analysis or resolution failure (e.g. early‑binding errors).
    #[error("{location}: Error: {message}")]
    Resolve {
        message: String,
        location: SourceLocation,
    },
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(location: SourceLocation, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: {}: {}", location, message);

        LoxError::Lex { message, location }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(location: SourceLocation, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: {}: {}", location, message);

        LoxError::Parse { message, location }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(location: SourceLocation, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: {}: {}", location, message);

        LoxError::Resolve { message, location }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            LoxError::Lex { location, .. }
            | LoxError::Parse { location, .. }
            | LoxError::Resolve { location, .. } => location,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. } => message,
        }
    }
}

/// Crate‑wide `Result` alias for the static stages.
pub type Result<T> = std::result::Result<T, LoxError>;

/// Advisory finding of the resolver (e.g. a local that is never read).
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: Warning: {message}")]
pub struct Warning {
    pub message: String,
    pub location: SourceLocation,
}

impl Warning {
    pub fn new<S: Into<String>>(location: SourceLocation, msg: S) -> Self {
        Self {
            message: msg.into(),
            location,
        }
    }
}

/// Typed fault raised during evaluation.  Every variant carries the source
/// location of the node that failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum RuntimeFault {
    /// Operand of the wrong type.
    #[error("{location}: {message}")]
    Cast {
        message: String,
        location: SourceLocation,
    },

    #[error("{location}: Zero division is not allowed.")]
    ZeroDivide { location: SourceLocation },

    #[error("{location}: Undefined variable '{name}'.")]
    UndefinedVariable {
        name: String,
        location: SourceLocation,
    },

    #[error("{location}: Undefined property '{name}'.")]
    UndefinedField {
        name: String,
        location: SourceLocation,
    },

    /// Calling a non‑callable, property access on a non‑instance, a superclass
    /// that is not a class.
    #[error("{location}: {message}")]
    Type {
        message: String,
        location: SourceLocation,
    },

    #[error("{location}: Expected {expected} arguments but got {got}.")]
    Arity {
        expected: usize,
        got: usize,
        location: SourceLocation,
    },

    #[error("{location}: Variable '{name}' is already defined.")]
    Redefinition {
        name: String,
        location: SourceLocation,
    },

    #[error("{location}: 'break' used outside of a loop.")]
    BreakOutsideLoop { location: SourceLocation },

    #[error("{location}: 'return' used outside of a function.")]
    ReturnOutsideFunction { location: SourceLocation },

    /// The print sink refused the write.
    #[error("{location}: Failed to write output: {message}")]
    Output {
        message: String,
        location: SourceLocation,
    },

    /// Resolver and evaluator disagree about the shape of the scope chain.
    #[error("{location}: Internal error: {message}")]
    Internal {
        message: String,
        location: SourceLocation,
    },
}

impl RuntimeFault {
    pub fn cast<S: Into<String>>(location: SourceLocation, msg: S) -> Self {
        RuntimeFault::Cast {
            message: msg.into(),
            location,
        }
    }

    pub fn type_error<S: Into<String>>(location: SourceLocation, msg: S) -> Self {
        RuntimeFault::Type {
            message: msg.into(),
            location,
        }
    }

    pub fn internal<S: Into<String>>(location: SourceLocation, msg: S) -> Self {
        RuntimeFault::Internal {
            message: msg.into(),
            location,
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            RuntimeFault::Cast { location, .. }
            | RuntimeFault::ZeroDivide { location }
            | RuntimeFault::UndefinedVariable { location, .. }
            | RuntimeFault::UndefinedField { location, .. }
            | RuntimeFault::Type { location, .. }
            | RuntimeFault::Arity { location, .. }
            | RuntimeFault::Redefinition { location, .. }
            | RuntimeFault::BreakOutsideLoop { location }
            | RuntimeFault::ReturnOutsideFunction { location }
            | RuntimeFault::Output { location, .. }
            | RuntimeFault::Internal { location, .. } => location,
        }
    }
}
