//! Expression and statement trees produced by the [`Parser`](crate::parser::Parser).
//!
//! Both trees are closed sums: every pass (`resolver`, `interpreter`,
//! `ast_printer`) matches them exhaustively, so adding a node kind fails to
//! compile until every pass handles it.
//!
//! Nodes that read or write a variable (`Variable`, `Assign`, `This`, `Super`)
//! carry a `depth` slot.  The resolver fills it through a shared reference once
//! it knows how many environments separate the use from the declaration; an
//! empty slot means "look the name up in the globals".

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::token::{Identifier, SourceLocation, TokenType};

/// Lexical distance recorded by the resolver.
pub type Depth = Cell<Option<usize>>;

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    True,

    False,

    /// The `nil` literal (Lox’s `null`).
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `-`
    Negate,
    /// `!`
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Negate => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// Every binary operator, one variant per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equality,
    Inequality,
    /// Short‑circuiting `and`.
    And,
    /// Short‑circuiting `or`.
    Or,
}

impl BinaryOp {
    /// Map an operator token onto its operation.
    pub fn from_token(token_type: &TokenType) -> Option<Self> {
        let op = match token_type {
            TokenType::PLUS => BinaryOp::Addition,
            TokenType::MINUS => BinaryOp::Subtraction,
            TokenType::STAR => BinaryOp::Multiplication,
            TokenType::SLASH => BinaryOp::Division,
            TokenType::LESS => BinaryOp::Less,
            TokenType::LESS_EQUAL => BinaryOp::LessEqual,
            TokenType::GREATER => BinaryOp::Greater,
            TokenType::GREATER_EQUAL => BinaryOp::GreaterEqual,
            TokenType::EQUAL_EQUAL => BinaryOp::Equality,
            TokenType::BANG_EQUAL => BinaryOp::Inequality,
            TokenType::AND => BinaryOp::And,
            TokenType::OR => BinaryOp::Or,
            _ => return None,
        };

        Some(op)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Addition => "+",
            BinaryOp::Subtraction => "-",
            BinaryOp::Multiplication => "*",
            BinaryOp::Division => "/",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::Equality => "==",
            BinaryOp::Inequality => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Shared by named function declarations, methods and lambdas.
///
/// Held behind an `Rc` so runtime function values can keep the body alive
/// after the statement list that declared them is dropped (REPL lines).
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for lambdas.
    pub name: Option<Identifier>,
    pub params: Vec<Identifier>,
    pub body: Vec<Stmt>,
    /// The `fun` keyword, or the method name for methods.
    pub location: SourceLocation,
}

impl FunctionDecl {
    /// Name used in `<fn …>` and diagnostics.
    pub fn display_name(&self) -> &str {
        self.name.as_ref().map_or("lambda", |n| n.name.as_str())
    }
}

/// **Abstract‑Syntax‑Tree node** representing every kind of *expression*.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal {
        value: LiteralValue,
        location: SourceLocation,
    },

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping {
        expr: Box<Expr>,
        location: SourceLocation,
    },

    /// Prefix unary operator expression
    /// *Example:* `!isReady` or `-42`
    Unary {
        op: UnaryOp,
        right: Box<Expr>,
        location: SourceLocation,
    },

    /// Infix binary operator expression, including `and` / `or`.
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        /// Location of the operator token.
        location: SourceLocation,
    },

    /// Comma operator: evaluates every element, yields the last.
    Sequence {
        exprs: Vec<Expr>,
        location: SourceLocation,
    },

    /// Variable access.
    Variable { name: Identifier, depth: Depth },

    /// Assignment expression: `identifier "=" expression`
    Assign {
        name: Identifier,
        value: Box<Expr>,
        depth: Depth,
    },

    /// Function‑ or method‑call expression
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
        /// The opening `(`.
        location: SourceLocation,
    },

    /// Anonymous function: `fun (a, b) { … }`.
    Lambda(Rc<FunctionDecl>),

    /// object.property
    Get { object: Box<Expr>, name: Identifier },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Identifier,
        value: Box<Expr>,
    },

    /// The 'this' keyword inside a method.
    This {
        location: SourceLocation,
        depth: Depth,
    },

    /// `super.method`
    Super {
        location: SourceLocation,
        method: Identifier,
        depth: Depth,
    },
}

impl Expr {
    pub fn variable(name: Identifier) -> Self {
        Expr::Variable {
            name,
            depth: Cell::new(None),
        }
    }

    pub fn location(&self) -> &SourceLocation {
        match self {
            Expr::Literal { location, .. }
            | Expr::Grouping { location, .. }
            | Expr::Unary { location, .. }
            | Expr::Binary { location, .. }
            | Expr::Sequence { location, .. }
            | Expr::Call { location, .. }
            | Expr::This { location, .. }
            | Expr::Super { location, .. } => location,

            Expr::Variable { name, .. }
            | Expr::Assign { name, .. }
            | Expr::Get { name, .. }
            | Expr::Set { name, .. } => &name.location,

            Expr::Lambda(decl) => &decl.location,
        }
    }
}

/// **Abstract‑Syntax‑Tree node** for *statements*.  A program is a sequence of
/// these nodes returned by [`Parser::parse`](crate::parser::Parser::parse).
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print {
        expr: Expr,
        location: SourceLocation,
    },

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: Identifier,
        initializer: Option<Expr>,
    },

    /// Braced scope containing zero or more declarations/statements.
    Block {
        statements: Vec<Stmt>,
        location: SourceLocation,
    },

    /// `if` / `else` conditional.
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        location: SourceLocation,
    },

    /// `while` loop.  `for` loops are desugared into this.
    While {
        condition: Expr,
        body: Box<Stmt>,
        location: SourceLocation,
    },

    Break { location: SourceLocation },

    /// Function declaration ‑ becomes a first‑class callable value.
    Function(Rc<FunctionDecl>),

    /// `return` statement.  Absent value ⇒ `nil`.
    Return {
        value: Option<Expr>,
        location: SourceLocation,
    },

    Class {
        name: Identifier,
        /// Always an `Expr::Variable` when present.
        superclass: Option<Expr>,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

impl Stmt {
    pub fn location(&self) -> &SourceLocation {
        match self {
            Stmt::Expression(expr) => expr.location(),
            Stmt::Print { location, .. }
            | Stmt::Block { location, .. }
            | Stmt::If { location, .. }
            | Stmt::While { location, .. }
            | Stmt::Break { location }
            | Stmt::Return { location, .. } => location,
            Stmt::Var { name, .. } | Stmt::Class { name, .. } => &name.location,
            Stmt::Function(decl) => &decl.location,
        }
    }
}
