//! Tree‑walking evaluator.
//!
//! Statements run for their effects, expressions reduce to [`Value`]s.  Loop
//! exit and function return travel up the Rust call stack as
//! [`InterpretError`] signals next to real faults; loops and call sites match
//! on the signal they own and pass everything else through.

use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;

use log::{debug, info};
use thiserror::Error;

use crate::ast::{BinaryOp, Depth, Expr, FunctionDecl, LiteralValue, Stmt, UnaryOp};
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeFault;
use crate::token::{Identifier, SourceLocation};
use crate::value::{self, LoxClass, LoxFunction, LoxInstance, NativeFunction, Value};

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error(transparent)]
    Fault(#[from] RuntimeFault),

    #[error("{0}: break signal")]
    BreakSignal(SourceLocation),

    #[error("{1}: return signal with value: {0}")]
    ReturnSignal(Value, SourceLocation),
}

impl InterpretError {
    /// A signal nobody caught is a fault of its own.
    pub fn into_fault(self) -> RuntimeFault {
        match self {
            InterpretError::Fault(fault) => fault,
            InterpretError::BreakSignal(location) => RuntimeFault::BreakOutsideLoop { location },
            InterpretError::ReturnSignal(_, location) => {
                RuntimeFault::ReturnOutsideFunction { location }
            }
        }
    }
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, InterpretError>;

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    output: Box<dyn Write>,
}

impl Interpreter {
    /// An interpreter printing to stdout.
    pub fn new(allow_redefinition: bool) -> Self {
        Self::with_output(Box::new(io::stdout()), allow_redefinition)
    }

    /// An interpreter printing to `output`.
    pub fn with_output(output: Box<dyn Write>, allow_redefinition: bool) -> Self {
        info!("Initializing Interpreter");

        let globals = Environment::new(allow_redefinition).shared();
        define_natives(&globals);

        Self {
            environment: Rc::clone(&globals),
            globals,
            output,
        }
    }

    pub fn set_allow_redefinition(&mut self, allow: bool) {
        self.globals.borrow_mut().set_allow_redefinition(allow);
    }

    /// Forget every user global; natives come back.
    pub fn clear_globals(&mut self) {
        info!("Clearing globals");

        self.globals.borrow_mut().clear();
        define_natives(&self.globals);
        self.environment = Rc::clone(&self.globals);
    }

    /// Run a resolved program.  Stops at the first fault.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeFault> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            self.execute(stmt).map_err(InterpretError::into_fault)?;
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }

            Stmt::Print { expr, location } => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value)
                    .and_then(|()| self.output.flush())
                    .map_err(|e| RuntimeFault::Output {
                        message: e.to_string(),
                        location: location.clone(),
                    })?;
                debug!("Printed value: {}", value);
                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Defining variable '{}' = {}", name, value);
                self.environment.borrow_mut().define(name, value)?;
                Ok(())
            }

            Stmt::Block { statements, .. } => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, environment.shared())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(())
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body) {
                        Ok(()) => {}
                        Err(InterpretError::BreakSignal(_)) => {
                            debug!("Break out of while loop");
                            break;
                        }
                        Err(err) => return Err(err),
                    }
                }
                Ok(())
            }

            Stmt::Break { location } => Err(InterpretError::BreakSignal(location.clone())),

            Stmt::Function(decl) => {
                let function = self.closure_over(decl, false);
                if let Some(name) = &decl.name {
                    debug!("Defining function '{}'", name);
                    self.environment
                        .borrow_mut()
                        .define(name, Value::Function(function))?;
                }
                Ok(())
            }

            Stmt::Return { value, location } => {
                let value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Err(InterpretError::ReturnSignal(value, location.clone()))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Runs `statements` with `environment` as the current scope.  The previous
    /// scope is restored on every exit path.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> IResult<()> {
        let previous = mem::replace(&mut self.environment, environment);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;
        result
    }

    fn execute_class(
        &mut self,
        name: &Identifier,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> IResult<()> {
        debug!("Defining class '{}'", name);

        let superclass = match superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                other => {
                    return Err(RuntimeFault::type_error(
                        expr.location().clone(),
                        format!("Superclass must be a class, got {}.", other.type_name()),
                    )
                    .into())
                }
            },
            None => None,
        };

        // methods of a subclass close over a scope that binds `super`
        let previous = superclass.as_ref().map(|class| {
            let mut environment = Environment::with_enclosing(Rc::clone(&self.environment));
            environment.insert("super", Value::Class(Rc::clone(class)));
            mem::replace(&mut self.environment, environment.shared())
        });

        let table: HashMap<String, Rc<LoxFunction>> = methods
            .iter()
            .map(|method| {
                let is_initializer = method.display_name() == "init";
                (
                    method.display_name().to_string(),
                    self.closure_over(method, is_initializer),
                )
            })
            .collect();

        if let Some(previous) = previous {
            self.environment = previous;
        }

        let class = LoxClass::new(name.name.clone(), superclass, table);
        self.environment
            .borrow_mut()
            .define(name, Value::Class(Rc::new(class)))?;

        Ok(())
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        match expr {
            Expr::Literal { value, .. } => Ok(match value {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping { expr, .. } => self.evaluate(expr),

            Expr::Unary { op, right, .. } => {
                let value = self.evaluate(right)?;
                match op {
                    UnaryOp::Negate => Ok(Value::Number(-as_number(&value, right)?)),
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }

            Expr::Binary {
                left,
                op,
                right,
                location,
            } => self.evaluate_binary(left, *op, right, location),

            Expr::Sequence { exprs, .. } => {
                let mut last = Value::Nil;
                for e in exprs {
                    last = self.evaluate(e)?;
                }
                Ok(last)
            }

            Expr::Variable { name, depth } => self.lookup_variable(name, depth),

            Expr::Assign { name, value, depth } => {
                let value = self.evaluate(value)?;
                match depth.get() {
                    Some(distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.name,
                        value.clone(),
                        &name.location,
                    )?,
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }
                Ok(value)
            }

            Expr::Call {
                callee,
                arguments,
                location,
            } => {
                let callee = self.evaluate(callee)?;

                let mut values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    values.push(self.evaluate(arg)?);
                }

                let callable = callee.as_callable().ok_or_else(|| {
                    RuntimeFault::type_error(location.clone(), "Can only call functions and classes.")
                })?;

                if values.len() != callable.arity() {
                    return Err(RuntimeFault::Arity {
                        expected: callable.arity(),
                        got: values.len(),
                        location: location.clone(),
                    }
                    .into());
                }

                callable.call(self, values, location)
            }

            Expr::Lambda(decl) => Ok(Value::Function(self.closure_over(decl, false))),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),
                _ => Err(RuntimeFault::type_error(
                    name.location.clone(),
                    "Only instances have properties.",
                )
                .into()),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeFault::type_error(
                        name.location.clone(),
                        "Only instances have fields.",
                    )
                    .into());
                };

                let value = self.evaluate(value)?;
                instance.set(name, value.clone());
                Ok(value)
            }

            Expr::This { location, depth } => self.lookup_pseudo("this", depth, location),

            Expr::Super {
                location,
                method,
                depth,
            } => self.evaluate_super(method, depth, location),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        location: &SourceLocation,
    ) -> IResult<Value> {
        let lhs = self.evaluate(left)?;

        // short‑circuit operators yield the deciding operand itself
        match op {
            BinaryOp::Or if lhs.is_truthy() => return Ok(lhs),
            BinaryOp::And if !lhs.is_truthy() => return Ok(lhs),
            BinaryOp::Or | BinaryOp::And => return self.evaluate(right),
            _ => {}
        }

        let rhs = self.evaluate(right)?;
        debug!("Binary {} on {} and {}", op, lhs, rhs);

        let value = match op {
            BinaryOp::Addition => match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                (Value::String(a), Value::String(b)) => Value::String(format!("{}{}", a, b)),
                (Value::Number(_) | Value::String(_), _) => {
                    return Err(addition_fault(right.location()).into())
                }
                _ => return Err(addition_fault(left.location()).into()),
            },

            BinaryOp::Subtraction => {
                Value::Number(as_number(&lhs, left)? - as_number(&rhs, right)?)
            }

            BinaryOp::Multiplication => {
                Value::Number(as_number(&lhs, left)? * as_number(&rhs, right)?)
            }

            BinaryOp::Division => {
                let dividend = as_number(&lhs, left)?;
                let divisor = as_number(&rhs, right)?;
                if divisor == 0.0 {
                    return Err(RuntimeFault::ZeroDivide {
                        location: location.clone(),
                    }
                    .into());
                }
                Value::Number(dividend / divisor)
            }

            BinaryOp::Less => Value::Bool(as_number(&lhs, left)? < as_number(&rhs, right)?),

            BinaryOp::LessEqual => Value::Bool(as_number(&lhs, left)? <= as_number(&rhs, right)?),

            BinaryOp::Greater => Value::Bool(as_number(&lhs, left)? > as_number(&rhs, right)?),

            BinaryOp::GreaterEqual => {
                Value::Bool(as_number(&lhs, left)? >= as_number(&rhs, right)?)
            }

            BinaryOp::Equality => Value::Bool(lhs.is_equal(&rhs)),

            BinaryOp::Inequality => Value::Bool(!lhs.is_equal(&rhs)),

            BinaryOp::And | BinaryOp::Or => rhs,
        };

        Ok(value)
    }

    fn evaluate_super(
        &mut self,
        method: &Identifier,
        depth: &Depth,
        location: &SourceLocation,
    ) -> IResult<Value> {
        let distance = depth
            .get()
            .ok_or_else(|| RuntimeFault::internal(location.clone(), "Unresolved 'super'."))?;

        // `this` always sits one scope inside `super`
        let this_distance = distance
            .checked_sub(1)
            .ok_or_else(|| RuntimeFault::internal(location.clone(), "Misplaced 'super' scope."))?;

        let superclass = Environment::get_at(&self.environment, distance, "super", location)?;
        let this = Environment::get_at(&self.environment, this_distance, "this", location)?;

        let (Value::Class(superclass), Value::Instance(instance)) = (superclass, this) else {
            return Err(RuntimeFault::internal(
                location.clone(),
                "'super' or 'this' bound to the wrong kind of value.",
            )
            .into());
        };

        match superclass.find_method(&method.name) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(RuntimeFault::UndefinedField {
                name: method.name.clone(),
                location: method.location.clone(),
            }
            .into()),
        }
    }

    /// Resolved locals jump straight to their scope; the rest are globals.
    fn lookup_variable(&self, name: &Identifier, depth: &Depth) -> IResult<Value> {
        let value = match depth.get() {
            Some(distance) => {
                Environment::get_at(&self.environment, distance, &name.name, &name.location)?
            }
            None => self.globals.borrow().get(name)?,
        };

        Ok(value)
    }

    fn lookup_pseudo(&self, name: &str, depth: &Depth, location: &SourceLocation) -> IResult<Value> {
        let distance = depth.get().ok_or_else(|| {
            RuntimeFault::internal(location.clone(), format!("Unresolved '{}'.", name))
        })?;

        Ok(Environment::get_at(&self.environment, distance, name, location)?)
    }

    fn closure_over(&self, decl: &Rc<FunctionDecl>, is_initializer: bool) -> Rc<LoxFunction> {
        Rc::new(LoxFunction::new(
            Rc::clone(decl),
            Rc::clone(&self.environment),
            is_initializer,
        ))
    }
}

fn define_natives(globals: &EnvRef) {
    debug!("Defining native function 'clock'");

    globals.borrow_mut().insert(
        "clock",
        Value::NativeFunction(Rc::new(NativeFunction::new("clock", 0, value::clock))),
    );
}

/// Numeric view of an operand, or a cast fault pointing at it.
fn as_number(value: &Value, operand: &Expr) -> Result<f64, RuntimeFault> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(RuntimeFault::cast(
            operand.location().clone(),
            format!("Could not perform cast of `{}` to double", other),
        )),
    }
}

fn addition_fault(location: &SourceLocation) -> RuntimeFault {
    RuntimeFault::cast(
        location.clone(),
        "Both operands of addition should be either numbers or strings.",
    )
}
