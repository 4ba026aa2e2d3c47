//! Formula evaluator
//!
//! Evaluates formula ASTs against an [`EvaluationContext`] of setting
//! bindings. Evaluation has no access to anything outside the context and
//! the built-in registry.

use crate::ast::{BinaryOperator, Expr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions;
use crate::value::{Callable, Value};
use ahash::AHashMap;
use std::cmp::Ordering;

/// Key to value environment formulas read from
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    bindings: AHashMap<String, Value>,
}

impl EvaluationContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from key/value pairs
    pub fn from_bindings<I, K, V>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            bindings: bindings
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Bind (or rebind) a key
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.bindings.insert(key.into(), value.into());
    }

    /// Current binding of a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bindings.get(key)
    }

    /// Current binding of a key, or an unknown-reference error
    pub fn lookup(&self, key: &str) -> FormulaResult<&Value> {
        self.get(key)
            .ok_or_else(|| FormulaError::UnknownReference(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Tree-walking interpreter over one context
///
/// Lambda parameters live in a local scope stack that shadows the context.
pub struct Interpreter<'a> {
    ctx: &'a EvaluationContext,
    locals: Vec<(String, Value)>,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: &'a EvaluationContext) -> Self {
        Self {
            ctx,
            locals: Vec::new(),
        }
    }

    /// The context being read
    pub fn context(&self) -> &'a EvaluationContext {
        self.ctx
    }

    /// Evaluate an expression
    pub fn evaluate(&mut self, expr: &Expr) -> FormulaResult<Value> {
        match expr {
            // === Literals ===
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Bool(*b)),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item)?);
                }
                Ok(Value::List(values))
            }
            Expr::Object(fields) => {
                let mut values = Vec::with_capacity(fields.len());
                for (key, value) in fields {
                    values.push((key.clone(), self.evaluate(value)?));
                }
                Ok(Value::Object(values))
            }

            // === References ===
            Expr::Variable(name) => self.resolve_variable(name),
            Expr::Member { object, field } => {
                let object = self.evaluate(object)?;
                object.field(field).cloned().ok_or_else(|| {
                    FormulaError::Evaluation(format!(
                        "{} has no field '{}'",
                        object.type_name(),
                        field
                    ))
                })
            }
            Expr::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                index_value(&object, &index)
            }
            Expr::FunctionRef(name) => Ok(Value::Function(Callable::Builtin(name.clone()))),

            // === Operators ===
            Expr::BinaryOp { op, left, right } => self.evaluate_binary_op(*op, left, right),
            Expr::UnaryOp { op, operand } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOperator::Negate => Ok(Value::Number(-value.to_number()?)),
                    UnaryOperator::Not => Ok(Value::Bool(!value.is_truthy())),
                }
            }
            Expr::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                // Only the taken branch is evaluated
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            // === Functions ===
            Expr::Call { function, args } => {
                let mut evaluated_args = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated_args.push(self.evaluate(arg)?);
                }
                self.call_builtin(function, &evaluated_args)
            }
            Expr::Lambda { param, body } => Ok(Value::Function(Callable::Lambda {
                param: param.clone(),
                body: body.clone(),
            })),
        }
    }

    /// Apply a function value to arguments
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> FormulaResult<Value> {
        match callee {
            Value::Function(Callable::Builtin(name)) => self.call_builtin(name, &args),
            Value::Function(Callable::Lambda { param, body }) => {
                let [arg] = <[Value; 1]>::try_from(args).map_err(|args| {
                    FormulaError::ArgumentCount {
                        function: format!("{} => ...", param),
                        expected: "1".to_string(),
                        actual: args.len(),
                    }
                })?;

                self.locals.push((param.clone(), arg));
                let result = self.evaluate(body);
                self.locals.pop();
                result
            }
            other => Err(FormulaError::Evaluation(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_builtin(&mut self, name: &str, args: &[Value]) -> FormulaResult<Value> {
        let func = functions::registry()
            .get(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        func.check_arity(args.len())?;
        match (func.implementation)(args, self)? {
            Value::Number(n) if !n.is_finite() => Err(FormulaError::Evaluation(format!(
                "{} result is not a finite number",
                name
            ))),
            value => Ok(value),
        }
    }

    fn resolve_variable(&self, name: &str) -> FormulaResult<Value> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(param, _)| param == name) {
            return Ok(value.clone());
        }
        self.ctx.lookup(name).cloned()
    }

    fn evaluate_binary_op(
        &mut self,
        op: BinaryOperator,
        left: &Expr,
        right: &Expr,
    ) -> FormulaResult<Value> {
        // Logical operators short-circuit
        match op {
            BinaryOperator::And => {
                let result = self.evaluate(left)?.is_truthy() && self.evaluate(right)?.is_truthy();
                return Ok(Value::Bool(result));
            }
            BinaryOperator::Or => {
                let result = self.evaluate(left)?.is_truthy() || self.evaluate(right)?.is_truthy();
                return Ok(Value::Bool(result));
            }
            _ => {}
        }

        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        match op {
            // Arithmetic operators
            BinaryOperator::Add => {
                if matches!(left_val, Value::String(_)) || matches!(right_val, Value::String(_)) {
                    return Ok(Value::String(format!("{}{}", left_val, right_val)));
                }
                finite("Addition", left_val.to_number()? + right_val.to_number()?)
            }
            BinaryOperator::Subtract => {
                finite("Subtraction", left_val.to_number()? - right_val.to_number()?)
            }
            BinaryOperator::Multiply => {
                finite("Multiplication", left_val.to_number()? * right_val.to_number()?)
            }
            BinaryOperator::Divide => {
                let (l, r) = (left_val.to_number()?, right_val.to_number()?);
                if r == 0.0 {
                    return Err(FormulaError::Evaluation("Division by zero".into()));
                }
                finite("Division", l / r)
            }
            BinaryOperator::Modulo => {
                let (l, r) = (left_val.to_number()?, right_val.to_number()?);
                if r == 0.0 {
                    return Err(FormulaError::Evaluation("Modulo by zero".into()));
                }
                finite("Modulo", l % r)
            }
            BinaryOperator::Power => {
                finite("Exponentiation", left_val.to_number()?.powf(right_val.to_number()?))
            }

            // Equality is strict: values of different types are never equal
            BinaryOperator::Equal => Ok(Value::Bool(left_val == right_val)),
            BinaryOperator::NotEqual => Ok(Value::Bool(left_val != right_val)),

            // Ordering
            BinaryOperator::LessThan => {
                Ok(Value::Bool(compare_values(&left_val, &right_val)? == Ordering::Less))
            }
            BinaryOperator::LessEqual => {
                Ok(Value::Bool(compare_values(&left_val, &right_val)? != Ordering::Greater))
            }
            BinaryOperator::GreaterThan => {
                Ok(Value::Bool(compare_values(&left_val, &right_val)? == Ordering::Greater))
            }
            BinaryOperator::GreaterEqual => {
                Ok(Value::Bool(compare_values(&left_val, &right_val)? != Ordering::Less))
            }

            BinaryOperator::And => Ok(Value::Bool(left_val.is_truthy() && right_val.is_truthy())),
            BinaryOperator::Or => Ok(Value::Bool(left_val.is_truthy() || right_val.is_truthy())),
        }
    }
}

/// Evaluate an expression against a context
pub fn evaluate(expr: &Expr, ctx: &EvaluationContext) -> FormulaResult<Value> {
    Interpreter::new(ctx).evaluate(expr)
}

/// Arithmetic results must stay finite
fn finite(operation: &str, n: f64) -> FormulaResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(FormulaError::Evaluation(format!(
            "{} result is not a finite number",
            operation
        )))
    }
}

/// Order two values: numbers (and booleans) numerically, strings lexically
fn compare_values(left: &Value, right: &Value) -> FormulaResult<Ordering> {
    match (left, right) {
        (Value::String(l), Value::String(r)) => Ok(l.cmp(r)),
        _ => match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => l.partial_cmp(&r).ok_or_else(|| {
                FormulaError::Evaluation("Cannot order NaN".into())
            }),
            _ => Err(FormulaError::Evaluation(format!(
                "Cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn index_value(object: &Value, index: &Value) -> FormulaResult<Value> {
    match (object, index) {
        (Value::List(items), Value::Number(n)) => {
            position(*n, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| FormulaError::Evaluation(format!("List index {} out of range", n)))
        }
        (Value::String(s), Value::Number(n)) => position(*n, s.chars().count())
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .ok_or_else(|| FormulaError::Evaluation(format!("String index {} out of range", n))),
        (Value::Object(_), Value::String(key)) => object.field(key).cloned().ok_or_else(|| {
            FormulaError::Evaluation(format!("object has no field '{}'", key))
        }),
        _ => Err(FormulaError::Evaluation(format!(
            "Cannot index {} with {}",
            object.type_name(),
            index.type_name()
        ))),
    }
}

/// Whole, in-range index
fn position(n: f64, len: usize) -> Option<usize> {
    if n.fract() != 0.0 || n < 0.0 || n >= len as f64 {
        None
    } else {
        Some(n as usize)
    }
}
