//! Runtime values produced and consumed by formulas

use crate::ast::Expr;
use crate::error::{FormulaError, FormulaResult};
use presetkit_core::{format_number, SettingValue};
use std::fmt;
use std::sync::Arc;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Bool(bool),
    String(String),
    List(Vec<Value>),
    /// Object literal fields in source order
    Object(Vec<(String, Value)>),
    Function(Callable),
}

/// Something `map` can apply
#[derive(Debug, Clone, PartialEq)]
pub enum Callable {
    /// An allow-listed built-in, by name
    Builtin(String),
    /// A `param => body` lambda
    Lambda { param: String, body: Arc<Expr> },
}

impl Value {
    /// Name of the value's type, for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Convert to number, if possible (booleans count as 0/1)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(true) => Some(1.0),
            Value::Bool(false) => Some(0.0),
            _ => None,
        }
    }

    /// Force conversion to number for arithmetic
    pub fn to_number(&self) -> FormulaResult<f64> {
        self.as_number().ok_or_else(|| {
            FormulaError::Evaluation(format!("Expected number, got {}", self.type_name()))
        })
    }

    /// Truthiness used by `!`, `&&`, `||`, ternaries and `any`/`all`
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
            Value::Function(_) => true,
        }
    }

    /// Borrow as list
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Look up an object field
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Convert a scalar result to a setting value.
    ///
    /// Numbers become floats, booleans bools, strings strings; the declared
    /// type is applied afterwards by coercion. Lists, objects and functions
    /// have no setting representation.
    pub fn to_setting_value(&self) -> Option<SettingValue> {
        match self {
            Value::Number(n) => Some(SettingValue::Float(*n)),
            Value::Bool(b) => Some(SettingValue::Bool(*b)),
            Value::String(s) => Some(SettingValue::String(s.clone())),
            Value::List(_) | Value::Object(_) | Value::Function(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Bool(b) => write!(f, "{}", b),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(fields) => {
                f.write_str("{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                f.write_str("}")
            }
            Value::Function(Callable::Builtin(name)) => write!(f, "<{}>", name),
            Value::Function(Callable::Lambda { param, .. }) => write!(f, "<{} => ...>", param),
        }
    }
}

impl From<SettingValue> for Value {
    fn from(value: SettingValue) -> Self {
        match value {
            SettingValue::Float(n) => Value::Number(n),
            SettingValue::Int(n) => Value::Number(n as f64),
            SettingValue::Bool(b) => Value::Bool(b),
            SettingValue::Enum(s) | SettingValue::Color(s) | SettingValue::String(s) => {
                Value::String(s)
            }
        }
    }
}

impl From<&SettingValue> for Value {
    fn from(value: &SettingValue) -> Self {
        value.clone().into()
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
