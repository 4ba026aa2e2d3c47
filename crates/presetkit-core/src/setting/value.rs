//! Setting value types and type coercion

use super::SettingType;
use crate::error::{Error, Result};
use lazy_regex::regex_is_match;
use std::fmt;

/// A typed value committed to a setting
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum SettingValue {
    /// Floating point number
    Float(f64),
    /// Integer number
    Int(i64),
    /// Boolean flag
    Bool(bool),
    /// Selected enum option
    Enum(String),
    /// Color literal (`#rgb`, `#rrggbb` or `#rrggbbaa`)
    Color(String),
    /// Free text
    String(String),
}

impl SettingValue {
    /// Create a new string value
    pub fn string<S: Into<String>>(s: S) -> Self {
        SettingValue::String(s.into())
    }

    /// Create a new enum value
    pub fn option<S: Into<String>>(s: S) -> Self {
        SettingValue::Enum(s.into())
    }

    /// The zero value used when a document gives no default
    pub fn zero(ty: SettingType, options: &[String]) -> Self {
        match ty {
            SettingType::Float => SettingValue::Float(0.0),
            SettingType::Int => SettingValue::Int(0),
            SettingType::Bool => SettingValue::Bool(false),
            SettingType::Enum => {
                SettingValue::Enum(options.first().cloned().unwrap_or_default())
            }
            SettingType::Color => SettingValue::Color("#000000".into()),
            SettingType::String => SettingValue::String(String::new()),
        }
    }

    /// The type this value naturally belongs to
    pub fn setting_type(&self) -> SettingType {
        match self {
            SettingValue::Float(_) => SettingType::Float,
            SettingValue::Int(_) => SettingType::Int,
            SettingValue::Bool(_) => SettingType::Bool,
            SettingValue::Enum(_) => SettingType::Enum,
            SettingValue::Color(_) => SettingType::Color,
            SettingValue::String(_) => SettingType::String,
        }
    }

    /// Short name of the variant, used in messages
    pub fn type_name(&self) -> &'static str {
        self.setting_type().name()
    }

    /// Numeric view (floats and ints only)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(n) => Some(*n),
            SettingValue::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Boolean view
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text view (enum, color and string values)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Enum(s) | SettingValue::Color(s) | SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Whether two values differ.
    ///
    /// Numeric values differ when they are more than `epsilon` apart or
    /// either is NaN; every other pairing uses exact equality.
    pub fn differs_from(&self, other: &SettingValue, epsilon: f64) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.is_nan() || b.is_nan() || (a - b).abs() > epsilon,
            _ => self != other,
        }
    }

    /// Coerce this value to `ty`.
    ///
    /// Conversions that lose information, or that produce a value outside the
    /// declared `options`, succeed with a [`CoercionWarning`]. Conversions that
    /// are impossible return [`Error::Coercion`].
    pub fn coerce(self, ty: SettingType, options: &[String]) -> Result<Coerced> {
        let from = self.setting_type();
        let lossy = |value| Coerced::warn(value, CoercionWarning::Lossy { from, to: ty });
        let fail = |value: &SettingValue| Error::Coercion {
            expected: ty,
            actual: format!("{} {}", value.type_name(), value),
        };

        let coerced = match (ty, self) {
            (SettingType::Float, SettingValue::Float(n)) => {
                if !n.is_finite() {
                    return Err(fail(&SettingValue::Float(n)));
                }
                Coerced::exact(SettingValue::Float(n))
            }
            (SettingType::Float, SettingValue::Int(n)) => {
                Coerced::exact(SettingValue::Float(n as f64))
            }
            (SettingType::Float, SettingValue::Bool(b)) => {
                lossy(SettingValue::Float(if b { 1.0 } else { 0.0 }))
            }
            (SettingType::Float, value) => match parse_number(&value) {
                Some(n) if n.is_finite() => lossy(SettingValue::Float(n)),
                _ => return Err(fail(&value)),
            },

            (SettingType::Int, SettingValue::Int(n)) => Coerced::exact(SettingValue::Int(n)),
            (SettingType::Int, SettingValue::Float(n)) => {
                if !n.is_finite() {
                    return Err(fail(&SettingValue::Float(n)));
                }
                if n.fract() == 0.0 {
                    Coerced::exact(SettingValue::Int(n as i64))
                } else {
                    lossy(SettingValue::Int(n.round() as i64))
                }
            }
            (SettingType::Int, SettingValue::Bool(b)) => lossy(SettingValue::Int(b as i64)),
            (SettingType::Int, value) => match parse_number(&value) {
                Some(n) if n.is_finite() => lossy(SettingValue::Int(n.round() as i64)),
                _ => return Err(fail(&value)),
            },

            (SettingType::Bool, SettingValue::Bool(b)) => Coerced::exact(SettingValue::Bool(b)),
            (SettingType::Bool, SettingValue::Float(n)) => lossy(SettingValue::Bool(n != 0.0)),
            (SettingType::Bool, SettingValue::Int(n)) => lossy(SettingValue::Bool(n != 0)),
            (SettingType::Bool, value) => match value.as_str().map(str::to_ascii_lowercase) {
                Some(s) if s == "true" => lossy(SettingValue::Bool(true)),
                Some(s) if s == "false" => lossy(SettingValue::Bool(false)),
                _ => return Err(fail(&value)),
            },

            (SettingType::Enum, SettingValue::Enum(s)) | (SettingType::Enum, SettingValue::String(s)) => {
                Coerced::exact(SettingValue::Enum(s))
            }
            (SettingType::Enum, value) => lossy(SettingValue::Enum(value.to_string())),

            (SettingType::Color, SettingValue::Color(s))
            | (SettingType::Color, SettingValue::String(s))
            | (SettingType::Color, SettingValue::Enum(s)) => {
                if is_color_literal(&s) {
                    Coerced::exact(SettingValue::Color(s))
                } else {
                    Coerced::warn(
                        SettingValue::Color(s.clone()),
                        CoercionWarning::MalformedColor(s),
                    )
                }
            }
            (SettingType::Color, value) => return Err(fail(&value)),

            (SettingType::String, SettingValue::String(s))
            | (SettingType::String, SettingValue::Enum(s))
            | (SettingType::String, SettingValue::Color(s)) => {
                Coerced::exact(SettingValue::String(s))
            }
            (SettingType::String, value) => lossy(SettingValue::String(value.to_string())),
        };

        Ok(coerced.check_options(options))
    }
}

fn parse_number(value: &SettingValue) -> Option<f64> {
    value.as_str().and_then(|s| s.trim().parse().ok())
}

/// Whether `s` is a `#rgb`, `#rrggbb` or `#rrggbbaa` color literal
pub fn is_color_literal(s: &str) -> bool {
    regex_is_match!(
        r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$",
        s
    )
}

/// Format a number without trailing zeros for whole values
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Float(n) => f.write_str(&format_number(*n)),
            SettingValue::Int(n) => write!(f, "{}", n),
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Enum(s) | SettingValue::Color(s) | SettingValue::String(s) => {
                f.write_str(s)
            }
        }
    }
}

impl From<f64> for SettingValue {
    fn from(n: f64) -> Self {
        SettingValue::Float(n)
    }
}

impl From<i64> for SettingValue {
    fn from(n: i64) -> Self {
        SettingValue::Int(n)
    }
}

impl From<i32> for SettingValue {
    fn from(n: i32) -> Self {
        SettingValue::Int(n as i64)
    }
}

impl From<bool> for SettingValue {
    fn from(b: bool) -> Self {
        SettingValue::Bool(b)
    }
}

impl From<&str> for SettingValue {
    fn from(s: &str) -> Self {
        SettingValue::String(s.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(s: String) -> Self {
        SettingValue::String(s)
    }
}

/// Non-fatal problem found while coercing a value
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionWarning {
    /// The conversion lost information (e.g. 2.5 → int)
    Lossy { from: SettingType, to: SettingType },
    /// Enum value is not among the declared options
    NotAnOption(String),
    /// Text is not a `#rgb`/`#rrggbb`/`#rrggbbaa` literal
    MalformedColor(String),
}

impl fmt::Display for CoercionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoercionWarning::Lossy { from, to } => write!(f, "lossy conversion from {from} to {to}"),
            CoercionWarning::NotAnOption(s) => write!(f, "{s:?} is not a declared option"),
            CoercionWarning::MalformedColor(s) => write!(f, "{s:?} is not a color literal"),
        }
    }
}

/// Result of a successful coercion
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: SettingValue,
    pub warnings: Vec<CoercionWarning>,
}

impl Coerced {
    fn exact(value: SettingValue) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    fn warn(value: SettingValue, warning: CoercionWarning) -> Self {
        Self {
            value,
            warnings: vec![warning],
        }
    }

    fn check_options(mut self, options: &[String]) -> Self {
        if let SettingValue::Enum(s) = &self.value {
            if !options.is_empty() && !options.iter().any(|o| o == s) {
                self.warnings.push(CoercionWarning::NotAnOption(s.clone()));
            }
        }
        self
    }

    /// Whether the value converted without any warning
    pub fn is_exact(&self) -> bool {
        self.warnings.is_empty()
    }
}
