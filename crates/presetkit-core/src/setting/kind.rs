//! Declared setting types

use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// The declared type of a setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SettingType {
    /// Floating point number
    Float,
    /// Integer number
    #[cfg_attr(feature = "serde", serde(alias = "integer"))]
    Int,
    /// Boolean flag
    #[cfg_attr(feature = "serde", serde(alias = "boolean"))]
    Bool,
    /// One of a fixed list of options
    Enum,
    /// Color literal such as `#ff8800`
    Color,
    /// Free text
    #[cfg_attr(feature = "serde", serde(alias = "str"))]
    String,
}

impl SettingType {
    /// All supported types
    pub const ALL: [SettingType; 6] = [
        SettingType::Float,
        SettingType::Int,
        SettingType::Bool,
        SettingType::Enum,
        SettingType::Color,
        SettingType::String,
    ];

    /// Lowercase type name as it appears in preset documents
    pub fn name(&self) -> &'static str {
        match self {
            SettingType::Float => "float",
            SettingType::Int => "int",
            SettingType::Bool => "bool",
            SettingType::Enum => "enum",
            SettingType::Color => "color",
            SettingType::String => "string",
        }
    }

    /// Numeric types compare with a tolerance and accept bounds
    pub fn is_numeric(&self) -> bool {
        matches!(self, SettingType::Float | SettingType::Int)
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SettingType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float" => Ok(SettingType::Float),
            "int" | "integer" => Ok(SettingType::Int),
            "bool" | "boolean" => Ok(SettingType::Bool),
            "enum" => Ok(SettingType::Enum),
            "color" => Ok(SettingType::Color),
            "string" | "str" => Ok(SettingType::String),
            other => Err(Error::UnknownType(other.to_string())),
        }
    }
}
