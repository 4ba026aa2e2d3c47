//! Setting definitions as declared by a preset document

use super::{SettingType, SettingValue};
use crate::error::{Error, Result};
use lazy_regex::regex_is_match;

/// Declaration of one setting: its key, type, formulas and UI metadata
///
/// Formulas are kept as source text here; compiling them is the job of the
/// formula crate.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDefinition {
    /// Unique identifier, referenced by other settings' formulas
    pub key: String,
    /// Human readable label
    pub label: String,
    /// Declared type
    pub setting_type: SettingType,
    /// Constant default (used as the initial value)
    pub default_value: Option<SettingValue>,
    /// Formula computing the default
    pub value_expression: Option<String>,
    /// Formula computing the lower bound
    pub minimum_expression: Option<String>,
    /// Formula computing the upper bound
    pub maximum_expression: Option<String>,
    /// Formula deciding whether the setting is editable
    pub enabled_expression: Option<String>,
    /// Enum choices, in display order
    pub options: Vec<String>,
    /// Display unit (e.g. "mm", "mm/s")
    pub unit: Option<String>,
    /// Whether the setting is shown at all
    pub visible: bool,
    /// Persisted user value, queued as an override on load
    pub saved_value: Option<SettingValue>,
}

impl SettingDefinition {
    /// Create a constant setting with no default and no formulas
    pub fn new(key: impl Into<String>, setting_type: SettingType) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            setting_type,
            default_value: None,
            value_expression: None,
            minimum_expression: None,
            maximum_expression: None,
            enabled_expression: None,
            options: Vec::new(),
            unit: None,
            visible: true,
            saved_value: None,
        }
    }

    /// Shorthand for a float setting
    pub fn float(key: impl Into<String>) -> Self {
        Self::new(key, SettingType::Float)
    }

    /// Shorthand for an int setting
    pub fn int(key: impl Into<String>) -> Self {
        Self::new(key, SettingType::Int)
    }

    /// Shorthand for a bool setting
    pub fn bool(key: impl Into<String>) -> Self {
        Self::new(key, SettingType::Bool)
    }

    /// Shorthand for an enum setting with its options
    pub fn enumeration<I, S>(key: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(key, SettingType::Enum).with_options(options)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_default(mut self, value: impl Into<SettingValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_value(mut self, source: impl Into<String>) -> Self {
        self.value_expression = Some(source.into());
        self
    }

    pub fn with_minimum(mut self, source: impl Into<String>) -> Self {
        self.minimum_expression = Some(source.into());
        self
    }

    pub fn with_maximum(mut self, source: impl Into<String>) -> Self {
        self.maximum_expression = Some(source.into());
        self
    }

    pub fn with_enabled(mut self, source: impl Into<String>) -> Self {
        self.enabled_expression = Some(source.into());
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_saved_value(mut self, value: impl Into<SettingValue>) -> Self {
        self.saved_value = Some(value.into());
        self
    }

    /// Hide the setting from the UI
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// A setting without a value formula
    pub fn is_constant(&self) -> bool {
        self.value_expression.is_none()
    }

    /// Iterate over every formula source with its role name
    pub fn expressions(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("value", self.value_expression.as_deref()),
            ("minimum_value", self.minimum_expression.as_deref()),
            ("maximum_value", self.maximum_expression.as_deref()),
            ("enabled", self.enabled_expression.as_deref()),
        ]
        .into_iter()
        .filter_map(|(role, source)| source.map(|s| (role, s)))
    }

    /// Check the key and compute the value a new table starts with.
    ///
    /// The default is coerced to the declared type; a default that cannot be
    /// converted, or an enum default outside `options`, is rejected.
    pub fn initial_value(&self) -> Result<SettingValue> {
        validate_key(&self.key)?;

        let Some(default) = self.default_value.clone() else {
            return Ok(SettingValue::zero(self.setting_type, &self.options));
        };

        let coerced = default
            .coerce(self.setting_type, &self.options)
            .map_err(|e| Error::InvalidDefault {
                key: self.key.clone(),
                message: e.to_string(),
            })?;

        if let Some(warning) = coerced
            .warnings
            .iter()
            .find(|w| matches!(w, super::CoercionWarning::NotAnOption(_)))
        {
            return Err(Error::InvalidDefault {
                key: self.key.clone(),
                message: warning.to_string(),
            });
        }

        Ok(coerced.value)
    }
}

/// Words formulas read as literals, never as setting keys
const RESERVED_KEYS: [&str; 4] = ["true", "True", "false", "False"];

/// Keys must be identifiers so that formulas can reference them
pub fn validate_key(key: &str) -> Result<()> {
    if regex_is_match!(r"^[A-Za-z_][A-Za-z0-9_]*$", key) && !RESERVED_KEYS.contains(&key) {
        Ok(())
    } else {
        Err(Error::InvalidKey(key.to_string()))
    }
}
