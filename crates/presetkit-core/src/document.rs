//! Preset document shape
//!
//! A preset document is an ordered list of setting entries. Entry order is
//! the declaration order of the resulting table.
//!
//! ```json
//! {
//!   "name": "Fine 0.4",
//!   "settings": [
//!     { "key": "nozzle_diameter", "type": "float", "default_value": 0.4, "unit": "mm" },
//!     { "key": "layer_height", "type": "float", "value": "nozzle_diameter * 0.5",
//!       "minimum_value": 0.04, "maximum_value": "nozzle_diameter * 0.8" }
//!   ]
//! }
//! ```

use crate::error::Result;
use crate::setting::{format_number, SettingDefinition, SettingType, SettingValue};
use serde::{Deserialize, Serialize};

/// A whole preset: optional name plus settings in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDocument {
    #[serde(default)]
    pub name: Option<String>,
    pub settings: Vec<SettingEntry>,
}

impl PresetDocument {
    /// Convert every entry into a [`SettingDefinition`], preserving order
    pub fn into_definitions(self) -> Result<Vec<SettingDefinition>> {
        self.settings
            .into_iter()
            .map(SettingEntry::into_definition)
            .collect()
    }
}

/// One setting entry of a preset document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingEntry {
    pub key: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    #[serde(default)]
    pub default_value: Option<ScalarValue>,
    /// Formula source computing the default
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub minimum_value: Option<FormulaSource>,
    #[serde(default)]
    pub maximum_value: Option<FormulaSource>,
    #[serde(default)]
    pub enabled: Option<FormulaSource>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub saved_value: Option<ScalarValue>,
}

fn default_visible() -> bool {
    true
}

impl SettingEntry {
    /// Convert into a [`SettingDefinition`]
    pub fn into_definition(self) -> Result<SettingDefinition> {
        let mut def = SettingDefinition::new(self.key, self.setting_type);
        if let Some(label) = self.label {
            def.label = label;
        }
        def.default_value = self.default_value.map(Into::into);
        def.value_expression = self.value;
        def.minimum_expression = self.minimum_value.map(FormulaSource::into_source);
        def.maximum_expression = self.maximum_value.map(FormulaSource::into_source);
        def.enabled_expression = self.enabled.map(FormulaSource::into_source);
        def.options = self.options;
        def.unit = self.unit;
        def.visible = self.visible;
        def.saved_value = self.saved_value.map(Into::into);
        Ok(def)
    }
}

/// A literal value as written in a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<ScalarValue> for SettingValue {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Bool(b) => SettingValue::Bool(b),
            ScalarValue::Number(n) => SettingValue::Float(n),
            ScalarValue::Text(s) => SettingValue::String(s),
        }
    }
}

/// A formula field; bare numbers and booleans are accepted as constant formulas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormulaSource {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FormulaSource {
    /// Formula source text
    pub fn into_source(self) -> String {
        match self {
            FormulaSource::Bool(b) => b.to_string(),
            FormulaSource::Number(n) => format_number(n),
            FormulaSource::Text(s) => s,
        }
    }
}
