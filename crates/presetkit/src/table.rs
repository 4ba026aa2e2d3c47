//! Settings tables
//!
//! A [`SettingsTable`] holds one preset's settings in declaration order,
//! their current values and mismatch flags, and the queue of pending user
//! overrides. Resolution itself lives in [`crate::resolver`].

use crate::plan::EvaluationPlan;
use crate::resolver::EvaluationOrder;
use ahash::AHashMap;
use presetkit_core::{
    Error, PresetDocument, Result, SettingDefinition, SettingType, SettingValue,
};
use presetkit_formula::ExpressionCompiler;
use std::sync::Arc;

/// Lifecycle of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    /// Built but never resolved; values are the declared defaults
    Unresolved,
    /// At least one resolve has completed
    Resolved,
}

/// One setting of a table: its definition plus resolved state
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    definition: SettingDefinition,
    pub(crate) value: SettingValue,
    pub(crate) mismatch: bool,
    pub(crate) enabled: bool,
}

impl Setting {
    fn new(definition: SettingDefinition, value: SettingValue) -> Self {
        Self {
            definition,
            value,
            mismatch: false,
            enabled: true,
        }
    }

    pub fn key(&self) -> &str {
        &self.definition.key
    }

    pub fn definition(&self) -> &SettingDefinition {
        &self.definition
    }

    pub fn setting_type(&self) -> SettingType {
        self.definition.setting_type
    }

    pub fn label(&self) -> &str {
        &self.definition.label
    }

    pub fn unit(&self) -> Option<&str> {
        self.definition.unit.as_deref()
    }

    pub fn options(&self) -> &[String] {
        &self.definition.options
    }

    pub fn is_visible(&self) -> bool {
        self.definition.visible
    }

    /// Last committed value
    pub fn value(&self) -> &SettingValue {
        &self.value
    }

    /// Whether the committed value differs from the formula value
    pub fn is_mismatched(&self) -> bool {
        self.mismatch
    }

    /// Last successfully evaluated `enabled` formula (`true` when absent)
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Setting without a value formula
    pub fn is_constant(&self) -> bool {
        self.definition.is_constant()
    }
}

/// Ordered, independently resolvable set of settings
///
/// Cloning copies every value and the override queue; the compiled plan is
/// shared between the clones.
#[derive(Debug, Clone)]
pub struct SettingsTable {
    name: Option<String>,
    pub(crate) settings: Vec<Setting>,
    pub(crate) index: AHashMap<String, usize>,
    pub(crate) overrides: Vec<(String, SettingValue)>,
    pub(crate) plan: Option<Arc<EvaluationPlan>>,
    pub(crate) state: TableState,
}

impl SettingsTable {
    /// Build a table from definitions in declaration order.
    ///
    /// Saved values are queued as overrides for the first resolve. Formulas
    /// are not compiled here; compile failures surface as diagnostics.
    pub fn new(definitions: Vec<SettingDefinition>) -> Result<Self> {
        let mut settings = Vec::with_capacity(definitions.len());
        let mut index = AHashMap::with_capacity(definitions.len());
        let mut overrides = Vec::new();

        for definition in definitions {
            let value = definition.initial_value()?;
            if index.insert(definition.key.clone(), settings.len()).is_some() {
                return Err(Error::DuplicateKey(definition.key));
            }
            if let Some(saved) = definition.saved_value.clone() {
                overrides.push((definition.key.clone(), saved));
            }
            settings.push(Setting::new(definition, value));
        }

        Ok(Self {
            name: None,
            settings,
            index,
            overrides,
            plan: None,
            state: TableState::Unresolved,
        })
    }

    /// Set the preset name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build a table from a preset document, tolerating broken formulas.
    ///
    /// Formulas that fail to compile are logged and reported again as
    /// diagnostics by every resolve.
    pub fn from_document(document: PresetDocument) -> Result<Self> {
        let name = document.name.clone();
        let table = Self::new(document.into_definitions()?)?;

        let compiler = ExpressionCompiler::global();
        for setting in &table.settings {
            for (role, source) in setting.definition.expressions() {
                if let Err(e) = compiler.compile(source) {
                    tracing::warn!(key = setting.key(), role, error = %e, "formula failed to compile");
                }
            }
        }

        Ok(match name {
            Some(name) => table.with_name(name),
            None => table,
        })
    }

    /// Build a table from a preset document, rejecting any formula that
    /// fails to compile or references a key missing from the document.
    pub fn from_document_strict(document: PresetDocument) -> Result<Self> {
        let name = document.name.clone();
        let table = Self::new(document.into_definitions()?)?;

        let compiler = ExpressionCompiler::global();
        for setting in &table.settings {
            for (_, source) in setting.definition.expressions() {
                let compiled = compiler.compile(source).map_err(|e| Error::Compile {
                    key: setting.key().to_string(),
                    source_text: e.source_text.clone(),
                    message: e.error.to_string(),
                })?;
                if let Some(missing) = compiled
                    .references()
                    .iter()
                    .find(|r| !table.index.contains_key(r.as_str()))
                {
                    return Err(Error::UnknownKey(missing.clone()));
                }
            }
        }

        Ok(match name {
            Some(name) => table.with_name(name),
            None => table,
        })
    }

    /// Parse a JSON preset document and build a lenient table
    pub fn from_json(json: &str) -> Result<Self> {
        let document: PresetDocument =
            serde_json::from_str(json).map_err(|e| Error::Document(e.to_string()))?;
        Self::from_document(document)
    }

    /// Preset name, if the document had one
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn state(&self) -> TableState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.settings.iter().map(Setting::key)
    }

    /// Settings in declaration order
    pub fn settings(&self) -> impl Iterator<Item = &Setting> {
        self.settings.iter()
    }

    pub fn setting(&self, key: &str) -> Option<&Setting> {
        self.index.get(key).map(|&slot| &self.settings[slot])
    }

    /// Committed value of a key
    pub fn get_value(&self, key: &str) -> Option<&SettingValue> {
        self.setting(key).map(Setting::value)
    }

    /// Mismatch flag of a key
    pub fn get_mismatch(&self, key: &str) -> Option<bool> {
        self.setting(key).map(Setting::is_mismatched)
    }

    /// Enabled flag of a key
    pub fn is_enabled(&self, key: &str) -> Option<bool> {
        self.setting(key).map(Setting::is_enabled)
    }

    /// Keys whose committed value differs from their formula value
    pub fn mismatched_keys(&self) -> Vec<&str> {
        self.settings
            .iter()
            .filter(|s| s.mismatch)
            .map(Setting::key)
            .collect()
    }

    /// Queue an override for the next resolve.
    ///
    /// Unknown keys are accepted here and reported by the resolve that
    /// consumes them.
    pub fn set_override(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.overrides.push((key.into(), value.into()));
    }

    /// Overrides waiting for the next resolve, in queue order
    pub fn pending_overrides(&self) -> &[(String, SettingValue)] {
        &self.overrides
    }

    pub fn clear_overrides(&mut self) {
        self.overrides.clear();
    }

    /// Plan for `order`, built on first use and reused while the order
    /// stays the same
    pub(crate) fn plan(&mut self, order: EvaluationOrder) -> Arc<EvaluationPlan> {
        match &self.plan {
            Some(plan) if plan.order_kind() == order => Arc::clone(plan),
            _ => {
                let plan = Arc::new(EvaluationPlan::build(
                    &self.settings,
                    &self.index,
                    order,
                    ExpressionCompiler::global(),
                ));
                self.plan = Some(Arc::clone(&plan));
                plan
            }
        }
    }

    /// Whether two tables share the same compiled plan
    pub fn shares_plan_with(&self, other: &SettingsTable) -> bool {
        match (&self.plan, &other.plan) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
