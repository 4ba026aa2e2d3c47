//! Table resolution
//!
//! One resolve sweeps the table's settings in plan order. For each key it
//! evaluates the value and bound formulas, picks the override or the formula
//! value, clamps it (maximum first, then minimum), commits it to the table
//! and to the live context, and recomputes the mismatch flag. A key whose
//! formulas fail keeps its value and produces diagnostics; the sweep goes on.
//!
//! # Example
//!
//! ```rust
//! use presetkit::prelude::*;
//!
//! let mut table = SettingsTable::new(vec![
//!     SettingDefinition::float("nozzle_diameter").with_default(0.4),
//!     SettingDefinition::float("layer_height")
//!         .with_value("nozzle_diameter * 0.5")
//!         .with_maximum("nozzle_diameter * 0.8"),
//! ])
//! .unwrap();
//!
//! let diagnostics = table.resolve();
//! assert!(diagnostics.is_empty());
//! assert_eq!(table.get_value("layer_height"), Some(&SettingValue::Float(0.2)));
//!
//! table.set_override("layer_height", 0.3);
//! table.resolve();
//! assert_eq!(table.get_value("layer_height"), Some(&SettingValue::Float(0.3)));
//! assert_eq!(table.get_mismatch("layer_height"), Some(true));
//! ```

use crate::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticList, ExpressionRole};
use crate::plan::{EvaluationPlan, PlanEntry, PlanError, PlanExpression};
use crate::table::{Setting, SettingsTable, TableState};
use ahash::AHashMap;
use presetkit_core::{
    format_number, CoercionWarning, SettingDefinition, SettingType, SettingValue,
};
use presetkit_formula::{EvaluationContext, FormulaError, Value};

/// Order in which a resolve visits settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationOrder {
    /// Declaration order; a formula reading a later key sees its value from
    /// before the sweep
    #[default]
    Declared,
    /// Every key after the keys its formulas read; cycles go last
    Dependency,
}

/// Options for resolving a table
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Visiting order (default: declared)
    pub order: EvaluationOrder,
    /// Maximum sweeps; above 1 the sweep repeats until values settle (default: 1)
    pub max_passes: usize,
    /// Numeric tolerance for mismatch detection (default: 1e-6)
    pub mismatch_epsilon: f64,
    /// Numeric tolerance for deciding that values settled (default: 1e-9)
    pub convergence_epsilon: f64,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            order: EvaluationOrder::Declared,
            max_passes: 1,
            mismatch_epsilon: 1e-6,
            convergence_epsilon: 1e-9,
        }
    }
}

impl ResolveOptions {
    /// Dependency order, iterating up to `max_passes` sweeps
    pub fn dependency_ordered(max_passes: usize) -> Self {
        Self {
            order: EvaluationOrder::Dependency,
            max_passes,
            ..Self::default()
        }
    }
}

/// Extension trait adding resolution to [`SettingsTable`]
pub trait TableResolutionExt {
    /// Resolve with the queued overrides and default options
    fn resolve(&mut self) -> DiagnosticList;

    /// Resolve with the queued overrides followed by `overrides`
    fn resolve_with<I, K, V>(&mut self, overrides: I) -> DiagnosticList
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>;

    /// Resolve with custom options
    fn resolve_with_options<I, K, V>(
        &mut self,
        overrides: I,
        options: &ResolveOptions,
    ) -> DiagnosticList
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>;

    /// Discard queued overrides and recompute every formula value
    fn reset(&mut self) -> DiagnosticList;
}

impl TableResolutionExt for SettingsTable {
    fn resolve(&mut self) -> DiagnosticList {
        Resolver::default().resolve(self, Vec::new())
    }

    fn resolve_with<I, K, V>(&mut self, overrides: I) -> DiagnosticList
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>,
    {
        Resolver::default().resolve(self, collect_overrides(overrides))
    }

    fn resolve_with_options<I, K, V>(
        &mut self,
        overrides: I,
        options: &ResolveOptions,
    ) -> DiagnosticList
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>,
    {
        Resolver::new(options.clone()).resolve(self, collect_overrides(overrides))
    }

    fn reset(&mut self) -> DiagnosticList {
        Resolver::default().reset(self)
    }
}

fn collect_overrides<I, K, V>(overrides: I) -> Vec<(String, SettingValue)>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<SettingValue>,
{
    overrides
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Resolve a table with default options
pub fn resolve(table: &mut SettingsTable, overrides: Vec<(String, SettingValue)>) -> DiagnosticList {
    Resolver::default().resolve(table, overrides)
}

/// Equivalent to resolving with no overrides at all
pub fn reset(table: &mut SettingsTable) -> DiagnosticList {
    Resolver::default().reset(table)
}

/// Runs resolution passes over tables
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    options: ResolveOptions,
}

impl Resolver {
    pub fn new(options: ResolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve `table` in place.
    ///
    /// Queued overrides are applied first, then `overrides`; the last
    /// override of a key wins. The queue is empty afterwards.
    pub fn resolve(
        &self,
        table: &mut SettingsTable,
        overrides: Vec<(String, SettingValue)>,
    ) -> DiagnosticList {
        let mut queued = std::mem::take(&mut table.overrides);
        queued.extend(overrides);
        self.run(table, queued)
    }

    /// Resolve `table` ignoring and discarding queued overrides
    pub fn reset(&self, table: &mut SettingsTable) -> DiagnosticList {
        table.overrides.clear();
        self.run(table, Vec::new())
    }

    fn run(&self, table: &mut SettingsTable, overrides: Vec<(String, SettingValue)>) -> DiagnosticList {
        let _span = tracing::debug_span!("resolve", table = table.name().unwrap_or("")).entered();

        let plan = table.plan(self.options.order);
        let mut diagnostics = DiagnosticList::new();

        for &slot in plan.cyclic() {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::Cycle,
                table.settings[slot].key(),
                None,
                "setting is part of a reference cycle",
            ));
        }

        let overrides = prepare_overrides(table, overrides, &mut diagnostics);

        let max_passes = self.options.max_passes.max(1);
        let mut passes = 0;
        let mut last_sweep = DiagnosticList::new();
        while passes < max_passes {
            passes += 1;
            let before: Vec<SettingValue> = table.settings.iter().map(|s| s.value.clone()).collect();
            last_sweep = self.sweep(table, &plan, &overrides);

            let settled = table
                .settings
                .iter()
                .zip(&before)
                .all(|(s, old)| !s.value.differs_from(old, self.options.convergence_epsilon));
            if settled {
                break;
            }
        }
        diagnostics.extend(last_sweep);

        table.state = TableState::Resolved;
        tracing::debug!(
            keys = table.len(),
            passes,
            errors = diagnostics.errors().count(),
            warnings = diagnostics.warnings().count(),
            "resolve complete"
        );

        diagnostics
    }

    /// One pass over the table in plan order
    fn sweep(
        &self,
        table: &mut SettingsTable,
        plan: &EvaluationPlan,
        overrides: &AHashMap<usize, SettingValue>,
    ) -> DiagnosticList {
        let mut diagnostics = DiagnosticList::new();
        let mut ctx = EvaluationContext::new();
        for setting in &table.settings {
            ctx.set(setting.key(), setting.value());
        }

        for &slot in plan.order() {
            let outcome = self.resolve_slot(
                &table.settings[slot],
                &plan.entries[slot],
                overrides.get(&slot),
                &mut ctx,
                &mut diagnostics,
            );

            let setting = &mut table.settings[slot];
            setting.mismatch = outcome.mismatch;
            if let Some(value) = outcome.value {
                setting.value = value;
            }
            if let Some(enabled) = outcome.enabled {
                setting.enabled = enabled;
            }
        }

        diagnostics
    }

    fn resolve_slot(
        &self,
        setting: &Setting,
        entry: &PlanEntry,
        override_value: Option<&SettingValue>,
        ctx: &mut EvaluationContext,
        diagnostics: &mut DiagnosticList,
    ) -> SlotOutcome {
        let def = setting.definition();

        // Value and bounds
        let formula = entry
            .value
            .as_ref()
            .map(|expr| evaluate_as(expr, ctx, def, ExpressionRole::Value, diagnostics));
        let min = self.bound(entry.minimum.as_ref(), def, ExpressionRole::Minimum, ctx, diagnostics);
        let max = self.bound(entry.maximum.as_ref(), def, ExpressionRole::Maximum, ctx, diagnostics);

        let mut outcome = SlotOutcome::default();
        match (formula, min, max) {
            (Some(None), _, _) | (_, Err(()), _) | (_, _, Err(())) => {
                tracing::trace!(key = %def.key, "formula failed, value kept");
            }
            (formula, Ok(min), Ok(max)) => {
                let formula = formula.flatten();

                // Override beats formula beats stored value
                let candidate = match override_value {
                    Some(value) => value.clone(),
                    None => formula.clone().unwrap_or_else(|| setting.value().clone()),
                };

                let (min, max) = effective_bounds(def.setting_type, min, max);
                if let (Some(lo), Some(hi)) = (min, max) {
                    if lo > hi {
                        diagnostics.push(Diagnostic::warning(
                            DiagnosticKind::ClampConflict,
                            &def.key,
                            None,
                            format!(
                                "minimum {} exceeds maximum {}",
                                format_number(lo),
                                format_number(hi)
                            ),
                        ));
                    }
                }
                let candidate = clamp(candidate, def.setting_type, min, max);

                outcome.mismatch = formula
                    .as_ref()
                    .map_or(false, |f| f.differs_from(&candidate, self.options.mismatch_epsilon));
                tracing::trace!(key = %def.key, value = %candidate, mismatch = outcome.mismatch);
                ctx.set(def.key.clone(), &candidate);
                outcome.value = Some(candidate);
            }
        }

        // Runs after the write so it sees the new value
        if let Some(expr) = &entry.enabled {
            outcome.enabled = evaluate_raw(expr, ctx, &def.key, ExpressionRole::Enabled, diagnostics)
                .map(|v| v.is_truthy());
        }

        outcome
    }

    /// Evaluate one bound; `Ok(None)` when absent or not applicable
    fn bound(
        &self,
        expr: Option<&PlanExpression>,
        def: &SettingDefinition,
        role: ExpressionRole,
        ctx: &EvaluationContext,
        diagnostics: &mut DiagnosticList,
    ) -> Result<Option<f64>, ()> {
        let Some(expr) = expr else {
            return Ok(None);
        };

        if !def.setting_type.is_numeric() {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::TypeCoercion,
                &def.key,
                Some(role),
                format!("bounds do not apply to {} settings", def.setting_type),
            ));
            return Ok(None);
        }

        evaluate_bound(expr, ctx, &def.key, role, diagnostics)
            .map(Some)
            .ok_or(())
    }
}

/// What resolving one slot changes
#[derive(Debug, Default)]
struct SlotOutcome {
    /// New committed value; `None` keeps the stored value
    value: Option<SettingValue>,
    mismatch: bool,
    /// New enabled flag; `None` keeps the previous flag
    enabled: Option<bool>,
}

/// Map override keys to slots, coerce values to the declared types, and keep
/// the last override per key
fn prepare_overrides(
    table: &SettingsTable,
    overrides: Vec<(String, SettingValue)>,
    diagnostics: &mut DiagnosticList,
) -> AHashMap<usize, SettingValue> {
    let mut prepared = AHashMap::new();

    for (key, value) in overrides {
        let Some(&slot) = table.index.get(&key) else {
            diagnostics.push(Diagnostic::warning(
                DiagnosticKind::UnknownOverride,
                &key,
                None,
                "override names a key that is not in the table",
            ));
            continue;
        };

        let def = table.settings[slot].definition();
        match value.coerce(def.setting_type, &def.options) {
            Ok(coerced) => {
                for warning in &coerced.warnings {
                    diagnostics.push(coercion_warning(&key, None, warning));
                }
                prepared.insert(slot, coerced.value);
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    DiagnosticKind::TypeCoercion,
                    &key,
                    None,
                    format!("override rejected: {}", e),
                ));
            }
        }
    }

    prepared
}

fn coercion_warning(key: &str, role: Option<ExpressionRole>, warning: &CoercionWarning) -> Diagnostic {
    Diagnostic::warning(DiagnosticKind::TypeCoercion, key, role, warning.to_string())
}

/// Evaluate a plan expression to a formula value, or record why it failed
fn evaluate_raw(
    expr: &PlanExpression,
    ctx: &EvaluationContext,
    key: &str,
    role: ExpressionRole,
    diagnostics: &mut DiagnosticList,
) -> Option<Value> {
    let compiled = match expr {
        Ok(compiled) => compiled,
        Err(PlanError::Compile(e)) => {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::Compile,
                key,
                Some(role),
                e.to_string(),
            ));
            return None;
        }
        Err(PlanError::UnknownReference(name)) => {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::UnknownReference,
                key,
                Some(role),
                format!("'{}' is not a setting of this table", name),
            ));
            return None;
        }
    };

    match compiled.evaluate(ctx) {
        Ok(value) => Some(value),
        Err(e) => {
            let kind = match e {
                FormulaError::UnknownReference(_) => DiagnosticKind::UnknownReference,
                _ => DiagnosticKind::Evaluation,
            };
            diagnostics.push(Diagnostic::error(kind, key, Some(role), e.to_string()));
            None
        }
    }
}

/// Evaluate and coerce to the setting's declared type
fn evaluate_as(
    expr: &PlanExpression,
    ctx: &EvaluationContext,
    def: &SettingDefinition,
    role: ExpressionRole,
    diagnostics: &mut DiagnosticList,
) -> Option<SettingValue> {
    let value = evaluate_raw(expr, ctx, &def.key, role, diagnostics)?;
    if let Value::Number(n) = &value {
        if !n.is_finite() {
            diagnostics.push(non_finite(&def.key, role));
            return None;
        }
    }

    let Some(raw) = value.to_setting_value() else {
        diagnostics.push(Diagnostic::error(
            DiagnosticKind::TypeCoercion,
            &def.key,
            Some(role),
            format!("{} result cannot be stored in a {} setting", value.type_name(), def.setting_type),
        ));
        return None;
    };

    match raw.coerce(def.setting_type, &def.options) {
        Ok(coerced) => {
            for warning in &coerced.warnings {
                diagnostics.push(coercion_warning(&def.key, Some(role), warning));
            }
            Some(coerced.value)
        }
        Err(e) => {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::TypeCoercion,
                &def.key,
                Some(role),
                e.to_string(),
            ));
            None
        }
    }
}

fn evaluate_bound(
    expr: &PlanExpression,
    ctx: &EvaluationContext,
    key: &str,
    role: ExpressionRole,
    diagnostics: &mut DiagnosticList,
) -> Option<f64> {
    let value = evaluate_raw(expr, ctx, key, role, diagnostics)?;
    match value.as_number() {
        Some(n) if n.is_finite() => Some(n),
        Some(_) => {
            diagnostics.push(non_finite(key, role));
            None
        }
        None => {
            diagnostics.push(Diagnostic::error(
                DiagnosticKind::TypeCoercion,
                key,
                Some(role),
                format!("bound must be a number, got {}", value.type_name()),
            ));
            None
        }
    }
}

fn non_finite(key: &str, role: ExpressionRole) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::Evaluation,
        key,
        Some(role),
        "result is not a finite number",
    )
}

/// Bounds as applied to a setting type; integer settings use whole bounds
fn effective_bounds(ty: SettingType, min: Option<f64>, max: Option<f64>) -> (Option<f64>, Option<f64>) {
    match ty {
        SettingType::Int => (min.map(f64::ceil), max.map(f64::floor)),
        _ => (min, max),
    }
}

/// Clamp a numeric candidate; integer settings clamp to whole bounds
fn clamp(candidate: SettingValue, ty: SettingType, min: Option<f64>, max: Option<f64>) -> SettingValue {
    let Some(mut n) = candidate.as_f64() else {
        return candidate;
    };

    let (min, max) = effective_bounds(ty, min, max);

    let mut clamped = false;
    if let Some(hi) = max {
        if n > hi {
            n = hi;
            clamped = true;
        }
    }
    if let Some(lo) = min {
        if n < lo {
            n = lo;
            clamped = true;
        }
    }

    if !clamped {
        return candidate;
    }
    match ty {
        SettingType::Int => SettingValue::Int(n as i64),
        _ => SettingValue::Float(n),
    }
}
