//! # presetkit
//!
//! Parametric settings resolution for machine-configuration presets.
//!
//! A preset is a table of typed settings. Some are constants; others carry
//! small formulas computing their default from other settings, plus optional
//! bound and `enabled` formulas. Resolving a table recomputes every formula,
//! applies user overrides, clamps values to their bounds and flags settings
//! whose committed value differs from the formula value ("mismatch").
//!
//! ## Features
//!
//! - Formula language with arithmetic, comparisons, ternaries, lists,
//!   objects, lambdas and an allow-list of built-ins
//! - Process-wide compile cache shared by every table
//! - Per-key fault isolation: broken formulas become diagnostics
//! - Declared-order resolution, with opt-in dependency ordering and
//!   fixpoint iteration
//!
//! ## Example
//!
//! ```rust
//! use presetkit::prelude::*;
//!
//! let mut table = SettingsTable::from_json(r#"{
//!     "name": "Fine 0.4",
//!     "settings": [
//!         { "key": "nozzle_diameter", "type": "float", "default_value": 0.4 },
//!         { "key": "layer_height", "type": "float", "value": "nozzle_diameter * 0.5",
//!           "minimum_value": 0.04, "maximum_value": "nozzle_diameter * 2" }
//!     ]
//! }"#).unwrap();
//!
//! table.resolve();
//! assert_eq!(table.get_value("layer_height"), Some(&SettingValue::Float(0.2)));
//!
//! // A user edit
//! table.set_override("layer_height", 1.0);
//! table.resolve();
//! assert_eq!(table.get_value("layer_height"), Some(&SettingValue::Float(0.8)));
//! assert_eq!(table.mismatched_keys(), vec!["layer_height"]);
//!
//! // Reset to defaults
//! table.reset();
//! assert_eq!(table.get_mismatch("layer_height"), Some(false));
//! ```

pub mod diagnostic;
mod plan;
pub mod prelude;
pub mod resolver;
pub mod table;

pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticList, ExpressionRole, Severity};
pub use plan::{EvaluationPlan, PlanError};
pub use resolver::{
    reset, resolve, EvaluationOrder, ResolveOptions, Resolver, TableResolutionExt,
};
pub use table::{Setting, SettingsTable, TableState};

// Re-export core types
pub use presetkit_core::{
    Error, PresetDocument, Result, SettingDefinition, SettingEntry, SettingType, SettingValue,
};

// Re-export formula types
pub use presetkit_formula::{
    compile, CompileError, CompiledExpression, EvaluationContext, ExpressionCompiler,
    FormulaError, Value,
};
