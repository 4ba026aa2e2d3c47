//! Prelude module - common imports for presetkit users
//!
//! ```rust
//! use presetkit::prelude::*;
//! ```

pub use crate::{
    // Diagnostics
    Diagnostic,
    DiagnosticKind,
    DiagnosticList,
    // Resolution
    EvaluationOrder,
    // Error types
    Error,
    ExpressionRole,
    PresetDocument,
    ResolveOptions,
    Resolver,
    Result,
    Severity,
    // Settings
    SettingDefinition,
    SettingType,
    SettingValue,
    // Main types
    SettingsTable,
    // Extension traits
    TableResolutionExt,
    TableState,
};
