//! # presetkit-core
//!
//! Core data structures for presetkit setting tables.
//!
//! This crate provides the fundamental types used throughout presetkit:
//! - [`SettingType`] and [`SettingValue`] - Declared types and typed values
//! - [`SettingDefinition`] - One declared setting with its formulas and metadata
//! - [`PresetDocument`] - The document shape presets are loaded from (`serde` feature)
//!
//! ## Example
//!
//! ```rust
//! use presetkit_core::{SettingDefinition, SettingValue};
//!
//! let nozzle = SettingDefinition::float("nozzle_diameter").with_default(0.4);
//! let layer = SettingDefinition::float("layer_height")
//!     .with_value("nozzle_diameter * 0.5")
//!     .with_maximum("nozzle_diameter * 0.8");
//!
//! assert_eq!(nozzle.initial_value().unwrap(), SettingValue::Float(0.4));
//! assert!(!layer.is_constant());
//! ```

#[cfg(feature = "serde")]
pub mod document;
pub mod error;
pub mod setting;

// Re-exports for convenience
#[cfg(feature = "serde")]
pub use document::{FormulaSource, PresetDocument, ScalarValue, SettingEntry};
pub use error::{Error, Result};
pub use setting::{
    format_number, is_color_literal, validate_key, Coerced, CoercionWarning, SettingDefinition,
    SettingType, SettingValue,
};
