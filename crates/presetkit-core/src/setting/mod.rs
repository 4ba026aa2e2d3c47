//! Setting-related types
//!
//! This module contains:
//! - [`SettingType`] - The declared type of a setting
//! - [`SettingValue`] - A typed value and its coercion rules
//! - [`SettingDefinition`] - A setting as declared by a preset document

mod definition;
mod kind;
mod value;

pub use definition::{validate_key, SettingDefinition};
pub use kind::SettingType;
pub use value::{format_number, is_color_literal, Coerced, CoercionWarning, SettingValue};
