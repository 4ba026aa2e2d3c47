//! Error types for presetkit-core

use crate::setting::SettingType;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or reading settings tables
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Setting key is not a valid identifier
    #[error("Invalid setting key: {0:?}")]
    InvalidKey(String),

    /// Two settings declared with the same key
    #[error("Duplicate setting key: {0}")]
    DuplicateKey(String),

    /// Lookup of a key that is not part of the table
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),

    /// Type name in a document is not one of the supported types
    #[error("Unknown setting type: {0}")]
    UnknownType(String),

    /// Default value cannot be used for the declared type
    #[error("Invalid default for {key}: {message}")]
    InvalidDefault { key: String, message: String },

    /// Value cannot be coerced to the declared type
    #[error("Cannot coerce {actual} to {expected}")]
    Coercion {
        expected: SettingType,
        actual: String,
    },

    /// Formula failed to compile (strict loading only)
    #[error("Formula for {key} failed to compile: {message} (source: {source_text:?})")]
    Compile {
        key: String,
        source_text: String,
        message: String,
    },

    /// Malformed preset document
    #[error("Invalid preset document: {0}")]
    Document(String),
}
