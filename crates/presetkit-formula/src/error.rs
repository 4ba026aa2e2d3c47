//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula compilation or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula exceeds the size or nesting limits
    #[error("Formula too large: {0}")]
    TooLarge(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Function outside the built-in allow-list
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference to a name that has no binding
    #[error("Unknown reference: {0}")]
    UnknownReference(String),
}

/// A formula that failed to compile, with the offending source text
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error} (source: {source_text:?})")]
pub struct CompileError {
    pub source_text: String,
    pub error: FormulaError,
}

impl CompileError {
    pub fn new(source_text: impl Into<String>, error: FormulaError) -> Self {
        Self {
            source_text: source_text.into(),
            error,
        }
    }
}
