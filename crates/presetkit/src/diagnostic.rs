//! Per-key diagnostics produced by resolution
//!
//! A failing formula never aborts a resolve: it becomes a [`Diagnostic`] tied
//! to the setting's key and the rest of the table resolves normally.

use serde::Serialize;
use std::fmt;

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// Which of a setting's formulas a diagnostic concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionRole {
    Value,
    Minimum,
    Maximum,
    Enabled,
}

impl ExpressionRole {
    /// Field name used in preset documents
    pub fn field_name(&self) -> &'static str {
        match self {
            ExpressionRole::Value => "value",
            ExpressionRole::Minimum => "minimum_value",
            ExpressionRole::Maximum => "maximum_value",
            ExpressionRole::Enabled => "enabled",
        }
    }
}

impl fmt::Display for ExpressionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Diagnostic kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Formula text failed to compile
    Compile,
    /// Formula references a key that is not in the table
    UnknownReference,
    /// Formula failed at runtime
    Evaluation,
    /// Minimum evaluated above maximum
    ClampConflict,
    /// Result type differs from the declared type
    TypeCoercion,
    /// Override names a key that is not in the table
    UnknownOverride,
    /// Setting is part of a reference cycle
    Cycle,
}

/// One problem found while resolving a table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    /// Setting key (or override key) the diagnostic concerns
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ExpressionRole>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(
        kind: DiagnosticKind,
        key: impl Into<String>,
        role: Option<ExpressionRole>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            key: key.into(),
            role,
            message: message.into(),
        }
    }

    pub fn warning(
        kind: DiagnosticKind,
        key: impl Into<String>,
        role: Option<ExpressionRole>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            key: key.into(),
            role,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.role {
            Some(role) => write!(f, "{}: {} ({}): {}", severity, self.key, role, self.message),
            None => write!(f, "{}: {}: {}", severity, self.key, self.message),
        }
    }
}

/// Diagnostics of one resolve, in the order they were raised
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DiagnosticList {
    items: Vec<Diagnostic>,
}

impl DiagnosticList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: DiagnosticList) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Error-severity diagnostics
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Error)
    }

    /// Warning-severity diagnostics
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.severity == Severity::Warning)
    }

    /// Diagnostics concerning one key
    pub fn for_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.items.iter().filter(move |d| d.key == key)
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    /// Whether any diagnostic of `kind` was raised for `key`
    pub fn contains(&self, key: &str, kind: DiagnosticKind) -> bool {
        self.items.iter().any(|d| d.key == key && d.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl IntoIterator for DiagnosticList {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiagnosticList {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl FromIterator<Diagnostic> for DiagnosticList {
    fn from_iter<I: IntoIterator<Item = Diagnostic>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DiagnosticList {
        [
            Diagnostic::error(
                DiagnosticKind::Compile,
                "infill_sparse_density",
                Some(ExpressionRole::Value),
                "Parse error: Unexpected end of formula",
            ),
            Diagnostic::warning(
                DiagnosticKind::ClampConflict,
                "layer_height",
                None,
                "minimum 0.3 exceeds maximum 0.2",
            ),
            Diagnostic::warning(
                DiagnosticKind::TypeCoercion,
                "infill_sparse_density",
                Some(ExpressionRole::Value),
                "lossy conversion from float to int",
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_filters() {
        let list = sample();
        assert!(list.has_errors());
        assert_eq!(list.errors().count(), 1);
        assert_eq!(list.warnings().count(), 2);
        assert_eq!(list.for_key("infill_sparse_density").count(), 2);
        assert!(list.contains("layer_height", DiagnosticKind::ClampConflict));
        assert!(!list.contains("layer_height", DiagnosticKind::Compile));
    }

    #[test]
    fn test_display() {
        let list = sample();
        let lines: Vec<String> = list.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines[0],
            "error: infill_sparse_density (value): Parse error: Unexpected end of formula"
        );
        assert_eq!(
            lines[1],
            "warning: layer_height: minimum 0.3 exceeds maximum 0.2"
        );
    }

    #[test]
    fn test_serialize() {
        let list: DiagnosticList = sample().into_iter().take(1).collect();
        let json = serde_json::to_string(&list).unwrap();
        assert_eq!(
            json,
            r#"[{"severity":"error","kind":"compile","key":"infill_sparse_density","role":"value","message":"Parse error: Unexpected end of formula"}]"#
        );
    }
}
