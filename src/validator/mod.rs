//! # Validator Module
//!
//! Evaluates a compiled [`Schema`] against a JSON value.
//!
//! Validation is pure and re-entrant: it reads the schema and the shared
//! [`Registry`] and allocates only the returned issue list, so one compiled
//! schema can serve any number of concurrent requests.
//!
//! Every keyword is checked independently and the results are concatenated;
//! a single pass reports every violation. Issues come out in traversal order
//! (object key order, then array index order, then combinator order), which
//! keeps error bodies and test assertions deterministic.
//!
//! ## Example
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), oapi_contract::SchemaCompileError> {
//! use oapi_contract::compiler::{compile, CompileOptions};
//! use serde_json::json;
//!
//! let schema = compile(
//!     json!({ "properties": { "id": { "type": "integer" } } }).into(),
//!     &CompileOptions::default(),
//! )
//! .await?;
//! let result = schema.validate(&json!({ "id": "abc" }));
//! assert_eq!(result.errors[0].path, "/id");
//! assert_eq!(result.errors[0].keyword, "type");
//! # Ok(())
//! # }
//! ```

pub mod format;
mod keywords;

use crate::compiler::Registry;
use crate::schema::Schema;
use serde::Serialize;
use serde_json::Value;
use tracing::error;

/// One violated constraint.
///
/// `path` is a JSON pointer into the validated value (`""` for the root).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub keyword: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        path: impl Into<String>,
        keyword: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            path: path.into(),
            keyword: keyword.into(),
            message: message.into(),
        }
    }

    /// Same issue with `prefix` prepended to its path.
    #[must_use]
    pub fn prefixed(mut self, prefix: &str) -> Self {
        self.path.insert_str(0, prefix);
        self
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "[{}] {}: {}", self.keyword, path, self.message)
    }
}

/// Outcome of validating one value. `valid == errors.is_empty()` always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationResult {
    #[must_use]
    pub fn from_errors(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    #[must_use]
    pub fn ok() -> Self {
        Self::from_errors(Vec::new())
    }
}

/// Validate `value` against `schema`, resolving `$ref`s in `registry`.
#[must_use]
pub fn validate(schema: &Schema, value: &Value, registry: &Registry) -> ValidationResult {
    let validator = keywords::Validator::new(registry);
    ValidationResult::from_errors(validator.validate(schema, value, ""))
}

/// Log a list of issues, one `error!` event per issue.
pub fn log_issues(context: &str, issues: &[ValidationIssue]) {
    error!(context = %context, count = issues.len(), "Validation failed");
    for issue in issues {
        error!(
            context = %context,
            path = %issue.path,
            keyword = %issue.keyword,
            "{}",
            issue.message
        );
    }
}

/// Render issues for a terminal.
#[must_use]
pub fn format_issues(issues: &[ValidationIssue]) -> String {
    let mut out = format!("{} issue(s) found:\n", issues.len());
    for issue in issues {
        out.push_str(&format!("  {issue}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_display_uses_root_slash() {
        let issue = ValidationIssue::new("", "type", "expected object");
        assert_eq!(issue.to_string(), "[type] /: expected object");
        let issue = issue.prefixed("/body");
        assert_eq!(issue.path, "/body");
    }

    #[test]
    fn format_issues_lists_every_issue() {
        let out = format_issues(&[
            ValidationIssue::new("/a", "required", "missing"),
            ValidationIssue::new("/b", "type", "expected integer"),
        ]);
        assert!(out.starts_with("2 issue(s) found:"));
        assert!(out.contains("[required] /a: missing"));
        assert!(out.contains("[type] /b: expected integer"));
    }
}
