use super::build::to_schema;
use super::meta::lint;
use super::types::ApiSchema;
use crate::compiler::{load_documents, CompileOptions, SchemaSource};
use crate::error::{ConfigurationError, OapiError, SchemaCompileError};
use crate::validator::{log_issues, ValidationIssue};

/// Load an OpenAPI document, check it against the meta-schema and derive
/// its validation schemas.
///
/// # Errors
///
/// [`SchemaCompileError`]s for unreadable documents or references,
/// [`ConfigurationError::InvalidApi`] when the document is structurally
/// invalid.
pub async fn load_api(
    source: SchemaSource,
    options: &CompileOptions,
) -> Result<ApiSchema, OapiError> {
    let loaded = load_documents(source, options).await?;

    let issues = lint(&loaded.root);
    if !issues.is_empty() {
        log_issues("api", &issues);
        return Err(ConfigurationError::InvalidApi { issues }.into());
    }

    to_schema(loaded, options.assert_formats)
}

/// Load a document and return its meta-schema issues without deriving
/// anything.
pub async fn lint_api(
    source: SchemaSource,
    options: &CompileOptions,
) -> Result<Vec<ValidationIssue>, SchemaCompileError> {
    let loaded = load_documents(source, options).await?;
    Ok(lint(&loaded.root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn invalid_documents_are_rejected_before_deriving() {
        let doc = json!({ "openapi": "3.0.0", "paths": {} });
        let err = load_api(doc.into(), &CompileOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].path, "/info");
    }

    #[tokio::test]
    async fn lint_api_reports_without_failing() {
        let doc = json!({ "openapi": "3.1.0", "info": { "title": "t", "version": "1" } });
        let issues = lint_api(doc.into(), &CompileOptions::default())
            .await
            .unwrap();
        assert!(issues.is_empty());
    }
}
