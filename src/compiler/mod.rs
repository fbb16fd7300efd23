//! # Compiler Module
//!
//! Turns JSON Schema documents into [`CompiledSchema`]s.
//!
//! Compilation has two phases:
//!
//! 1. **Load** ([`load_documents`]): read the root document and fetch every
//!    external document named by a `$ref`, concurrently and at most once
//!    per URI.
//! 2. **Register** ([`RegistryBuilder`]): parse the root and every schema a
//!    `$ref` points at into an immutable [`Registry`] keyed by canonical URI.
//!
//! `$ref`s stay symbolic in the compiled tree and are looked up in the
//! registry during validation. Cyclic references therefore compile to a
//! finite structure.
//!
//! ## Example
//!
//! ```rust,no_run
//! use oapi_contract::compiler::{compile, CompileOptions};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), oapi_contract::SchemaCompileError> {
//! let schema = compile(
//!     json!({ "type": "object", "required": ["id"] }).into(),
//!     &CompileOptions::default(),
//! )
//! .await?;
//! assert!(!schema.validate(&json!({})).valid);
//! # Ok(())
//! # }
//! ```

mod load;
mod registry;
pub mod uri;

pub use load::{
    load_documents, parse_document, Document, DocumentStore, LoadedDocuments, SchemaSource,
};
pub use registry::{Registry, RegistryBuilder};

use crate::error::SchemaCompileError;
use crate::runtime_config::RuntimeConfig;
use crate::schema::Schema;
use crate::validator::{self, ValidationResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Knobs for [`compile`].
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Reject values that fail a known `format`. When off, `format` is an
    /// annotation.
    pub assert_formats: bool,
    /// Allow `$ref`s to `http://` and `https://` documents.
    pub allow_remote_refs: bool,
    /// Per-request timeout for remote documents.
    pub fetch_timeout: Duration,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            assert_formats: true,
            allow_remote_refs: true,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        Self {
            assert_formats: config.assert_formats,
            allow_remote_refs: config.allow_remote_refs,
            fetch_timeout: config.fetch_timeout,
        }
    }
}

/// A root schema plus the registry its `$ref`s resolve in.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub root: Schema,
    pub registry: Arc<Registry>,
}

impl CompiledSchema {
    #[must_use]
    pub fn validate(&self, value: &Value) -> ValidationResult {
        validator::validate(&self.root, value, &self.registry)
    }
}

/// Load `source` with everything it references and compile it.
pub async fn compile(
    source: SchemaSource,
    options: &CompileOptions,
) -> Result<CompiledSchema, SchemaCompileError> {
    let loaded = load_documents(source, options).await?;
    let mut builder = RegistryBuilder::new(loaded.store, options.assert_formats);
    let root = builder.add_schema(&loaded.root, &loaded.base, "")?;
    Ok(CompiledSchema {
        root,
        registry: builder.finish(),
    })
}
