//! Structural check of OpenAPI documents against an embedded meta-schema.

#![allow(clippy::expect_used)]

use crate::compiler::{CompiledSchema, DocumentStore, RegistryBuilder};
use crate::validator::ValidationIssue;
use once_cell::sync::Lazy;
use serde_json::Value;
use url::Url;

const OPENAPI_V3: &str = include_str!("openapi_v3.json");

static META_SCHEMA: Lazy<CompiledSchema> = Lazy::new(|| {
    let value: Value = serde_json::from_str(OPENAPI_V3).expect("embedded meta-schema is JSON");
    let url = Url::parse("memory:///openapi-v3.json").expect("meta-schema URL is valid");

    let mut store = DocumentStore::default();
    let base = store.insert(&url, value.clone());
    let mut builder = RegistryBuilder::new(store, false);
    let root = builder
        .add_schema(&value, &base, "")
        .expect("embedded meta-schema compiles");
    CompiledSchema {
        root,
        registry: builder.finish(),
    }
});

/// Validate `document` against the OpenAPI 3.x meta-schema.
///
/// Returns every structural problem found; an empty list means the
/// document can be handed to [`to_schema`](super::to_schema).
#[must_use]
pub fn lint(document: &Value) -> Vec<ValidationIssue> {
    META_SCHEMA.validate(document).errors
}
