use super::load::DocumentStore;
use super::uri;
use crate::error::SchemaCompileError;
use crate::schema::{parse_schema, Schema};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Compiled schemas keyed by canonical URI.
///
/// Every `$ref` inside a compiled schema names an entry of this map, so
/// lookups during validation never fail for schemas built by
/// [`RegistryBuilder`]. The registry is immutable once built and shared
/// behind an `Arc` by every schema compiled against it.
#[derive(Debug, Default)]
pub struct Registry {
    schemas: HashMap<String, Schema>,
    documents: DocumentStore,
    assert_formats: bool,
}

impl Registry {
    #[must_use]
    pub fn get(&self, canonical: &str) -> Option<&Schema> {
        self.schemas.get(canonical)
    }

    /// Raw JSON a canonical URI points at, with the base of its document.
    #[must_use]
    pub fn resolve_value(&self, canonical: &str) -> Option<(&Value, &Url)> {
        self.documents.resolve(canonical)
    }

    /// Whether `format` keywords are asserted or only annotate.
    #[must_use]
    pub fn assert_formats(&self) -> bool {
        self.assert_formats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Builds a [`Registry`] from a set of loaded documents.
///
/// Only schemas reachable through `$ref` from something passed to
/// [`add_schema`](Self::add_schema) are parsed; the rest of a document is
/// left alone, which matters for OpenAPI files where most objects are not
/// schemas.
#[derive(Debug)]
pub struct RegistryBuilder {
    registry: Registry,
    pending: Vec<String>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new(documents: DocumentStore, assert_formats: bool) -> Self {
        Self {
            registry: Registry {
                schemas: HashMap::new(),
                documents,
                assert_formats,
            },
            pending: Vec::new(),
        }
    }

    /// Raw JSON lookup against the documents being compiled.
    #[must_use]
    pub fn resolve_value(&self, canonical: &str) -> Option<(&Value, &Url)> {
        self.registry.documents.resolve(canonical)
    }

    /// Parse `value` (relative refs resolve against `base`) and compile
    /// everything it references.
    pub fn add_schema(
        &mut self,
        value: &Value,
        base: &Url,
        location: &str,
    ) -> Result<Schema, SchemaCompileError> {
        let mut refs = Vec::new();
        let schema = parse_schema(value, base, location, &mut refs)?;
        self.pending.extend(refs);
        self.resolve_pending()?;
        Ok(schema)
    }

    /// Register `value` under `canonical` so other schemas can `$ref` it.
    pub fn insert(
        &mut self,
        canonical: &str,
        value: &Value,
        base: &Url,
    ) -> Result<(), SchemaCompileError> {
        let (_, fragment) = uri::split(canonical);
        let schema = self.add_schema(value, base, fragment)?;
        self.registry.schemas.insert(canonical.to_string(), schema);
        Ok(())
    }

    fn resolve_pending(&mut self) -> Result<(), SchemaCompileError> {
        while let Some(canonical) = self.pending.pop() {
            if self.registry.schemas.contains_key(&canonical) {
                continue;
            }
            let (value, base) = self.registry.documents.resolve(&canonical).ok_or_else(|| {
                SchemaCompileError::UnresolvedRef {
                    reference: canonical.clone(),
                    canonical: canonical.clone(),
                }
            })?;
            let location = urlencoding::decode(uri::split(&canonical).1)
                .map(|s| s.into_owned())
                .unwrap_or_default();

            let mut refs = Vec::new();
            let schema = parse_schema(value, base, &location, &mut refs)?;
            debug!(uri = %canonical, refs = refs.len(), "Schema registered");
            // inserted before its refs are followed so cycles terminate
            self.registry.schemas.insert(canonical, schema);
            self.pending.extend(refs);
        }
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> Arc<Registry> {
        Arc::new(self.registry)
    }
}
