//! Canonical reference URIs.
//!
//! A canonical URI is an absolute URL whose fragment, if any, is a JSON
//! pointer into the document. The root of a document has no fragment, so
//! `doc.json` and `doc.json#` collapse to the same registry key.

use crate::error::SchemaCompileError;
use std::path::Path;
use url::Url;

/// Base URI given to documents supplied in memory without an `$id`.
pub const MEMORY_ROOT: &str = "memory:///root.json";

#[must_use]
#[allow(clippy::expect_used)]
pub fn memory_root() -> Url {
    Url::parse(MEMORY_ROOT).expect("MEMORY_ROOT is a valid URL")
}

/// Resolve `reference` against `base` and return the registry key.
pub fn canonicalize(base: &Url, reference: &str) -> Result<String, SchemaCompileError> {
    let url = base
        .join(reference)
        .map_err(|e| SchemaCompileError::InvalidUri {
            uri: reference.to_string(),
            message: e.to_string(),
        })?;
    Ok(canonical(url))
}

/// Registry key for an already absolute URL.
#[must_use]
pub fn canonical(mut url: Url) -> String {
    if matches!(url.fragment(), Some("")) {
        url.set_fragment(None);
    }
    url.to_string()
}

/// Split a canonical URI into its document part and its fragment.
#[must_use]
pub fn split(canonical: &str) -> (&str, &str) {
    match canonical.split_once('#') {
        Some((doc, fragment)) => (doc, fragment),
        None => (canonical, ""),
    }
}

/// Turn a user-supplied location (URL or filesystem path) into a URL.
pub fn from_location(location: &str) -> Result<Url, SchemaCompileError> {
    if let Ok(url) = Url::parse(location) {
        // a bare Windows drive letter parses as a one-letter scheme
        if url.scheme().len() > 1 {
            return Ok(url);
        }
    }
    let path = Path::new(location);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|source| SchemaCompileError::ReadError {
                path: path.to_path_buf(),
                source,
            })?
            .join(path)
    };
    Url::from_file_path(&absolute).map_err(|_| SchemaCompileError::InvalidUri {
        uri: location.to_string(),
        message: "not an absolute file path".to_string(),
    })
}
