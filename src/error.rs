//! Error taxonomy.
//!
//! Startup errors ([`SchemaCompileError`], [`ConfigurationError`]) are fatal and
//! keep a service from accepting requests. Per-request problems are either data
//! ([`ValidationIssue`](crate::validator::ValidationIssue) lists rendered into
//! 400/500 bodies) or a [`SecurityError`] raised by a scheme resolver and
//! propagated verbatim.

use crate::dispatcher::HandlerResponse;
use crate::validator::ValidationIssue;
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading documents and building the schema registry.
#[derive(Debug, Error)]
pub enum SchemaCompileError {
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("remote reference {url} refused: remote refs are disabled")]
    RemoteDisabled { url: String },

    #[error("unsupported reference scheme in {url}")]
    UnsupportedScheme { url: String },

    #[error("invalid JSON in {uri}: {source}")]
    InvalidJson {
        uri: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML in {uri}: {source}")]
    InvalidYaml {
        uri: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid URI '{uri}': {message}")]
    InvalidUri { uri: String, message: String },

    #[error("unresolved $ref '{reference}' (canonical {canonical})")]
    UnresolvedRef { reference: String, canonical: String },

    #[error("invalid schema at {location}: {message}")]
    InvalidSchema { location: String, message: String },
}

/// Errors raised when the API document or the caller's handler/resolver
/// maps do not line up.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("invalid API definition: {} issue(s)", issues.len())]
    InvalidApi { issues: Vec<ValidationIssue> },

    #[error("invalid resolvers: {} issue(s)", issues.len())]
    InvalidResolvers { issues: Vec<ValidationIssue> },

    #[error("security requirement at {location} names unknown scheme '{scheme}'")]
    UnknownSecurityScheme { location: String, scheme: String },

    #[error("routes {first} and {second} are ambiguous for method {method}")]
    AmbiguousRoute {
        method: String,
        first: String,
        second: String,
    },
}

/// Umbrella error returned by service construction.
#[derive(Debug, Error)]
pub enum OapiError {
    #[error(transparent)]
    Compile(#[from] SchemaCompileError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl OapiError {
    /// Validation issues carried by this error, if any.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            OapiError::Configuration(ConfigurationError::InvalidApi { issues })
            | OapiError::Configuration(ConfigurationError::InvalidResolvers { issues }) => issues,
            _ => &[],
        }
    }
}

/// Failure raised by a security scheme resolver.
///
/// The pipeline never wraps this: the resolver's status and body become the
/// response for the request.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SecurityError {
    pub status: u16,
    pub message: String,
    pub body: Option<Value>,
}

impl SecurityError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            body: None,
        }
    }

    /// 401 with a message body.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, message)
    }

    /// 403 with a message body.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(403, message)
    }

    /// Replace the default `{ "message": ... }` body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn into_response(self) -> HandlerResponse {
        let body = self
            .body
            .unwrap_or_else(|| json!({ "message": self.message }));
        HandlerResponse::json(self.status, body)
    }
}
