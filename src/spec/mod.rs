//! # Spec Module
//!
//! Projects an OpenAPI 3.x document into the schemas the request pipeline
//! enforces.
//!
//! For every `(path, method)` operation the deriver produces:
//!
//! - a **context schema** validating `{path, query, headers, cookies, body}`
//!   built from the operation's parameters (path-level ones merged in) and
//!   its `requestBody`
//! - a **response schema** selected by status (exact, `NXX`, `default`) and
//!   content type
//! - the effective **security requirement set**
//!
//! It also derives a **resolver-shape schema** so that a handler map or
//! security resolver map that does not match the document is rejected at
//! startup.
//!
//! Documents are checked against an embedded OpenAPI 3.x meta-schema
//! ([`lint`]) before anything is derived.

mod build;
mod load;
mod meta;
mod types;

pub use build::{to_schema, METHODS};
pub use load::{lint_api, load_api};
pub use meta::lint;
pub use types::*;
