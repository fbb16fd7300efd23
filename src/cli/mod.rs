//! # CLI Module
//!
//! The `oapi-check` command line.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Load and derive an API, then print its route table in matching order:
//!
//! ```bash
//! oapi-check routes openapi.yaml
//! ```
//!
//! ### `validate`
//!
//! Validate a value against a JSON Schema. Exits `1` when invalid:
//!
//! ```bash
//! oapi-check validate --schema user.schema.json --value user.json
//! ```
//!
//! ### `lint`
//!
//! Check a document against the OpenAPI 3.x meta-schema only. Exits `1`
//! when issues are found:
//!
//! ```bash
//! oapi-check lint openapi.yaml
//! ```
//!
//! The `OAPI_*` variables read by
//! [`RuntimeConfig`](crate::runtime_config::RuntimeConfig) apply.

mod commands;


pub use commands::{run, Cli, Commands};
