//! # oapi-contract
//!
//! Contract-enforced request handling driven by an
//! [OpenAPI 3.x](https://spec.openapis.org/oas/v3.1.0) document.
//!
//! ## Overview
//!
//! Given an OpenAPI document, the crate compiles per-operation JSON Schemas
//! once at startup, routes incoming requests to handlers, validates each
//! request and each handler response against those schemas, and enforces the
//! document's security requirements before a handler runs.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **[`schema`]** - the closed JSON Schema model (`true`/`false` or a node of keywords)
//! - **[`validator`]** - recursive validator accumulating every issue with its path
//! - **[`compiler`]** - loads documents (memory, file, `http(s)`), follows `$ref`s
//!   and builds a shared, cycle-safe [`compiler::Registry`]
//! - **[`spec`]** - projects an OpenAPI document into context, response and
//!   security schemas per operation, plus a resolver-shape schema
//! - **[`router`]** - matches `(method, path)` against path templates
//! - **[`security`]** - OR-of-AND requirement evaluation over pluggable resolvers
//! - **[`dispatcher`]** - handler capability and handler table
//! - **[`server`]** - request context and the pipeline tying it all together
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant T as Transport
//!     participant S as OapiService
//!     participant R as Router
//!     participant V as Validator
//!     participant A as Security
//!     participant H as Handler
//!
//!     T->>S: RequestContext
//!     S->>R: route(method, path)
//!     R-->>S: RouteMatch or 404
//!     S->>V: context schema
//!     V-->>S: issues or 400
//!     S->>A: evaluate requirements
//!     A-->>S: AuthInfo or SecurityError
//!     S->>H: HandlerRequest
//!     H-->>S: HandlerResponse
//!     S->>V: response schema
//!     V-->>S: issues or 500
//!     S-->>T: HandlerResponse
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use http::Method;
//! use oapi_contract::dispatcher::{HandlerMap, HandlerRequest, HandlerResponse};
//! use oapi_contract::server::{create_oapi, OapiConfig, RequestContext};
//! use serde_json::json;
//!
//! let handlers = HandlerMap::new().route(Method::GET, "/item", |req: HandlerRequest| async move {
//!     HandlerResponse::ok(json!({ "id": req.get_query_param("id") }))
//! });
//! let service = create_oapi(OapiConfig::new("openapi.yaml", handlers)).await?;
//!
//! let response = service.handle(RequestContext::new("GET", "/item?id=abc")?).await;
//! assert_eq!(response.status, 400);
//! ```
//!
//! ## Runtime Considerations
//!
//! Everything built at startup is immutable and shared read-only, so one
//! service can serve any number of concurrent requests. Schema validation
//! is synchronous; the only suspension points are remote `$ref` fetches
//! during compilation and the security resolvers and handlers themselves.
//! There are no timeouts around resolvers or handlers.

pub mod cli;
pub mod compiler;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod pointer;
pub mod router;
pub mod runtime_config;
pub mod schema;
pub mod security;
pub mod server;
pub mod spec;
pub mod validator;

pub use compiler::{compile, CompileOptions, CompiledSchema, SchemaSource};
pub use error::{ConfigurationError, OapiError, SchemaCompileError, SecurityError};
pub use server::{create_oapi, OapiConfig, OapiService, RequestContext};
pub use spec::{load_api, ApiSchema};
pub use validator::{validate, ValidationIssue, ValidationResult};
