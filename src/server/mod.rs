//! # Server Module
//!
//! The request pipeline: everything between an inbound [`RequestContext`]
//! and the [`HandlerResponse`](crate::dispatcher::HandlerResponse) sent back.
//!
//! ## Pipeline
//!
//! 1. **Route**: no match is a `404` with `{"message": "Path GET /x not found"}`.
//! 2. **Validate** `{path, query, headers, cookies, body}` (values coerced to
//!    their declared types first): failure is a `400` carrying every issue.
//! 3. **Authenticate** with the operation's security requirements: a
//!    resolver's [`SecurityError`](crate::SecurityError) becomes the response
//!    as is.
//! 4. **Invoke** the handler with the validated values and auth info.
//! 5. **Validate the response** against the declared status, content type
//!    and body schema: failure is a `500` carrying every issue.
//!
//! ## Example
//!
//! ```rust,ignore
//! let service = create_oapi(OapiConfig::new("openapi.yaml", handlers)).await?;
//! let ctx = RequestContext::new("GET", "/user/3?verbose=true")?;
//! let response = service.handle(ctx).await;
//! ```

pub mod request;
pub mod service;

pub use request::{build_context, coerce_param, parse_cookies, parse_query, RequestContext};
pub use service::{create_oapi, OapiConfig, OapiService, ServiceOptions};
