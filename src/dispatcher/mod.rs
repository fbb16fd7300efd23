//! # Dispatcher Module
//!
//! Handler capability and the per-operation handler table.
//!
//! A [`Handler`] receives a [`HandlerRequest`] whose context has already been
//! routed, validated and authenticated, and returns a [`HandlerResponse`].
//! Handlers are registered in a [`HandlerMap`] keyed by path template and
//! method exactly as they appear in the OpenAPI document:
//!
//! ```rust,ignore
//! use oapi_contract::dispatcher::{HandlerMap, HandlerRequest, HandlerResponse};
//! use http::Method;
//!
//! let handlers = HandlerMap::new().route(Method::GET, "/user/{id}", |req: HandlerRequest| async move {
//!     HandlerResponse::ok(serde_json::json!({ "id": req.get_path_param("id") }))
//! });
//! ```
//!
//! The map's [`shape`](HandlerMap::shape) is checked against the document at
//! startup, so a missing or extra handler fails service construction rather
//! than the first request.

mod core;

pub use self::core::{
    Handler, HandlerMap, HandlerRequest, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS,
};
