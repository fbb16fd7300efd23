use crate::ids::RequestId;
use crate::router::ParamVec;
use crate::security::AuthInfo;
use async_trait::async_trait;
use http::Method;
use serde::Serialize;
use serde_json::{json, Map, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Maximum inline response headers before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Response header storage. Names are lower-case.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Request handed to a handler once routing, validation and authentication
/// have succeeded.
///
/// Query, header and cookie values are the coerced values that passed the
/// operation's context schema, so an `integer` query parameter arrives as a
/// JSON number.
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    pub request_id: RequestId,
    pub method: Method,
    /// Request path without the query string.
    pub path: String,
    pub operation_id: Option<String>,
    /// Raw (percent-decoded) path parameters as matched by the router.
    pub path_params: ParamVec,
    /// Coerced path parameters, as validated.
    pub path_values: Map<String, Value>,
    pub query: Map<String, Value>,
    /// Lower-cased header names.
    pub headers: Map<String, Value>,
    pub cookies: Map<String, Value>,
    pub body: Option<Value>,
    /// Merged info of the winning security requirement, `None` for public
    /// operations.
    pub auth_info: Option<AuthInfo>,
}

impl HandlerRequest {
    /// Get a path parameter by name.
    ///
    /// Last write wins when a template repeats a name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&Value> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    #[inline]
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&Value> {
        self.cookies.get(name)
    }
}

/// What a handler returns: status, headers and a JSON body.
#[derive(Debug, Clone, Serialize)]
pub struct HandlerResponse {
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with a `content-type: application/json` header.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "application/json".to_string()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// `200` with a JSON body.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    /// `{ "message": ... }` body, the shape every pipeline failure uses.
    #[must_use]
    pub fn message(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "message": message }))
    }

    /// Plain-text response; the body is a JSON string.
    #[must_use]
    pub fn text(status: u16, text: impl Into<String>) -> Self {
        let mut headers = HeaderVec::new();
        headers.push((Arc::from("content-type"), "text/plain".to_string()));
        Self {
            status,
            headers,
            body: Value::String(text.into()),
        }
    }

    /// `204` without content.
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: 204,
            headers: HeaderVec::new(),
            body: Value::Null,
        }
    }

    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header.
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers
            .push((Arc::from(name.to_ascii_lowercase().as_str()), value));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value.into());
        self
    }

    /// Declared content type, `application/json` when none was set.
    #[must_use]
    pub fn content_type(&self) -> &str {
        self.get_header("content-type").unwrap_or("application/json")
    }
}

/// A request handler bound to one operation.
///
/// Any `Fn(HandlerRequest) -> impl Future<Output = HandlerResponse>` is a
/// handler, so async closures and `async fn`s can be registered directly.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, req: HandlerRequest) -> HandlerResponse;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(HandlerRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResponse> + Send + 'static,
{
    async fn handle(&self, req: HandlerRequest) -> HandlerResponse {
        (self)(req).await
    }
}

/// Handlers keyed by path template and lower-case method, mirroring the
/// `paths` object of the document they serve.
#[derive(Clone, Default)]
pub struct HandlerMap {
    handlers: BTreeMap<String, BTreeMap<String, Arc<dyn Handler>>>,
}

impl fmt::Debug for HandlerMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.handlers
                    .iter()
                    .map(|(path, methods)| (path, methods.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}

impl HandlerMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    #[must_use]
    pub fn route(mut self, method: Method, path: &str, handler: impl Handler + 'static) -> Self {
        self.insert(method, path, Arc::new(handler));
        self
    }

    /// Register `handler` for `method path`, replacing any previous one.
    pub fn insert(&mut self, method: Method, path: &str, handler: Arc<dyn Handler>) {
        let method = method.as_str().to_ascii_lowercase();
        let replaced = self
            .handlers
            .entry(path.to_string())
            .or_default()
            .insert(method.clone(), handler);
        if replaced.is_some() {
            warn!(path = %path, method = %method, "Replaced existing handler");
        } else {
            info!(path = %path, method = %method, "Handler registered");
        }
    }

    #[must_use]
    pub fn get(&self, path: &str, method: &Method) -> Option<&Arc<dyn Handler>> {
        self.handlers
            .get(path)?
            .get(&method.as_str().to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `{ <path>: { <method>: true } }`, checked against the document's
    /// resolver-shape schema at startup.
    #[must_use]
    pub fn shape(&self) -> Value {
        let paths: Map<String, Value> = self
            .handlers
            .iter()
            .map(|(path, methods)| {
                let methods: Map<String, Value> = methods
                    .keys()
                    .map(|m| (m.clone(), Value::Bool(true)))
                    .collect();
                (path.clone(), Value::Object(methods))
            })
            .collect();
        Value::Object(paths)
    }
}
