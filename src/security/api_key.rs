use super::{AuthInfo, SecurityOptions, SecurityResolver};
use crate::error::SecurityError;
use crate::server::RequestContext;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolver for `type: apiKey` schemes backed by a fixed set of keys.
///
/// The key is read from wherever the scheme definition says (`in: header`,
/// `query` or `cookie`, under `name`). Each accepted key maps to the auth
/// info handed to the handler.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyResolver {
    keys: HashMap<String, AuthInfo>,
}

impl ApiKeyResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `key`, producing `info` when it is presented.
    #[must_use]
    pub fn key(mut self, key: impl Into<String>, info: AuthInfo) -> Self {
        self.keys.insert(key.into(), info);
        self
    }

    fn extract<'a>(ctx: &'a RequestContext, scheme: &Value) -> Result<Option<&'a str>, SecurityError> {
        let name = scheme.get("name").and_then(Value::as_str);
        let location = scheme.get("in").and_then(Value::as_str);
        let (Some(name), Some(location)) = (name, location) else {
            return Err(SecurityError::new(
                500,
                "apiKey scheme must declare 'name' and 'in'",
            ));
        };
        Ok(match location {
            "header" => ctx.header(name),
            "query" => ctx.query.get(name).and_then(Value::as_str),
            "cookie" => ctx.cookies.get(name).map(String::as_str),
            other => {
                return Err(SecurityError::new(
                    500,
                    format!("unsupported apiKey location '{other}'"),
                ))
            }
        })
    }
}

#[async_trait]
impl SecurityResolver for ApiKeyResolver {
    async fn resolve(
        &self,
        ctx: Arc<RequestContext>,
        options: SecurityOptions,
    ) -> Result<Option<AuthInfo>, SecurityError> {
        let Some(presented) = Self::extract(&ctx, &options.scheme)? else {
            return Err(SecurityError::unauthorized("Missing API key"));
        };
        match self.keys.get(presented) {
            Some(info) => Ok(Some(info.clone())),
            None => {
                debug!(key_len = presented.len(), "Rejected API key");
                Err(SecurityError::unauthorized("Invalid API key"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(location: &str) -> SecurityOptions {
        SecurityOptions {
            scheme: json!({ "type": "apiKey", "in": location, "name": "X-Key" }),
            scopes: Vec::new(),
        }
    }

    fn resolver() -> ApiKeyResolver {
        let mut info = AuthInfo::new();
        info.insert("user".to_string(), json!("alice"));
        ApiKeyResolver::new().key("secret", info)
    }

    #[tokio::test]
    async fn accepts_known_header_key() {
        let ctx = Arc::new(RequestContext::new("GET", "/").unwrap().with_header("x-key", "secret"));
        let info = resolver().resolve(ctx, options("header")).await.unwrap().unwrap();
        assert_eq!(info["user"], json!("alice"));
    }

    #[tokio::test]
    async fn reads_query_and_cookie() {
        let ctx = Arc::new(RequestContext::new("GET", "/?X-Key=secret").unwrap());
        assert!(resolver().resolve(ctx, options("query")).await.is_ok());

        let ctx = Arc::new(
            RequestContext::new("GET", "/")
                .unwrap()
                .with_header("Cookie", "X-Key=secret"),
        );
        assert!(resolver().resolve(ctx, options("cookie")).await.is_ok());
    }

    #[tokio::test]
    async fn missing_and_wrong_keys_are_unauthorized() {
        let ctx = Arc::new(RequestContext::new("GET", "/").unwrap());
        let err = resolver().resolve(ctx, options("header")).await.unwrap_err();
        assert_eq!((err.status, err.message.as_str()), (401, "Missing API key"));

        let ctx = Arc::new(RequestContext::new("GET", "/").unwrap().with_header("x-key", "nope"));
        let err = resolver().resolve(ctx, options("header")).await.unwrap_err();
        assert_eq!((err.status, err.message.as_str()), (401, "Invalid API key"));
    }
}
