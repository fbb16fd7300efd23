//! # Security Module
//!
//! Evaluates an operation's security requirement set against caller-supplied
//! scheme resolvers.
//!
//! ## Semantics
//!
//! A requirement set is an OR of requirements; each requirement is an AND of
//! named schemes, exactly as in OpenAPI:
//!
//! ```yaml
//! security:
//!   - apiKey: []            # either an API key...
//!   - oauth: [read]         # ...or an OAuth token carrying `read`
//!     session: []           #    together with a session cookie
//! ```
//!
//! - No requirements, or no resolvers configured: nothing to check.
//! - Every requirement is evaluated concurrently, and within a requirement
//!   every scheme resolver runs concurrently.
//! - A requirement passes when all of its resolvers return `Ok`. Their
//!   [`AuthInfo`] maps are merged in declaration order, later keys winning.
//! - The first passing requirement *in declaration order* wins, whatever
//!   order the resolvers finish in.
//! - When none pass, the first failure in declaration order is returned
//!   unchanged, so a resolver controls the status and body of the response.
//!
//! ## Resolvers
//!
//! A [`SecurityResolver`] is any async function of the request context and
//! the [`SecurityOptions`] for the scheme:
//!
//! ```rust,ignore
//! let resolvers = SecurityResolvers::new().scheme("apiKey", |ctx: Arc<RequestContext>, _opts: SecurityOptions| async move {
//!     match ctx.header("x-api-key") {
//!         Some("secret") => Ok(Some(AuthInfo::new())),
//!         _ => Err(SecurityError::unauthorized("Invalid API key")),
//!     }
//! });
//! ```
//!
//! [`ApiKeyResolver`] covers the common static-key case.

mod api_key;

pub use api_key::ApiKeyResolver;

use crate::error::SecurityError;
use crate::server::RequestContext;
use crate::spec::SecurityRequirement;
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Opaque data produced by successful resolvers and handed to the handler.
pub type AuthInfo = Map<String, Value>;

/// What a resolver is told about the scheme it is checking.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityOptions {
    /// The scheme's definition from `components.securitySchemes`.
    pub scheme: Value,
    /// Scopes the requirement lists for this scheme.
    pub scopes: Vec<String>,
}

/// Authenticates one security scheme.
///
/// `Ok(None)` passes without contributing auth info. An `Err` fails the
/// enclosing requirement.
#[async_trait]
pub trait SecurityResolver: Send + Sync {
    async fn resolve(
        &self,
        ctx: Arc<RequestContext>,
        options: SecurityOptions,
    ) -> Result<Option<AuthInfo>, SecurityError>;
}

#[async_trait]
impl<F, Fut> SecurityResolver for F
where
    F: Fn(Arc<RequestContext>, SecurityOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<AuthInfo>, SecurityError>> + Send + 'static,
{
    async fn resolve(
        &self,
        ctx: Arc<RequestContext>,
        options: SecurityOptions,
    ) -> Result<Option<AuthInfo>, SecurityError> {
        (self)(ctx, options).await
    }
}

/// Wrap a synchronous check as a resolver.
pub fn sync_resolver<F>(f: F) -> impl SecurityResolver
where
    F: Fn(&RequestContext, &SecurityOptions) -> Result<Option<AuthInfo>, SecurityError>
        + Send
        + Sync
        + 'static,
{
    move |ctx: Arc<RequestContext>, options: SecurityOptions| std::future::ready(f(&ctx, &options))
}

/// Resolvers keyed by security scheme name.
#[derive(Clone, Default)]
pub struct SecurityResolvers {
    resolvers: BTreeMap<String, Arc<dyn SecurityResolver>>,
}

impl fmt::Debug for SecurityResolvers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.resolvers.keys()).finish()
    }
}

impl SecurityResolvers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scheme(mut self, name: &str, resolver: impl SecurityResolver + 'static) -> Self {
        self.insert(name, Arc::new(resolver));
        self
    }

    pub fn insert(&mut self, name: &str, resolver: Arc<dyn SecurityResolver>) {
        if self.resolvers.insert(name.to_string(), resolver).is_some() {
            warn!(scheme = %name, "Replaced existing security resolver");
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn SecurityResolver>> {
        self.resolvers.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// `{ <scheme>: true }`, checked against the resolver-shape schema.
    #[must_use]
    pub fn shape(&self) -> Value {
        Value::Object(
            self.resolvers
                .keys()
                .map(|name| (name.clone(), Value::Bool(true)))
                .collect(),
        )
    }
}

/// Evaluate a requirement set.
///
/// Returns `Ok(None)` when there was nothing to check and `Ok(Some(info))`
/// with the winning requirement's merged info otherwise.
///
/// # Errors
///
/// The first failure in declaration order when no requirement passes. A
/// scheme without a resolver fails with status 500.
pub async fn evaluate_security(
    ctx: &Arc<RequestContext>,
    requirements: &[SecurityRequirement],
    schemes: &Map<String, Value>,
    resolvers: &SecurityResolvers,
) -> Result<Option<AuthInfo>, SecurityError> {
    if requirements.is_empty() || resolvers.is_empty() {
        debug!(
            requirements = requirements.len(),
            resolvers = resolvers.len(),
            "Security skipped"
        );
        return Ok(None);
    }

    let outcomes = join_all(
        requirements
            .iter()
            .map(|requirement| evaluate_requirement(ctx, requirement, schemes, resolvers)),
    )
    .await;

    let mut first_failure = None;
    for (index, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(info) => {
                info!(
                    requirement = index,
                    schemes = ?scheme_names(&requirements[index]),
                    "Security requirement satisfied"
                );
                return Ok(Some(info));
            }
            Err(err) => {
                debug!(requirement = index, status = err.status, error = %err, "Security requirement failed");
                first_failure.get_or_insert(err);
            }
        }
    }

    let err = first_failure.unwrap_or_else(|| SecurityError::unauthorized("Unauthorized"));
    warn!(
        status = err.status,
        error = %err,
        requirements = requirements.len(),
        "Security check failed"
    );
    Err(err)
}

async fn evaluate_requirement(
    ctx: &Arc<RequestContext>,
    requirement: &SecurityRequirement,
    schemes: &Map<String, Value>,
    resolvers: &SecurityResolvers,
) -> Result<AuthInfo, SecurityError> {
    let results = join_all(requirement.schemes.iter().map(|(name, scopes)| async move {
        let Some(resolver) = resolvers.get(name) else {
            return Err(SecurityError::new(
                500,
                format!("No resolver for security scheme '{name}'"),
            ));
        };
        let options = SecurityOptions {
            scheme: schemes.get(name).cloned().unwrap_or(Value::Null),
            scopes: scopes.clone(),
        };
        resolver.resolve(Arc::clone(ctx), options).await
    }))
    .await;

    let mut merged = AuthInfo::new();
    for result in results {
        if let Some(info) = result? {
            merged.extend(info);
        }
    }
    Ok(merged)
}

fn scheme_names(requirement: &SecurityRequirement) -> Vec<&str> {
    requirement
        .schemes
        .iter()
        .map(|(name, _)| name.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Arc<RequestContext> {
        Arc::new(RequestContext::new("GET", "/").unwrap())
    }

    fn requirement(names: &[&str]) -> SecurityRequirement {
        SecurityRequirement {
            schemes: names.iter().map(|n| (n.to_string(), Vec::new())).collect(),
        }
    }

    fn info(value: Value) -> AuthInfo {
        value.as_object().cloned().unwrap_or_default()
    }

    fn passing(value: Value) -> impl SecurityResolver {
        sync_resolver(move |_, _| Ok(Some(info(value.clone()))))
    }

    fn failing(status: u16) -> impl SecurityResolver {
        sync_resolver(move |_, _| Err(SecurityError::new(status, format!("failed {status}"))))
    }

    #[tokio::test]
    async fn no_requirements_is_a_noop() {
        let resolvers = SecurityResolvers::new().scheme("a", failing(401));
        let out = evaluate_security(&ctx(), &[], &Map::new(), &resolvers).await;
        assert_eq!(out.unwrap(), None);
    }

    #[tokio::test]
    async fn no_resolvers_is_a_noop() {
        let out = evaluate_security(&ctx(), &[requirement(&["a"])], &Map::new(), &SecurityResolvers::new()).await;
        assert_eq!(out.unwrap(), None);
    }

    #[tokio::test]
    async fn and_merges_last_write_wins() {
        let resolvers = SecurityResolvers::new()
            .scheme("a", passing(json!({ "user": "a", "from_a": true })))
            .scheme("b", passing(json!({ "user": "b" })));
        let out = evaluate_security(&ctx(), &[requirement(&["a", "b"])], &Map::new(), &resolvers)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(out), json!({ "user": "b", "from_a": true }));
    }

    #[tokio::test]
    async fn one_failing_scheme_fails_the_requirement() {
        let resolvers = SecurityResolvers::new()
            .scheme("a", passing(json!({})))
            .scheme("b", failing(403));
        let err = evaluate_security(&ctx(), &[requirement(&["a", "b"])], &Map::new(), &resolvers)
            .await
            .unwrap_err();
        assert_eq!(err.status, 403);
    }

    #[tokio::test]
    async fn first_failure_in_declaration_order_is_reported() {
        let resolvers = SecurityResolvers::new()
            .scheme("a", failing(401))
            .scheme("b", failing(403));
        let err = evaluate_security(
            &ctx(),
            &[requirement(&["a"]), requirement(&["b"])],
            &Map::new(),
            &resolvers,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, 401);
        assert_eq!(err.message, "failed 401");
    }

    #[tokio::test]
    async fn empty_requirement_passes() {
        let resolvers = SecurityResolvers::new().scheme("a", failing(401));
        let out = evaluate_security(
            &ctx(),
            &[requirement(&["a"]), SecurityRequirement::default()],
            &Map::new(),
            &resolvers,
        )
        .await
        .unwrap();
        assert_eq!(out, Some(AuthInfo::new()));
    }

    #[tokio::test]
    async fn missing_resolver_is_a_server_error() {
        let resolvers = SecurityResolvers::new().scheme("a", passing(json!({})));
        let err = evaluate_security(&ctx(), &[requirement(&["b"])], &Map::new(), &resolvers)
            .await
            .unwrap_err();
        assert_eq!(err.status, 500);
    }

    #[tokio::test]
    async fn resolver_receives_scheme_and_scopes() {
        let resolvers = SecurityResolvers::new().scheme(
            "oauth",
            sync_resolver(|_, opts| {
                Ok(Some(info(json!({
                    "type": opts.scheme["type"],
                    "scopes": opts.scopes,
                }))))
            }),
        );
        let mut schemes = Map::new();
        schemes.insert("oauth".to_string(), json!({ "type": "oauth2" }));
        let requirement = SecurityRequirement {
            schemes: vec![("oauth".to_string(), vec!["read".to_string()])],
        };
        let out = evaluate_security(&ctx(), &[requirement], &schemes, &resolvers)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Value::Object(out), json!({ "type": "oauth2", "scopes": ["read"] }));
    }

    #[test]
    fn shape_lists_scheme_names() {
        let resolvers = SecurityResolvers::new()
            .scheme("b", failing(401))
            .scheme("a", failing(401));
        assert_eq!(resolvers.shape(), json!({ "a": true, "b": true }));
    }
}
