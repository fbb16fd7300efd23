use super::request::{build_context, RequestContext};
use crate::compiler::{CompileOptions, SchemaSource};
use crate::dispatcher::{HandlerMap, HandlerRequest, HandlerResponse};
use crate::error::{ConfigurationError, OapiError, SecurityError};
use crate::ids::RequestId;
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;
use crate::security::{evaluate_security, SecurityResolvers};
use crate::spec::{load_api, ApiSchema};
use crate::validator::log_issues;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

/// Pipeline switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Check handler responses against the declared responses.
    pub validate_responses: bool,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            validate_responses: true,
        }
    }
}

impl ServiceOptions {
    #[must_use]
    pub fn from_runtime(config: &RuntimeConfig) -> Self {
        Self {
            validate_responses: config.validate_responses,
        }
    }
}

/// Everything needed to build an [`OapiService`].
#[derive(Debug)]
pub struct OapiConfig {
    /// The OpenAPI document, in memory or by location.
    pub api: SchemaSource,
    /// One handler per declared operation.
    pub paths: HandlerMap,
    /// One resolver per security scheme the document uses.
    pub security: SecurityResolvers,
    pub compile: CompileOptions,
    pub service: ServiceOptions,
}

impl OapiConfig {
    pub fn new(api: impl Into<SchemaSource>, paths: HandlerMap) -> Self {
        Self {
            api: api.into(),
            paths,
            security: SecurityResolvers::new(),
            compile: CompileOptions::default(),
            service: ServiceOptions::default(),
        }
    }

    #[must_use]
    pub fn security(mut self, security: SecurityResolvers) -> Self {
        self.security = security;
        self
    }

    /// Take compile and pipeline options from a [`RuntimeConfig`].
    #[must_use]
    pub fn runtime(mut self, config: &RuntimeConfig) -> Self {
        self.compile = CompileOptions::from_runtime(config);
        self.service = ServiceOptions::from_runtime(config);
        self
    }
}

/// Load the document, check the handler and resolver maps against it and
/// build the service.
///
/// # Errors
///
/// Any [`SchemaCompileError`](crate::SchemaCompileError) from loading, and
/// [`ConfigurationError`]s for an invalid document, mismatched maps or
/// ambiguous routes. No service exists unless every check passed.
pub async fn create_oapi(config: OapiConfig) -> Result<OapiService, OapiError> {
    let api = load_api(config.api, &config.compile).await?;
    OapiService::new(api, config.paths, config.security, config.service)
}

/// Contract-enforcing request pipeline for one API.
///
/// Immutable after construction; share it behind an `Arc` across tasks.
#[derive(Debug)]
pub struct OapiService {
    api: Arc<ApiSchema>,
    router: Router,
    handlers: HandlerMap,
    security: SecurityResolvers,
    options: ServiceOptions,
}

impl OapiService {
    /// Build a service from an already derived [`ApiSchema`].
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::InvalidResolvers`] when `handlers` or `security`
    /// do not match the document, [`ConfigurationError::AmbiguousRoute`]
    /// when two operations overlap.
    pub fn new(
        api: ApiSchema,
        handlers: HandlerMap,
        security: SecurityResolvers,
        options: ServiceOptions,
    ) -> Result<Self, OapiError> {
        let shape = json!({ "paths": handlers.shape(), "security": security.shape() });
        let check = api.validate_resolvers(&shape);
        if !check.valid {
            log_issues("resolvers", &check.errors);
            return Err(ConfigurationError::InvalidResolvers {
                issues: check.errors,
            }
            .into());
        }

        let router = Router::new(api.operations.iter().cloned().map(Arc::new).collect())?;
        info!(
            title = %api.title,
            version = %api.version,
            operations = api.operations.len(),
            handlers = handlers.len(),
            security_resolvers = security.len(),
            validate_responses = options.validate_responses,
            "Service ready"
        );

        Ok(Self {
            api: Arc::new(api),
            router,
            handlers,
            security,
            options,
        })
    }

    #[must_use]
    pub fn api(&self) -> &ApiSchema {
        &self.api
    }

    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Handle a request, turning a security failure into its response.
    pub async fn handle(&self, ctx: RequestContext) -> HandlerResponse {
        self.try_handle(ctx)
            .await
            .unwrap_or_else(SecurityError::into_response)
    }

    /// Handle a request.
    ///
    /// Not-found, invalid requests and invalid responses are ordinary
    /// `Ok` responses (404, 400, 500).
    ///
    /// # Errors
    ///
    /// The failing scheme resolver's [`SecurityError`], unchanged.
    pub async fn try_handle(&self, ctx: RequestContext) -> Result<HandlerResponse, SecurityError> {
        let request_id = RequestId::from_header_or_new(ctx.header("x-request-id"));
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %ctx.method,
            path = %ctx.path()
        );
        self.pipeline(ctx, request_id).instrument(span).await
    }

    async fn pipeline(
        &self,
        ctx: RequestContext,
        request_id: RequestId,
    ) -> Result<HandlerResponse, SecurityError> {
        let start = Instant::now();

        let Some(matched) = self.router.route(&ctx.method, ctx.path()) else {
            return Ok(HandlerResponse::message(
                404,
                &format!("Path {} {} not found", ctx.method, ctx.path()),
            ));
        };
        let operation = Arc::clone(&matched.route);

        let context = build_context(&ctx, &operation, &matched.path_params);
        let check = self.api.validate_context(&operation, &context);
        if !check.valid {
            log_issues("context", &check.errors);
            return Ok(HandlerResponse::json(
                400,
                json!({ "message": "Request Validation Error", "errors": check.errors }),
            ));
        }

        let mut ctx = ctx;
        ctx.path_params = context
            .get("path")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let ctx = Arc::new(ctx);
        let auth_info = evaluate_security(
            &ctx,
            &operation.security,
            &self.api.security_schemes,
            &self.security,
        )
        .await?;

        let Some(handler) = self.handlers.get(&operation.path, &operation.method) else {
            error!(
                method = %operation.method,
                path = %operation.path,
                "No handler registered for matched route"
            );
            return Ok(HandlerResponse::message(500, "Handler not registered"));
        };

        let Value::Object(mut sections) = context else {
            return Ok(HandlerResponse::message(500, "Malformed request context"));
        };
        let request = HandlerRequest {
            request_id,
            method: operation.method.clone(),
            path: ctx.path().to_string(),
            operation_id: operation.operation_id.clone(),
            path_params: matched.path_params,
            path_values: take_section(&mut sections, "path"),
            query: take_section(&mut sections, "query"),
            headers: take_section(&mut sections, "headers"),
            cookies: take_section(&mut sections, "cookies"),
            body: sections.remove("body"),
            auth_info,
        };

        let response = handler.handle(request).await;

        if self.options.validate_responses {
            let check = self.api.validate_response(
                &operation,
                response.status,
                response.get_header("content-type"),
                &response.body,
            );
            if !check.valid {
                warn!(
                    status = response.status,
                    operation_id = ?operation.operation_id,
                    "Handler response violates the declared contract"
                );
                log_issues("response", &check.errors);
                return Ok(HandlerResponse::json(
                    500,
                    json!({ "message": "Response Validation Error", "errors": check.errors }),
                ));
            }
        }

        info!(
            status = response.status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Request handled"
        );
        Ok(response)
    }
}

fn take_section(sections: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match sections.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
