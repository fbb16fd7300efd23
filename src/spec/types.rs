use crate::compiler::Registry;
use crate::pointer;
use crate::schema::{InstanceType, Schema};
use crate::validator::{self, ValidationIssue, ValidationResult};
use http::Method;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Where a parameter travels, and the context property it is validated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "path" => ParameterLocation::Path,
            "query" => ParameterLocation::Query,
            "header" => ParameterLocation::Header,
            "cookie" => ParameterLocation::Cookie,
            _ => return None,
        })
    }

    /// Property of the request context holding parameters of this location.
    #[must_use]
    pub fn context_key(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "headers",
            ParameterLocation::Cookie => "cookies",
        }
    }

    /// Default serialization style for this location.
    #[must_use]
    pub fn default_style(&self) -> ParameterStyle {
        match self {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "matrix" => ParameterStyle::Matrix,
            "label" => ParameterStyle::Label,
            "form" => ParameterStyle::Form,
            "simple" => ParameterStyle::Simple,
            "spaceDelimited" => ParameterStyle::SpaceDelimited,
            "pipeDelimited" => ParameterStyle::PipeDelimited,
            "deepObject" => ParameterStyle::DeepObject,
            _ => return None,
        })
    }

    /// Separator between array elements in a single serialized value.
    #[must_use]
    pub fn delimiter(&self) -> char {
        match self {
            ParameterStyle::SpaceDelimited => ' ',
            ParameterStyle::PipeDelimited => '|',
            _ => ',',
        }
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        };
        f.write_str(s)
    }
}

/// The JSON shape a raw string parameter is coerced into before validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterShape {
    /// A single value of the given primitive type (`None`: keep the string).
    Primitive(Option<InstanceType>),
    /// A delimited list whose elements have the given primitive type.
    Array(Option<InstanceType>),
    Object,
}

#[derive(Debug, Clone)]
pub struct ParameterMeta {
    /// Name as validated: header names are lower-cased.
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub style: ParameterStyle,
    pub explode: bool,
    pub shape: ParameterShape,
}

impl ParameterMeta {
    /// Whether one raw value carries several array elements.
    ///
    /// Exploded `form`, `spaceDelimited` and `pipeDelimited` arrays repeat
    /// the parameter instead (`ids=1&ids=2`), so a single value is a single
    /// element. `simple` values are always delimited.
    #[must_use]
    pub fn is_delimited(&self) -> bool {
        !self.explode
            || !matches!(
                self.style,
                ParameterStyle::Form | ParameterStyle::SpaceDelimited | ParameterStyle::PipeDelimited
            )
    }
}

/// Response status selector as written under `responses`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKey {
    Exact(u16),
    /// `2XX` style range; holds the leading digit.
    Range(u16),
    Default,
}

impl StatusKey {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        if s == "default" {
            return Some(StatusKey::Default);
        }
        let upper = s.to_ascii_uppercase();
        if let Some(digit) = upper.strip_suffix("XX") {
            return match digit.parse::<u16>() {
                Ok(d) if (1..=5).contains(&d) => Some(StatusKey::Range(d)),
                _ => None,
            };
        }
        s.parse::<u16>().ok().map(StatusKey::Exact)
    }

    #[must_use]
    pub fn matches(&self, status: u16) -> bool {
        match self {
            StatusKey::Exact(code) => *code == status,
            StatusKey::Range(digit) => status / 100 == *digit,
            StatusKey::Default => true,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            StatusKey::Exact(_) => 0,
            StatusKey::Range(_) => 1,
            StatusKey::Default => 2,
        }
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKey::Exact(code) => write!(f, "{code}"),
            StatusKey::Range(digit) => write!(f, "{digit}XX"),
            StatusKey::Default => f.write_str("default"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseContent {
    /// Lower-cased media type or media range, without parameters.
    pub media_type: String,
    pub schema: Schema,
}

#[derive(Debug, Clone)]
pub struct ResponseSpec {
    pub status: StatusKey,
    /// `None` when the response declares no content: any body is accepted.
    pub content: Option<Vec<ResponseContent>>,
}

/// Declared responses of one operation.
#[derive(Debug, Clone, Default)]
pub struct ResponseSchema {
    pub responses: Vec<ResponseSpec>,
}

impl ResponseSchema {
    /// Most specific declared response for `status`: exact code, then range,
    /// then `default`.
    #[must_use]
    pub fn select(&self, status: u16) -> Option<&ResponseSpec> {
        self.responses
            .iter()
            .filter(|r| r.status.matches(status))
            .min_by_key(|r| r.status.rank())
    }

    /// Check a handler response against the declared contract.
    ///
    /// Issue paths address the response as `{status, headers, body}`.
    #[must_use]
    pub fn validate(
        &self,
        status: u16,
        content_type: Option<&str>,
        body: &Value,
        registry: &Registry,
    ) -> ValidationResult {
        let Some(spec) = self.select(status) else {
            return ValidationResult::from_errors(vec![ValidationIssue::new(
                "/status",
                "status",
                format!("status {status} is not declared for this operation"),
            )]);
        };
        let content = match &spec.content {
            Some(content) if !content.is_empty() => content,
            _ => return ValidationResult::ok(),
        };

        let media = media_type_of(content_type.unwrap_or("application/json"));
        let Some(declared) = match_media(content, &media) else {
            return ValidationResult::from_errors(vec![ValidationIssue::new(
                "/headers/content-type",
                "content-type",
                format!("content type {media} is not declared for status {}", spec.status),
            )]);
        };

        let errors = validator::validate(&declared.schema, body, registry)
            .errors
            .into_iter()
            .map(|issue| issue.prefixed("/body"))
            .collect();
        ValidationResult::from_errors(errors)
    }
}

/// `text/html; charset=utf-8` → `text/html`.
#[must_use]
pub fn media_type_of(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn match_media<'a>(content: &'a [ResponseContent], media: &str) -> Option<&'a ResponseContent> {
    if let Some(exact) = content.iter().find(|c| c.media_type == media) {
        return Some(exact);
    }
    let major = media.split('/').next().unwrap_or_default();
    content
        .iter()
        .find(|c| {
            c.media_type
                .strip_suffix("/*")
                .is_some_and(|range_major| range_major == major)
        })
        .or_else(|| content.iter().find(|c| c.media_type == "*/*"))
}

/// One alternative of a security requirement set: scheme name → required
/// scopes, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecurityRequirement {
    pub schemes: Vec<(String, Vec<String>)>,
}

impl SecurityRequirement {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }
}

/// Everything derived for one (path, method) operation.
#[derive(Debug, Clone)]
pub struct OperationSchema {
    pub method: Method,
    pub path: Arc<str>,
    pub operation_id: Option<String>,
    pub parameters: Vec<ParameterMeta>,
    /// Validates `{path, query, headers, cookies, body}`.
    pub context: Schema,
    pub body_required: bool,
    pub response: ResponseSchema,
    /// Effective requirement set; empty means the operation is public.
    pub security: Vec<SecurityRequirement>,
}

impl OperationSchema {
    /// Parameters declared for `location`.
    pub fn parameters_in(
        &self,
        location: ParameterLocation,
    ) -> impl Iterator<Item = &ParameterMeta> + '_ {
        self.parameters
            .iter()
            .filter(move |p| p.location == location)
    }

    /// Pointer of this operation inside the resolver map, e.g. `/paths/~1user~1{id}/get`.
    #[must_use]
    pub fn resolver_pointer(&self) -> String {
        let method = self.method.as_str().to_ascii_lowercase();
        pointer::join(&pointer::join("/paths", &self.path), &method)
    }
}

/// A whole API projected into validation schemas.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct ApiSchema {
    pub title: String,
    pub version: String,
    pub operations: Vec<OperationSchema>,
    /// `components.securitySchemes`, `$ref`s resolved.
    pub security_schemes: Map<String, Value>,
    /// Validates `{paths: {<path>: {<method>: ..}}, security: {<scheme>: ..}}`.
    pub resolvers: Schema,
    pub registry: Arc<Registry>,
}

impl ApiSchema {
    #[must_use]
    pub fn operation(&self, path: &str, method: &Method) -> Option<&OperationSchema> {
        self.operations
            .iter()
            .find(|op| &*op.path == path && &op.method == method)
    }

    #[must_use]
    pub fn validate_context(&self, operation: &OperationSchema, context: &Value) -> ValidationResult {
        validator::validate(&operation.context, context, &self.registry)
    }

    #[must_use]
    pub fn validate_response(
        &self,
        operation: &OperationSchema,
        status: u16,
        content_type: Option<&str>,
        body: &Value,
    ) -> ValidationResult {
        operation
            .response
            .validate(status, content_type, body, &self.registry)
    }

    /// Check the shape of the caller's handler and resolver maps.
    #[must_use]
    pub fn validate_resolvers(&self, shape: &Value) -> ValidationResult {
        validator::validate(&self.resolvers, shape, &self.registry)
    }
}
