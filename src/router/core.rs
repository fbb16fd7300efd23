use crate::error::ConfigurationError;
use crate::spec::OperationSchema;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Path parameters of a match: names are shared with the route table, values
/// are per-request and percent-decoded.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One segment of a path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Must equal the request segment exactly.
    Literal(String),
    /// `{name}`: matches any non-empty segment.
    Param(Arc<str>),
    /// `prefix{name}suffix`, e.g. `{file}.json`.
    Template {
        prefix: String,
        name: Arc<str>,
        suffix: String,
    },
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) {
            if open < close {
                let name: Arc<str> = Arc::from(&raw[open + 1..close]);
                if open == 0 && close == raw.len() - 1 {
                    return Segment::Param(name);
                }
                return Segment::Template {
                    prefix: raw[..open].to_string(),
                    name,
                    suffix: raw[close + 1..].to_string(),
                };
            }
        }
        Segment::Literal(raw.to_string())
    }

    /// Literal beats template beats bare parameter.
    fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 0,
            Segment::Template { .. } => 1,
            Segment::Param(_) => 2,
        }
    }

    /// Whether two segments accept exactly the same request segments.
    fn same_shape(&self, other: &Segment) -> bool {
        match (self, other) {
            (Segment::Literal(a), Segment::Literal(b)) => a == b,
            (Segment::Param(_), Segment::Param(_)) => true,
            (
                Segment::Template {
                    prefix: p1,
                    suffix: s1,
                    ..
                },
                Segment::Template {
                    prefix: p2,
                    suffix: s2,
                    ..
                },
            ) => p1 == p2 && s1 == s2,
            _ => false,
        }
    }

    /// Match one request segment, pushing any captured parameter.
    fn capture(&self, segment: &str, params: &mut ParamVec) -> bool {
        match self {
            Segment::Literal(lit) => lit == segment,
            Segment::Param(name) => {
                if segment.is_empty() {
                    return false;
                }
                params.push((Arc::clone(name), decode(segment)));
                true
            }
            Segment::Template {
                prefix,
                name,
                suffix,
            } => {
                let inner = segment
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_suffix(suffix.as_str()));
                match inner {
                    Some(value) if !value.is_empty() => {
                        params.push((Arc::clone(name), decode(value)));
                        true
                    }
                    _ => false,
                }
            }
        }
    }
}

fn decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.strip_prefix('/').unwrap_or(path).split('/')
}

/// A compiled route: method, path template and the operation it serves.
#[derive(Debug, Clone)]
pub struct Route {
    pub operation: Arc<OperationSchema>,
    /// Position of the operation in the list the router was built from.
    pub index: usize,
    segments: Vec<Segment>,
}

impl Route {
    fn new(operation: Arc<OperationSchema>, index: usize) -> Self {
        let segments = split_path(&operation.path).map(Segment::parse).collect();
        Self {
            operation,
            index,
            segments,
        }
    }

    #[must_use]
    pub fn method(&self) -> &str {
        self.operation.method.as_str()
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.operation.path
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn specificity(&self, other: &Route) -> Ordering {
        self.segments
            .iter()
            .map(Segment::rank)
            .cmp(other.segments.iter().map(Segment::rank))
    }

    fn overlaps(&self, other: &Route) -> bool {
        self.method() == other.method()
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.same_shape(b))
    }

    fn matches(&self, path: &str) -> Option<ParamVec> {
        let mut params = ParamVec::new();
        let mut segments = self.segments.iter();
        for raw in split_path(path) {
            let segment = segments.next()?;
            if !segment.capture(raw, &mut params) {
                return None;
            }
        }
        if segments.next().is_some() {
            return None;
        }
        Some(params)
    }
}

/// Result of successfully matching a request to a route.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<OperationSchema>,
    /// Position of the operation in the list the router was built from.
    pub index: usize,
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name.
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path parameters as an owned map. Allocates.
    #[must_use]
    pub fn path_params_map(&self) -> HashMap<String, String> {
        self.path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }
}

/// Route table built once from the derived operations.
///
/// Routes are kept ordered by specificity, so `/user/me` is tried before
/// `/user/{id}` whatever their order in the document. Two routes accepting
/// the same requests are rejected at construction.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Build the route table.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::AmbiguousRoute`] when two operations share a
    /// method and a path shape.
    pub fn new(operations: Vec<Arc<OperationSchema>>) -> Result<Self, ConfigurationError> {
        let mut routes: Vec<Route> = operations
            .into_iter()
            .enumerate()
            .map(|(index, op)| Route::new(op, index))
            .collect();

        for (i, route) in routes.iter().enumerate() {
            if let Some(other) = routes[i + 1..].iter().find(|r| route.overlaps(r)) {
                return Err(ConfigurationError::AmbiguousRoute {
                    method: route.method().to_string(),
                    first: route.pattern().to_string(),
                    second: other.pattern().to_string(),
                });
            }
        }

        // stable: equally specific routes keep document order
        routes.sort_by(|a, b| a.specificity(b));

        let routes_summary: Vec<String> = routes
            .iter()
            .take(10)
            .map(|r| format!("{} {}", r.method(), r.pattern()))
            .collect();
        info!(
            routes_count = routes.len(),
            routes_summary = ?routes_summary,
            "Routing table loaded"
        );

        Ok(Self { routes })
    }

    /// Routes in matching order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Match `method` (case-sensitive) and `path` against the table.
    ///
    /// `None` is the normal "not found" outcome.
    #[must_use]
    pub fn route(&self, method: &str, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "Route match attempt");

        for route in self.routes.iter().filter(|r| r.method() == method) {
            if let Some(path_params) = route.matches(path) {
                debug!(
                    method = %method,
                    path = %path,
                    route_pattern = %route.pattern(),
                    path_params = ?path_params,
                    "Route matched"
                );
                return Some(RouteMatch {
                    route: Arc::clone(&route.operation),
                    index: route.index,
                    path_params,
                });
            }
        }

        warn!(method = %method, path = %path, "No route matched");
        None
    }
}
