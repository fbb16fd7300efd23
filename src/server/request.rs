use crate::router::ParamVec;
use crate::schema::InstanceType;
use crate::spec::{OperationSchema, ParameterLocation, ParameterMeta, ParameterShape, ParameterStyle};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// Inbound request as produced by the transport layer.
///
/// The pipeline does not parse raw bytes: whatever sits in front of it
/// (a hyper service, a test) fills in method, url, headers and an already
/// decoded JSON body.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Compared case-sensitively against the document's methods.
    pub method: String,
    pub url: Url,
    /// Lower-cased header names. Sorted, so context validation reports
    /// header issues in the same order for every request.
    pub headers: BTreeMap<String, String>,
    /// Parsed from the `cookie` header.
    pub cookies: BTreeMap<String, String>,
    /// Query string with bracket notation expanded.
    pub query: Map<String, Value>,
    pub body: Option<Value>,
    /// Coerced path parameters of the matched route. Filled in by the
    /// pipeline before security runs; empty until then.
    pub path_params: Map<String, Value>,
}

impl RequestContext {
    /// Build a context for `method url`. Relative urls are resolved against
    /// `http://localhost`.
    ///
    /// # Errors
    ///
    /// When `url` does not parse.
    pub fn new(method: impl Into<String>, url: &str) -> Result<Self, url::ParseError> {
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost")?.join(url)?
            }
            Err(err) => return Err(err),
        };
        let query = url.query().map(parse_query).unwrap_or_default();
        Ok(Self {
            method: method.into(),
            url,
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
            query,
            body: None,
            path_params: Map::new(),
        })
    }

    /// Add a header. A `cookie` header also refreshes [`cookies`](Self::cookies).
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        if name == "cookie" {
            self.cookies = parse_cookies(&value);
        }
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Percent-encoded request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parse a `cookie` header value into name/value pairs.
#[must_use]
pub fn parse_cookies(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Parse a query string, expanding bracket notation.
///
/// `a=1&a=2` and `a[]=1` become arrays, `a[b]=1` becomes `{"a": {"b": "1"}}`.
/// Leaf values stay strings; coercion happens per parameter later.
#[must_use]
pub fn parse_query(query: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let keys = split_key(&key);
        if keys.is_empty() || keys[0].is_empty() {
            continue;
        }
        insert_query(&mut out, &keys, value.into_owned());
    }
    out
}

/// `a[b][]` → `["a", "b", ""]`. Keys with unbalanced brackets are kept whole.
fn split_key(key: &str) -> Vec<&str> {
    let Some(open) = key.find('[') else {
        return vec![key];
    };
    let mut keys = vec![&key[..open]];
    let mut rest = &key[open..];
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return vec![key];
        };
        keys.push(&inner[..close]);
        rest = &inner[close + 1..];
    }
    if rest.is_empty() {
        keys
    } else {
        vec![key]
    }
}

fn insert_query(target: &mut Map<String, Value>, keys: &[&str], value: String) {
    let Some((first, rest)) = keys.split_first() else {
        return;
    };
    let first = (*first).to_string();
    match rest.first() {
        None => match target.get_mut(&first) {
            None => {
                target.insert(first, Value::String(value));
            }
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, Value::String(value)]);
            }
        },
        Some(&"") => {
            let entry = target
                .entry(first)
                .or_insert_with(|| Value::Array(Vec::new()));
            match entry {
                Value::Array(items) => items.push(Value::String(value)),
                other => {
                    let previous = other.take();
                    *other = Value::Array(vec![previous, Value::String(value)]);
                }
            }
        }
        Some(_) => {
            let entry = target
                .entry(first)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_query(inner, rest, value);
            }
        }
    }
}

/// Convert a raw string to the primitive type a parameter declares.
///
/// Values that do not parse stay strings so validation reports them.
#[must_use]
pub fn coerce_primitive(raw: &str, ty: Option<InstanceType>) -> Value {
    let coerced = match ty {
        Some(InstanceType::Integer) => raw
            .parse::<i64>()
            .map(Value::from)
            .or_else(|_| raw.parse::<u64>().map(Value::from))
            .ok(),
        Some(InstanceType::Number) => raw.parse::<i64>().map(Value::from).ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }),
        Some(InstanceType::Boolean) => raw.parse::<bool>().map(Value::Bool).ok(),
        Some(InstanceType::Null) if raw.is_empty() || raw == "null" => Some(Value::Null),
        _ => None,
    };
    coerced.unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Coerce one raw parameter value according to its declared shape and
/// style.
#[must_use]
pub fn coerce_param(raw: &Value, meta: &ParameterMeta) -> Value {
    match (meta.shape, raw) {
        (ParameterShape::Primitive(ty), Value::String(s)) => coerce_primitive(s, ty),
        (ParameterShape::Array(ty), Value::String(s)) => {
            if s.is_empty() {
                return Value::Array(Vec::new());
            }
            if !meta.is_delimited() {
                return Value::Array(vec![coerce_primitive(s, ty)]);
            }
            Value::Array(
                s.split(meta.style.delimiter())
                    .map(|part| coerce_primitive(part.trim(), ty))
                    .collect(),
            )
        }
        (ParameterShape::Array(ty), Value::Array(items)) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => coerce_primitive(s, ty),
                    other => other.clone(),
                })
                .collect(),
        ),
        (ParameterShape::Object, Value::String(s)) => object_from_pairs(s, meta.style),
        _ => raw.clone(),
    }
}

/// `role,admin,name,alex` → `{"role": "admin", "name": "alex"}`; a JSON
/// object literal is accepted as well.
fn object_from_pairs(raw: &str, style: ParameterStyle) -> Value {
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(raw) {
        return value;
    }
    let parts: Vec<&str> = raw.split(style.delimiter()).collect();
    if parts.len() % 2 != 0 {
        return Value::String(raw.to_string());
    }
    Value::Object(
        parts
            .chunks(2)
            .map(|pair| (pair[0].to_string(), Value::String(pair[1].to_string())))
            .collect(),
    )
}

fn section<'a>(
    raw: impl Iterator<Item = (&'a str, Value)>,
    operation: &OperationSchema,
    location: ParameterLocation,
) -> Map<String, Value> {
    let mut section: Map<String, Value> = raw.map(|(k, v)| (k.to_string(), v)).collect();
    for meta in operation.parameters_in(location) {
        if let Some(value) = section.get_mut(&meta.name) {
            *value = coerce_param(value, meta);
        }
    }
    section
}

/// Build the `{path, query, headers, cookies, body?}` value validated
/// against an operation's context schema.
#[must_use]
pub fn build_context(
    ctx: &RequestContext,
    operation: &OperationSchema,
    path_params: &ParamVec,
) -> Value {
    let path = section(
        path_params
            .iter()
            .map(|(k, v)| (k.as_ref(), Value::String(v.clone()))),
        operation,
        ParameterLocation::Path,
    );
    let query = section(
        ctx.query.iter().map(|(k, v)| (k.as_str(), v.clone())),
        operation,
        ParameterLocation::Query,
    );
    let headers = section(
        ctx.headers
            .iter()
            .map(|(k, v)| (k.as_str(), Value::String(v.clone()))),
        operation,
        ParameterLocation::Header,
    );
    let cookies = section(
        ctx.cookies
            .iter()
            .map(|(k, v)| (k.as_str(), Value::String(v.clone()))),
        operation,
        ParameterLocation::Cookie,
    );

    debug!(
        path_params = path.len(),
        query_params = query.len(),
        headers = headers.len(),
        cookies = cookies.len(),
        has_body = ctx.body.is_some(),
        "Request context built"
    );

    let mut context = Map::new();
    context.insert("path".to_string(), Value::Object(path));
    context.insert("query".to_string(), Value::Object(query));
    context.insert("headers".to_string(), Value::Object(headers));
    context.insert("cookies".to_string(), Value::Object(cookies));
    if let Some(body) = &ctx.body {
        context.insert("body".to_string(), body.clone());
    }
    Value::Object(context)
}
