use super::types::{
    ApiSchema, OperationSchema, ParameterLocation, ParameterMeta, ParameterShape, ParameterStyle,
    ResponseContent, ResponseSchema, ResponseSpec, SecurityRequirement, StatusKey,
};
use crate::compiler::{uri, LoadedDocuments, RegistryBuilder};
use crate::error::{ConfigurationError, OapiError, SchemaCompileError};
use crate::pointer;
use crate::schema::{InstanceType, Keyword, Schema, SchemaNode};
use http::Method;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Operation keys of a path item, in the order routes are derived.
pub const METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

const MAX_REF_HOPS: usize = 32;

/// Project a loaded OpenAPI document into per-operation validation schemas.
///
/// The document is expected to have passed [`lint`](super::lint) already;
/// this function only fails on things the meta-schema cannot see, such as
/// dangling `$ref`s, invalid schemas or security requirements naming an
/// undeclared scheme.
pub fn to_schema(loaded: LoadedDocuments, assert_formats: bool) -> Result<ApiSchema, OapiError> {
    let LoadedDocuments { base, root, store } = loaded;
    let mut deriver = Deriver {
        builder: RegistryBuilder::new(store, assert_formats),
        base,
    };

    let security_schemes = deriver.security_schemes(&root)?;
    let default_security = match root.get("security") {
        Some(security) => deriver.security(security, "/security", &security_schemes)?,
        None => Vec::new(),
    };

    let mut operations = Vec::new();
    if let Some(paths) = root.get("paths").and_then(Value::as_object) {
        for (path, item) in paths {
            if path.starts_with("x-") {
                continue;
            }
            let location = pointer::join("/paths", path);
            deriver.path_item(
                path,
                item,
                &location,
                &default_security,
                &security_schemes,
                &mut operations,
            )?;
        }
    }

    let resolver_shape = resolver_shape(&operations, &security_schemes);
    let base = deriver.base.clone();
    let resolvers = deriver.builder.add_schema(&resolver_shape, &base, "")?;

    let info = root.get("info");
    let text = |key: &str| {
        info.and_then(|i| i.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    info!(
        title = %text("title"),
        operations = operations.len(),
        security_schemes = security_schemes.len(),
        "API schema derived"
    );

    Ok(ApiSchema {
        title: text("title"),
        version: text("version"),
        operations,
        security_schemes,
        resolvers,
        registry: deriver.builder.finish(),
    })
}

struct Deriver {
    builder: RegistryBuilder,
    base: Url,
}

/// An OpenAPI object with `$ref`s followed, plus where it was found.
struct Resolved {
    value: Value,
    base: Url,
    location: String,
}

impl Deriver {
    /// Follow `$ref` until reaching a concrete object.
    fn resolve(
        &self,
        value: &Value,
        base: &Url,
        location: &str,
    ) -> Result<Resolved, SchemaCompileError> {
        let mut current = Resolved {
            value: value.clone(),
            base: base.clone(),
            location: location.to_string(),
        };
        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = current.value.get("$ref").and_then(Value::as_str) else {
                return Ok(current);
            };
            let canonical = uri::canonicalize(&current.base, reference)?;
            let (target, target_base) = self.builder.resolve_value(&canonical).ok_or_else(|| {
                SchemaCompileError::UnresolvedRef {
                    reference: reference.to_string(),
                    canonical: canonical.clone(),
                }
            })?;
            let fragment = uri::split(&canonical).1;
            current = Resolved {
                value: target.clone(),
                base: target_base.clone(),
                location: urlencoding::decode(fragment)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|_| fragment.to_string()),
            };
        }
        Err(SchemaCompileError::InvalidSchema {
            location: format!("#{}", current.location),
            message: "reference chain too long".to_string(),
        })
    }

    fn security_schemes(&self, root: &Value) -> Result<Map<String, Value>, SchemaCompileError> {
        let mut out = Map::new();
        let Some(schemes) = root
            .get("components")
            .and_then(|c| c.get("securitySchemes"))
            .and_then(Value::as_object)
        else {
            return Ok(out);
        };
        for (name, scheme) in schemes {
            let location = pointer::join("/components/securitySchemes", name);
            let resolved = self.resolve(scheme, &self.base, &location)?;
            out.insert(name.clone(), resolved.value);
        }
        Ok(out)
    }

    fn security(
        &self,
        value: &Value,
        location: &str,
        schemes: &Map<String, Value>,
    ) -> Result<Vec<SecurityRequirement>, ConfigurationError> {
        let Some(requirements) = value.as_array() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::with_capacity(requirements.len());
        for (i, requirement) in requirements.iter().enumerate() {
            let req_location = pointer::join_index(location, i);
            let mut parsed = SecurityRequirement::default();
            for (name, scopes) in requirement.as_object().into_iter().flatten() {
                if !schemes.contains_key(name) {
                    return Err(ConfigurationError::UnknownSecurityScheme {
                        location: req_location,
                        scheme: name.clone(),
                    });
                }
                let scopes = scopes
                    .as_array()
                    .map(|s| {
                        s.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                parsed.schemes.push((name.clone(), scopes));
            }
            out.push(parsed);
        }
        Ok(out)
    }

    fn path_item(
        &mut self,
        path: &str,
        item: &Value,
        location: &str,
        default_security: &[SecurityRequirement],
        schemes: &Map<String, Value>,
        operations: &mut Vec<OperationSchema>,
    ) -> Result<(), OapiError> {
        let base = self.base.clone();
        let item = self.resolve(item, &base, location)?;
        let shared = self.parameters(&item, None)?;

        for method_key in METHODS {
            let Some(operation) = item.value.get(method_key) else {
                continue;
            };
            let op_location = pointer::join(&item.location, method_key);
            let op = Resolved {
                value: operation.clone(),
                base: item.base.clone(),
                location: op_location,
            };

            let mut parameters = shared.clone();
            for param in self.parameters(&op, Some(&op.location))? {
                match parameters
                    .iter_mut()
                    .find(|(p, _)| p.name == param.0.name && p.location == param.0.location)
                {
                    Some(existing) => *existing = param,
                    None => parameters.push(param),
                }
            }

            let body = self.request_body(&op)?;
            let body_required = body.as_ref().is_some_and(|(_, required)| *required);
            let context = context_schema(&parameters, body);
            let response = self.responses(&op)?;

            let security = match op.value.get("security") {
                Some(security) => self.security(
                    security,
                    &pointer::join(&op.location, "security"),
                    schemes,
                )?,
                None => default_security.to_vec(),
            };

            let method = Method::from_str(&method_key.to_ascii_uppercase()).map_err(|e| {
                SchemaCompileError::InvalidSchema {
                    location: format!("#{}", op.location),
                    message: e.to_string(),
                }
            })?;

            debug!(
                method = %method,
                path = %path,
                parameters = parameters.len(),
                responses = response.responses.len(),
                security = security.len(),
                "Operation derived"
            );

            operations.push(OperationSchema {
                method,
                path: Arc::from(path),
                operation_id: op
                    .value
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                parameters: parameters.into_iter().map(|(meta, _)| meta).collect(),
                context,
                body_required,
                response,
                security,
            });
        }
        Ok(())
    }

    /// `parameters` of a path item or operation, `$ref`s resolved and
    /// schemas compiled.
    fn parameters(
        &mut self,
        owner: &Resolved,
        location: Option<&str>,
    ) -> Result<Vec<(ParameterMeta, Schema)>, SchemaCompileError> {
        let Some(params) = owner.value.get("parameters").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };
        let list_location = pointer::join(location.unwrap_or(&owner.location), "parameters");

        let mut out = Vec::with_capacity(params.len());
        for (i, raw) in params.iter().enumerate() {
            let param = self.resolve(raw, &owner.base, &pointer::join_index(&list_location, i))?;
            let name = param.value.get("name").and_then(Value::as_str);
            let location = param
                .value
                .get("in")
                .and_then(Value::as_str)
                .and_then(ParameterLocation::parse);
            let (Some(name), Some(location)) = (name, location) else {
                warn!(location = %param.location, "Skipping parameter without name or location");
                continue;
            };

            let style = param
                .value
                .get("style")
                .and_then(Value::as_str)
                .and_then(ParameterStyle::parse)
                .unwrap_or_else(|| location.default_style());
            let explode = param
                .value
                .get("explode")
                .and_then(Value::as_bool)
                .unwrap_or(style == ParameterStyle::Form);

            let (schema, shape) = match param.value.get("schema") {
                Some(raw_schema) => {
                    let schema_location = pointer::join(&param.location, "schema");
                    let schema = self
                        .builder
                        .add_schema(raw_schema, &param.base, &schema_location)?;
                    let shape = self.shape_of(raw_schema, &param.base, &schema_location);
                    (schema, shape)
                }
                None => match first_media_schema(&param.value) {
                    // `content` parameters carry serialized JSON
                    Some((media, raw_schema)) => {
                        let schema_location = pointer::join(
                            &pointer::join(&pointer::join(&param.location, "content"), &media),
                            "schema",
                        );
                        let schema = self
                            .builder
                            .add_schema(&raw_schema, &param.base, &schema_location)?;
                        (schema, ParameterShape::Object)
                    }
                    None => (Schema::any(), ParameterShape::Primitive(None)),
                },
            };

            let name = if location == ParameterLocation::Header {
                name.to_ascii_lowercase()
            } else {
                name.to_string()
            };
            let required = location == ParameterLocation::Path
                || param
                    .value
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

            out.push((
                ParameterMeta {
                    name,
                    location,
                    required,
                    style,
                    explode,
                    shape,
                },
                schema,
            ));
        }
        Ok(out)
    }

    /// How a raw string parameter should be coerced, read from its schema.
    fn shape_of(&self, schema: &Value, base: &Url, location: &str) -> ParameterShape {
        let Ok(schema) = self.resolve(schema, base, location) else {
            return ParameterShape::Primitive(None);
        };
        match primary_type(&schema.value) {
            Some(InstanceType::Array) => {
                let items = schema
                    .value
                    .get("items")
                    .and_then(|items| self.resolve(items, &schema.base, &schema.location).ok())
                    .and_then(|items| primary_type(&items.value));
                ParameterShape::Array(items)
            }
            Some(InstanceType::Object) => ParameterShape::Object,
            other => ParameterShape::Primitive(other),
        }
    }

    fn request_body(&mut self, op: &Resolved) -> Result<Option<(Schema, bool)>, SchemaCompileError> {
        let Some(raw) = op.value.get("requestBody") else {
            return Ok(None);
        };
        let body = self.resolve(raw, &op.base, &pointer::join(&op.location, "requestBody"))?;
        let required = body
            .value
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let schema = match pick_body_media(&body.value) {
            Some((media, Some(raw_schema))) => {
                let location = pointer::join(
                    &pointer::join(&pointer::join(&body.location, "content"), &media),
                    "schema",
                );
                self.builder.add_schema(&raw_schema, &body.base, &location)?
            }
            _ => Schema::any(),
        };
        Ok(Some((schema, required)))
    }

    fn responses(&mut self, op: &Resolved) -> Result<ResponseSchema, SchemaCompileError> {
        let mut out = ResponseSchema::default();
        let Some(responses) = op.value.get("responses").and_then(Value::as_object) else {
            return Ok(out);
        };
        let responses_location = pointer::join(&op.location, "responses");

        for (key, raw) in responses {
            if key.starts_with("x-") {
                continue;
            }
            let Some(status) = StatusKey::parse(key) else {
                warn!(location = %responses_location, key = %key, "Skipping unknown response key");
                continue;
            };
            let response = self.resolve(raw, &op.base, &pointer::join(&responses_location, key))?;
            let content = match response.value.get("content").and_then(Value::as_object) {
                Some(content) => {
                    let content_location = pointer::join(&response.location, "content");
                    let mut parsed = Vec::with_capacity(content.len());
                    for (media, media_obj) in content {
                        let schema = match media_obj.get("schema") {
                            Some(raw_schema) => self.builder.add_schema(
                                raw_schema,
                                &response.base,
                                &pointer::join(&pointer::join(&content_location, media), "schema"),
                            )?,
                            None => Schema::any(),
                        };
                        parsed.push(ResponseContent {
                            media_type: super::types::media_type_of(media),
                            schema,
                        });
                    }
                    Some(parsed)
                }
                None => None,
            };
            out.responses.push(ResponseSpec { status, content });
        }
        Ok(out)
    }
}

/// First `type` a schema names, ignoring `null`.
fn primary_type(schema: &Value) -> Option<InstanceType> {
    match schema.get("type")? {
        Value::String(s) => InstanceType::parse(s),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .filter_map(InstanceType::parse)
            .find(|t| *t != InstanceType::Null),
        _ => None,
    }
}

fn first_media_schema(owner: &Value) -> Option<(String, Value)> {
    let (media, obj) = owner.get("content")?.as_object()?.iter().next()?;
    Some((media.clone(), obj.get("schema")?.clone()))
}

/// Media type that supplies the request body schema: `application/json`,
/// else the first JSON-ish type, else `*/*`, else the first declared.
fn pick_body_media(body: &Value) -> Option<(String, Option<Value>)> {
    let content = body.get("content")?.as_object()?;
    let key = content
        .keys()
        .find(|k| super::types::media_type_of(k) == "application/json")
        .or_else(|| content.keys().find(|k| k.contains("json")))
        .or_else(|| content.keys().find(|k| k.as_str() == "*/*"))
        .or_else(|| content.keys().next())?;
    Some((key.clone(), content.get(key)?.get("schema").cloned()))
}

fn object_schema(properties: Vec<(String, Schema)>, required: Vec<String>) -> Schema {
    let mut keywords = vec![Keyword::Type {
        types: vec![InstanceType::Object],
        nullable: false,
    }];
    if !properties.is_empty() {
        keywords.push(Keyword::Properties(properties));
    }
    if !required.is_empty() {
        keywords.push(Keyword::Required(required));
    }
    Schema::Node(Box::new(SchemaNode { keywords }))
}

/// `{path, query, headers, cookies, body}` schema for one operation.
fn context_schema(parameters: &[(ParameterMeta, Schema)], body: Option<(Schema, bool)>) -> Schema {
    let locations = [
        ParameterLocation::Path,
        ParameterLocation::Query,
        ParameterLocation::Header,
        ParameterLocation::Cookie,
    ];
    let mut properties = Vec::new();
    let mut required = Vec::new();

    for location in locations {
        let mut section_props = Vec::new();
        let mut section_required = Vec::new();
        for (meta, schema) in parameters.iter().filter(|(m, _)| m.location == location) {
            section_props.push((meta.name.clone(), schema.clone()));
            if meta.required {
                section_required.push(meta.name.clone());
            }
        }
        if section_props.is_empty() {
            continue;
        }
        if !section_required.is_empty() {
            required.push(location.context_key().to_string());
        }
        properties.push((
            location.context_key().to_string(),
            object_schema(section_props, section_required),
        ));
    }

    if let Some((schema, body_required)) = body {
        if body_required {
            required.push("body".to_string());
        }
        properties.push(("body".to_string(), schema));
    }

    object_schema(properties, required)
}

/// Schema for `{paths: {<path>: {<method>: ..}}, security: {<scheme>: ..}}`.
///
/// Every declared operation needs a handler and every scheme used by some
/// operation needs a resolver; entries for anything undeclared are rejected.
fn resolver_shape(operations: &[OperationSchema], schemes: &Map<String, Value>) -> Value {
    let mut paths = Map::new();
    for op in operations {
        let method = op.method.as_str().to_ascii_lowercase();
        let entry = paths
            .entry(op.path.to_string())
            .or_insert_with(|| json!({ "type": "object", "properties": {}, "required": [] }));
        entry["properties"][&method] = Value::Bool(true);
        if let Some(required) = entry["required"].as_array_mut() {
            required.push(Value::String(method));
        }
        entry["additionalProperties"] = Value::Bool(false);
    }

    let mut used: Vec<&str> = Vec::new();
    for op in operations {
        for requirement in &op.security {
            for (name, _) in &requirement.schemes {
                if !used.contains(&name.as_str()) {
                    used.push(name);
                }
            }
        }
    }
    let declared: Map<String, Value> = schemes
        .keys()
        .map(|name| (name.clone(), Value::Bool(true)))
        .collect();

    let path_names: Vec<&String> = paths.keys().collect();
    let mut required = vec!["paths"];
    if !used.is_empty() {
        required.push("security");
    }

    json!({
        "type": "object",
        "required": required,
        "properties": {
            "paths": {
                "type": "object",
                "required": path_names,
                "properties": paths,
                "additionalProperties": false
            },
            "security": {
                "type": "object",
                "required": used,
                "properties": declared,
                "additionalProperties": false
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::DocumentStore;
    use serde_json::json;

    fn derive(doc: Value) -> Result<ApiSchema, OapiError> {
        let mut store = DocumentStore::default();
        let base = store.insert(&uri::memory_root(), doc);
        let root = Arc::clone(&store.get(uri::MEMORY_ROOT).unwrap().value);
        to_schema(LoadedDocuments { base, root, store }, true)
    }

    fn api() -> Value {
        json!({
            "openapi": "3.0.3",
            "info": { "title": "Items", "version": "1.0.0" },
            "security": [{ "apiKey": [] }],
            "paths": {
                "/item/{id}": {
                    "parameters": [
                        { "$ref": "#/components/parameters/Id" },
                        { "name": "verbose", "in": "query", "schema": { "type": "boolean" } }
                    ],
                    "get": {
                        "operationId": "getItem",
                        "parameters": [
                            { "name": "verbose", "in": "query", "required": true, "schema": { "type": "boolean" } },
                            { "name": "X-Trace", "in": "header", "schema": { "type": "string" } }
                        ],
                        "responses": {
                            "200": { "$ref": "#/components/responses/Item" },
                            "default": { "description": "error" }
                        }
                    },
                    "put": {
                        "security": [],
                        "requestBody": {
                            "required": true,
                            "content": {
                                "application/json": { "schema": { "$ref": "#/components/schemas/Item" } }
                            }
                        },
                        "responses": { "204": { "description": "stored" } }
                    }
                }
            },
            "components": {
                "parameters": {
                    "Id": { "name": "id", "in": "path", "required": true, "schema": { "type": "integer" } }
                },
                "responses": {
                    "Item": {
                        "description": "an item",
                        "content": { "application/json": { "schema": { "$ref": "#/components/schemas/Item" } } }
                    }
                },
                "schemas": {
                    "Item": { "type": "object", "required": ["name"], "properties": { "name": { "type": "string" } } }
                },
                "securitySchemes": {
                    "apiKey": { "type": "apiKey", "name": "x-api-key", "in": "header" }
                }
            }
        })
    }

    #[test]
    fn derives_operations_in_document_order() {
        let api = derive(api()).unwrap();
        assert_eq!(api.title, "Items");
        let ops: Vec<_> = api
            .operations
            .iter()
            .map(|o| (o.method.as_str(), &*o.path))
            .collect();
        assert_eq!(ops, vec![("GET", "/item/{id}"), ("PUT", "/item/{id}")]);
    }

    #[test]
    fn operation_parameters_override_path_level_ones() {
        let api = derive(api()).unwrap();
        let get = api.operation("/item/{id}", &Method::GET).unwrap();
        let names: Vec<_> = get.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["id", "verbose", "x-trace"]);
        let verbose = &get.parameters[1];
        assert!(verbose.required);
        assert_eq!(
            verbose.shape,
            ParameterShape::Primitive(Some(InstanceType::Boolean))
        );
        assert_eq!(get.parameters[0].shape, ParameterShape::Primitive(Some(InstanceType::Integer)));
    }

    #[test]
    fn context_schema_validates_sections() {
        let api = derive(api()).unwrap();
        let get = api.operation("/item/{id}", &Method::GET).unwrap();

        let ok = json!({ "path": { "id": 3 }, "query": { "verbose": true }, "headers": {}, "cookies": {} });
        assert!(api.validate_context(get, &ok).valid);

        let bad = json!({ "path": { "id": "x" }, "query": {}, "headers": {}, "cookies": {} });
        let errors = api.validate_context(get, &bad).errors;
        assert_eq!(errors.len(), 2);
        assert_eq!((errors[0].path.as_str(), errors[0].keyword.as_str()), ("/path/id", "type"));
        assert_eq!(
            (errors[1].path.as_str(), errors[1].keyword.as_str()),
            ("/query/verbose", "required")
        );
    }

    #[test]
    fn required_body_is_enforced() {
        let api = derive(api()).unwrap();
        let put = api.operation("/item/{id}", &Method::PUT).unwrap();
        assert!(put.body_required);
        let missing = json!({ "path": { "id": 1 }, "query": {}, "headers": {}, "cookies": {} });
        let errors = api.validate_context(put, &missing).errors;
        assert_eq!(errors[0].path, "/body");
        assert_eq!(errors[0].keyword, "required");

        let wrong = json!({ "path": { "id": 1 }, "body": {} });
        let errors = api.validate_context(put, &wrong).errors;
        assert_eq!(errors[0].path, "/body/name");
    }

    #[test]
    fn operation_security_overrides_document_security() {
        let api = derive(api()).unwrap();
        let get = api.operation("/item/{id}", &Method::GET).unwrap();
        let put = api.operation("/item/{id}", &Method::PUT).unwrap();
        assert_eq!(get.security.len(), 1);
        assert_eq!(get.security[0].schemes[0].0, "apiKey");
        assert!(put.security.is_empty());
    }

    #[test]
    fn responses_resolve_refs() {
        let api = derive(api()).unwrap();
        let get = api.operation("/item/{id}", &Method::GET).unwrap();
        assert!(api
            .validate_response(get, 200, None, &json!({ "name": "a" }))
            .valid);
        let errors = api.validate_response(get, 200, None, &json!({})).errors;
        assert_eq!(errors[0].path, "/body/name");
        // default accepts any body
        assert!(api.validate_response(get, 500, None, &json!("boom")).valid);
    }

    #[test]
    fn resolver_shape_requires_handlers_and_used_schemes() {
        let api = derive(api()).unwrap();
        let good = json!({
            "paths": { "/item/{id}": { "get": true, "put": true } },
            "security": { "apiKey": true }
        });
        assert!(api.validate_resolvers(&good).valid);

        let bad = json!({
            "paths": { "/item/{id}": { "get": true, "post": true } },
            "security": { "oauth": true }
        });
        let errors = api.validate_resolvers(&bad).errors;
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "/paths/~1item~1{id}/put",
                "/paths/~1item~1{id}/post",
                "/security/apiKey",
                "/security/oauth"
            ]
        );
    }

    #[test]
    fn unknown_security_scheme_is_rejected() {
        let mut doc = api();
        doc["security"] = json!([{ "missing": [] }]);
        let err = derive(doc).unwrap_err();
        assert!(matches!(
            err,
            OapiError::Configuration(ConfigurationError::UnknownSecurityScheme { .. })
        ));
    }

    #[test]
    fn dangling_ref_is_a_compile_error() {
        let mut doc = api();
        doc["paths"]["/item/{id}"]["get"]["responses"]["200"] =
            json!({ "$ref": "#/components/responses/Nope" });
        let err = derive(doc).unwrap_err();
        assert!(matches!(
            err,
            OapiError::Compile(SchemaCompileError::UnresolvedRef { .. })
        ));
    }
}
