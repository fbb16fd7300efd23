use super::types::{Dependency, InstanceType, Items, Keyword, Pattern, Schema, SchemaNode};
use crate::compiler::uri;
use crate::error::SchemaCompileError;
use crate::pointer;
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

/// Parse a JSON value into a [`Schema`].
///
/// Every `$ref` encountered is canonicalised against `base` and pushed onto
/// `refs` so the caller can make sure the target lands in the registry.
/// `location` is the pointer of `value` inside its document and only feeds
/// error messages.
pub fn parse_schema(
    value: &Value,
    base: &Url,
    location: &str,
    refs: &mut Vec<String>,
) -> Result<Schema, SchemaCompileError> {
    let mut parser = SchemaParser { base, refs };
    parser.parse(value, location)
}

struct SchemaParser<'a> {
    base: &'a Url,
    refs: &'a mut Vec<String>,
}

impl SchemaParser<'_> {
    fn parse(&mut self, value: &Value, location: &str) -> Result<Schema, SchemaCompileError> {
        match value {
            Value::Bool(b) => Ok(Schema::Bool(*b)),
            Value::Object(obj) => self.parse_node(obj, location),
            other => Err(invalid(
                location,
                format!("expected object or boolean, got {}", InstanceType::of(other)),
            )),
        }
    }

    fn parse_node(
        &mut self,
        obj: &Map<String, Value>,
        location: &str,
    ) -> Result<Schema, SchemaCompileError> {
        if obj.is_empty() {
            return Ok(Schema::any());
        }
        let mut keywords = Vec::new();

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let canonical = uri::canonicalize(self.base, reference)?;
            self.refs.push(canonical.clone());
            keywords.push(Keyword::Ref(canonical));
        }

        let nullable = obj.get("nullable").and_then(Value::as_bool).unwrap_or(false);
        if let Some(ty) = obj.get("type") {
            let types = parse_types(ty, &pointer::join(location, "type"))?;
            keywords.push(Keyword::Type { types, nullable });
        }
        if let Some(values) = obj.get("enum") {
            let values = values
                .as_array()
                .ok_or_else(|| invalid(location, "enum must be an array"))?;
            keywords.push(Keyword::Enum(values.clone()));
        }
        if let Some(value) = obj.get("const") {
            keywords.push(Keyword::Const(value.clone()));
        }

        self.parse_object_keywords(obj, location, &mut keywords)?;
        self.parse_array_keywords(obj, location, &mut keywords)?;
        parse_numeric_keywords(obj, location, &mut keywords)?;
        parse_string_keywords(obj, location, &mut keywords)?;
        self.parse_combinators(obj, location, &mut keywords)?;

        if keywords.is_empty() {
            // annotations only
            return Ok(Schema::any());
        }
        Ok(Schema::Node(Box::new(SchemaNode { keywords })))
    }

    fn parse_object_keywords(
        &mut self,
        obj: &Map<String, Value>,
        location: &str,
        keywords: &mut Vec<Keyword>,
    ) -> Result<(), SchemaCompileError> {
        if let Some(props) = obj.get("properties") {
            let loc = pointer::join(location, "properties");
            let props = props
                .as_object()
                .ok_or_else(|| invalid(&loc, "properties must be an object"))?;
            let mut parsed = Vec::with_capacity(props.len());
            for (name, sub) in props {
                parsed.push((name.clone(), self.parse(sub, &pointer::join(&loc, name))?));
            }
            keywords.push(Keyword::Properties(parsed));
        }
        if let Some(Value::Array(required)) = obj.get("required") {
            let names = required
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid(location, "required entries must be strings"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            if !names.is_empty() {
                keywords.push(Keyword::Required(names));
            }
        }
        if let Some(additional) = obj.get("additionalProperties") {
            let loc = pointer::join(location, "additionalProperties");
            keywords.push(Keyword::AdditionalProperties(Box::new(
                self.parse(additional, &loc)?,
            )));
        }
        if let Some(patterns) = obj.get("patternProperties") {
            let loc = pointer::join(location, "patternProperties");
            let patterns = patterns
                .as_object()
                .ok_or_else(|| invalid(&loc, "patternProperties must be an object"))?;
            let mut parsed = Vec::with_capacity(patterns.len());
            for (source, sub) in patterns {
                let sub_loc = pointer::join(&loc, source);
                let pattern = compile_pattern(source, &sub_loc)?;
                parsed.push((pattern, self.parse(sub, &sub_loc)?));
            }
            keywords.push(Keyword::PatternProperties(parsed));
        }
        if let Some(deps) = obj.get("dependencies") {
            let loc = pointer::join(location, "dependencies");
            let deps = deps
                .as_object()
                .ok_or_else(|| invalid(&loc, "dependencies must be an object"))?;
            let mut parsed = Vec::with_capacity(deps.len());
            for (name, dep) in deps {
                let dep = match dep {
                    Value::Array(names) => Dependency::Properties(
                        names
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect(),
                    ),
                    other => Dependency::Schema(Box::new(
                        self.parse(other, &pointer::join(&loc, name))?,
                    )),
                };
                parsed.push((name.clone(), dep));
            }
            keywords.push(Keyword::Dependencies(parsed));
        }
        if let Some(names) = obj.get("propertyNames") {
            let loc = pointer::join(location, "propertyNames");
            keywords.push(Keyword::PropertyNames(Box::new(self.parse(names, &loc)?)));
        }
        if let Some(n) = non_negative(obj, "minProperties", location)? {
            keywords.push(Keyword::MinProperties(n));
        }
        if let Some(n) = non_negative(obj, "maxProperties", location)? {
            keywords.push(Keyword::MaxProperties(n));
        }
        Ok(())
    }

    fn parse_array_keywords(
        &mut self,
        obj: &Map<String, Value>,
        location: &str,
        keywords: &mut Vec<Keyword>,
    ) -> Result<(), SchemaCompileError> {
        if let Some(items) = obj.get("items") {
            let loc = pointer::join(location, "items");
            let items = match items {
                Value::Array(tuple) => Items::Tuple(
                    tuple
                        .iter()
                        .enumerate()
                        .map(|(i, s)| self.parse(s, &pointer::join_index(&loc, i)))
                        .collect::<Result<Vec<_>, _>>()?,
                ),
                single => Items::Single(Box::new(self.parse(single, &loc)?)),
            };
            keywords.push(Keyword::Items(items));
        }
        if let Some(additional) = obj.get("additionalItems") {
            let loc = pointer::join(location, "additionalItems");
            keywords.push(Keyword::AdditionalItems(Box::new(self.parse(additional, &loc)?)));
        }
        if let Some(contains) = obj.get("contains") {
            let loc = pointer::join(location, "contains");
            keywords.push(Keyword::Contains(Box::new(self.parse(contains, &loc)?)));
        }
        if let Some(n) = non_negative(obj, "minItems", location)? {
            keywords.push(Keyword::MinItems(n));
        }
        if let Some(n) = non_negative(obj, "maxItems", location)? {
            keywords.push(Keyword::MaxItems(n));
        }
        if obj.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
            keywords.push(Keyword::UniqueItems);
        }
        Ok(())
    }

    fn parse_combinators(
        &mut self,
        obj: &Map<String, Value>,
        location: &str,
        keywords: &mut Vec<Keyword>,
    ) -> Result<(), SchemaCompileError> {
        for name in ["allOf", "anyOf", "oneOf"] {
            let Some(branches) = obj.get(name) else {
                continue;
            };
            let loc = pointer::join(location, name);
            let branches = branches
                .as_array()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| invalid(&loc, format!("{name} must be a non-empty array")))?;
            let parsed = branches
                .iter()
                .enumerate()
                .map(|(i, s)| self.parse(s, &pointer::join_index(&loc, i)))
                .collect::<Result<Vec<_>, _>>()?;
            keywords.push(match name {
                "allOf" => Keyword::AllOf(parsed),
                "anyOf" => Keyword::AnyOf(parsed),
                _ => Keyword::OneOf(parsed),
            });
        }
        if let Some(not) = obj.get("not") {
            let loc = pointer::join(location, "not");
            keywords.push(Keyword::Not(Box::new(self.parse(not, &loc)?)));
        }
        Ok(())
    }
}

fn parse_types(value: &Value, location: &str) -> Result<Vec<InstanceType>, SchemaCompileError> {
    let one = |v: &Value| {
        v.as_str()
            .and_then(InstanceType::parse)
            .ok_or_else(|| invalid(location, format!("unknown type {v}")))
    };
    match value {
        Value::Array(types) => types.iter().map(one).collect(),
        single => Ok(vec![one(single)?]),
    }
}

fn parse_numeric_keywords(
    obj: &Map<String, Value>,
    location: &str,
    keywords: &mut Vec<Keyword>,
) -> Result<(), SchemaCompileError> {
    let exclusive_min = obj.get("exclusiveMinimum");
    let exclusive_max = obj.get("exclusiveMaximum");

    if let Some(limit) = number(obj, "minimum", location)? {
        let exclusive = exclusive_min.and_then(Value::as_bool).unwrap_or(false);
        keywords.push(Keyword::Minimum { limit, exclusive });
    }
    if let Some(limit) = number(obj, "maximum", location)? {
        let exclusive = exclusive_max.and_then(Value::as_bool).unwrap_or(false);
        keywords.push(Keyword::Maximum { limit, exclusive });
    }
    if let Some(limit) = exclusive_min.and_then(Value::as_f64) {
        keywords.push(Keyword::ExclusiveMinimum(limit));
    }
    if let Some(limit) = exclusive_max.and_then(Value::as_f64) {
        keywords.push(Keyword::ExclusiveMaximum(limit));
    }
    if let Some(divisor) = number(obj, "multipleOf", location)? {
        if divisor <= 0.0 {
            return Err(invalid(location, "multipleOf must be greater than 0"));
        }
        keywords.push(Keyword::MultipleOf(divisor));
    }
    Ok(())
}

fn parse_string_keywords(
    obj: &Map<String, Value>,
    location: &str,
    keywords: &mut Vec<Keyword>,
) -> Result<(), SchemaCompileError> {
    if let Some(source) = obj.get("pattern") {
        let loc = pointer::join(location, "pattern");
        let source = source
            .as_str()
            .ok_or_else(|| invalid(&loc, "pattern must be a string"))?;
        keywords.push(Keyword::Pattern(compile_pattern(source, &loc)?));
    }
    if let Some(format) = obj.get("format").and_then(Value::as_str) {
        keywords.push(Keyword::Format(format.to_string()));
    }
    if let Some(n) = non_negative(obj, "minLength", location)? {
        keywords.push(Keyword::MinLength(n));
    }
    if let Some(n) = non_negative(obj, "maxLength", location)? {
        keywords.push(Keyword::MaxLength(n));
    }
    Ok(())
}

fn compile_pattern(source: &str, location: &str) -> Result<Pattern, SchemaCompileError> {
    let regex = Regex::new(source)
        .map_err(|e| invalid(location, format!("invalid pattern '{source}': {e}")))?;
    Ok(Pattern {
        source: source.to_string(),
        regex,
    })
}

fn number(
    obj: &Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<Option<f64>, SchemaCompileError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(location, format!("{key} must be a number"))),
    }
}

fn non_negative(
    obj: &Map<String, Value>,
    key: &str,
    location: &str,
) -> Result<Option<u64>, SchemaCompileError> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| invalid(location, format!("{key} must be a non-negative integer"))),
    }
}

fn invalid(location: &str, message: impl Into<String>) -> SchemaCompileError {
    SchemaCompileError::InvalidSchema {
        location: if location.is_empty() {
            "#".to_string()
        } else {
            format!("#{location}")
        },
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Url {
        Url::parse("memory:///root.json").unwrap()
    }

    #[test]
    fn empty_and_annotation_only_schemas_accept_everything() {
        let mut refs = Vec::new();
        for v in [json!({}), json!({ "title": "x", "description": "y" }), json!(true)] {
            let schema = parse_schema(&v, &base(), "", &mut refs).unwrap();
            assert!(matches!(schema, Schema::Bool(true)));
        }
    }

    #[test]
    fn refs_are_canonicalised_and_collected() {
        let mut refs = Vec::new();
        let v = json!({ "items": { "$ref": "#/definitions/node" } });
        parse_schema(&v, &base(), "", &mut refs).unwrap();
        assert_eq!(refs, vec!["memory:///root.json#/definitions/node".to_string()]);
    }

    #[test]
    fn draft4_exclusive_minimum_modifies_minimum() {
        let mut refs = Vec::new();
        let v = json!({ "minimum": 1, "exclusiveMinimum": true });
        let schema = parse_schema(&v, &base(), "", &mut refs).unwrap();
        assert!(matches!(
            schema.keywords(),
            [Keyword::Minimum { exclusive: true, .. }]
        ));
    }

    #[test]
    fn invalid_pattern_is_reported_with_location() {
        let mut refs = Vec::new();
        let v = json!({ "properties": { "a": { "pattern": "(" } } });
        let err = parse_schema(&v, &base(), "", &mut refs).unwrap_err();
        assert!(err.to_string().contains("#/properties/a/pattern"));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let mut refs = Vec::new();
        let err = parse_schema(&json!({ "type": "float" }), &base(), "", &mut refs).unwrap_err();
        assert!(matches!(err, SchemaCompileError::InvalidSchema { .. }));
    }
}
