use super::format;
use super::ValidationIssue;
use crate::compiler::Registry;
use crate::pointer;
use crate::schema::{Dependency, InstanceType, Items, Keyword, Schema, SchemaNode};
use serde_json::{Map, Value};

/// `$ref`s entered on the way down to the current node.
///
/// Entering the same reference again at the same instance path cannot make
/// progress on the value, so that branch is treated as satisfied.
struct RefTrail<'a> {
    uri: &'a str,
    path: &'a str,
    parent: Option<&'a RefTrail<'a>>,
}

impl RefTrail<'_> {
    fn contains(&self, uri: &str, path: &str) -> bool {
        let mut cur = Some(self);
        while let Some(link) = cur {
            if link.uri == uri && link.path == path {
                return true;
            }
            cur = link.parent;
        }
        false
    }
}

pub(super) struct Validator<'r> {
    registry: &'r Registry,
}

impl<'r> Validator<'r> {
    pub(super) fn new(registry: &'r Registry) -> Self {
        Self { registry }
    }

    pub(super) fn validate(
        &self,
        schema: &Schema,
        value: &Value,
        path: &str,
    ) -> Vec<ValidationIssue> {
        let mut out = Vec::new();
        self.check(schema, value, path, None, &mut out);
        out
    }

    fn check(
        &self,
        schema: &Schema,
        value: &Value,
        path: &str,
        trail: Option<&RefTrail<'_>>,
        out: &mut Vec<ValidationIssue>,
    ) {
        match schema {
            Schema::Bool(true) => {}
            Schema::Bool(false) => {
                out.push(ValidationIssue::new(path, "false", "no value is allowed here"));
            }
            Schema::Node(node) => {
                for keyword in &node.keywords {
                    self.check_keyword(node, keyword, value, path, trail, out);
                }
            }
        }
    }

    fn is_valid(
        &self,
        schema: &Schema,
        value: &Value,
        path: &str,
        trail: Option<&RefTrail<'_>>,
    ) -> bool {
        let mut scratch = Vec::new();
        self.check(schema, value, path, trail, &mut scratch);
        scratch.is_empty()
    }

    fn check_keyword(
        &self,
        node: &SchemaNode,
        keyword: &Keyword,
        value: &Value,
        path: &str,
        trail: Option<&RefTrail<'_>>,
        out: &mut Vec<ValidationIssue>,
    ) {
        let issue = |message: String| ValidationIssue::new(path, keyword.name(), message);

        match keyword {
            Keyword::Ref(uri) => {
                if trail.is_some_and(|t| t.contains(uri, path)) {
                    return;
                }
                match self.registry.get(uri) {
                    Some(target) => {
                        let link = RefTrail {
                            uri: uri.as_str(),
                            path,
                            parent: trail,
                        };
                        self.check(target, value, path, Some(&link), out);
                    }
                    None => out.push(issue(format!("unresolved reference {uri}"))),
                }
            }
            Keyword::Type { types, nullable } => {
                let ok = types.iter().any(|t| t.matches(value)) || (*nullable && value.is_null());
                if !ok {
                    let expected = types
                        .iter()
                        .map(InstanceType::as_str)
                        .collect::<Vec<_>>()
                        .join(" or ");
                    out.push(issue(format!(
                        "should be {expected}, got {}",
                        InstanceType::of(value)
                    )));
                }
            }
            Keyword::Enum(allowed) => {
                if !allowed.iter().any(|a| json_equal(a, value)) {
                    out.push(issue(format!(
                        "should be one of {}",
                        Value::Array(allowed.clone())
                    )));
                }
            }
            Keyword::Const(expected) => {
                if !json_equal(expected, value) {
                    out.push(issue(format!("should be equal to {expected}")));
                }
            }

            Keyword::Properties(props) => {
                let Some(obj) = value.as_object() else { return };
                for (key, v) in obj {
                    if let Some((_, sub)) = props.iter().find(|(name, _)| name == key) {
                        self.check(sub, v, &pointer::join(path, key), trail, out);
                    }
                }
            }
            Keyword::Required(names) => {
                let Some(obj) = value.as_object() else { return };
                for name in names {
                    if !obj.contains_key(name) {
                        out.push(ValidationIssue::new(
                            pointer::join(path, name),
                            "required",
                            format!("'{name}' is required"),
                        ));
                    }
                }
            }
            Keyword::AdditionalProperties(extra) => {
                let Some(obj) = value.as_object() else { return };
                let declared = node.properties().unwrap_or_default();
                let patterns = node.pattern_properties().unwrap_or_default();
                for (key, v) in obj {
                    let known = declared.iter().any(|(name, _)| name == key)
                        || patterns.iter().any(|(p, _)| p.is_match(key));
                    if known {
                        continue;
                    }
                    let key_path = pointer::join(path, key);
                    if matches!(extra.as_ref(), Schema::Bool(false)) {
                        out.push(ValidationIssue::new(
                            key_path,
                            "additionalProperties",
                            format!("property '{key}' is not allowed"),
                        ));
                    } else {
                        self.check(extra, v, &key_path, trail, out);
                    }
                }
            }
            Keyword::PatternProperties(patterns) => {
                let Some(obj) = value.as_object() else { return };
                for (key, v) in obj {
                    for (pattern, sub) in patterns {
                        if pattern.is_match(key) {
                            self.check(sub, v, &pointer::join(path, key), trail, out);
                        }
                    }
                }
            }
            Keyword::Dependencies(deps) => {
                let Some(obj) = value.as_object() else { return };
                for (name, dep) in deps {
                    if !obj.contains_key(name) {
                        continue;
                    }
                    match dep {
                        Dependency::Properties(needed) => {
                            for other in needed.iter().filter(|n| !obj.contains_key(*n)) {
                                out.push(issue(format!(
                                    "'{other}' is required when '{name}' is present"
                                )));
                            }
                        }
                        Dependency::Schema(sub) => self.check(sub, value, path, trail, out),
                    }
                }
            }
            Keyword::PropertyNames(names) => {
                let Some(obj) = value.as_object() else { return };
                for key in obj.keys() {
                    let key_value = Value::String(key.clone());
                    if !self.is_valid(names, &key_value, path, trail) {
                        out.push(ValidationIssue::new(
                            pointer::join(path, key),
                            "propertyNames",
                            format!("property name '{key}' is invalid"),
                        ));
                    }
                }
            }
            Keyword::MinProperties(min) => {
                if let Some(obj) = value.as_object() {
                    if (obj.len() as u64) < *min {
                        out.push(issue(format!("should have at least {min} properties")));
                    }
                }
            }
            Keyword::MaxProperties(max) => {
                if let Some(obj) = value.as_object() {
                    if obj.len() as u64 > *max {
                        out.push(issue(format!("should have at most {max} properties")));
                    }
                }
            }

            Keyword::Items(items) => {
                let Some(arr) = value.as_array() else { return };
                match items {
                    Items::Single(sub) => {
                        for (i, v) in arr.iter().enumerate() {
                            self.check(sub, v, &pointer::join_index(path, i), trail, out);
                        }
                    }
                    Items::Tuple(subs) => {
                        for (i, (v, sub)) in arr.iter().zip(subs).enumerate() {
                            self.check(sub, v, &pointer::join_index(path, i), trail, out);
                        }
                    }
                }
            }
            Keyword::AdditionalItems(extra) => {
                let Some(arr) = value.as_array() else { return };
                let Some(Items::Tuple(subs)) = node.items() else { return };
                for (i, v) in arr.iter().enumerate().skip(subs.len()) {
                    let item_path = pointer::join_index(path, i);
                    if matches!(extra.as_ref(), Schema::Bool(false)) {
                        out.push(ValidationIssue::new(
                            item_path,
                            "additionalItems",
                            format!("should have at most {} items", subs.len()),
                        ));
                        break;
                    }
                    self.check(extra, v, &item_path, trail, out);
                }
            }
            Keyword::Contains(sub) => {
                let Some(arr) = value.as_array() else { return };
                let found = arr
                    .iter()
                    .enumerate()
                    .any(|(i, v)| self.is_valid(sub, v, &pointer::join_index(path, i), trail));
                if !found {
                    out.push(issue("should contain at least one matching item".to_string()));
                }
            }
            Keyword::MinItems(min) => {
                if let Some(arr) = value.as_array() {
                    if (arr.len() as u64) < *min {
                        out.push(issue(format!("should have at least {min} items")));
                    }
                }
            }
            Keyword::MaxItems(max) => {
                if let Some(arr) = value.as_array() {
                    if arr.len() as u64 > *max {
                        out.push(issue(format!("should have at most {max} items")));
                    }
                }
            }
            Keyword::UniqueItems => {
                let Some(arr) = value.as_array() else { return };
                if let Some((i, j)) = first_duplicate(arr) {
                    out.push(issue(format!("items at {i} and {j} are equal")));
                }
            }

            Keyword::Minimum { limit, exclusive } => {
                let Some(n) = value.as_f64() else { return };
                if *exclusive && n <= *limit {
                    out.push(issue(format!("should be greater than {limit}")));
                } else if n < *limit {
                    out.push(issue(format!("should be greater than or equal to {limit}")));
                }
            }
            Keyword::Maximum { limit, exclusive } => {
                let Some(n) = value.as_f64() else { return };
                if *exclusive && n >= *limit {
                    out.push(issue(format!("should be less than {limit}")));
                } else if n > *limit {
                    out.push(issue(format!("should be less than or equal to {limit}")));
                }
            }
            Keyword::ExclusiveMinimum(limit) => {
                if value.as_f64().is_some_and(|n| n <= *limit) {
                    out.push(issue(format!("should be greater than {limit}")));
                }
            }
            Keyword::ExclusiveMaximum(limit) => {
                if value.as_f64().is_some_and(|n| n >= *limit) {
                    out.push(issue(format!("should be less than {limit}")));
                }
            }
            Keyword::MultipleOf(divisor) => {
                if value.is_number() && !is_multiple_of(value, *divisor) {
                    out.push(issue(format!("should be a multiple of {divisor}")));
                }
            }

            Keyword::Pattern(pattern) => {
                if let Some(s) = value.as_str() {
                    if !pattern.is_match(s) {
                        out.push(issue(format!("should match pattern '{}'", pattern.source)));
                    }
                }
            }
            Keyword::Format(name) => {
                let Some(s) = value.as_str() else { return };
                if !self.registry.assert_formats() {
                    return;
                }
                if format::check(name, s) == Some(false) {
                    out.push(issue(format!("should be a valid {name}")));
                }
            }
            Keyword::MinLength(min) => {
                if let Some(s) = value.as_str() {
                    if (s.chars().count() as u64) < *min {
                        out.push(issue(format!("should be at least {min} characters long")));
                    }
                }
            }
            Keyword::MaxLength(max) => {
                if let Some(s) = value.as_str() {
                    if s.chars().count() as u64 > *max {
                        out.push(issue(format!("should be at most {max} characters long")));
                    }
                }
            }

            Keyword::AllOf(branches) => {
                for branch in branches {
                    self.check(branch, value, path, trail, out);
                }
            }
            Keyword::AnyOf(branches) => {
                if !branches.iter().any(|b| self.is_valid(b, value, path, trail)) {
                    out.push(issue("should match at least one schema in anyOf".to_string()));
                }
            }
            Keyword::OneOf(branches) => {
                let matched = branches
                    .iter()
                    .filter(|b| self.is_valid(b, value, path, trail))
                    .count();
                if matched != 1 {
                    out.push(issue(format!(
                        "should match exactly one schema in oneOf, matched {matched}"
                    )));
                }
            }
            Keyword::Not(sub) => {
                if self.is_valid(sub, value, path, trail) {
                    out.push(issue("should not match the schema in not".to_string()));
                }
            }
        }
    }
}

/// JSON equality with numbers compared by value (`1 == 1.0`).
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| json_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => objects_equal(x, y),
        _ => a == b,
    }
}

fn objects_equal(x: &Map<String, Value>, y: &Map<String, Value>) -> bool {
    x.len() == y.len()
        && x
            .iter()
            .all(|(k, v)| y.get(k).is_some_and(|other| json_equal(v, other)))
}

fn first_duplicate(arr: &[Value]) -> Option<(usize, usize)> {
    for (i, a) in arr.iter().enumerate() {
        for (j, b) in arr.iter().enumerate().skip(i + 1) {
            if json_equal(a, b) {
                return Some((i, j));
            }
        }
    }
    None
}

fn is_multiple_of(value: &Value, divisor: f64) -> bool {
    if divisor.fract() == 0.0 {
        if let Some(n) = value.as_i64() {
            return n % (divisor as i64) == 0;
        }
    }
    let Some(n) = value.as_f64() else {
        return true;
    };
    let quotient = n / divisor;
    if !quotient.is_finite() {
        return false;
    }
    (quotient - quotient.round()).abs() < 1e-9
}
