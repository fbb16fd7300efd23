use regex::Regex;
use serde_json::Value;
use std::fmt;

/// A JSON Schema node.
///
/// `true`/`false` schemas accept/reject everything. Every other schema is a
/// [`SchemaNode`] holding the keywords it declares, in evaluation order.
#[derive(Debug, Clone)]
pub enum Schema {
    Bool(bool),
    Node(Box<SchemaNode>),
}

impl Schema {
    /// The empty schema `{}`; accepts every value.
    #[must_use]
    pub fn any() -> Self {
        Schema::Bool(true)
    }

    /// Keywords declared by this schema (empty for boolean schemas).
    #[must_use]
    pub fn keywords(&self) -> &[Keyword] {
        match self {
            Schema::Bool(_) => &[],
            Schema::Node(node) => &node.keywords,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    pub keywords: Vec<Keyword>,
}

impl SchemaNode {
    pub(crate) fn properties(&self) -> Option<&[(String, Schema)]> {
        self.keywords.iter().find_map(|k| match k {
            Keyword::Properties(props) => Some(props.as_slice()),
            _ => None,
        })
    }

    pub(crate) fn pattern_properties(&self) -> Option<&[(Pattern, Schema)]> {
        self.keywords.iter().find_map(|k| match k {
            Keyword::PatternProperties(props) => Some(props.as_slice()),
            _ => None,
        })
    }

    pub(crate) fn items(&self) -> Option<&Items> {
        self.keywords.iter().find_map(|k| match k {
            Keyword::Items(items) => Some(items),
            _ => None,
        })
    }
}

/// Primitive JSON types as named by the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceType {
    Null,
    Boolean,
    Object,
    Array,
    Number,
    Integer,
    String,
}

impl InstanceType {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "null" => InstanceType::Null,
            "boolean" => InstanceType::Boolean,
            "object" => InstanceType::Object,
            "array" => InstanceType::Array,
            "number" => InstanceType::Number,
            "integer" => InstanceType::Integer,
            "string" => InstanceType::String,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Null => "null",
            InstanceType::Boolean => "boolean",
            InstanceType::Object => "object",
            InstanceType::Array => "array",
            InstanceType::Number => "number",
            InstanceType::Integer => "integer",
            InstanceType::String => "string",
        }
    }

    /// Whether `value` is an instance of this type.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            InstanceType::Null => value.is_null(),
            InstanceType::Boolean => value.is_boolean(),
            InstanceType::Object => value.is_object(),
            InstanceType::Array => value.is_array(),
            InstanceType::Number => value.is_number(),
            InstanceType::Integer => is_integer(value),
            InstanceType::String => value.is_string(),
        }
    }

    /// Most specific type name for a value, used in error messages.
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => InstanceType::Null,
            Value::Bool(_) => InstanceType::Boolean,
            Value::Number(_) if is_integer(value) => InstanceType::Integer,
            Value::Number(_) => InstanceType::Number,
            Value::String(_) => InstanceType::String,
            Value::Array(_) => InstanceType::Array,
            Value::Object(_) => InstanceType::Object,
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn is_integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
        }
        _ => false,
    }
}

/// A compiled regular expression together with its source text.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub source: String,
    pub regex: Regex,
}

impl Pattern {
    #[must_use]
    pub fn is_match(&self, s: &str) -> bool {
        self.regex.is_match(s)
    }
}

/// `items`: one schema for every element, or one schema per position.
#[derive(Debug, Clone)]
pub enum Items {
    Single(Box<Schema>),
    Tuple(Vec<Schema>),
}

/// A `dependencies` entry.
#[derive(Debug, Clone)]
pub enum Dependency {
    Properties(Vec<String>),
    Schema(Box<Schema>),
}

/// One declared keyword. Validators match on this exhaustively.
#[derive(Debug, Clone)]
pub enum Keyword {
    /// Canonical URI of the referenced schema in the registry.
    Ref(String),
    Type {
        types: Vec<InstanceType>,
        nullable: bool,
    },
    Enum(Vec<Value>),
    Const(Value),

    Properties(Vec<(String, Schema)>),
    Required(Vec<String>),
    AdditionalProperties(Box<Schema>),
    PatternProperties(Vec<(Pattern, Schema)>),
    Dependencies(Vec<(String, Dependency)>),
    PropertyNames(Box<Schema>),
    MinProperties(u64),
    MaxProperties(u64),

    Items(Items),
    AdditionalItems(Box<Schema>),
    Contains(Box<Schema>),
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,

    Minimum { limit: f64, exclusive: bool },
    Maximum { limit: f64, exclusive: bool },
    ExclusiveMinimum(f64),
    ExclusiveMaximum(f64),
    MultipleOf(f64),

    Pattern(Pattern),
    Format(String),
    MinLength(u64),
    MaxLength(u64),

    AllOf(Vec<Schema>),
    AnyOf(Vec<Schema>),
    OneOf(Vec<Schema>),
    Not(Box<Schema>),
}

impl Keyword {
    /// The keyword name as written in a schema document.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Keyword::Ref(_) => "$ref",
            Keyword::Type { .. } => "type",
            Keyword::Enum(_) => "enum",
            Keyword::Const(_) => "const",
            Keyword::Properties(_) => "properties",
            Keyword::Required(_) => "required",
            Keyword::AdditionalProperties(_) => "additionalProperties",
            Keyword::PatternProperties(_) => "patternProperties",
            Keyword::Dependencies(_) => "dependencies",
            Keyword::PropertyNames(_) => "propertyNames",
            Keyword::MinProperties(_) => "minProperties",
            Keyword::MaxProperties(_) => "maxProperties",
            Keyword::Items(_) => "items",
            Keyword::AdditionalItems(_) => "additionalItems",
            Keyword::Contains(_) => "contains",
            Keyword::MinItems(_) => "minItems",
            Keyword::MaxItems(_) => "maxItems",
            Keyword::UniqueItems => "uniqueItems",
            Keyword::Minimum { .. } => "minimum",
            Keyword::Maximum { .. } => "maximum",
            Keyword::ExclusiveMinimum(_) => "exclusiveMinimum",
            Keyword::ExclusiveMaximum(_) => "exclusiveMaximum",
            Keyword::MultipleOf(_) => "multipleOf",
            Keyword::Pattern(_) => "pattern",
            Keyword::Format(_) => "format",
            Keyword::MinLength(_) => "minLength",
            Keyword::MaxLength(_) => "maxLength",
            Keyword::AllOf(_) => "allOf",
            Keyword::AnyOf(_) => "anyOf",
            Keyword::OneOf(_) => "oneOf",
            Keyword::Not(_) => "not",
        }
    }
}
