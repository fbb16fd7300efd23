//! # Schema Module
//!
//! The JSON Schema data model shared by the compiler and the validator.
//!
//! A schema is either a boolean literal or a node holding a list of
//! [`Keyword`]s. Keywords are a closed enum so that each validator can match
//! exhaustively; `$ref` is stored as a canonical URI and resolved by registry
//! lookup at validation time, which is what lets self-referential schemas
//! compile without expanding forever.
//!
//! Supported keyword groups:
//!
//! - **type/enum/const** (`nullable` from OpenAPI 3.0 folds into `type`)
//! - **object**: `properties`, `required`, `additionalProperties`,
//!   `patternProperties`, `dependencies`, `propertyNames`,
//!   `minProperties`, `maxProperties`
//! - **array**: `items` (single or tuple), `additionalItems`, `contains`,
//!   `minItems`, `maxItems`, `uniqueItems`
//! - **numeric**: `minimum`, `maximum`, `exclusiveMinimum`,
//!   `exclusiveMaximum` (draft-04 booleans or draft-06 numbers), `multipleOf`
//! - **string**: `pattern`, `format`, `minLength`, `maxLength`
//! - **combinators**: `allOf`, `anyOf`, `oneOf`, `not`
//!
//! Anything else is an annotation and is ignored.

mod parse;
mod types;

pub use parse::parse_schema;
pub use types::{Dependency, InstanceType, Items, Keyword, Pattern, Schema, SchemaNode};
