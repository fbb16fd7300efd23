mod common;

use common::temp_files;
use oapi_contract::compiler::{compile, CompileOptions, SchemaSource};
use oapi_contract::SchemaCompileError;
use serde_json::json;

fn local_only() -> CompileOptions {
    CompileOptions {
        allow_remote_refs: false,
        ..CompileOptions::default()
    }
}

#[tokio::test]
async fn test_refs_across_files() {
    let dir = temp_files::create_temp_dir(&[
        (
            "order.json",
            r##"{
                "type": "object",
                "required": ["id", "customer"],
                "properties": {
                    "id": { "type": "integer" },
                    "customer": { "$ref": "customer.json" },
                    "lines": { "type": "array", "items": { "$ref": "common.json#/definitions/line" } }
                }
            }"##,
        ),
        (
            "customer.json",
            r##"{ "type": "object", "required": ["name"], "properties": { "name": { "type": "string" } } }"##,
        ),
        (
            "common.json",
            r##"{ "definitions": { "line": { "type": "object", "properties": { "qty": { "type": "integer", "minimum": 1 } } } } }"##,
        ),
    ]);

    let schema = compile(dir.path().join("order.json").into(), &local_only())
        .await
        .unwrap();

    assert!(schema
        .validate(&json!({ "id": 1, "customer": { "name": "a" }, "lines": [{ "qty": 2 }] }))
        .valid);

    let result = schema.validate(&json!({ "id": 1, "customer": {}, "lines": [{ "qty": 0 }] }));
    let found: Vec<_> = result.errors.iter().map(|i| (i.path.as_str(), i.keyword.as_str())).collect();
    assert_eq!(found, vec![("/customer/name", "required"), ("/lines/0/qty", "minimum")]);
}

#[tokio::test]
async fn test_circular_refs_between_files() {
    let dir = temp_files::create_temp_dir(&[
        (
            "person.json",
            r##"{ "type": "object", "properties": { "employer": { "$ref": "company.json" } } }"##,
        ),
        (
            "company.json",
            r##"{ "type": "object", "properties": { "owner": { "$ref": "person.json" }, "name": { "type": "string" } } }"##,
        ),
    ]);

    let schema = compile(dir.path().join("person.json").into(), &local_only())
        .await
        .unwrap();
    assert!(schema
        .validate(&json!({ "employer": { "owner": { "employer": { "name": "acme" } } } }))
        .valid);
    let result = schema.validate(&json!({ "employer": { "owner": { "employer": { "name": 3 } } } }));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].path, "/employer/owner/employer/name");
}

#[tokio::test]
async fn test_yaml_documents() {
    let file = temp_files::create_temp_yaml(
        "type: object\nrequired: [id]\nproperties:\n  id:\n    type: integer\n",
    );
    let schema = compile(file.path().into(), &local_only()).await.unwrap();
    assert!(schema.validate(&json!({ "id": 1 })).valid);
    assert!(!schema.validate(&json!({})).valid);
}

#[tokio::test]
async fn test_relative_refs_resolve_against_root_id() {
    let dir = temp_files::create_temp_dir(&[(
        "defs.json",
        r##"{ "definitions": { "positive": { "type": "integer", "minimum": 1 } } }"##,
    )]);
    let base = url::Url::from_directory_path(dir.path()).unwrap();
    let root = json!({
        "$id": base.join("root.json").unwrap().to_string(),
        "properties": { "n": { "$ref": "defs.json#/definitions/positive" } }
    });

    let schema = compile(root.into(), &local_only()).await.unwrap();
    assert!(schema.validate(&json!({ "n": 3 })).valid);
    assert!(!schema.validate(&json!({ "n": 0 })).valid);
}

#[tokio::test]
async fn test_unresolved_ref_is_an_error() {
    let err = compile(
        json!({ "properties": { "a": { "$ref": "#/definitions/missing" } } }).into(),
        &local_only(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SchemaCompileError::UnresolvedRef { .. }), "{err}");
}

#[tokio::test]
async fn test_missing_file_is_an_error() {
    let dir = temp_files::create_temp_dir(&[(
        "a.json",
        r##"{ "$ref": "b.json" }"##,
    )]);
    let err = compile(dir.path().join("a.json").into(), &local_only())
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaCompileError::FileNotFound { .. }), "{err}");

    let err = compile(SchemaSource::from("/definitely/not/here.json"), &local_only())
        .await
        .unwrap_err();
    assert!(matches!(err, SchemaCompileError::FileNotFound { .. }), "{err}");
}

#[tokio::test]
async fn test_remote_refs_can_be_disabled() {
    let err = compile(
        json!({ "$ref": "https://schemas.example.invalid/thing.json" }).into(),
        &local_only(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SchemaCompileError::RemoteDisabled { .. }), "{err}");
}

#[tokio::test]
async fn test_malformed_documents_are_reported() {
    let file = temp_files::create_temp_spec("{ not json", "json");
    let err = compile(file.path().into(), &local_only()).await.unwrap_err();
    assert!(matches!(err, SchemaCompileError::InvalidJson { .. }), "{err}");
}
