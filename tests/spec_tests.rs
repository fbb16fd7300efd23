mod common;

use common::{fixtures, temp_files};
use http::Method;
use oapi_contract::router::Router;
use oapi_contract::spec::{lint, load_api, ParameterLocation, SecurityRequirement};
use oapi_contract::{CompileOptions, ConfigurationError, OapiError};
use serde_json::json;
use std::sync::Arc;

async fn user_api() -> oapi_contract::ApiSchema {
    load_api(fixtures::user_api().into(), &CompileOptions::default())
        .await
        .unwrap()
}

fn keywords_at(errors: &[oapi_contract::ValidationIssue]) -> Vec<(&str, &str)> {
    errors
        .iter()
        .map(|i| (i.path.as_str(), i.keyword.as_str()))
        .collect()
}

#[tokio::test]
async fn test_operations_follow_document_order() {
    let api = user_api().await;
    assert_eq!(api.title, "Users");
    assert_eq!(api.version, "1.0.0");
    let ops: Vec<_> = api
        .operations
        .iter()
        .map(|op| (op.method.as_str(), &*op.path, op.operation_id.as_deref()))
        .collect();
    assert_eq!(
        ops,
        vec![
            ("GET", "/item", Some("getItem")),
            ("GET", "/users/{userId}", Some("getUser")),
            ("GET", "/users/me", Some("getMe")),
            ("POST", "/users", Some("createUser")),
        ]
    );
}

#[tokio::test]
async fn test_path_level_parameters_are_inherited() {
    let api = user_api().await;
    let op = api.operation("/users/{userId}", &Method::GET).unwrap();

    let path: Vec<_> = op.parameters_in(ParameterLocation::Path).map(|p| &p.name).collect();
    assert_eq!(path, vec!["userId"]);
    // header names are matched case-insensitively
    let headers: Vec<_> = op.parameters_in(ParameterLocation::Header).map(|p| &p.name).collect();
    assert_eq!(headers, vec!["x-trace"]);

    let context = json!({
        "path": { "userId": 0 },
        "query": {},
        "headers": { "x-trace": "ok" },
        "cookies": {}
    });
    let result = api.validate_context(op, &context);
    assert_eq!(keywords_at(&result.errors), vec![("/path/userId", "minimum")]);
}

#[tokio::test]
async fn test_operation_security_overrides_document_security() {
    let api = user_api().await;

    let item = api.operation("/item", &Method::GET).unwrap();
    assert!(item.security.is_empty());

    let user = api.operation("/users/{userId}", &Method::GET).unwrap();
    assert_eq!(
        user.security,
        vec![
            SecurityRequirement {
                schemes: vec![("apiKey".to_string(), vec![])],
            },
            SecurityRequirement {
                schemes: vec![
                    ("bearer".to_string(), vec!["read".to_string()]),
                    ("session".to_string(), vec![]),
                ],
            },
        ]
    );
    assert_eq!(api.security_schemes["session"]["in"], "cookie");
}

#[tokio::test]
async fn test_response_schemas_are_selected_by_status() {
    let api = user_api().await;
    let op = api.operation("/users/{userId}", &Method::GET).unwrap();

    assert!(api
        .validate_response(op, 200, Some("application/json"), &json!({ "id": 1, "name": "a" }))
        .valid);
    // 4XX range
    let result = api.validate_response(op, 409, None, &json!({ "code": 1 }));
    assert_eq!(keywords_at(&result.errors), vec![("/body/message", "required")]);
    // undeclared
    let result = api.validate_response(op, 500, None, &json!({}));
    assert_eq!(keywords_at(&result.errors), vec![("/status", "status")]);
    // undeclared media type
    let result = api.validate_response(op, 200, Some("text/html"), &json!("<p>"));
    assert_eq!(keywords_at(&result.errors), vec![("/headers/content-type", "content-type")]);
}

#[tokio::test]
async fn test_resolver_shape() {
    let api = user_api().await;
    let t = json!(true);
    let complete = json!({
        "paths": {
            "/item": { "get": t },
            "/users/{userId}": { "get": t },
            "/users/me": { "get": t },
            "/users": { "post": t }
        },
        "security": { "apiKey": t, "bearer": t, "session": t }
    });
    assert!(api.validate_resolvers(&complete).valid);

    let mut missing = complete.clone();
    missing["paths"]["/users"] = json!({});
    missing["security"].as_object_mut().unwrap().remove("session");
    let result = api.validate_resolvers(&missing);
    assert_eq!(
        keywords_at(&result.errors),
        vec![("/paths/~1users/post", "required"), ("/security/session", "required")]
    );

    let mut extra = complete.clone();
    extra["paths"]["/item"]["put"] = t.clone();
    extra["security"]["oauth"] = t;
    let result = api.validate_resolvers(&extra);
    assert_eq!(
        keywords_at(&result.errors),
        vec![
            ("/paths/~1item/put", "additionalProperties"),
            ("/security/oauth", "additionalProperties"),
        ]
    );
}

#[tokio::test]
async fn test_public_api_needs_no_resolvers() {
    let doc = json!({
        "openapi": "3.0.0",
        "info": { "title": "Open", "version": "1" },
        "paths": { "/ping": { "get": { "responses": { "204": { "description": "pong" } } } } }
    });
    let api = load_api(doc.into(), &CompileOptions::default()).await.unwrap();
    assert!(api
        .validate_resolvers(&json!({ "paths": { "/ping": { "get": true } } }))
        .valid);
}

#[tokio::test]
async fn test_unknown_security_scheme_is_rejected() {
    let mut doc = fixtures::user_api();
    doc["paths"]["/users/me"]["get"]["security"] = json!([{ "oauth": ["admin"] }]);
    let err = load_api(doc.into(), &CompileOptions::default())
        .await
        .unwrap_err();
    match err {
        OapiError::Configuration(ConfigurationError::UnknownSecurityScheme { scheme, .. }) => {
            assert_eq!(scheme, "oauth")
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_invalid_document_is_rejected() {
    let mut doc = fixtures::user_api();
    doc.as_object_mut().unwrap().remove("info");
    assert_eq!(lint(&doc).len(), 1);

    let err = load_api(doc.into(), &CompileOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OapiError::Configuration(ConfigurationError::InvalidApi { .. })
    ));
}

#[tokio::test]
async fn test_yaml_document_with_external_schemas() {
    let dir = temp_files::create_temp_dir(&[
        (
            "api.yaml",
            r#"
openapi: 3.0.3
info:
  title: Pets
  version: "2"
paths:
  /pets/{petId}:
    get:
      parameters:
        - $ref: 'params.yaml#/petId'
      responses:
        '200':
          description: a pet
          content:
            application/json:
              schema:
                $ref: 'pet.json'
"#,
        ),
        (
            "params.yaml",
            "petId:\n  name: petId\n  in: path\n  required: true\n  schema:\n    type: integer\n",
        ),
        (
            "pet.json",
            r#"{ "type": "object", "required": ["name"], "properties": { "name": { "type": "string" } } }"#,
        ),
    ]);

    let api = load_api(dir.path().join("api.yaml").into(), &CompileOptions::default())
        .await
        .unwrap();
    let op = api.operation("/pets/{petId}", &Method::GET).unwrap();

    let bad_path = json!({ "path": { "petId": "x" }, "query": {}, "headers": {}, "cookies": {} });
    assert_eq!(
        keywords_at(&api.validate_context(op, &bad_path).errors),
        vec![("/path/petId", "type")]
    );
    let result = api.validate_response(op, 200, None, &json!({}));
    assert_eq!(keywords_at(&result.errors), vec![("/body/name", "required")]);
}

#[tokio::test]
async fn test_literal_paths_route_before_templates() {
    let api = user_api().await;
    let router = Router::new(api.operations.iter().cloned().map(Arc::new).collect()).unwrap();

    let me = router.route("GET", "/users/me").unwrap();
    assert_eq!(me.route.operation_id.as_deref(), Some("getMe"));

    let other = router.route("GET", "/users/42").unwrap();
    assert_eq!(other.route.operation_id.as_deref(), Some("getUser"));
    assert_eq!(other.get_path_param("userId"), Some("42"));

    assert!(router.route("PUT", "/users/42").is_none());
    assert!(router.route("GET", "/users/42/extra").is_none());
}
