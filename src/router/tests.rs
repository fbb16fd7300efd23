use super::{Router, Segment};
use crate::error::ConfigurationError;
use crate::schema::Schema;
use crate::spec::{OperationSchema, ResponseSchema};
use http::Method;
use std::sync::Arc;

fn op(method: Method, path: &str) -> Arc<OperationSchema> {
    Arc::new(OperationSchema {
        method,
        path: Arc::from(path),
        operation_id: None,
        parameters: Vec::new(),
        context: Schema::any(),
        body_required: false,
        response: ResponseSchema::default(),
        security: Vec::new(),
    })
}

fn router(routes: &[(Method, &str)]) -> Router {
    Router::new(routes.iter().map(|(m, p)| op(m.clone(), p)).collect()).unwrap()
}

#[test]
fn test_named_segment_is_captured() {
    let router = router(&[(Method::GET, "/user/{id}")]);
    let m = router.route("GET", "/user/3").unwrap();
    assert_eq!(&*m.route.path, "/user/{id}");
    assert_eq!(m.get_path_param("id"), Some("3"));
    assert_eq!(m.index, 0);
}

#[test]
fn test_literal_mismatch_is_not_found() {
    let router = router(&[(Method::GET, "/user/{id}")]);
    assert!(router.route("GET", "/users/3").is_none());
    assert!(router.route("GET", "/user").is_none());
    assert!(router.route("GET", "/user/3/posts").is_none());
    assert!(router.route("GET", "/user/").is_none());
}

#[test]
fn test_method_is_case_sensitive() {
    let router = router(&[(Method::GET, "/user/{id}")]);
    assert!(router.route("get", "/user/3").is_none());
    assert!(router.route("POST", "/user/3").is_none());
}

#[test]
fn test_root_path() {
    let router = router(&[(Method::GET, "/")]);
    assert!(router.route("GET", "/").is_some());
    assert!(router.route("GET", "/x").is_none());
}

#[test]
fn test_params_are_percent_decoded() {
    let router = router(&[(Method::GET, "/files/{name}")]);
    let m = router.route("GET", "/files/a%20b%2Fc").unwrap();
    assert_eq!(m.get_path_param("name"), Some("a b/c"));
}

#[test]
fn test_multiple_params() {
    let router = router(&[(Method::GET, "/users/{user_id}/posts/{post_id}")]);
    let m = router.route("GET", "/users/7/posts/42").unwrap();
    let params = m.path_params_map();
    assert_eq!(params.get("user_id").map(String::as_str), Some("7"));
    assert_eq!(params.get("post_id").map(String::as_str), Some("42"));
}

#[test]
fn test_template_segment() {
    let router = router(&[(Method::GET, "/reports/{day}.json")]);
    let m = router.route("GET", "/reports/2024-01-01.json").unwrap();
    assert_eq!(m.get_path_param("day"), Some("2024-01-01"));
    assert!(router.route("GET", "/reports/.json").is_none());
    assert!(router.route("GET", "/reports/2024-01-01.xml").is_none());
}

#[test]
fn test_literal_beats_param_regardless_of_order() {
    let router = router(&[(Method::GET, "/user/{id}"), (Method::GET, "/user/me")]);
    let me = router.route("GET", "/user/me").unwrap();
    assert_eq!(&*me.route.path, "/user/me");
    assert_eq!(me.index, 1);
    let other = router.route("GET", "/user/5").unwrap();
    assert_eq!(&*other.route.path, "/user/{id}");
}

#[test]
fn test_same_shape_routes_are_ambiguous() {
    let err = Router::new(vec![
        op(Method::GET, "/user/{id}"),
        op(Method::GET, "/user/{name}"),
    ])
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::AmbiguousRoute { .. }));
}

#[test]
fn test_same_shape_different_methods_are_fine() {
    let router = router(&[(Method::GET, "/user/{id}"), (Method::DELETE, "/user/{name}")]);
    let m = router.route("DELETE", "/user/bob").unwrap();
    assert_eq!(m.get_path_param("name"), Some("bob"));
}

#[test]
fn test_segment_parsing() {
    let router = router(&[(Method::GET, "/a/{b}/c{d}.txt")]);
    let segments = router.routes()[0].segments();
    assert_eq!(segments[0], Segment::Literal("a".to_string()));
    assert_eq!(segments[1], Segment::Param(Arc::from("b")));
    assert!(matches!(&segments[2], Segment::Template { prefix, suffix, .. } if prefix == "c" && suffix == ".txt"));
}
