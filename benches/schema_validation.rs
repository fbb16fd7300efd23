use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use oapi_contract::compiler::{compile, CompileOptions, CompiledSchema};
use oapi_contract::router::Router;
use oapi_contract::spec::load_api;
use serde_json::{json, Value};
use std::hint::black_box;
use std::sync::Arc;

fn order_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "customer", "lines"],
        "properties": {
            "id": { "type": "integer", "minimum": 1 },
            "customer": {
                "type": "object",
                "required": ["name", "email"],
                "properties": {
                    "name": { "type": "string", "minLength": 1 },
                    "email": { "type": "string", "format": "email" }
                }
            },
            "lines": {
                "type": "array",
                "minItems": 1,
                "items": { "$ref": "#/definitions/line" }
            },
            "note": { "type": "string", "nullable": true }
        },
        "definitions": {
            "line": {
                "type": "object",
                "required": ["sku", "qty"],
                "additionalProperties": false,
                "properties": {
                    "sku": { "type": "string", "pattern": "^[A-Z]{3}-[0-9]{4}$" },
                    "qty": { "type": "integer", "minimum": 1 }
                }
            }
        }
    })
}

fn order(lines: usize, valid: bool) -> Value {
    let lines: Vec<Value> = (0..lines)
        .map(|i| {
            if valid {
                json!({ "sku": format!("ABC-{:04}", i), "qty": i + 1 })
            } else {
                json!({ "sku": "bad", "qty": 0, "extra": true })
            }
        })
        .collect();
    json!({
        "id": 7,
        "customer": { "name": "Ada", "email": if valid { "ada@example.com" } else { "nope" } },
        "lines": lines,
        "note": null
    })
}

fn compiled(runtime: &tokio::runtime::Runtime) -> CompiledSchema {
    runtime
        .block_on(compile(order_schema().into(), &CompileOptions::default()))
        .unwrap()
}

fn bench_validation(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let schema = compiled(&runtime);

    let mut group = c.benchmark_group("validate");
    for lines in [1usize, 10, 100] {
        let good = order(lines, true);
        let bad = order(lines, false);
        group.bench_function(format!("valid/{lines}_lines"), |b| {
            b.iter(|| black_box(schema.validate(black_box(&good))))
        });
        group.bench_function(format!("invalid/{lines}_lines"), |b| {
            b.iter(|| black_box(schema.validate(black_box(&bad))))
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    c.bench_function("compile/order_schema", |b| {
        b.iter(|| black_box(compiled(&runtime)))
    });
}

fn bench_routing(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut paths = serde_json::Map::new();
    for resource in ["users", "orders", "invoices", "products", "stores"] {
        let ok = json!({ "responses": { "200": { "description": "ok" } } });
        paths.insert(format!("/{resource}"), json!({ "get": ok, "post": ok }));
        paths.insert(format!("/{resource}/{{id}}"), json!({ "get": ok, "delete": ok }));
        paths.insert(format!("/{resource}/{{id}}/history/{{entry}}"), json!({ "get": ok }));
    }
    let doc = json!({ "openapi": "3.0.3", "info": { "title": "bench", "version": "1" }, "paths": paths });
    let api = runtime
        .block_on(load_api(doc.into(), &CompileOptions::default()))
        .unwrap();
    let router = Router::new(api.operations.iter().cloned().map(Arc::new).collect()).unwrap();

    c.bench_function("route/deep_param", |b| {
        b.iter(|| black_box(router.route(Method::GET.as_str(), black_box("/stores/42/history/9"))))
    });
    c.bench_function("route/miss", |b| {
        b.iter(|| black_box(router.route("GET", black_box("/warehouses/1"))))
    });
}

criterion_group!(benches, bench_validation, bench_compile, bench_routing);
criterion_main!(benches);
