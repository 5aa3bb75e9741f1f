//! HTTP tests against the router, no sockets involved

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use flat_earth::hcl_documents::ConfigRoot;
use flat_earth::service::{GraphService, ServiceConfig};
use flat_earth::toolchain::{HclToolchain, SchemaSource};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use tower::ServiceExt;

const WIDGET_A: &str = "resource \"widget\" \"a\" {\n  count = 1\n}\n";

const SCHEMAS: &str = r#"{
    "format_version": "1.0",
    "provider_schemas": {
        "registry.terraform.io/acme/widget": {
            "resource_schemas": {
                "widget": {
                    "version": 0,
                    "block": {
                        "attributes": {
                            "size": {"type": "number", "optional": true},
                            "id": {"type": "string", "computed": true}
                        }
                    }
                }
            }
        }
    }
}"#;

fn router(root: &Path, schema_source: SchemaSource, enforce_schema: bool) -> Router {
    GraphService::new(
        ServiceConfig {
            root: ConfigRoot::new(root),
            enforce_schema,
        },
        HclToolchain::new(schema_source),
    )
    .router()
}

fn config(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        std::fs::write(dir.path().join(name), contents).unwrap();
    }
    dir
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    (status, bytes.to_vec())
}

async fn call_json(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = call(router, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn update(name: &str, label: &str, attribute: &str, tag: &str, value: Value) -> Value {
    json!({
        "blockType": "resource",
        "blockName": name,
        "blockLabel": label,
        "attributeName": attribute,
        "attributeType": tag,
        "newValue": value
    })
}

#[tokio::test]
async fn update_rewrites_attribute() {
    let dir = config(&[("main.tf", WIDGET_A)]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let (status, graph) = call_json(
        &router,
        "POST",
        "/update-flat-earth-graph",
        Some(update("widget", "a", "count", "number", json!(2))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("main.tf")).unwrap(),
        "resource \"widget\" \"a\" {\n  count = 2\n}\n"
    );
    assert_eq!(graph["widget.a"]["attributes"]["count"]["value"], json!(2));
}

#[tokio::test]
async fn update_accepts_pascal_case_fields() {
    let dir = config(&[("main.tf", WIDGET_A)]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let (status, graph) = call_json(
        &router,
        "POST",
        "/update-flat-earth-graph",
        Some(json!({
            "BlockType": "resource",
            "BlockName": "widget",
            "BlockLabel": "a",
            "AttributeName": "tags",
            "AttributeType": "list",
            "NewValue": [{"type": "string", "value": "blue"}]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["widget.a"]["attributes"]["tags"]["value"], json!(["blue"]));
    assert_eq!(graph["widget.a"]["attributes"]["count"]["value"], json!(1));
}

#[tokio::test]
async fn update_unknown_block() {
    let dir = config(&[("main.tf", WIDGET_A)]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let (status, body) = call_json(
        &router,
        "POST",
        "/update-flat-earth-graph",
        Some(update("widget", "z", "count", "number", json!(2))),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "NotFound");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("main.tf")).unwrap(),
        WIDGET_A
    );
}

#[tokio::test]
async fn update_rejects_bad_input() {
    let dir = config(&[("main.tf", WIDGET_A)]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let cases = [
        (
            update("widget", "a", "count", "number", json!("two")),
            StatusCode::BAD_REQUEST,
            "TypeMismatch",
        ),
        (
            update("widget", "a", "count", "number", json!(1e20)),
            StatusCode::BAD_REQUEST,
            "TypeMismatch",
        ),
        (
            update("widget", "a", "not valid", "number", json!(2)),
            StatusCode::BAD_REQUEST,
            "InvalidIdentifier",
        ),
        (
            json!({"blockType": "resource", "blockName": "widget"}),
            StatusCode::BAD_REQUEST,
            "BadRequest",
        ),
    ];

    for (request, expected_status, expected_kind) in cases {
        let (status, body) = call_json(&router, "POST", "/update-flat-earth-graph", Some(request)).await;
        assert_eq!((status, body["kind"].as_str()), (expected_status, Some(expected_kind)));
    }

    assert_eq!(
        std::fs::read_to_string(dir.path().join("main.tf")).unwrap(),
        WIDGET_A
    );
}

#[tokio::test]
async fn update_enforces_schema() {
    let dir = config(&[("main.tf", WIDGET_A), ("schema.json", SCHEMAS)]);
    let router = router(
        dir.path(),
        SchemaSource::File(dir.path().join("schema.json")),
        true,
    );

    let (status, body) = call_json(
        &router,
        "POST",
        "/update-flat-earth-graph",
        Some(update("widget", "a", "colour", "string", json!("red"))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "AttributeNotWritable");

    for attribute in ["size", "count"] {
        let (status, _) = call(
            &router,
            "POST",
            "/update-flat-earth-graph",
            Some(update("widget", "a", attribute, "number", json!(3))),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{attribute}");
    }
}

#[tokio::test]
async fn create_block_without_persisting() {
    let dir = config(&[]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let (status, bytes) = call(
        &router,
        "POST",
        "/create-new-block",
        Some(json!({
            "blockType": "resource",
            "blockName": "widget",
            "blockLabel": "b",
            "attributes": {"count": {"type": "number", "value": 5}}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let parsed: Value = hcl::from_str(std::str::from_utf8(&bytes).unwrap()).unwrap();
    assert_eq!(parsed, json!({"resource": {"widget": {"b": {"count": 5}}}}));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn create_block_and_persist() {
    let dir = config(&[("main.tf", WIDGET_A)]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let (status, bytes) = call(
        &router,
        "POST",
        "/create-new-block",
        Some(json!({
            "blockType": "resource",
            "blockName": "widget",
            "blockLabel": "b",
            "attributes": {"count": {"type": "number", "value": 5}},
            "persist": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(std::fs::read(dir.path().join("widget_b.tf")).unwrap(), bytes);

    let (_, graph) = call_json(&router, "GET", "/get-flat-earth-graph", None).await;
    let addresses: Vec<_> = graph.as_object().unwrap().keys().cloned().collect();
    assert_eq!(addresses, ["widget.a", "widget.b"]);
    assert_eq!(graph["widget.b"]["attributes"]["count"]["value"], json!(5));
}

#[tokio::test]
async fn create_block_rejects_bad_identifier() {
    let dir = config(&[]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let (status, body) = call_json(
        &router,
        "POST",
        "/create-new-block",
        Some(json!({
            "blockType": "not valid",
            "blockName": "widget",
            "blockLabel": "b",
            "attributes": {}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidIdentifier");
}

#[tokio::test]
async fn graph_of_empty_configuration() {
    let dir = config(&[]);
    let router = router(dir.path(), SchemaSource::default(), false);

    let (status, graph) = call_json(&router, "GET", "/get-flat-earth-graph", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph, json!({}));
}

#[tokio::test]
async fn graph_of_missing_root() {
    let dir = config(&[]);
    let router = router(&dir.path().join("missing"), SchemaSource::default(), false);

    let (status, body) = call_json(&router, "GET", "/get-flat-earth-graph", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "ToolchainLoadFailure");
}

#[tokio::test]
async fn provider_schema() {
    let dir = config(&[("schema.json", SCHEMAS)]);
    let router = router(
        dir.path(),
        SchemaSource::File(dir.path().join("schema.json")),
        false,
    );

    let (status, schema) = call_json(&router, "GET", "/get-provider-schema", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        schema["registry.terraform.io/acme/widget"]["resources"]["widget"]["size"],
        json!({"type": "number", "required": false, "optional": true, "computed": false, "sensitive": false})
    );
    assert_eq!(
        schema["registry.terraform.io/acme/widget"]["dataSources"],
        json!({})
    );
}

#[tokio::test]
async fn provider_schema_command_fails() {
    let dir = config(&[]);
    let router = router(
        dir.path(),
        SchemaSource::Command(vec!["flat-earth-no-such-program".into()]),
        false,
    );

    let (status, body) = call_json(&router, "GET", "/get-provider-schema", None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "ToolchainLoadFailure");
}
