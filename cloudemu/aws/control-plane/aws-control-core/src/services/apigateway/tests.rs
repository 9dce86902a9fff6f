use crate::gateway;
use crate::Emulator;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap()
}

#[tokio::test]
async fn test_rest_api_and_resource_lifecycle() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let req = Request::builder()
        .method("POST")
        .uri("/restapis")
        .header("content-type", "application/json")
        .body(Body::from(json!({"name": "my-api", "description": "a test api"}).to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let api = body_json(resp).await;
    let api_id = api["id"].as_str().unwrap().to_string();
    assert_eq!(api["name"], "my-api");

    let req = Request::builder().method("GET").uri(format!("/restapis/{api_id}")).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().method("GET").uri("/restapis").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let list = body_json(resp).await;
    assert_eq!(list["item"].as_array().unwrap().len(), 1);

    let req = Request::builder().method("GET").uri(format!("/restapis/{api_id}/resources")).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let resources = body_json(resp).await;
    let root = &resources["item"].as_array().unwrap()[0];
    assert_eq!(root["pathPart"], "/");
    let root_id = root["id"].as_str().unwrap().to_string();

    let req = Request::builder()
        .method("POST")
        .uri(format!("/restapis/{api_id}/resources/{root_id}"))
        .header("content-type", "application/json")
        .body(Body::from(json!({"pathPart": "hello"}).to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let resource = body_json(resp).await;
    let resource_id = resource["id"].as_str().unwrap().to_string();
    assert_eq!(resource["pathPart"], "hello");

    let req = Request::builder()
        .method("PUT")
        .uri(format!("/restapis/{api_id}/resources/{resource_id}/methods/GET"))
        .header("content-type", "application/json")
        .body(Body::from(json!({"authorizationType": "NONE"}).to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let method = body_json(resp).await;
    assert_eq!(method["httpMethod"], "GET");

    let req = Request::builder()
        .method("PUT")
        .uri(format!("/restapis/{api_id}/resources/{resource_id}/methods/GET/integration"))
        .header("content-type", "application/json")
        .body(Body::from(json!({"uri": "arn:aws:apigateway:us-east-1:lambda:path/2015-03-31/functions/arn:aws:lambda:us-east-1:000000000000:function:my-fn/invocations"}).to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder()
        .method("GET")
        .uri(format!("/restapis/{api_id}/resources/{resource_id}/methods/GET/integration"))
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let integration = body_json(resp).await;
    assert_eq!(integration["functionName"], "my-fn");
}

#[tokio::test]
async fn test_deployed_api_invoke_resolves_nested_resource_path() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());

    let api = emulator.apigateway.storage.create_rest_api("nested-api", None).unwrap();
    let root = emulator.apigateway.storage.list_resources(&api.id).unwrap().into_iter().find(|r| r.path == "/").unwrap();
    let level1 = emulator.apigateway.storage.create_resource(&api.id, &root.id, "orders").unwrap();
    let level2 = emulator.apigateway.storage.create_resource(&api.id, &level1.id, "hello").unwrap();
    assert_eq!(level2.path, "/orders/hello");
    emulator.apigateway.storage.put_method(&api.id, &level2.id, "GET", "NONE").unwrap();
    emulator.apigateway.storage.put_integration(&api.id, &level2.id, "GET", "my-fn").unwrap();

    let invoke_app = crate::gateway::gateway::create_apigateway_invoke_router(emulator);

    let req = Request::builder().method("GET").uri(format!("/{}/prod/orders/hello", api.id)).body(Body::empty()).unwrap();
    let resp = invoke_app.oneshot(req).await.unwrap();
    // find_resource_by_path now resolves "/orders/hello" correctly; the request
    // fails past that point only because no function named "my-fn" was ever
    // created in the lambda service, not because the resource lookup failed.
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.contains("my-fn"), "expected missing-function error, got: {message}");
}

#[tokio::test]
async fn test_create_rest_api_requires_name() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let req = Request::builder()
        .method("POST")
        .uri("/restapis")
        .header("content-type", "application/json")
        .body(Body::from(json!({"description": "missing name"}).to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
