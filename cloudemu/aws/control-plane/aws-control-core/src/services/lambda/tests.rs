use crate::gateway;
use crate::Emulator;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn fake_zip_base64() -> String {
    // Not a real zip; `create_function`/`get_function`/etc. only store
    // and round-trip the bytes, they never parse the archive.
    general_purpose::STANDARD.encode(b"PK\x03\x04 not a real zip, just bytes to round-trip")
}

#[tokio::test]
async fn test_lambda_function_lifecycle() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let create_body = json!({
        "FunctionName": "my-fn",
        "Runtime": "python3.12",
        "Role": "arn:aws:iam::000000000000:role/lambda-role",
        "Handler": "handler.main",
        "Code": { "ZipFile": fake_zip_base64() },
    });

    let req = Request::builder()
        .method("POST")
        .uri("/2015-03-31/functions")
        .header("content-type", "application/json")
        .body(Body::from(create_body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["FunctionName"], "my-fn");
    assert_eq!(body["Runtime"], "python3.12");

    let req = Request::builder().method("GET").uri("/2015-03-31/functions/my-fn").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["Configuration"]["FunctionName"], "my-fn");

    let req = Request::builder().method("GET").uri("/2015-03-31/functions").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let body: Value = serde_json::from_slice(&axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["Functions"].as_array().unwrap().len(), 1);

    let req = Request::builder().method("DELETE").uri("/2015-03-31/functions/my-fn").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().method("GET").uri("/2015-03-31/functions/my-fn").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_ne!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_function_rejects_missing_code() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let create_body = json!({
        "FunctionName": "no-code-fn",
        "Runtime": "python3.12",
        "Role": "arn:aws:iam::000000000000:role/lambda-role",
        "Handler": "handler.main",
    });

    let req = Request::builder()
        .method("POST")
        .uri("/2015-03-31/functions")
        .header("content-type", "application/json")
        .body(Body::from(create_body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
