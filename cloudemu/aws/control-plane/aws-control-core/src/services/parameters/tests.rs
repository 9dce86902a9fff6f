use crate::gateway;
use crate::Emulator;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

async fn body_json(resp: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap()
}

fn req(target: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("x-amz-target", format!("AmazonSSM.{target}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_parameter_put_get_and_path_listing() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app
        .clone()
        .oneshot(req("PutParameter", json!({"Name": "/app/db/host", "Value": "localhost", "Type": "String"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["Version"], 1);

    let resp = app
        .clone()
        .oneshot(req("PutParameter", json!({"Name": "/app/db/port", "Value": "5432", "Type": "String"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(req("GetParameter", json!({"Name": "/app/db/host"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["Parameter"]["Value"], "localhost");

    let resp = app
        .clone()
        .oneshot(req("GetParametersByPath", json!({"Path": "/app/db", "Recursive": true})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["Parameters"].as_array().unwrap().len(), 2);

    let resp = app
        .clone()
        .oneshot(req(
            "PutParameter",
            json!({"Name": "/app/db/host", "Value": "overwritten", "Overwrite": true}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["Version"], 2);

    let resp = app.clone().oneshot(req("DeleteParameter", json!({"Name": "/app/db/port"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(req("GetParameter", json!({"Name": "/app/db/port"}))).await.unwrap();
    assert_ne!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_put_parameter_without_overwrite_rejects_duplicate() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    app.clone()
        .oneshot(req("PutParameter", json!({"Name": "/app/key", "Value": "v1"})))
        .await
        .unwrap();

    let resp = app
        .oneshot(req("PutParameter", json!({"Name": "/app/key", "Value": "v2"})))
        .await
        .unwrap();
    assert_ne!(resp.status(), StatusCode::OK);
}
