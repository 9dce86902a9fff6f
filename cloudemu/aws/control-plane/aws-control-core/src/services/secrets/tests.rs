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
        .header("x-amz-target", format!("secretsmanager.{target}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_secret_lifecycle() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app
        .clone()
        .oneshot(req("CreateSecret", json!({"Name": "db/password", "SecretString": "s3cret"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created = body_json(resp).await;
    assert_eq!(created["Name"], "db/password");

    let resp = app.clone().oneshot(req("GetSecretValue", json!({"SecretId": "db/password"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["SecretString"], "s3cret");

    let resp = app
        .clone()
        .oneshot(req("PutSecretValue", json!({"SecretId": "db/password", "SecretString": "new-value"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(req("GetSecretValue", json!({"SecretId": "db/password"}))).await.unwrap();
    assert_eq!(body_json(resp).await["SecretString"], "new-value");

    let resp = app.clone().oneshot(req("ListSecrets", json!({}))).await.unwrap();
    assert_eq!(body_json(resp).await["SecretList"].as_array().unwrap().len(), 1);

    let resp = app.clone().oneshot(req("DeleteSecret", json!({"SecretId": "db/password"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Deletion is soft: it hides the secret from DescribeSecret/ListSecrets
    // but doesn't retroactively invalidate already-issued version rows.
    let resp = app.oneshot(req("DescribeSecret", json!({"SecretId": "db/password"}))).await.unwrap();
    assert_ne!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_secret_value_requires_secret_id() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.oneshot(req("GetSecretValue", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
