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
        .header("x-amz-target", format!("AWSCognitoIdentityProviderService.{target}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_user_pool_signup_and_auth() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.clone().oneshot(req("CreateUserPool", json!({"PoolName": "my-pool"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let pool_id = body_json(resp).await["UserPool"]["Id"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(req(
            "SignUp",
            json!({"ClientId": pool_id, "Username": "alice", "Password": "hunter22"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["UserSub"].is_string());

    let resp = app
        .clone()
        .oneshot(req("ConfirmSignUp", json!({"ClientId": pool_id, "Username": "alice"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(req(
            "InitiateAuth",
            json!({"ClientId": pool_id, "AuthParameters": {"USERNAME": "alice", "PASSWORD": "hunter22"}}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let auth = body_json(resp).await;
    assert!(auth["AuthenticationResult"]["AccessToken"].as_str().unwrap().starts_with("local-access-token."));
    assert_eq!(auth["AuthenticationResult"]["TokenType"], "Bearer");

    let resp = app
        .clone()
        .oneshot(req("AdminGetUser", json!({"UserPoolId": pool_id, "Username": "alice"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["Username"], "alice");

    let resp = app.oneshot(req("ListUsers", json!({"UserPoolId": pool_id}))).await.unwrap();
    assert_eq!(body_json(resp).await["Users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_initiate_auth_rejects_wrong_password() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.clone().oneshot(req("CreateUserPool", json!({"PoolName": "my-pool"}))).await.unwrap();
    let pool_id = body_json(resp).await["UserPool"]["Id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(req("SignUp", json!({"ClientId": pool_id, "Username": "bob", "Password": "correct-horse"})))
        .await
        .unwrap();
    app.clone().oneshot(req("ConfirmSignUp", json!({"ClientId": pool_id, "Username": "bob"}))).await.unwrap();

    let resp = app
        .oneshot(req(
            "InitiateAuth",
            json!({"ClientId": pool_id, "AuthParameters": {"USERNAME": "bob", "PASSWORD": "wrong"}}),
        ))
        .await
        .unwrap();
    assert_ne!(resp.status(), StatusCode::OK);
}
