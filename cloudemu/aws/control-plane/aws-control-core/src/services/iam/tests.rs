use crate::gateway;
use crate::Emulator;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap()
}

fn form_req(pairs: &[(&str, &str)]) -> Request<Body> {
    let body = pairs
        .iter()
        .map(|(k, v)| format!("{k}={}", utf8_percent_encode(v, NON_ALPHANUMERIC)))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_role_and_policy_lifecycle() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let assume_doc = r#"{"Version":"2012-10-17","Statement":[]}"#;
    let resp = app
        .clone()
        .oneshot(form_req(&[
            ("Action", "CreateRole"),
            ("RoleName", "lambda-exec"),
            ("AssumeRolePolicyDocument", assume_doc),
        ]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let role_name = body["CreateRoleResponse"]["CreateRoleResult"]["Role"]["RoleName"].as_str().unwrap();
    assert_eq!(role_name, "lambda-exec");

    let resp = app
        .clone()
        .oneshot(form_req(&[("Action", "GetRole"), ("RoleName", "lambda-exec")]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(form_req(&[("Action", "ListRoles")])).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["ListRolesResponse"]["ListRolesResult"]["Roles"].as_array().unwrap().len(), 1);

    let policy_doc = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"*","Resource":"*"}]}"#;
    let resp = app
        .clone()
        .oneshot(form_req(&[("Action", "CreatePolicy"), ("PolicyName", "admin"), ("PolicyDocument", policy_doc)]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let policy_arn = body["CreatePolicyResponse"]["CreatePolicyResult"]["Policy"]["Arn"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(form_req(&[("Action", "AttachRolePolicy"), ("RoleName", "lambda-exec"), ("PolicyArn", &policy_arn)]))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(form_req(&[("Action", "CreateUser"), ("UserName", "alice")])).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.clone().oneshot(form_req(&[("Action", "CreateAccessKey"), ("UserName", "alice")])).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["CreateAccessKeyResponse"]["CreateAccessKeyResult"]["AccessKey"]["AccessKeyId"].is_string());

    let resp = app.oneshot(form_req(&[("Action", "ListUsers")])).await.unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["ListUsersResponse"]["ListUsersResult"]["Users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_action_not_implemented() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.oneshot(form_req(&[("Action", "NotARealAction")])).await.unwrap();
    assert_ne!(resp.status(), StatusCode::OK);
}
