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
        .header("x-amz-target", format!("AWSStepFunctions.{target}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn pass_through_definition() -> String {
    json!({
        "StartAt": "Greet",
        "States": {
            "Greet": { "Type": "Pass", "Result": {"message": "hello"}, "End": true }
        }
    })
    .to_string()
}

#[tokio::test]
async fn test_express_execution_runs_synchronously() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app
        .clone()
        .oneshot(req(
            "CreateStateMachine",
            json!({"name": "greeter", "definition": pass_through_definition(), "type": "EXPRESS"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let machine_arn = body_json(resp).await["stateMachineArn"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(req("ListStateMachines", json!({}))).await.unwrap();
    assert_eq!(body_json(resp).await["stateMachines"].as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(req("DescribeStateMachine", json!({"stateMachineArn": machine_arn})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["type"], "EXPRESS");

    let resp = app
        .clone()
        .oneshot(req(
            "StartExecution",
            json!({"stateMachineArn": machine_arn, "name": "run-1", "input": "{}"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let start = body_json(resp).await;
    let execution_arn = start["executionArn"].as_str().unwrap().to_string();
    let output: serde_json::Value = serde_json::from_str(start["output"].as_str().unwrap()).unwrap();
    assert_eq!(output["message"], "hello");

    let resp = app
        .clone()
        .oneshot(req("DescribeExecution", json!({"executionArn": execution_arn})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "SUCCEEDED");

    let resp = app.oneshot(req("DeleteStateMachine", json!({"stateMachineArn": machine_arn}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_state_machine_requires_parseable_definition() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app
        .oneshot(req("CreateStateMachine", json!({"name": "broken", "definition": "not json"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
