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
        .header("x-amz-target", format!("AWSEvents.{target}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_event_bus_rule_target_and_dispatch() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.clone().oneshot(req("CreateEventBus", json!({"Name": "orders"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(req(
            "PutRule",
            json!({"Name": "order-placed", "EventBusName": "orders", "EventPattern": "{\"source\":[\"app.orders\"]}"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(req(
            "PutTargets",
            json!({
                "Rule": "order-placed",
                "EventBusName": "orders",
                "Targets": [{"Id": "t1", "Arn": "arn:aws:sqs:us-east-1:000000000000:orders-queue"}],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["FailedEntryCount"], 0);

    let resp = app.clone().oneshot(req("ListRules", json!({"EventBusName": "orders"}))).await.unwrap();
    assert_eq!(body_json(resp).await["Rules"].as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(req(
            "ListTargetsByRule",
            json!({"Rule": "order-placed", "EventBusName": "orders"}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["Targets"].as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(req(
            "PutEvents",
            json!({"Entries": [{"EventBusName": "orders", "Source": "app.orders", "DetailType": "OrderPlaced", "Detail": "{\"id\":1}"}]}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["FailedEntryCount"], 0);

    let resp = app
        .clone()
        .oneshot(req("RemoveTargets", json!({"Rule": "order-placed", "EventBusName": "orders", "Ids": ["t1"]})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(req("DeleteRule", json!({"Name": "order-placed", "EventBusName": "orders"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_put_rule_requires_name() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.oneshot(req("PutRule", json!({"EventBusName": "orders"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
