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
        .header("x-amz-target", format!("AmazonSNS.{target}"))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_sns_topic_and_publish() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.clone().oneshot(req("CreateTopic", json!({"Name": "my-topic"}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let topic_arn = body_json(resp).await["TopicArn"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(req("ListTopics", json!({}))).await.unwrap();
    let topics = body_json(resp).await;
    assert_eq!(topics["Topics"].as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(req(
            "Subscribe",
            json!({"TopicArn": topic_arn, "Protocol": "http", "Endpoint": "http://example.com/hook"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let sub_arn = body_json(resp).await["SubscriptionArn"].as_str().unwrap().to_string();

    let resp = app.clone().oneshot(req("ListSubscriptionsByTopic", json!({"TopicArn": topic_arn}))).await.unwrap();
    let subs = body_json(resp).await;
    assert_eq!(subs["Subscriptions"].as_array().unwrap().len(), 1);

    let resp = app
        .clone()
        .oneshot(req("Publish", json!({"TopicArn": topic_arn, "Message": "hello subscribers"})))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["MessageId"].is_string());

    let resp = app.clone().oneshot(req("Unsubscribe", json!({"SubscriptionArn": sub_arn}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(req("DeleteTopic", json!({"TopicArn": topic_arn}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_create_topic_requires_name() {
    let emulator = Arc::new(Emulator::in_memory().unwrap());
    let app = gateway::create_router(emulator);

    let resp = app.oneshot(req("CreateTopic", json!({}))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
