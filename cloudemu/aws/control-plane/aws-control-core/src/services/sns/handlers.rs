//! Pub/sub topic wire adapter: `x-amz-target`-dispatched AWS JSON 1.1.

use crate::error::ApiError;
use crate::Emulator;
use aws_data_core::error::{EmulatorError, Result};
use aws_data_core::pubsub::PublishedMessage;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub async fn handle_request(
    State(emulator): State<Arc<Emulator>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let target = headers.get("x-amz-target").and_then(|h| h.to_str().ok()).unwrap_or("");
    let action = target.rsplit('.').next().unwrap_or(target);
    info!("sns: {action}");

    let result = match action {
        "CreateTopic" => create_topic(&emulator, body).await,
        "ListTopics" => list_topics(&emulator, body).await,
        "DeleteTopic" => delete_topic(&emulator, body).await,
        "Subscribe" => subscribe(&emulator, body).await,
        "Unsubscribe" => unsubscribe(&emulator, body).await,
        "ListSubscriptionsByTopic" => list_subscriptions(&emulator, body).await,
        "Publish" => publish(&emulator, body).await,
        _ => Err(EmulatorError::UnknownOperation(action.to_string())),
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn create_topic(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    let topic = emulator.sns.storage.create_topic(name)?;
    Ok(json!({ "TopicArn": topic.arn }))
}

async fn list_topics(emulator: &Emulator, _body: Value) -> Result<Value> {
    let topics = emulator.sns.storage.list_topics()?;
    let list: Vec<Value> = topics.into_iter().map(|t| json!({ "TopicArn": t.arn })).collect();
    Ok(json!({ "Topics": list }))
}

async fn delete_topic(emulator: &Emulator, body: Value) -> Result<Value> {
    let arn = body["TopicArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing TopicArn".into()))?;
    emulator.sns.storage.delete_topic(arn)?;
    Ok(json!({}))
}

async fn subscribe(emulator: &Emulator, body: Value) -> Result<Value> {
    let topic_arn = body["TopicArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing TopicArn".into()))?;
    let protocol = body["Protocol"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Protocol".into()))?;
    let endpoint = body["Endpoint"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Endpoint".into()))?;
    let filter_policy = body["Attributes"]["FilterPolicy"]
        .as_str()
        .and_then(|s| serde_json::from_str::<Value>(s).ok());

    let record = emulator.sns.storage.create_subscription(topic_arn, protocol, endpoint, filter_policy.as_ref().map(|v| v.to_string()).as_deref())?;

    let rx = emulator
        .sns
        .fabric
        .subscribe(topic_arn, &record.arn, protocol, endpoint, filter_policy)
        .await;

    if protocol == "sqs" {
        let queue_name = endpoint.rsplit(':').next().unwrap_or(endpoint).to_string();
        emulator.sns.spawn_sqs_forwarder(record.arn.clone(), rx, queue_name).await;
    } else if protocol == "lambda" {
        let function_name = endpoint.rsplit(':').next().unwrap_or(endpoint).to_string();
        emulator.sns.spawn_lambda_forwarder(record.arn.clone(), rx, function_name).await;
    }

    Ok(json!({ "SubscriptionArn": record.arn }))
}

async fn unsubscribe(emulator: &Emulator, body: Value) -> Result<Value> {
    let sub_arn = body["SubscriptionArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing SubscriptionArn".into()))?;
    let topic_arn = sub_arn.rsplit_once(':').map(|(t, _)| t).unwrap_or(sub_arn);
    emulator.sns.fabric.unsubscribe(topic_arn, sub_arn).await;
    emulator.sns.stop_forwarder(sub_arn).await;
    emulator.sns.storage.delete_subscription(sub_arn)?;
    Ok(json!({}))
}

async fn list_subscriptions(emulator: &Emulator, body: Value) -> Result<Value> {
    let topic_arn = body["TopicArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing TopicArn".into()))?;
    let subs = emulator.sns.storage.list_subscriptions_by_topic(topic_arn)?;
    let list: Vec<Value> = subs
        .into_iter()
        .map(|s| json!({ "SubscriptionArn": s.arn, "TopicArn": s.topic_arn, "Protocol": s.protocol, "Endpoint": s.endpoint }))
        .collect();
    Ok(json!({ "Subscriptions": list }))
}

async fn publish(emulator: &Emulator, body: Value) -> Result<Value> {
    let topic_arn = body["TopicArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing TopicArn".into()))?;
    let message_body = body["Message"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Message".into()))?;
    let subject = body["Subject"].as_str().map(str::to_string);
    let attributes: HashMap<String, Value> = body["MessageAttributes"]
        .as_object()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v["StringValue"].as_str().map(|s| (k.clone(), json!(s))))
                .collect()
        })
        .unwrap_or_default();

    let message_id = Uuid::new_v4().to_string();
    emulator
        .sns
        .fabric
        .publish(PublishedMessage {
            message_id: message_id.clone(),
            topic_arn: topic_arn.to_string(),
            subject,
            body: message_body.to_string(),
            attributes,
        })
        .await;

    Ok(json!({ "MessageId": message_id }))
}
