//! Queue wire adapter: `x-amz-target`-dispatched AWS JSON 1.1.

use crate::error::ApiError;
use crate::services::sqs::SqsService;
use crate::Emulator;
use aws_data_core::error::{EmulatorError, Result};
use aws_data_core::queue::QueueAttributes;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub async fn handle_request(
    State(emulator): State<Arc<Emulator>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let target = headers.get("x-amz-target").and_then(|h| h.to_str().ok()).unwrap_or("");
    let action = target.rsplit('.').next().unwrap_or(target);
    info!("sqs: {action}");

    let result = match action {
        "CreateQueue" => create_queue(&emulator, body).await,
        "DeleteQueue" => delete_queue(&emulator, body).await,
        "ListQueues" => list_queues(&emulator, body).await,
        "GetQueueAttributes" => get_queue_attributes(&emulator, body).await,
        "SendMessage" => send_message(&emulator, body).await,
        "ReceiveMessage" => receive_message(&emulator, body).await,
        "DeleteMessage" => delete_message(&emulator, body).await,
        "ChangeMessageVisibility" => change_message_visibility(&emulator, body).await,
        _ => Err(EmulatorError::UnknownOperation(action.to_string())),
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn queue_name(body: &Value) -> Result<&str> {
    body["QueueUrl"]
        .as_str()
        .map(SqsService::queue_name_from_url)
        .or_else(|| body["QueueName"].as_str())
        .ok_or_else(|| EmulatorError::InvalidArgument("Missing QueueUrl or QueueName".into()))
}

async fn create_queue(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["QueueName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing QueueName".into()))?;
    let attrs_in = body["Attributes"].as_object();
    let mut attrs = QueueAttributes::default();
    if let Some(map) = attrs_in {
        apply_attributes(&mut attrs, map);
    }
    if name.ends_with(".fifo") {
        attrs.fifo = true;
    }
    emulator.sqs.queues.create_queue(name, attrs)?;
    Ok(json!({ "QueueUrl": emulator.sqs.queue_url(name) }))
}

fn apply_attributes(attrs: &mut QueueAttributes, map: &Map<String, Value>) {
    if let Some(v) = map.get("VisibilityTimeout").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()) {
        attrs.visibility_timeout_secs = v;
    }
    if let Some(v) = map.get("MessageRetentionPeriod").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()) {
        attrs.message_retention_secs = v;
    }
    if let Some(v) = map.get("FifoQueue").and_then(|v| v.as_str()) {
        attrs.fifo = v == "true";
    }
    if let Some(v) = map.get("ContentBasedDeduplication").and_then(|v| v.as_str()) {
        attrs.content_based_dedup = v == "true";
    }
    if let Some(policy) = map.get("RedrivePolicy").and_then(|v| v.as_str()) {
        if let Ok(parsed) = serde_json::from_str::<Value>(policy) {
            attrs.dead_letter_target = parsed["deadLetterTargetArn"].as_str().map(|s| s.rsplit(':').next().unwrap_or(s).to_string());
            attrs.max_receive_count = parsed["maxReceiveCount"].as_str().and_then(|s| s.parse().ok());
        }
    }
}

async fn delete_queue(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = queue_name(&body)?;
    emulator.sqs.queues.delete_queue(name)?;
    Ok(json!({}))
}

async fn list_queues(emulator: &Emulator, _body: Value) -> Result<Value> {
    let urls: Vec<String> = emulator.sqs.queues.list_queues().iter().map(|n| emulator.sqs.queue_url(n)).collect();
    Ok(json!({ "QueueUrls": urls }))
}

async fn get_queue_attributes(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = queue_name(&body)?;
    let attrs = emulator.sqs.queues.queue_attributes(name)?;
    let (ready, in_flight) = emulator.sqs.queues.approximate_depth(name)?;
    Ok(json!({
        "Attributes": {
            "VisibilityTimeout": attrs.visibility_timeout_secs.to_string(),
            "MessageRetentionPeriod": attrs.message_retention_secs.to_string(),
            "FifoQueue": attrs.fifo.to_string(),
            "ApproximateNumberOfMessages": ready.to_string(),
            "ApproximateNumberOfMessagesNotVisible": in_flight.to_string(),
        }
    }))
}

async fn send_message(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = queue_name(&body)?.to_string();
    let message_body = body["MessageBody"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing MessageBody".into()))?.to_string();
    let group_id = body["MessageGroupId"].as_str().map(str::to_string);
    let dedup_id = body["MessageDeduplicationId"].as_str().map(str::to_string);
    let attributes: HashMap<String, String> = body["MessageAttributes"]
        .as_object()
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v["StringValue"].as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let id = emulator.sqs.queues.send_message(&name, message_body, attributes, group_id, dedup_id)?;
    match id {
        Some(message_id) => Ok(json!({ "MessageId": message_id, "MD5OfMessageBody": "" })),
        None => Ok(json!({})),
    }
}

async fn receive_message(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = queue_name(&body)?.to_string();
    let max = body["MaxNumberOfMessages"].as_u64().unwrap_or(1) as usize;
    let wait_secs = body["WaitTimeSeconds"].as_u64().unwrap_or(0);

    let received = emulator.sqs.queues.receive_message(&name, Duration::from_secs(wait_secs), max).await?;
    let messages: Vec<Value> = received
        .into_iter()
        .map(|(msg, receipt_handle)| {
            json!({
                "MessageId": msg.message_id,
                "ReceiptHandle": receipt_handle,
                "Body": msg.body,
                "Attributes": { "ApproximateReceiveCount": msg.receive_count.to_string() },
            })
        })
        .collect();
    Ok(json!({ "Messages": messages }))
}

async fn delete_message(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = queue_name(&body)?.to_string();
    let receipt_handle = body["ReceiptHandle"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing ReceiptHandle".into()))?;
    emulator.sqs.queues.delete_message(&name, receipt_handle)?;
    Ok(json!({}))
}

async fn change_message_visibility(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = queue_name(&body)?.to_string();
    let receipt_handle = body["ReceiptHandle"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing ReceiptHandle".into()))?;
    let timeout = body["VisibilityTimeout"].as_u64().unwrap_or(30) as u32;
    emulator.sqs.queues.change_message_visibility(&name, receipt_handle, timeout)?;
    Ok(json!({}))
}
