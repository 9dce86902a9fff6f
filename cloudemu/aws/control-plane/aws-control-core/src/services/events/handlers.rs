//! Event bus wire adapter: `x-amz-target`-dispatched AWS JSON 1.1.
//! `PutEvents` delegates matching and delivery entirely to
//! [`aws_data_core::fabric::EventFabric`]; this module only does
//! request/response shaping.

use crate::error::ApiError;
use crate::Emulator;
use aws_data_core::error::{EmulatorError, Result};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub async fn handle_request(
    State(emulator): State<Arc<Emulator>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let target = headers.get("x-amz-target").and_then(|h| h.to_str().ok()).unwrap_or("");
    let action = target.rsplit('.').next().unwrap_or(target);
    info!("eventbridge: {action}");

    let result = match action {
        "CreateEventBus" => create_event_bus(&emulator, body).await,
        "DeleteEventBus" => delete_event_bus(&emulator, body).await,
        "ListEventBuses" => list_event_buses(&emulator, body).await,
        "PutRule" => put_rule(&emulator, body).await,
        "ListRules" => list_rules(&emulator, body).await,
        "DeleteRule" => delete_rule(&emulator, body).await,
        "PutTargets" => put_targets(&emulator, body).await,
        "ListTargetsByRule" => list_targets_by_rule(&emulator, body).await,
        "RemoveTargets" => remove_targets(&emulator, body).await,
        "PutEvents" => put_events(&emulator, body).await,
        _ => Err(EmulatorError::UnknownOperation(action.to_string())),
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn create_event_bus(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    let bus = emulator.events.storage.create_event_bus(name)?;
    Ok(json!({ "EventBusArn": bus.arn }))
}

async fn delete_event_bus(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    emulator.events.storage.delete_event_bus(name)?;
    Ok(json!({}))
}

async fn list_event_buses(emulator: &Emulator, _body: Value) -> Result<Value> {
    let buses = emulator.events.storage.list_event_buses()?;
    let list: Vec<Value> = buses.into_iter().map(|b| json!({ "Name": b.name, "Arn": b.arn })).collect();
    Ok(json!({ "EventBuses": list }))
}

async fn put_rule(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    let bus_name = body["EventBusName"].as_str().unwrap_or("default");
    let pattern = body["EventPattern"].as_str();
    let schedule = body["ScheduleExpression"].as_str();
    let state = body["State"].as_str().unwrap_or("ENABLED");
    let rule = emulator.events.storage.put_rule(bus_name, name, pattern, schedule, state)?;
    Ok(json!({ "RuleArn": rule.arn }))
}

async fn list_rules(emulator: &Emulator, body: Value) -> Result<Value> {
    let bus_name = body["EventBusName"].as_str().unwrap_or("default");
    let rules = emulator.events.storage.list_rules(bus_name)?;
    let list: Vec<Value> = rules
        .into_iter()
        .map(|r| json!({ "Name": r.name, "Arn": r.arn, "EventPattern": r.event_pattern, "State": r.state, "ScheduleExpression": r.schedule_expression }))
        .collect();
    Ok(json!({ "Rules": list }))
}

async fn delete_rule(emulator: &Emulator, body: Value) -> Result<Value> {
    let bus_name = body["EventBusName"].as_str().unwrap_or("default");
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    emulator.events.storage.delete_rule(bus_name, name)?;
    Ok(json!({}))
}

async fn put_targets(emulator: &Emulator, body: Value) -> Result<Value> {
    let bus_name = body["EventBusName"].as_str().unwrap_or("default");
    let rule_name = body["Rule"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Rule".into()))?;
    let entries = body["Targets"].as_array().ok_or_else(|| EmulatorError::InvalidArgument("Missing Targets".into()))?;

    let targets: Vec<(String, String, Option<String>)> = entries
        .iter()
        .map(|t| {
            (
                t["Id"].as_str().unwrap_or_default().to_string(),
                t["Arn"].as_str().unwrap_or_default().to_string(),
                t["Input"].as_str().map(str::to_string),
            )
        })
        .collect();

    emulator.events.storage.put_targets(bus_name, rule_name, &targets)?;
    Ok(json!({ "FailedEntries": [], "FailedEntryCount": 0 }))
}

async fn list_targets_by_rule(emulator: &Emulator, body: Value) -> Result<Value> {
    let bus_name = body["EventBusName"].as_str().unwrap_or("default");
    let rule_name = body["Rule"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Rule".into()))?;
    let targets = emulator.events.storage.list_targets(bus_name, rule_name)?;
    let list: Vec<Value> = targets.into_iter().map(|t| json!({ "Id": t.target_id, "Arn": t.arn, "Input": t.input_transformer })).collect();
    Ok(json!({ "Targets": list }))
}

async fn remove_targets(emulator: &Emulator, body: Value) -> Result<Value> {
    let bus_name = body["EventBusName"].as_str().unwrap_or("default");
    let rule_name = body["Rule"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Rule".into()))?;
    let ids: Vec<String> = body["Ids"].as_array().map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect()).unwrap_or_default();
    emulator.events.storage.remove_targets(bus_name, rule_name, &ids)?;
    Ok(json!({ "FailedEntries": [], "FailedEntryCount": 0 }))
}

async fn put_events(emulator: &Emulator, body: Value) -> Result<Value> {
    let entries = body["Entries"].as_array().ok_or_else(|| EmulatorError::InvalidArgument("Missing Entries".into()))?;
    let mut results = Vec::new();

    for entry in entries {
        let bus_name = entry["EventBusName"].as_str().unwrap_or("default");
        let source = entry["Source"].as_str().unwrap_or("");
        let detail_type = entry["DetailType"].as_str().unwrap_or("");
        let detail: Value = entry["Detail"].as_str().and_then(|s| serde_json::from_str(s).ok()).unwrap_or(json!({}));

        let delivered = emulator.events.fabric.dispatch_event(bus_name, detail_type, source, detail).await?;
        info!(bus = bus_name, delivered, "dispatched event");
        results.push(json!({ "EventId": uuid::Uuid::new_v4().to_string() }));
    }

    Ok(json!({ "Entries": results, "FailedEntryCount": 0 }))
}
