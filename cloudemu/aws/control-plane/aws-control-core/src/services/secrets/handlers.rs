//! Secrets store wire adapter: `x-amz-target`-dispatched AWS JSON 1.1,
//! same family DynamoDB and EventBridge use.

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
    info!("secretsmanager: {action}");

    let result = match action {
        "CreateSecret" => create_secret(&emulator, body).await,
        "GetSecretValue" => get_secret_value(&emulator, body).await,
        "PutSecretValue" => put_secret_value(&emulator, body).await,
        "DescribeSecret" => describe_secret(&emulator, body).await,
        "ListSecrets" => list_secrets(&emulator, body).await,
        "DeleteSecret" => delete_secret(&emulator, body).await,
        _ => Err(EmulatorError::UnknownOperation(action.to_string())),
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn secret_name(body: &Value, key: &str) -> Result<String> {
    body[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EmulatorError::InvalidArgument(format!("Missing {key}")))
}

async fn create_secret(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = secret_name(&body, "Name")?;
    let value = body["SecretString"].as_str().unwrap_or_default();
    let description = body["Description"].as_str();
    let meta = emulator.secrets.storage.create_secret(&name, value, description)?;
    Ok(json!({ "ARN": meta.arn, "Name": meta.name, "VersionId": meta.current_version_id }))
}

async fn get_secret_value(emulator: &Emulator, body: Value) -> Result<Value> {
    let id = secret_name(&body, "SecretId")?;
    let version_id = body["VersionId"].as_str();
    let version_stage = body["VersionStage"].as_str();
    let val = emulator.secrets.storage.get_secret_value(&id, version_id, version_stage)?;
    Ok(json!({
        "Name": id,
        "VersionId": val.version_id,
        "SecretString": val.secret_value,
        "VersionStages": val.stages,
        "CreatedDate": val.created_at,
    }))
}

async fn put_secret_value(emulator: &Emulator, body: Value) -> Result<Value> {
    let id = secret_name(&body, "SecretId")?;
    let value = body["SecretString"]
        .as_str()
        .ok_or_else(|| EmulatorError::InvalidArgument("Missing SecretString".into()))?;
    let version = emulator.secrets.storage.put_secret_value(&id, value)?;
    Ok(json!({ "Name": id, "VersionId": version.version_id, "VersionStages": version.stages }))
}

async fn describe_secret(emulator: &Emulator, body: Value) -> Result<Value> {
    let id = secret_name(&body, "SecretId")?;
    let meta = emulator.secrets.storage.describe_secret(&id)?;
    Ok(json!({
        "ARN": meta.arn,
        "Name": meta.name,
        "Description": meta.description,
        "CreatedDate": meta.created_at,
    }))
}

async fn list_secrets(emulator: &Emulator, _body: Value) -> Result<Value> {
    let secrets = emulator.secrets.storage.list_secrets()?;
    let list: Vec<Value> = secrets
        .into_iter()
        .map(|s| json!({ "ARN": s.arn, "Name": s.name, "Description": s.description, "CreatedDate": s.created_at }))
        .collect();
    Ok(json!({ "SecretList": list }))
}

async fn delete_secret(emulator: &Emulator, body: Value) -> Result<Value> {
    let id = secret_name(&body, "SecretId")?;
    emulator.secrets.storage.delete_secret(&id)?;
    Ok(json!({ "Name": id }))
}
