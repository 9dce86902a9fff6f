//! Parameter store wire adapter: `x-amz-target`-dispatched AWS JSON 1.1.

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
    info!("ssm: {action}");

    let result = match action {
        "PutParameter" => put_parameter(&emulator, body).await,
        "GetParameter" => get_parameter(&emulator, body).await,
        "GetParametersByPath" => get_parameters_by_path(&emulator, body).await,
        "DeleteParameter" => delete_parameter(&emulator, body).await,
        _ => Err(EmulatorError::UnknownOperation(action.to_string())),
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn param_json(p: &aws_data_core::storage::ParameterRecord) -> Value {
    json!({
        "Name": p.name,
        "Value": p.value,
        "Type": p.parameter_type,
        "Version": p.version,
        "LastModifiedDate": p.last_modified,
    })
}

async fn put_parameter(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    let value = body["Value"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Value".into()))?;
    let parameter_type = body["Type"].as_str().unwrap_or("String");
    let overwrite = body["Overwrite"].as_bool().unwrap_or(false);
    let version = emulator.parameters.storage.put_parameter(name, value, parameter_type, overwrite)?;
    Ok(json!({ "Version": version, "Tier": "Standard" }))
}

async fn get_parameter(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    let param = emulator.parameters.storage.get_parameter(name)?;
    Ok(json!({ "Parameter": param_json(&param) }))
}

async fn get_parameters_by_path(emulator: &Emulator, body: Value) -> Result<Value> {
    let path = body["Path"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Path".into()))?;
    let recursive = body["Recursive"].as_bool().unwrap_or(false);
    let params = emulator.parameters.storage.get_parameters_by_path(path, recursive)?;
    let list: Vec<Value> = params.iter().map(param_json).collect();
    Ok(json!({ "Parameters": list }))
}

async fn delete_parameter(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["Name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Name".into()))?;
    emulator.parameters.storage.delete_parameter(name)?;
    Ok(json!({}))
}
