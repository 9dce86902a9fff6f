//! Function compute wire adapter: unlike the `x-amz-target` services,
//! this dialect is REST-path-based (`/2015-03-31/functions/...`).

use crate::error::{ApiError, EmulatorError};
use crate::Emulator;
use aws_data_core::error::Result;
use aws_data_core::fabric::Invoker;
use aws_data_core::storage::{CreateFunctionParams, FunctionMetadata};
use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

fn function_json(f: &FunctionMetadata) -> Value {
    json!({
        "FunctionName": f.name,
        "FunctionArn": f.arn,
        "Runtime": f.runtime,
        "Role": f.role,
        "Handler": f.handler,
        "Timeout": f.timeout_secs,
        "MemorySize": f.memory_mb,
        "Environment": { "Variables": f.environment },
        "LastModified": f.last_modified,
        "CodeSha256": f.code_sha256,
    })
}

pub async fn handle_request(
    axum::extract::State(emulator): axum::extract::State<Arc<Emulator>>,
    req: axum::extract::Request,
) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().clone();
    info!(%method, %path, "lambda");

    let body_bytes = match axum::body::to_bytes(req.into_body(), 10 * 1024 * 1024).await {
        Ok(b) => b,
        Err(_) => return (axum::http::StatusCode::BAD_REQUEST, "Invalid body").into_response(),
    };
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    // segments look like ["2015-03-31", "functions", "{name}", "invocations"?]
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let function_name = segments.get(2).copied();

    let result = if method == axum::http::Method::POST && segments.get(1) == Some(&"event-source-mappings") {
        create_event_source_mapping(&emulator, body).await
    } else if segments.last() == Some(&"invocations") {
        invoke(&emulator, function_name.unwrap_or(""), body).await
    } else if method == axum::http::Method::POST && segments.get(1) == Some(&"functions") && function_name.is_none() {
        create_function(&emulator, body).await
    } else if method == axum::http::Method::GET && function_name.is_some() && segments.len() == 3 {
        get_function(&emulator, function_name.unwrap()).await
    } else if method == axum::http::Method::GET && segments.get(1) == Some(&"functions") && function_name.is_none() {
        list_functions(&emulator).await
    } else if method == axum::http::Method::DELETE && function_name.is_some() {
        delete_function(&emulator, function_name.unwrap()).await
    } else if method == axum::http::Method::PUT && segments.last() == Some(&"code") {
        update_function_code(&emulator, function_name.unwrap_or(""), body).await
    } else {
        Err(EmulatorError::NotFound("Function".into(), path.clone()))
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn invoke(emulator: &Emulator, name: &str, payload: Value) -> Result<Value> {
    emulator.lambda.invoke(name, payload).await
}

async fn create_function(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["FunctionName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing FunctionName".into()))?;
    let runtime = body["Runtime"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Runtime".into()))?;
    let role = body["Role"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Role".into()))?;
    let handler = body["Handler"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Handler".into()))?;
    let timeout_secs = body["Timeout"].as_u64().unwrap_or(3) as u32;
    let memory_mb = body["MemorySize"].as_u64().unwrap_or(128) as u32;
    let environment = body["Environment"]["Variables"].clone();

    let code_bytes = if let Some(zip_file) = body["Code"]["ZipFile"].as_str() {
        use base64::{engine::general_purpose, Engine as _};
        general_purpose::STANDARD
            .decode(zip_file)
            .map_err(|e| EmulatorError::InvalidArgument(format!("Invalid Base64 in Code.ZipFile: {e}")))?
    } else {
        return Err(EmulatorError::InvalidArgument("Missing Code.ZipFile (Base64 encoded zip)".into()));
    };

    let func = emulator.lambda.storage.create_function(CreateFunctionParams {
        name,
        runtime,
        role,
        handler,
        code_bytes: &code_bytes,
        timeout_secs,
        memory_mb,
        environment,
    })?;

    Ok(function_json(&func))
}

async fn get_function(emulator: &Emulator, name: &str) -> Result<Value> {
    let f = emulator.lambda.storage.get_function(name)?;
    Ok(json!({ "Configuration": function_json(&f) }))
}

async fn list_functions(emulator: &Emulator) -> Result<Value> {
    let list = emulator.lambda.storage.list_functions()?;
    let functions: Vec<Value> = list.iter().map(function_json).collect();
    Ok(json!({ "Functions": functions }))
}

async fn delete_function(emulator: &Emulator, name: &str) -> Result<Value> {
    emulator.lambda.storage.delete_function(name)?;
    Ok(json!({}))
}

/// Wires a DynamoDB stream or an SQS queue to a function, the way a
/// real `CreateEventSourceMapping` call would. Which kind of source it
/// is is inferred from the ARN shape rather than a separate field,
/// same as the real API distinguishes them.
async fn create_event_source_mapping(emulator: &Emulator, body: Value) -> Result<Value> {
    let event_source_arn =
        body["EventSourceArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing EventSourceArn".into()))?;
    let function_name =
        body["FunctionName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing FunctionName".into()))?;
    let batch_size = body["BatchSize"].as_u64().unwrap_or(10) as usize;

    if let Some(rest) = event_source_arn.split_once("table/").map(|(_, r)| r) {
        let table_name = rest.split('/').next().unwrap_or(rest).to_string();
        emulator
            .fabric
            .add_stream_trigger(aws_data_core::fabric::StreamTrigger {
                table_name,
                function_name: function_name.to_string(),
                batch_size,
            })
            .await;
    } else if event_source_arn.contains(":sqs:") {
        let queue_name = event_source_arn.rsplit(':').next().unwrap_or(event_source_arn).to_string();
        let wait_seconds = body["WaitSeconds"].as_u64().unwrap_or(5);
        emulator
            .fabric
            .add_queue_trigger(aws_data_core::fabric::QueueTrigger {
                queue_name,
                function_name: function_name.to_string(),
                batch_size,
                wait_seconds,
            })
            .await;
    } else {
        return Err(EmulatorError::InvalidArgument(format!("unrecognized EventSourceArn {event_source_arn}")));
    }

    Ok(json!({
        "UUID": uuid::Uuid::new_v4().to_string(),
        "EventSourceArn": event_source_arn,
        "FunctionArn": function_name,
        "BatchSize": batch_size,
        "State": "Enabled",
    }))
}

async fn update_function_code(emulator: &Emulator, name: &str, body: Value) -> Result<Value> {
    let zip_file = body["ZipFile"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing ZipFile".into()))?;
    use base64::{engine::general_purpose, Engine as _};
    let code_bytes = general_purpose::STANDARD
        .decode(zip_file)
        .map_err(|e| EmulatorError::InvalidArgument(format!("Invalid Base64 in ZipFile: {e}")))?;
    let func = emulator.lambda.storage.update_function_code(name, &code_bytes)?;
    Ok(function_json(&func))
}
