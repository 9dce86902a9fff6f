use super::asl::StateMachineDefinition;
use crate::error::{ApiError, EmulatorError};
use crate::Emulator;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

pub async fn handle_request(State(emulator): State<Arc<Emulator>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let target = headers.get("x-amz-target").and_then(|h| h.to_str().ok()).unwrap_or("");
    let action = target.rsplit('.').next().unwrap_or(target);
    info!(action, "stepfunctions request");

    let result = match action {
        "CreateStateMachine" => create_state_machine(&emulator, body).await,
        "ListStateMachines" => list_state_machines(&emulator, body).await,
        "DescribeStateMachine" => describe_state_machine(&emulator, body).await,
        "DeleteStateMachine" => delete_state_machine(&emulator, body).await,
        "StartExecution" => start_execution(&emulator, body).await,
        "DescribeExecution" => describe_execution(&emulator, body).await,
        "GetExecutionHistory" => get_execution_history(&emulator, body).await,
        "ListExecutions" => list_executions(&emulator, body).await,
        _ => Err(EmulatorError::InvalidRequest(format!("unknown StepFunctions action: {target}"))),
    };

    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn create_state_machine(emulator: &Emulator, body: Value) -> Result<Value, EmulatorError> {
    let name = body["name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing name".into()))?;
    let definition: Value = body["definition"]
        .as_str()
        .and_then(|s| serde_json::from_str(s).ok())
        .ok_or_else(|| EmulatorError::InvalidArgument("missing or unparseable definition".into()))?;
    serde_json::from_value::<StateMachineDefinition>(definition.clone())
        .map_err(|e| EmulatorError::InvalidDefinition(e.to_string()))?;

    let role_arn = body["roleArn"].as_str();
    let workflow_type = body["type"].as_str().unwrap_or("STANDARD");

    let machine = emulator.workflows.storage.create_state_machine(name, definition, role_arn, workflow_type)?;
    Ok(json!({"stateMachineArn": machine.arn, "creationDate": machine.created_at}))
}

async fn list_state_machines(emulator: &Emulator, _body: Value) -> Result<Value, EmulatorError> {
    let machines = emulator.workflows.storage.list_state_machines()?;
    Ok(json!({
        "stateMachines": machines.into_iter().map(|m| json!({
            "stateMachineArn": m.arn,
            "name": m.name,
            "type": m.workflow_type,
            "creationDate": m.created_at,
        })).collect::<Vec<_>>()
    }))
}

async fn describe_state_machine(emulator: &Emulator, body: Value) -> Result<Value, EmulatorError> {
    let arn = body["stateMachineArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing stateMachineArn".into()))?;
    let machine = emulator.workflows.storage.describe_state_machine(arn)?;
    Ok(json!({
        "stateMachineArn": machine.arn,
        "name": machine.name,
        "type": machine.workflow_type,
        "roleArn": machine.role_arn,
        "definition": machine.definition.to_string(),
        "creationDate": machine.created_at,
    }))
}

async fn delete_state_machine(emulator: &Emulator, body: Value) -> Result<Value, EmulatorError> {
    let arn = body["stateMachineArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing stateMachineArn".into()))?;
    emulator.workflows.storage.delete_state_machine(arn)?;
    Ok(json!({}))
}

/// `standard` executions run in the background (`tokio::spawn`) and
/// return immediately with a `RUNNING` execution; `express` blocks the
/// caller for the whole run and returns its output inline.
async fn start_execution(emulator: &Emulator, body: Value) -> Result<Value, EmulatorError> {
    let machine_arn = body["stateMachineArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing stateMachineArn".into()))?;
    let name = body["name"].as_str().map(str::to_string).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let input: Value = body["input"].as_str().map(|s| serde_json::from_str(s).unwrap_or(json!({}))).unwrap_or(json!({}));

    let machine = emulator.workflows.storage.describe_state_machine(machine_arn)?;
    let definition: StateMachineDefinition =
        serde_json::from_value(machine.definition.clone()).map_err(|e| EmulatorError::InvalidDefinition(e.to_string()))?;

    let exec = emulator.workflows.storage.start_execution(machine_arn, &name, input.clone())?;

    if machine.workflow_type == "EXPRESS" {
        let result = emulator.workflows.engine.run(&definition, input).await;
        emulator.workflows.storage.finish_execution(&exec.arn, result.status, result.output.clone(), result.error.as_deref(), result.cause.as_deref())?;
        return Ok(json!({
            "executionArn": exec.arn,
            "startDate": exec.started_at,
            "output": result.output.map(|v| v.to_string()),
        }));
    }

    let storage = emulator.workflows.storage.clone();
    let engine = emulator.workflows.engine.clone();
    let arn_for_task = exec.arn.clone();
    tokio::spawn(async move {
        let result = engine.run(&definition, input).await;
        let outcome = storage.finish_execution(&arn_for_task, result.status, result.output, result.error.as_deref(), result.cause.as_deref());
        if let Err(e) = outcome {
            error!(execution = %arn_for_task, error = %e, "failed to persist execution result");
        }
    });

    Ok(json!({"executionArn": exec.arn, "startDate": exec.started_at}))
}

async fn describe_execution(emulator: &Emulator, body: Value) -> Result<Value, EmulatorError> {
    let arn = body["executionArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing executionArn".into()))?;
    let exec = emulator.workflows.storage.describe_execution(arn)?;
    Ok(json!({
        "executionArn": exec.arn,
        "stateMachineArn": exec.state_machine_arn,
        "name": exec.name,
        "status": exec.status,
        "startDate": exec.started_at,
        "stopDate": exec.stopped_at,
        "input": exec.input.to_string(),
        "output": exec.output.map(|o| o.to_string()),
        "error": exec.error,
        "cause": exec.cause,
    }))
}

async fn get_execution_history(emulator: &Emulator, body: Value) -> Result<Value, EmulatorError> {
    let arn = body["executionArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing executionArn".into()))?;
    let exec = emulator.workflows.storage.describe_execution(arn)?;
    Ok(json!({"events": exec.history}))
}

async fn list_executions(emulator: &Emulator, body: Value) -> Result<Value, EmulatorError> {
    let machine_arn = body["stateMachineArn"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("missing stateMachineArn".into()))?;
    let status_filter = body["statusFilter"].as_str();
    let executions = emulator.workflows.storage.list_executions(machine_arn, status_filter)?;
    Ok(json!({
        "executions": executions.into_iter().map(|e| json!({
            "executionArn": e.arn,
            "stateMachineArn": e.state_machine_arn,
            "name": e.name,
            "status": e.status,
            "startDate": e.started_at,
            "stopDate": e.stopped_at,
        })).collect::<Vec<_>>()
    }))
}
