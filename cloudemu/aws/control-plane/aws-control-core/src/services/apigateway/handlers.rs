//! REST-API gateway wire adapter: management calls use the classic
//! `/restapis/...` REST-JSON shape; anything else on this port is
//! treated as a deployed-API invocation and proxied to the wired
//! function via [`crate::services::lambda::LambdaService`].

use crate::error::ApiError;
use crate::Emulator;
use aws_data_core::error::{EmulatorError, Result};
use aws_data_core::fabric::Invoker;
use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn handle_request(State(emulator): State<Arc<Emulator>>, method: Method, uri: axum::http::Uri, body: String) -> Response {
    let path = uri.path();
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    let result = match segments.as_slice() {
        ["restapis"] if method == Method::GET => list_rest_apis(&emulator).await,
        ["restapis"] if method == Method::POST => create_rest_api(&emulator, &body).await,
        ["restapis", api_id] if method == Method::GET => get_rest_api(&emulator, api_id).await,
        ["restapis", api_id, "resources"] if method == Method::GET => list_resources(&emulator, api_id).await,
        ["restapis", api_id, "resources", parent_id] if method == Method::POST => create_resource(&emulator, api_id, parent_id, &body).await,
        ["restapis", api_id, "resources", resource_id, "methods", http_method] if method == Method::PUT => {
            put_method(&emulator, api_id, resource_id, http_method, &body).await
        }
        ["restapis", api_id, "resources", resource_id, "methods", http_method, "integration"] if method == Method::PUT => {
            put_integration(&emulator, api_id, resource_id, http_method, &body).await
        }
        ["restapis", api_id, "resources", resource_id, "methods", http_method, "integration"] if method == Method::GET => {
            get_integration(&emulator, api_id, resource_id, http_method).await
        }
        _ => return invoke_deployed_api(&emulator, &method, path, body).await,
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn list_rest_apis(emulator: &Emulator) -> Result<Value> {
    let apis = emulator.apigateway.storage.list_rest_apis()?;
    let item: Vec<Value> = apis
        .into_iter()
        .map(|api| json!({ "id": api.id, "name": api.name, "description": api.description, "createdDate": api.created_at, "endpointConfiguration": { "types": [api.endpoint_type] } }))
        .collect();
    Ok(json!({ "item": item }))
}

async fn create_rest_api(emulator: &Emulator, body: &str) -> Result<Value> {
    let req: Value = serde_json::from_str(body).map_err(|e| EmulatorError::InvalidRequest(e.to_string()))?;
    let name = req["name"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing name".into()))?;
    let api = emulator.apigateway.storage.create_rest_api(name, req["description"].as_str())?;
    Ok(json!({ "id": api.id, "name": api.name, "description": api.description, "createdDate": api.created_at, "endpointConfiguration": { "types": [api.endpoint_type] } }))
}

async fn get_rest_api(emulator: &Emulator, api_id: &str) -> Result<Value> {
    let api = emulator.apigateway.storage.get_rest_api(api_id)?;
    Ok(json!({ "id": api.id, "name": api.name, "description": api.description, "createdDate": api.created_at, "endpointConfiguration": { "types": [api.endpoint_type] } }))
}

async fn list_resources(emulator: &Emulator, api_id: &str) -> Result<Value> {
    let resources = emulator.apigateway.storage.list_resources(api_id)?;
    let item: Vec<Value> = resources.into_iter().map(|r| json!({ "id": r.id, "parentId": r.parent_id, "pathPart": r.path_part, "path": r.path })).collect();
    Ok(json!({ "item": item }))
}

async fn create_resource(emulator: &Emulator, api_id: &str, parent_id: &str, body: &str) -> Result<Value> {
    let req: Value = serde_json::from_str(body).map_err(|e| EmulatorError::InvalidRequest(e.to_string()))?;
    let path_part = req["pathPart"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing pathPart".into()))?;
    let r = emulator.apigateway.storage.create_resource(api_id, parent_id, path_part)?;
    Ok(json!({ "id": r.id, "parentId": r.parent_id, "pathPart": r.path_part, "path": r.path }))
}

async fn put_method(emulator: &Emulator, api_id: &str, resource_id: &str, http_method: &str, body: &str) -> Result<Value> {
    let req: Value = serde_json::from_str(body).unwrap_or(json!({}));
    let auth_type = req["authorizationType"].as_str().unwrap_or("NONE");
    let m = emulator.apigateway.storage.put_method(api_id, resource_id, http_method, auth_type)?;
    Ok(json!({ "httpMethod": m.http_method, "authorizationType": m.authorization_type, "apiKeyRequired": m.api_key_required }))
}

async fn put_integration(emulator: &Emulator, api_id: &str, resource_id: &str, http_method: &str, body: &str) -> Result<Value> {
    let req: Value = serde_json::from_str(body).map_err(|e| EmulatorError::InvalidRequest(e.to_string()))?;
    let uri = req["uri"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing uri".into()))?;
    // `uri` is a Lambda invocation ARN-ish string; the function name is its last segment.
    let function_name = uri.rsplit(':').next().unwrap_or(uri).trim_end_matches("/invocations");
    emulator.apigateway.storage.put_integration(api_id, resource_id, http_method, function_name)?;
    Ok(json!({ "type": "AWS_PROXY", "uri": uri }))
}

async fn get_integration(emulator: &Emulator, api_id: &str, resource_id: &str, http_method: &str) -> Result<Value> {
    let function_name = emulator.apigateway.storage.get_integration(api_id, resource_id, http_method)?;
    Ok(json!({ "type": "AWS_PROXY", "functionName": function_name }))
}

/// A deployed API is invoked at `/{api_id}/{stage}/{proxy path...}`; this
/// is the `AWS_PROXY` integration the rest of the control plane assumes.
async fn invoke_deployed_api(emulator: &Emulator, method: &Method, path: &str, body: String) -> Response {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    let Some((api_id, rest)) = segments.split_first() else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    let Some((_stage, proxy_segments)) = rest.split_first() else {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    };
    let resource_path = format!("/{}", proxy_segments.join("/"));

    let resource = match emulator.apigateway.storage.find_resource_by_path(api_id, &resource_path) {
        Ok(Some(r)) => r,
        Ok(None) => return ApiError::from(EmulatorError::NotFound("Resource".into(), resource_path)).into_response(),
        Err(e) => return ApiError::from(e).into_response(),
    };

    let function_name = match emulator.apigateway.storage.get_integration(api_id, &resource.id, method.as_str()) {
        Ok(Some(name)) => name,
        Ok(None) => return ApiError::from(EmulatorError::NotFound("Integration".into(), method.to_string())).into_response(),
        Err(e) => return ApiError::from(e).into_response(),
    };

    let event = json!({
        "httpMethod": method.as_str(),
        "path": resource_path,
        "body": body,
        "isBase64Encoded": false,
    });

    match emulator.lambda.invoke(&function_name, event).await {
        Ok(payload) => Json(payload).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
