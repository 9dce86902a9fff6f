//! Identity provider wire adapter: `x-amz-target`-dispatched AWS JSON
//! 1.1, same dialect DynamoDB and EventBridge use.

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
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub async fn handle_request(
    State(emulator): State<Arc<Emulator>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let target = headers.get("x-amz-target").and_then(|h| h.to_str().ok()).unwrap_or("");
    let action = target.rsplit('.').next().unwrap_or(target);
    info!("cognito-idp: {action}");

    let result = match action {
        "CreateUserPool" => create_user_pool(&emulator, body).await,
        "ListUserPools" => list_user_pools(&emulator, body).await,
        "CreateGroup" => create_group(&emulator, body).await,
        "ListGroups" => list_groups(&emulator, body).await,
        "SignUp" => sign_up(&emulator, body).await,
        "ConfirmSignUp" => confirm_sign_up(&emulator, body).await,
        "InitiateAuth" => initiate_auth(&emulator, body).await,
        "AdminGetUser" => admin_get_user(&emulator, body).await,
        "AdminAddUserToGroup" => admin_add_user_to_group(&emulator, body).await,
        "ListUsers" => list_users(&emulator, body).await,
        _ => Err(EmulatorError::UnknownOperation(action.to_string())),
    };

    match result {
        Ok(v) => Json(v).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

fn user_json(u: &aws_data_core::storage::UserRecord) -> Value {
    let attrs: Vec<Value> = u.attributes.iter().map(|(k, v)| json!({ "Name": k, "Value": v })).collect();
    json!({
        "Username": u.username,
        "UserStatus": u.status,
        "UserAttributes": attrs,
        "UserCreateDate": u.created_at,
    })
}

async fn create_user_pool(emulator: &Emulator, body: Value) -> Result<Value> {
    let name = body["PoolName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing PoolName".into()))?;
    let pool = emulator.identity.storage.create_user_pool(name)?;
    Ok(json!({ "UserPool": { "Id": pool.id, "Name": pool.name, "Arn": pool.arn, "CreationDate": pool.created_at } }))
}

async fn list_user_pools(emulator: &Emulator, _body: Value) -> Result<Value> {
    let pools = emulator.identity.storage.list_user_pools()?;
    let list: Vec<Value> = pools.into_iter().map(|p| json!({ "Id": p.id, "Name": p.name, "Arn": p.arn })).collect();
    Ok(json!({ "UserPools": list }))
}

async fn create_group(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["UserPoolId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing UserPoolId".into()))?;
    let name = body["GroupName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing GroupName".into()))?;
    let description = body["Description"].as_str();
    let precedence = body["Precedence"].as_i64();
    let group = emulator.identity.storage.create_group(pool_id, name, description, precedence)?;
    Ok(json!({ "Group": { "GroupName": group.name, "UserPoolId": group.pool_id, "Description": group.description, "Precedence": group.precedence } }))
}

async fn list_groups(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["UserPoolId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing UserPoolId".into()))?;
    let groups = emulator.identity.storage.list_groups(pool_id)?;
    let list: Vec<Value> = groups.into_iter().map(|g| json!({ "GroupName": g.name, "Description": g.description, "Precedence": g.precedence })).collect();
    Ok(json!({ "Groups": list }))
}

fn extract_attributes(body: &Value) -> HashMap<String, String> {
    body["UserAttributes"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|a| Some((a["Name"].as_str()?.to_string(), a["Value"].as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

async fn sign_up(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["ClientId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing ClientId".into()))?;
    let username = body["Username"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Username".into()))?;
    let password = body["Password"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Password".into()))?;
    let attributes = extract_attributes(&body);
    let user = emulator.identity.storage.sign_up(pool_id, username, password, attributes)?;
    Ok(json!({ "UserSub": user.sub, "UserConfirmed": false }))
}

async fn confirm_sign_up(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["ClientId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing ClientId".into()))?;
    let username = body["Username"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Username".into()))?;
    emulator.identity.storage.confirm_sign_up(pool_id, username)?;
    Ok(json!({}))
}

async fn initiate_auth(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["ClientId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing ClientId".into()))?;
    let params = &body["AuthParameters"];
    let username = params["USERNAME"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing USERNAME".into()))?;
    let password = params["PASSWORD"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing PASSWORD".into()))?;
    let user = emulator.identity.storage.authenticate(pool_id, username, password)?;
    Ok(json!({
        "AuthenticationResult": {
            "AccessToken": format!("local-access-token.{}", user.sub),
            "IdToken": format!("local-id-token.{}", user.sub),
            "RefreshToken": format!("local-refresh-token.{}", user.sub),
            "TokenType": "Bearer",
            "ExpiresIn": 3600,
        }
    }))
}

async fn admin_get_user(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["UserPoolId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing UserPoolId".into()))?;
    let username = body["Username"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Username".into()))?;
    let user = emulator.identity.storage.get_user(pool_id, username)?;
    Ok(user_json(&user))
}

async fn admin_add_user_to_group(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["UserPoolId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing UserPoolId".into()))?;
    let username = body["Username"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing Username".into()))?;
    let group = body["GroupName"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing GroupName".into()))?;
    emulator.identity.storage.add_user_to_group(pool_id, username, group)?;
    Ok(json!({}))
}

async fn list_users(emulator: &Emulator, body: Value) -> Result<Value> {
    let pool_id = body["UserPoolId"].as_str().ok_or_else(|| EmulatorError::InvalidArgument("Missing UserPoolId".into()))?;
    let users = emulator.identity.storage.list_users(pool_id)?;
    let list: Vec<Value> = users.iter().map(user_json).collect();
    Ok(json!({ "Users": list }))
}
