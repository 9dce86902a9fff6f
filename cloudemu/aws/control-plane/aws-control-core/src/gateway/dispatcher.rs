//! JSON-targeted dialect dispatch: every service selected by
//! `X-Amz-Target: Svc.Op` lands here and is routed by the `Svc` prefix.
//! Lambda and API Gateway are REST-path dialects and are routed
//! directly from [`super::gateway::create_router`] instead.

use crate::Emulator;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

pub async fn dispatch(State(emulator): State<Arc<Emulator>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let target = headers.get("x-amz-target").and_then(|h| h.to_str().ok()).unwrap_or("");
    let service = target.split('.').next().unwrap_or("");

    match service {
        #[cfg(feature = "kv")]
        "DynamoDB_20120810" => crate::services::dynamodb::handlers::handle_request(State(emulator), headers, Json(body)).await,

        #[cfg(feature = "queue")]
        "AmazonSQS" | "AWSSQS" => crate::services::sqs::handlers::handle_request(State(emulator), headers, Json(body)).await,

        #[cfg(feature = "pubsub")]
        "AmazonSNS" => crate::services::sns::handlers::handle_request(State(emulator), headers, Json(body)).await,

        #[cfg(feature = "secrets")]
        "secretsmanager" => crate::services::secrets::handlers::handle_request(State(emulator), headers, Json(body)).await,

        #[cfg(feature = "eventbus")]
        "AWSEvents" => crate::services::events::handlers::handle_request(State(emulator), headers, Json(body)).await,

        #[cfg(feature = "identity")]
        "AWSCognitoIdentityProviderService" => crate::services::identity::handlers::handle_request(State(emulator), headers, Json(body)).await,

        #[cfg(feature = "workflow")]
        "AWSStepFunctions" => crate::services::workflows::handle_request(State(emulator), headers, Json(body)).await,

        #[cfg(feature = "parameters")]
        "AmazonSSM" => crate::services::parameters::handlers::handle_request(State(emulator), headers, Json(body)).await,

        _ => {
            warn!("unknown x-amz-target service: {target}");
            (StatusCode::NOT_FOUND, format!("Unknown service target: {target}")).into_response()
        }
    }
}
