//! `/_ldk/*` management surface: the one HTTP namespace every baseline
//! port answers regardless of which managed services are enabled.

use crate::Emulator;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

async fn status(State(emulator): State<Arc<Emulator>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "region": emulator.config.region,
        "account_id": emulator.config.account_id,
        "data_dir": emulator.config.data_dir.display().to_string(),
        "in_memory": emulator.config.in_memory,
    }))
}

async fn resources(State(emulator): State<Arc<Emulator>>) -> Json<Value> {
    let mut services = serde_json::Map::new();

    #[cfg(feature = "object")]
    services.insert(
        "s3".into(),
        json!({"port": emulator.config.port + 3, "buckets": emulator.s3.storage.list_buckets().unwrap_or_default().into_iter().map(|b| b.name).collect::<Vec<_>>()}),
    );
    #[cfg(feature = "kv")]
    services.insert(
        "dynamodb".into(),
        json!({"port": emulator.config.port + 1, "tables": emulator.dynamodb.storage.list_tables().unwrap_or_default()}),
    );
    #[cfg(feature = "queue")]
    services.insert("sqs".into(), json!({"port": emulator.config.port + 2, "queues": emulator.sqs.queues.list_queues()}));
    #[cfg(feature = "pubsub")]
    services.insert(
        "sns".into(),
        json!({"port": emulator.config.port + 4, "topics": emulator.sns.storage.list_topics().unwrap_or_default().into_iter().map(|t| t.arn).collect::<Vec<_>>()}),
    );
    #[cfg(feature = "eventbus")]
    services.insert("events".into(), json!({"port": emulator.config.port + 5}));
    #[cfg(feature = "workflow")]
    services.insert(
        "stepfunctions".into(),
        json!({"port": emulator.config.port + 6, "state_machines": emulator.workflows.storage.list_state_machines().unwrap_or_default().into_iter().map(|s| s.arn).collect::<Vec<_>>()}),
    );
    #[cfg(feature = "identity")]
    services.insert("cognito".into(), json!({"port": emulator.config.port + 7}));
    #[cfg(feature = "apigateway")]
    services.insert("apigateway".into(), json!({"port": emulator.config.port + 8}));
    #[cfg(feature = "functions")]
    services.insert(
        "lambda".into(),
        json!({"port": emulator.config.port + 9, "functions": emulator.lambda.storage.list_functions().unwrap_or_default().into_iter().map(|f| f.name).collect::<Vec<_>>()}),
    );
    #[cfg(feature = "parameters")]
    services.insert("ssm".into(), json!({"port": emulator.config.port + 12}));
    #[cfg(feature = "secrets")]
    services.insert("secretsmanager".into(), json!({"port": emulator.config.port + 13}));

    Json(json!({"services": services}))
}

async fn invoke(State(emulator): State<Arc<Emulator>>, Json(body): Json<Value>) -> Response {
    #[cfg(feature = "functions")]
    {
        use aws_data_core::fabric::Invoker;

        let Some(function_name) = body["function_name"].as_str() else {
            return (axum::http::StatusCode::BAD_REQUEST, "missing function_name").into_response();
        };
        let event = body["event"].clone();
        match emulator.lambda.invoke(function_name, event).await {
            Ok(payload) => Json(payload).into_response(),
            Err(e) => crate::ApiError::from(e).into_response(),
        }
    }

    #[cfg(not(feature = "functions"))]
    {
        let _ = (emulator, body);
        (axum::http::StatusCode::NOT_IMPLEMENTED, "functions feature disabled").into_response()
    }
}

/// Clears the services the external interface spec documents as
/// in-memory-only: queues, topics/subscriptions, event buses, and
/// workflow state machines. KV, object, and identity state persists
/// across restarts by design and is left untouched.
async fn reset(State(emulator): State<Arc<Emulator>>) -> Json<Value> {
    #[cfg(feature = "queue")]
    for name in emulator.sqs.queues.list_queues() {
        let _ = emulator.sqs.queues.delete_queue(&name);
    }

    #[cfg(feature = "pubsub")]
    if let Ok(topics) = emulator.sns.storage.list_topics() {
        for t in topics {
            let _ = emulator.sns.storage.delete_topic(&t.arn);
        }
    }

    #[cfg(feature = "eventbus")]
    if let Ok(buses) = emulator.events.storage.list_event_buses() {
        for b in buses {
            if b.name != "default" {
                let _ = emulator.events.storage.delete_event_bus(&b.name);
            }
        }
    }

    #[cfg(feature = "workflow")]
    if let Ok(machines) = emulator.workflows.storage.list_state_machines() {
        for m in machines {
            let _ = emulator.workflows.storage.delete_state_machine(&m.arn);
        }
    }

    Json(json!({"reset": true}))
}

/// Forwards a request to a colocated service port — lets the dashboard
/// (or any caller only holding the baseline port) reach a
/// dedicated-service listener without knowing its port number.
async fn service_proxy(State(emulator): State<Arc<Emulator>>, Json(body): Json<Value>) -> Response {
    let Some(url) = body["url"].as_str() else {
        return (axum::http::StatusCode::BAD_REQUEST, "missing url").into_response();
    };
    let method = body["method"].as_str().unwrap_or("GET").to_uppercase();
    let _ = &emulator;

    let client = reqwest::Client::new();
    let mut req = client.request(method.parse().unwrap_or(reqwest::Method::GET), url);

    if let Some(headers) = body["headers"].as_object() {
        for (k, v) in headers {
            if let Some(v) = v.as_str() {
                req = req.header(k.as_str(), v);
            }
        }
    }
    if let Some(b) = body["body"].as_str() {
        req = req.body(b.to_string());
    }

    match req.send().await {
        Ok(resp) => {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            (status, text).into_response()
        }
        Err(e) => {
            warn!("service-proxy request failed: {e}");
            (axum::http::StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// Installs an IAM role, an optional policy, and attaches the two —
/// a convenience endpoint for tests/tooling to seed identity state
/// without speaking the full IAM query dialect.
async fn iam_auth(State(emulator): State<Arc<Emulator>>, Json(body): Json<Value>) -> Response {
    let Some(role_name) = body["role_name"].as_str() else {
        return (axum::http::StatusCode::BAD_REQUEST, "missing role_name").into_response();
    };
    let assume_doc = body["assume_role_policy_document"].as_str().unwrap_or("{}");

    let role = match emulator.iam.storage.create_role(role_name, assume_doc) {
        Ok(r) => r,
        Err(e) => return crate::ApiError::from(e).into_response(),
    };

    if let (Some(policy_name), Some(policy_doc)) = (body["policy_name"].as_str(), body["policy_document"].as_str()) {
        let policy = match emulator.iam.storage.create_policy(policy_name, policy_doc) {
            Ok(p) => p,
            Err(e) => return crate::ApiError::from(e).into_response(),
        };
        if let Err(e) = emulator.iam.storage.attach_role_policy(role_name, &policy.arn) {
            return crate::ApiError::from(e).into_response();
        }
    }

    Json(json!({"role_arn": role.arn})).into_response()
}

/// Streams the request-logging ring buffer over a WebSocket: the
/// current snapshot first, then every new entry as it's logged.
async fn ws_logs(State(emulator): State<Arc<Emulator>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_logs(socket, emulator))
}

async fn handle_ws_logs(mut socket: WebSocket, emulator: Arc<Emulator>) {
    for entry in emulator.log_ring.snapshot() {
        if socket.send(Message::Text(serde_json::to_string(&entry).unwrap_or_default())).await.is_err() {
            return;
        }
    }

    let mut rx = emulator.log_ring.subscribe();
    loop {
        tokio::select! {
            entry = rx.recv() => {
                match entry {
                    Ok(entry) => {
                        if socket.send(Message::Text(serde_json::to_string(&entry).unwrap_or_default())).await.is_err() {
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
            incoming = socket.recv() => {
                if incoming.is_none() {
                    return;
                }
            }
        }
    }
}

pub fn router(emulator: Arc<Emulator>) -> Router {
    Router::new()
        .route("/_ldk/dashboard", get(super::dashboard::render_dashboard))
        .route("/_ldk/status", get(status))
        .route("/_ldk/resources", get(resources))
        .route("/_ldk/invoke", post(invoke))
        .route("/_ldk/reset", post(reset))
        .route("/_ldk/service-proxy", post(service_proxy))
        .route("/_ldk/ws/logs", get(ws_logs))
        .route("/_ldk/iam-auth", post(iam_auth))
        .with_state(emulator)
}
