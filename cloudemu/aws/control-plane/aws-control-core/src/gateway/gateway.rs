//! Router assembly: mounts every enabled service's dialect onto one
//! [`axum::Router`]. Orchestrating which port serves which subset is
//! the job of `cloudemu_server`'s orchestrator — this router answers
//! every dialect regardless of which port it's bound to, so a listener
//! dedicated to (say) the queue port still works if a client mistakenly
//! speaks DynamoDB to it.
//!
//! The one dialect this router deliberately omits is API Gateway's
//! deployed-API proxy path (`/{api_id}/{stage}/...`): its shape
//! collides with S3's `/{bucket}/{key}` path style, so it's only
//! mounted by [`create_apigateway_invoke_router`], which the
//! orchestrator binds to the baseline port (mirroring real AWS, where
//! a deployed API's invoke URL is distinct from the `apigateway`
//! management API's endpoint).

use crate::Emulator;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;

/// `POST /` is shared by every JSON-target service and by IAM's
/// query/form dialect; the `content-type` header picks between them.
async fn root_dispatch(State(emulator): State<Arc<Emulator>>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers.get("content-type").and_then(|h| h.to_str().ok()).unwrap_or("");

    if content_type.contains("x-www-form-urlencoded") {
        let body_str = String::from_utf8_lossy(&body).into_owned();
        return crate::services::iam::handlers::handle_request(State(emulator), headers, body_str).await;
    }

    let json: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid JSON body").into_response(),
    };
    super::dispatcher::dispatch(State(emulator), headers, Json(json)).await
}

/// The combined, single-port router: every JSON-target and query
/// dialect plus S3 and the management surface. Used in tests and as
/// the standalone fallback server when no REST-API gateway is declared.
pub fn create_router(emulator: Arc<Emulator>) -> Router {
    #[cfg_attr(not(feature = "object"), allow(unused_mut))]
    let mut root_route = any(root_dispatch);

    #[cfg(feature = "object")]
    {
        root_route = get(crate::services::s3::handlers::handle_request).merge(root_route);
    }

    #[allow(unused_mut)]
    let mut router = Router::new().route("/", root_route);

    #[cfg(feature = "object")]
    {
        router = router
            .route("/:bucket", any(crate::services::s3::handlers::handle_request))
            .route("/:bucket/*key", any(crate::services::s3::handlers::handle_request));
    }

    #[cfg(feature = "functions")]
    {
        router = router
            .route("/2015-03-31/functions", any(crate::services::lambda::handlers::handle_request))
            .route("/2015-03-31/functions/*rest", any(crate::services::lambda::handlers::handle_request));
    }

    #[cfg(feature = "apigateway")]
    {
        router = router
            .route("/restapis", any(crate::services::apigateway::handlers::handle_request))
            .route("/restapis/*rest", any(crate::services::apigateway::handlers::handle_request));
    }

    router = router.route("/_ldk/dashboard", get(super::dashboard::render_dashboard));

    crate::middleware::apply(router.with_state(emulator.clone()), emulator)
}

/// API Gateway's management dialect alone (`create_rest_api`/
/// `put_method`/...), bound to its own dedicated port by the
/// orchestrator.
#[cfg(feature = "apigateway")]
pub fn create_apigateway_management_router(emulator: Arc<Emulator>) -> Router {
    let router = Router::new()
        .route("/restapis", any(crate::services::apigateway::handlers::handle_request))
        .route("/restapis/*rest", any(crate::services::apigateway::handlers::handle_request))
        .with_state(emulator.clone());
    crate::middleware::apply(router, emulator)
}

/// The deployed-API invocation proxy alone, free of the `/{bucket}`
/// ambiguity that keeps it out of [`create_router`]. Bound to the
/// baseline port by the orchestrator, alongside the management
/// surface, mirroring how a deployed API's invoke URL is separate from
/// the `apigateway` management API's own endpoint in real AWS.
#[cfg(feature = "apigateway")]
pub fn create_apigateway_invoke_router(emulator: Arc<Emulator>) -> Router {
    let router = Router::new().fallback(crate::services::apigateway::handlers::handle_request).with_state(emulator.clone());
    crate::middleware::apply(router, emulator)
}
