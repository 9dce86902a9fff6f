//! The per-request middleware chain (L): request logging, IAM
//! evaluation, chaos injection, and the object engine's virtual-hosted
//! style rewrite. Layered onto a [`crate::Emulator`]'s router via
//! [`apply`], innermost (logging) to outermost (vhost), matching how
//! a real request actually flows: the vhost rewrite runs first so the
//! rest of the chain sees a normalized path.

pub mod chaos;
pub mod iam;
pub mod logging;
pub mod vhost;

use crate::Emulator;
use axum::Router;
use std::sync::Arc;

/// Wraps `router` with the full chain, outermost layer added last so
/// axum's "layers run outside-in" ordering produces: vhost, chaos,
/// iam, logging (closest to the handler).
pub fn apply(router: Router, emulator: Arc<Emulator>) -> Router {
    router
        .layer(axum::middleware::from_fn_with_state(emulator.clone(), logging::log_requests))
        .layer(axum::middleware::from_fn_with_state(emulator.clone(), iam::evaluate_iam))
        .layer(axum::middleware::from_fn_with_state(emulator.clone(), chaos::inject_chaos))
        .layer(axum::middleware::from_fn_with_state(emulator, vhost::rewrite_vhost))
}

#[cfg(test)]
mod tests {
    use crate::gateway;
    use crate::Emulator;
    use aws_data_core::{Config, IamMode};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn req() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("x-amz-target", "DynamoDB_20120810.ListTables")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap()
    }

    #[tokio::test]
    async fn enforce_mode_denies_without_a_matching_allow_policy() {
        let config = Config { in_memory: true, iam_mode: IamMode::Enforce, ..Config::default() };
        let emulator = Arc::new(Emulator::with_config(config).unwrap());
        let app = gateway::create_router(emulator);

        let resp = app.oneshot(req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn audit_mode_lets_the_request_through() {
        let config = Config { in_memory: true, iam_mode: IamMode::Audit, ..Config::default() };
        let emulator = Arc::new(Emulator::with_config(config).unwrap());
        let app = gateway::create_router(emulator);

        let resp = app.oneshot(req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn chaos_error_rate_of_one_always_injects_a_synthetic_failure() {
        let config = Config { in_memory: true, chaos_error_rate: 1.0, ..Config::default() };
        let emulator = Arc::new(Emulator::with_config(config).unwrap());
        let app = gateway::create_router(emulator);

        let resp = app.oneshot(req()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[cfg(feature = "object")]
    #[tokio::test]
    async fn vhost_style_host_header_resolves_to_the_path_style_bucket() {
        let emulator = Arc::new(Emulator::in_memory().unwrap());
        let app = gateway::create_router(emulator);

        let create = Request::builder().method("PUT").uri("/vhost-bucket").body(Body::empty()).unwrap();
        assert_eq!(app.clone().oneshot(create).await.unwrap().status(), StatusCode::OK);

        let list_via_vhost =
            Request::builder().method("GET").uri("/").header("host", "vhost-bucket.localhost").body(Body::empty()).unwrap();
        assert_eq!(app.oneshot(list_via_vhost).await.unwrap().status(), StatusCode::OK);
    }
}
