//! Provider orchestrator: binds one dedicated port per enabled service
//! plus the baseline management port, all against a single shared
//! [`Emulator`]. Each dedicated router answers only its own dialect, so
//! a client pointed at the wrong port gets a 404 instead of silently
//! being routed to a different service — unlike [`super::gateway::create_router`],
//! which answers every dialect on one port for tests and the standalone
//! fallback binary.

use crate::error::Result;
use crate::Emulator;
use aws_data_core::error::EmulatorError;
use aws_data_core::Config;
use axum::routing::any;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Fixed offsets from the baseline port, per service.
const OFFSET_KV: u16 = 1;
const OFFSET_QUEUE: u16 = 2;
const OFFSET_OBJECT: u16 = 3;
const OFFSET_PUBSUB: u16 = 4;
const OFFSET_EVENTBUS: u16 = 5;
const OFFSET_WORKFLOW: u16 = 6;
const OFFSET_IDENTITY: u16 = 7;
const OFFSET_APIGATEWAY: u16 = 8;
const OFFSET_FUNCTIONS: u16 = 9;
const OFFSET_IAM: u16 = 10;
const OFFSET_STS: u16 = 11;
const OFFSET_PARAMETERS: u16 = 12;
const OFFSET_SECRETS: u16 = 13;

/// Finishes a per-service router: binds state, then layers the
/// logging/IAM/chaos/vhost chain on top, same as [`super::gateway::create_router`].
fn finish(router: Router<Arc<Emulator>>, emulator: &Arc<Emulator>) -> Router {
    crate::middleware::apply(router.with_state(emulator.clone()), emulator.clone())
}

async fn bind_and_serve(name: &'static str, addr: SocketAddr, router: Router, tasks: &mut JoinSet<Result<()>>) {
    info!("{name} listening on http://{addr}");
    tasks.spawn(async move {
        let listener = TcpListener::bind(addr).await.map_err(EmulatorError::Io)?;
        axum::serve(listener, router).await.map_err(EmulatorError::Io)?;
        Ok(())
    });
}

/// Drives every pull-based delivery path the event fabric owns: KV
/// stream triggers, SQS-to-function mappings, object notifications,
/// and the DLQ sweep backstop. Runs on a fixed cadence for the life of
/// the process, same as the teacher's queue-visibility sweep this is
/// generalized from.
const FABRIC_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

fn spawn_fabric_poller(emulator: &Arc<Emulator>, tasks: &mut JoinSet<Result<()>>) {
    let emulator = emulator.clone();
    tasks.spawn(async move {
        let mut interval = tokio::time::interval(FABRIC_POLL_INTERVAL);
        loop {
            interval.tick().await;
            emulator.fabric.poll_streams().await;
            emulator.fabric.poll_queues().await;
            emulator.fabric.poll_object_notifications().await;
            emulator.fabric.sweep_dead_letters();
        }
    });
}

/// Boot one HTTP listener per enabled service plus the baseline
/// management/gateway port, all sharing one [`Emulator`]. Runs until a
/// listener task fails or the process is killed.
pub async fn start_all(config: Config) -> Result<()> {
    let host = config.host.clone();
    let port = config.port;
    let emulator = Arc::new(Emulator::with_config(config)?);
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    let addr = |offset: u16| -> SocketAddr { format!("{host}:{}", port + offset).parse().expect("valid host:port") };

    #[cfg(feature = "kv")]
    bind_and_serve(
        "DynamoDB",
        addr(OFFSET_KV),
        finish(
            Router::new()
                .route("/", any(crate::services::dynamodb::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "queue")]
    bind_and_serve(
        "SQS",
        addr(OFFSET_QUEUE),
        finish(
            Router::new()
                .route("/", any(crate::services::sqs::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "object")]
    bind_and_serve(
        "S3",
        addr(OFFSET_OBJECT),
        finish(
            Router::new()
                .route("/", any(crate::services::s3::handlers::handle_request))
                .route("/:bucket", any(crate::services::s3::handlers::handle_request))
                .route("/:bucket/*key", any(crate::services::s3::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "pubsub")]
    bind_and_serve(
        "SNS",
        addr(OFFSET_PUBSUB),
        finish(
            Router::new()
                .route("/", any(crate::services::sns::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "eventbus")]
    bind_and_serve(
        "EventBridge",
        addr(OFFSET_EVENTBUS),
        finish(
            Router::new()
                .route("/", any(crate::services::events::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "workflow")]
    bind_and_serve(
        "Step Functions",
        addr(OFFSET_WORKFLOW),
        finish(
            Router::new()
                .route("/", any(crate::services::workflows::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "identity")]
    bind_and_serve(
        "Cognito",
        addr(OFFSET_IDENTITY),
        finish(
            Router::new()
                .route("/", any(crate::services::identity::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "functions")]
    bind_and_serve(
        "Lambda",
        addr(OFFSET_FUNCTIONS),
        finish(
            Router::new()
                .route("/2015-03-31/functions", any(crate::services::lambda::handlers::handle_request))
                .route("/2015-03-31/functions/*rest", any(crate::services::lambda::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "parameters")]
    bind_and_serve(
        "SSM Parameter Store",
        addr(OFFSET_PARAMETERS),
        finish(
            Router::new()
                .route("/", any(crate::services::parameters::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    #[cfg(feature = "secrets")]
    bind_and_serve(
        "Secrets Manager",
        addr(OFFSET_SECRETS),
        finish(
            Router::new()
                .route("/", any(crate::services::secrets::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    bind_and_serve(
        "IAM",
        addr(OFFSET_IAM),
        finish(
            Router::new()
                .route("/", any(crate::services::iam::handlers::handle_request)),
            &emulator,
        ),
        &mut tasks,
    )
    .await;

    bind_and_serve("STS", addr(OFFSET_STS), super::sts::router(emulator.clone()), &mut tasks).await;

    #[cfg(feature = "apigateway")]
    bind_and_serve(
        "API Gateway (management)",
        addr(OFFSET_APIGATEWAY),
        super::gateway::create_apigateway_management_router(emulator.clone()),
        &mut tasks,
    )
    .await;

    // Baseline port: the deployed-API invoke proxy (when the apigateway
    // feature is enabled) plus the management surface always.
    #[cfg(feature = "apigateway")]
    let baseline_router = super::gateway::create_apigateway_invoke_router(emulator.clone()).merge(super::management::router(emulator.clone()));
    #[cfg(not(feature = "apigateway"))]
    let baseline_router = super::management::router(emulator.clone());

    bind_and_serve("Management / deployed API invoke proxy", addr(0), baseline_router, &mut tasks).await;

    spawn_fabric_poller(&emulator, &mut tasks);

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("provider listener failed: {e}"),
            Err(e) => error!("listener task panicked: {e}"),
        }
    }

    Ok(())
}
