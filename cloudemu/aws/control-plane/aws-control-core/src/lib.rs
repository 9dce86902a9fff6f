pub mod adapters;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod services;

pub use error::{ApiError, EmulatorError, Result};

use aws_data_core::fabric::EventFabric;
use aws_data_core::pubsub::PubSubFabric;
use aws_data_core::queue::QueueEngine;
use aws_data_core::{Config, StorageEngine};
use std::sync::Arc;

/// Every enabled service plus the shared engines they're built on.
pub struct Emulator {
    pub config: Config,
    pub storage: Arc<StorageEngine>,

    #[cfg(feature = "object")]
    pub s3: services::s3::S3Service,
    #[cfg(feature = "kv")]
    pub dynamodb: services::dynamodb::DynamoDbService,
    #[cfg(feature = "queue")]
    pub sqs: services::sqs::SqsService,
    #[cfg(feature = "pubsub")]
    pub sns: Arc<services::sns::SnsService>,
    #[cfg(feature = "secrets")]
    pub secrets: services::secrets::SecretsService,
    #[cfg(feature = "eventbus")]
    pub events: services::events::EventsService,
    #[cfg(feature = "identity")]
    pub identity: services::identity::IdentityService,
    #[cfg(feature = "workflow")]
    pub workflows: services::workflows::WorkflowsService,
    #[cfg(feature = "functions")]
    pub lambda: Arc<services::lambda::LambdaService>,
    #[cfg(feature = "parameters")]
    pub parameters: services::parameters::ParametersService,
    #[cfg(feature = "apigateway")]
    pub apigateway: services::apigateway::ApiGatewayService,
    pub iam: services::iam::IamService,

    /// The event propagation fabric (component J), shared across every
    /// service so a queue poller / stream mapping / notification
    /// registration handler anywhere in the tree can reach the same
    /// trigger registry and cursor state.
    pub fabric: Arc<EventFabric>,

    pub log_ring: Arc<middleware::logging::LogRing>,
    pub chaos: Arc<middleware::chaos::ChaosState>,
}

impl Emulator {
    /// Create a new emulator with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::default())
    }

    /// Create a new ephemeral, non-persisted emulator.
    pub fn in_memory() -> Result<Self> {
        let config = Config { in_memory: true, ..Config::default() };
        let storage = Arc::new(StorageEngine::in_memory(&config.account_id, &config.region)?);
        Self::assemble(config, storage)
    }

    /// Create a new emulator with custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        let storage = if config.in_memory {
            Arc::new(StorageEngine::in_memory(&config.account_id, &config.region)?)
        } else {
            Arc::new(StorageEngine::new(&config.data_dir, &config.account_id, &config.region)?)
        };
        Self::assemble(config, storage)
    }

    fn assemble(config: Config, storage: Arc<StorageEngine>) -> Result<Self> {
        // Every service shares one queue engine and one pub/sub fabric so
        // that, e.g., an SNS-to-SQS subscription delivers into the same
        // queues an SQS client reads from.
        let queues = Arc::new(QueueEngine::new());

        #[cfg(feature = "functions")]
        let lambda = Arc::new(services::lambda::LambdaService::new(storage.clone()));

        #[cfg(feature = "functions")]
        let invoker: Arc<dyn aws_data_core::fabric::Invoker> = lambda.clone();
        #[cfg(not(feature = "functions"))]
        let invoker: Arc<dyn aws_data_core::fabric::Invoker> = Arc::new(NullInvoker);

        let event_fabric = EventFabric::new(storage.clone(), queues.clone(), invoker.clone());

        Ok(Self {
            #[cfg(feature = "object")]
            s3: services::s3::S3Service::new(storage.clone()),
            #[cfg(feature = "kv")]
            dynamodb: services::dynamodb::DynamoDbService::new(storage.clone()),
            #[cfg(feature = "queue")]
            sqs: services::sqs::SqsService::new(queues.clone(), config.account_id.clone(), format!("http://{}:{}", config.host, config.port)),
            #[cfg(feature = "pubsub")]
            sns: Arc::new(services::sns::SnsService::new(storage.clone(), PubSubFabric::new(), queues.clone(), invoker.clone())),
            #[cfg(feature = "secrets")]
            secrets: services::secrets::SecretsService::new(storage.clone()),
            #[cfg(feature = "eventbus")]
            events: services::events::EventsService::new(storage.clone(), event_fabric.clone()),
            #[cfg(feature = "identity")]
            identity: services::identity::IdentityService::new(storage.clone()),
            #[cfg(feature = "workflow")]
            workflows: services::workflows::WorkflowsService::new(storage.clone(), invoker.clone()),
            #[cfg(feature = "functions")]
            lambda,
            #[cfg(feature = "parameters")]
            parameters: services::parameters::ParametersService::new(storage.clone()),
            #[cfg(feature = "apigateway")]
            apigateway: services::apigateway::ApiGatewayService::new(storage.clone()),
            iam: services::iam::IamService::new(storage.clone()),
            fabric: event_fabric,
            log_ring: middleware::logging::LogRing::new(),
            chaos: middleware::chaos::ChaosState::new(),
            storage,
            config,
        })
    }

    /// The endpoint URL clients should target.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.config.host, self.config.port)
    }
}

/// Stands in for [`aws_data_core::fabric::Invoker`] when the `functions`
/// feature is off, so the event fabric and workflow engine always have
/// something to call into.
struct NullInvoker;

#[async_trait::async_trait]
impl aws_data_core::fabric::Invoker for NullInvoker {
    async fn invoke(&self, function_name: &str, _payload: serde_json::Value) -> aws_data_core::error::Result<serde_json::Value> {
        Err(aws_data_core::error::EmulatorError::NotFound("Function".into(), function_name.into()))
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new().expect("failed to create emulator")
    }
}

/// Start the emulator server.
pub use gateway::ingress::start as start_server;
