//! Cloud service implementations

#[cfg(feature = "object")]
pub mod s3;

#[cfg(feature = "kv")]
pub mod dynamodb;

#[cfg(feature = "queue")]
pub mod sqs;

#[cfg(feature = "pubsub")]
pub mod sns;

#[cfg(feature = "functions")]
pub mod lambda;

#[cfg(feature = "secrets")]
pub mod secrets;

#[cfg(feature = "eventbus")]
pub mod events;

#[cfg(feature = "identity")]
pub mod identity;

#[cfg(feature = "workflow")]
pub mod workflows;

#[cfg(feature = "parameters")]
pub mod parameters;

#[cfg(feature = "apigateway")]
pub mod apigateway;

/// Policy evaluation backing the middleware chain's IAM layer — not an
/// optional managed service of its own, so it isn't feature-gated.
pub mod iam;
