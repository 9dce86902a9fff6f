//! Storage engine: SQLite metadata + content-addressed blobs on disk.
//!
//! One [`StorageEngine`] per process, shared behind an `Arc` by every
//! service handler. Each component's persistence lives in its own
//! submodule as an `impl StorageEngine` block, following the shape the
//! original teacher's `iam`/`lambda`/`apigateway` modules already use.

mod engine;
mod schema;

mod apigateway;
mod eventbridge;
mod iam;
mod identity;
pub(crate) mod kv;
mod lambda;
mod object;
mod parameters;
mod secrets;
mod topics;
mod workflow;

pub use engine::StorageEngine;
pub use iam::{IamAccessKey, IamPolicy, IamRole, IamUser, RolePolicyAttachment};
pub use lambda::{CreateFunctionParams, FunctionMetadata};
pub use apigateway::{ApiGateway, ApiMethod, ApiResource};
pub use identity::{UserGroupRecord, UserPoolRecord, UserRecord};
pub use kv::{ChangeEventName, ChangeRecord, CreateTableParams, GsiDefinition, KeySchema, TableDescription};
pub use object::{BucketMetadata, ListObjectsPage, ObjectMetadata, ObjectNotificationRecord};
pub use parameters::ParameterRecord;
pub use secrets::{SecretRecord, SecretVersion};
pub use topics::{SubscriptionRecord, TopicRecord};
pub use eventbridge::{EventBusRecord, EventRuleRecord, EventTargetRecord};
pub use workflow::{ExecutionRecord, StateMachineRecord};
