//! HTTP Gateway - Ingress, Router, Dispatcher

pub mod dashboard;
pub mod dispatcher;
#[allow(clippy::module_inception)]
pub mod gateway;
pub mod ingress;
pub mod management;
pub mod orchestrator;
pub mod sts;

pub use gateway::create_router;
pub use orchestrator::start_all;
