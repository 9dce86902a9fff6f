use super::interpreter::Engine;
use aws_data_core::fabric::Invoker;
use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

pub struct WorkflowsService {
    pub storage: Arc<StorageEngine>,
    pub engine: Engine,
}

impl WorkflowsService {
    pub fn new(storage: Arc<StorageEngine>, invoker: Arc<dyn Invoker>) -> Self {
        Self { storage, engine: Engine::new(invoker) }
    }
}
