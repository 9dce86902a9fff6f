//! Function compute service (component: functions wire adapter).
//!
//! Doubles as the [`Invoker`] the workflow engine and event fabric call
//! into for `arn:aws:lambda:::function:*` targets.

use super::executor::execute_lambda;
use aws_data_core::error::{EmulatorError, Result};
use aws_data_core::fabric::Invoker;
use aws_data_core::storage::StorageEngine;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct LambdaService {
    pub storage: Arc<StorageEngine>,
}

impl LambdaService {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl Invoker for LambdaService {
    async fn invoke(&self, function_name: &str, payload: Value) -> Result<Value> {
        let function = self.storage.get_function(function_name)?;
        let code_bytes = self.storage.get_function_code(function_name)?;

        let response = tokio::task::spawn_blocking(move || execute_lambda(&function.runtime, &function.handler, &code_bytes, &payload))
            .await
            .map_err(|e| EmulatorError::Internal(format!("lambda execution task panicked: {e}")))??;

        Ok(response["Payload"].clone())
    }
}
