//! Secrets store service (AWS JSON 1.1 dialect wire adapter).

use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

pub struct SecretsService {
    pub storage: Arc<StorageEngine>,
}

impl SecretsService {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}
