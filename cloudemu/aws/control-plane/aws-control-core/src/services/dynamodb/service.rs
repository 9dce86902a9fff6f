//! KV engine service (component D wire adapter).

use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

pub struct DynamoDbService {
    pub storage: Arc<StorageEngine>,
}

impl DynamoDbService {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}
