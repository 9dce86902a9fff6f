//! Object store service (component F wire adapter): path-style
//! bucket/key routing over the shared `StorageEngine`.

use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

pub struct S3Service {
    pub storage: Arc<StorageEngine>,
}

impl S3Service {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}
