//! Identity provider service (component H wire adapter).

use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

pub struct IdentityService {
    pub storage: Arc<StorageEngine>,
}

impl IdentityService {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}
