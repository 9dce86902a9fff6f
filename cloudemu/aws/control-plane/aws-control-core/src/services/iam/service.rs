//! IAM wire adapter (component K's AWS Query dialect): role/policy/user
//! bookkeeping backing the middleware chain's identity checks.

use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

pub struct IamService {
    pub storage: Arc<StorageEngine>,
}

impl IamService {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}
