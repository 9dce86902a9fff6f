//! REST-API gateway service (component K's REST dialect): owns the
//! declared API/resource/method/integration graph and proxies incoming
//! requests to the wired function.

use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiGatewayService {
    pub storage: Arc<StorageEngine>,
}

impl ApiGatewayService {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }
}
