//! Queue service (component E wire adapter).

use aws_data_core::queue::QueueEngine;
use std::sync::Arc;

pub struct SqsService {
    pub queues: Arc<QueueEngine>,
    pub account_id: String,
    pub endpoint: String,
}

impl SqsService {
    pub fn new(queues: Arc<QueueEngine>, account_id: String, endpoint: String) -> Self {
        Self { queues, account_id, endpoint }
    }

    pub fn queue_url(&self, name: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.account_id, name)
    }

    pub fn queue_name_from_url(url: &str) -> &str {
        url.rsplit('/').next().unwrap_or(url)
    }
}
