//! Event bus service (component G rule half / component J dispatch).

use aws_data_core::fabric::EventFabric;
use aws_data_core::storage::StorageEngine;
use std::sync::Arc;

pub struct EventsService {
    pub storage: Arc<StorageEngine>,
    pub fabric: Arc<EventFabric>,
}

impl EventsService {
    pub fn new(storage: Arc<StorageEngine>, fabric: Arc<EventFabric>) -> Self {
        Self { storage, fabric }
    }
}
