//! Event propagation fabric (component J): the glue that turns a raw
//! mutation (a KV change record, a published event, an object-store
//! notification) into a downstream delivery (a function invocation, a
//! queue send, a pub/sub fan-out).
//!
//! This module owns no state of its own beyond subscription
//! bookkeeping — it polls [`crate::storage::kv`]'s change log, matches
//! [`crate::eventbus`] patterns, and drives an injected [`Invoker`] so
//! the control plane can supply the actual function-execution runtime
//! without this crate depending on it.

use crate::eventbus;
use crate::queue::QueueEngine;
use crate::storage::StorageEngine;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Abstraction over "run this function with this payload", implemented
/// by the control plane's function-compute runtime. Kept minimal so
/// the fabric can be unit tested with a stub.
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(&self, function_name: &str, payload: Value) -> crate::error::Result<Value>;
}

#[derive(Clone)]
pub struct StreamTrigger {
    pub table_name: String,
    pub function_name: String,
    pub batch_size: usize,
}

/// A queue-to-function event-source mapping: the poller long-polls
/// `queue_name` and invokes `function_name` with a batch of up to
/// `batch_size` messages, deleting each message only once its
/// invocation succeeds.
#[derive(Clone)]
pub struct QueueTrigger {
    pub queue_name: String,
    pub function_name: String,
    pub batch_size: usize,
    pub wait_seconds: u64,
}

/// A bucket notification target: every matching mutation on `bucket`
/// invokes `function_name` with a synthetic `s3`-shaped event.
#[derive(Clone)]
pub struct ObjectNotificationTarget {
    pub bucket: String,
    pub event_prefix: String,
    pub function_name: String,
}

#[derive(Clone)]
pub struct EventBridgeTarget {
    pub bus_name: String,
    pub rule_name: String,
    pub target_arn: String,
}

/// Live cursor into a single table's KV change log, so repeated polls
/// only see records newer than the last batch delivered.
struct StreamCursor {
    after_sequence: i64,
}

pub struct EventFabric {
    storage: Arc<StorageEngine>,
    queues: Arc<QueueEngine>,
    invoker: Arc<dyn Invoker>,
    stream_triggers: RwLock<Vec<StreamTrigger>>,
    cursors: RwLock<HashMap<String, StreamCursor>>,
    queue_triggers: RwLock<Vec<QueueTrigger>>,
    object_notifications: RwLock<Vec<ObjectNotificationTarget>>,
    object_cursor: RwLock<i64>,
}

impl EventFabric {
    pub fn new(storage: Arc<StorageEngine>, queues: Arc<QueueEngine>, invoker: Arc<dyn Invoker>) -> Arc<Self> {
        Arc::new(EventFabric {
            storage,
            queues,
            invoker,
            stream_triggers: RwLock::new(Vec::new()),
            cursors: RwLock::new(HashMap::new()),
            queue_triggers: RwLock::new(Vec::new()),
            object_notifications: RwLock::new(Vec::new()),
            object_cursor: RwLock::new(0),
        })
    }

    pub async fn add_stream_trigger(&self, trigger: StreamTrigger) {
        self.cursors.write().await.entry(trigger.table_name.clone()).or_insert(StreamCursor { after_sequence: 0 });
        self.stream_triggers.write().await.push(trigger);
    }

    pub async fn remove_stream_triggers_for(&self, table_name: &str, function_name: &str) {
        let mut triggers = self.stream_triggers.write().await;
        triggers.retain(|t| !(t.table_name == table_name && t.function_name == function_name));
    }

    pub async fn add_queue_trigger(&self, trigger: QueueTrigger) {
        self.queue_triggers.write().await.push(trigger);
    }

    pub async fn remove_queue_triggers_for(&self, queue_name: &str, function_name: &str) {
        let mut triggers = self.queue_triggers.write().await;
        triggers.retain(|t| !(t.queue_name == queue_name && t.function_name == function_name));
    }

    /// Register a bucket-notification handler. `event_prefix` matches
    /// by prefix against the fired event type (e.g. `"ObjectCreated"`
    /// catches both `ObjectCreated:Put` and `ObjectCreated:CompleteMultipartUpload`).
    pub async fn register_object_notification(&self, target: ObjectNotificationTarget) {
        self.object_notifications.write().await.push(target);
    }

    pub async fn remove_object_notifications_for(&self, bucket: &str, function_name: &str) {
        let mut targets = self.object_notifications.write().await;
        targets.retain(|t| !(t.bucket == bucket && t.function_name == function_name));
    }

    /// One sweep over every registered SQS-to-function mapping: a
    /// long-poll receive, a synthetic `Records` event per batch, an
    /// invocation, and a `delete` per message only on success. A
    /// message left undeleted becomes visible again once its
    /// visibility timeout elapses, so a failing handler naturally
    /// drives the message toward its queue's configured DLQ via the
    /// ordinary receive-count accounting rather than anything special
    /// here.
    pub async fn poll_queues(&self) {
        let triggers = self.queue_triggers.read().await.clone();
        for trigger in triggers {
            let received = match self
                .queues
                .receive_message(&trigger.queue_name, std::time::Duration::from_secs(trigger.wait_seconds), trigger.batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(queue = %trigger.queue_name, error = %e, "queue poller receive failed");
                    continue;
                }
            };
            if received.is_empty() {
                continue;
            }

            let payload = serde_json::json!({
                "Records": received.iter().map(|(msg, _)| serde_json::json!({
                    "messageId": msg.message_id,
                    "body": msg.body,
                    "attributes": { "ApproximateReceiveCount": msg.receive_count.to_string() },
                    "messageAttributes": msg.attributes,
                })).collect::<Vec<_>>()
            });

            match self.invoker.invoke(&trigger.function_name, payload).await {
                Ok(_) => {
                    for (_, receipt_handle) in &received {
                        let _ = self.queues.delete_message(&trigger.queue_name, receipt_handle);
                    }
                    debug!(function = %trigger.function_name, queue = %trigger.queue_name, count = received.len(), "delivered queue batch");
                }
                Err(e) => {
                    warn!(function = %trigger.function_name, queue = %trigger.queue_name, error = %e, "queue trigger invocation failed, leaving messages in flight");
                }
            }
        }
    }

    /// One sweep over the object-mutation log, invoking every
    /// registered handler whose bucket and event-type prefix match
    /// each new record.
    pub async fn poll_object_notifications(&self) {
        let after = *self.object_cursor.read().await;
        let batch = self.storage.poll_object_notifications(after, 100);
        if batch.is_empty() {
            return;
        }
        let max_seq = batch.iter().map(|r| r.sequence_number).max().unwrap_or(after);

        let targets = self.object_notifications.read().await.clone();
        for record in &batch {
            for target in &targets {
                if target.bucket != record.bucket || !record.event_type.starts_with(&target.event_prefix) {
                    continue;
                }
                let event = serde_json::json!({
                    "Records": [{
                        "eventName": record.event_type,
                        "s3": {
                            "bucket": { "name": record.bucket },
                            "object": { "key": record.key },
                        }
                    }]
                });
                if let Err(e) = self.invoker.invoke(&target.function_name, event).await {
                    warn!(function = %target.function_name, bucket = %record.bucket, error = %e, "object notification invocation failed");
                }
            }
        }
        *self.object_cursor.write().await = max_seq;
    }

    /// One sweep over every registered KV stream trigger. Intended to
    /// be called on a short interval by the server's background loop
    /// (the teacher's orchestrator polling cadence, generalized from
    /// "poll the queue" to "poll every live change source").
    pub async fn poll_streams(&self) {
        let triggers = self.stream_triggers.read().await.clone();
        for trigger in triggers {
            let after = {
                let cursors = self.cursors.read().await;
                cursors.get(&trigger.table_name).map(|c| c.after_sequence).unwrap_or(0)
            };
            let batch = self.storage.poll_changes(&trigger.table_name, after, trigger.batch_size);
            if batch.is_empty() {
                continue;
            }
            let max_seq = batch.iter().map(|c| c.sequence_number).max().unwrap_or(after);

            let payload = serde_json::json!({
                "Records": batch.iter().map(|c| serde_json::json!({
                    "eventID": c.sequence_number.to_string(),
                    "eventName": match c.event_name {
                        crate::storage::ChangeEventName::Insert => "INSERT",
                        crate::storage::ChangeEventName::Modify => "MODIFY",
                        crate::storage::ChangeEventName::Remove => "REMOVE",
                    },
                    "dynamodb": {
                        "Keys": c.keys,
                        "OldImage": c.old_image,
                        "NewImage": c.new_image,
                    }
                })).collect::<Vec<_>>()
            });

            if let Err(e) = self.invoker.invoke(&trigger.function_name, payload).await {
                warn!(function = %trigger.function_name, table = %trigger.table_name, error = %e, "stream trigger invocation failed");
            } else {
                debug!(function = %trigger.function_name, table = %trigger.table_name, count = batch.len(), "delivered change batch");
            }

            self.cursors.write().await.insert(trigger.table_name.clone(), StreamCursor { after_sequence: max_seq });
        }
    }

    /// Route a published event through every enabled rule on its bus,
    /// delivering to each matched rule's targets. Queue targets get a
    /// plain send; function targets get invoked directly; anything
    /// else is logged and dropped (no SNS/Kinesis target wiring in
    /// this emulator).
    pub async fn dispatch_event(&self, bus_name: &str, detail_type: &str, source: &str, detail: Value) -> crate::error::Result<usize> {
        let event = serde_json::json!({
            "detail-type": detail_type,
            "source": source,
            "detail": detail,
        });

        let rules = self.storage.enabled_rules(bus_name)?;
        let mut delivered = 0;
        for rule in rules {
            let Some(pattern_str) = &rule.event_pattern else { continue };
            let pattern: Value = match serde_json::from_str(pattern_str) {
                Ok(p) => p,
                Err(_) => continue,
            };
            if !eventbus::matches_pattern(&pattern, &event) {
                continue;
            }

            for target in self.storage.list_targets(bus_name, &rule.name)? {
                delivered += self.deliver_to_target(&target.arn, &event).await;
            }
        }
        Ok(delivered)
    }

    /// Backstop DLQ sweep for queues nobody is actively receiving
    /// from. Delegates to the same engine the queue poller and the
    /// `sqs` service share, so a transfer here is visible to both.
    pub fn sweep_dead_letters(&self) {
        self.queues.sweep_dead_letters();
    }

    async fn deliver_to_target(&self, arn: &str, event: &Value) -> usize {
        if let Some(queue_name) = arn.strip_prefix("arn:aws:sqs:::") {
            match self.queues.send_message(queue_name, event.to_string(), HashMap::new(), None, None) {
                Ok(Some(_)) => return 1,
                Ok(None) => return 0,
                Err(e) => {
                    warn!(target = %arn, error = %e, "event target queue send failed");
                    return 0;
                }
            }
        }
        if let Some(function_name) = arn.strip_prefix("arn:aws:lambda:::function:") {
            if let Err(e) = self.invoker.invoke(function_name, event.clone()).await {
                warn!(target = %arn, error = %e, "event target function invocation failed");
                return 0;
            }
            return 1;
        }
        warn!(target = %arn, "no deliverable target type recognized for this arn");
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::CreateTableParams;

    struct RecordingInvoker {
        calls: std::sync::Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Invoker for RecordingInvoker {
        async fn invoke(&self, function_name: &str, payload: Value) -> crate::error::Result<Value> {
            self.calls.lock().unwrap().push((function_name.to_string(), payload));
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn poll_streams_invokes_trigger_once_per_new_batch() {
        let storage = Arc::new(StorageEngine::in_memory("000000000000", "us-east-1").unwrap());
        storage
            .create_table(CreateTableParams {
                name: "t".into(),
                key_schema: crate::storage::KeySchema { partition_key: "pk".into(), sort_key: None },
                gsis: vec![],
                billing_mode: "PAY_PER_REQUEST".into(),
            })
            .unwrap();

        let invoker = Arc::new(RecordingInvoker { calls: std::sync::Mutex::new(Vec::new()) });
        let fabric = EventFabric::new(storage.clone(), Arc::new(QueueEngine::new()), invoker.clone());
        fabric.add_stream_trigger(StreamTrigger { table_name: "t".into(), function_name: "fn".into(), batch_size: 10 }).await;

        let item = serde_json::json!({"pk": "a"}).as_object().unwrap().clone();
        storage.put_item("t", item, None, &crate::expr::Names::new(), &crate::expr::Values::new()).unwrap();

        fabric.poll_streams().await;
        fabric.poll_streams().await;

        assert_eq!(invoker.calls.lock().unwrap().len(), 1, "second poll with no new changes shouldn't re-invoke");
    }

    #[tokio::test]
    async fn dispatch_event_routes_to_matching_queue_target() {
        let storage = Arc::new(StorageEngine::in_memory("000000000000", "us-east-1").unwrap());
        storage.create_event_bus("default").unwrap();
        storage.put_rule("default", "r1", Some(r#"{"source":["app"]}"#), None, "ENABLED").unwrap();
        storage.put_targets("default", "r1", &[("t1".into(), "arn:aws:sqs:::q".into(), None)]).unwrap();

        let queues = Arc::new(QueueEngine::new());
        queues.create_queue("q", crate::queue::QueueAttributes::default()).unwrap();

        let invoker = Arc::new(RecordingInvoker { calls: std::sync::Mutex::new(Vec::new()) });
        let fabric = EventFabric::new(storage, queues.clone(), invoker);

        let delivered = fabric.dispatch_event("default", "order.created", "app", serde_json::json!({"id": 1})).await.unwrap();
        assert_eq!(delivered, 1);
        assert_eq!(queues.approximate_depth("q").unwrap().0, 1);
    }

    #[tokio::test]
    async fn poll_queues_invokes_and_deletes_on_success() {
        let storage = Arc::new(StorageEngine::in_memory("000000000000", "us-east-1").unwrap());
        let queues = Arc::new(QueueEngine::new());
        queues.create_queue("q", crate::queue::QueueAttributes::default()).unwrap();
        queues.send_message("q", "payload".into(), HashMap::new(), None, None).unwrap();

        let invoker = Arc::new(RecordingInvoker { calls: std::sync::Mutex::new(Vec::new()) });
        let fabric = EventFabric::new(storage, queues.clone(), invoker.clone());
        fabric.add_queue_trigger(QueueTrigger { queue_name: "q".into(), function_name: "fn".into(), batch_size: 10, wait_seconds: 0 }).await;

        fabric.poll_queues().await;

        assert_eq!(invoker.calls.lock().unwrap().len(), 1);
        assert_eq!(invoker.calls.lock().unwrap()[0].1["Records"][0]["body"], "payload");
        assert_eq!(queues.approximate_depth("q").unwrap(), (0, 0), "successfully delivered message must be deleted");
    }

    struct FailingInvoker;

    #[async_trait]
    impl Invoker for FailingInvoker {
        async fn invoke(&self, _function_name: &str, _payload: Value) -> crate::error::Result<Value> {
            Err(crate::error::EmulatorError::Internal("boom".into()))
        }
    }

    #[tokio::test]
    async fn poll_queues_leaves_message_in_flight_on_invocation_failure() {
        let storage = Arc::new(StorageEngine::in_memory("000000000000", "us-east-1").unwrap());
        let queues = Arc::new(QueueEngine::new());
        queues.create_queue("q", crate::queue::QueueAttributes::default()).unwrap();
        queues.send_message("q", "payload".into(), HashMap::new(), None, None).unwrap();

        let fabric = EventFabric::new(storage, queues.clone(), Arc::new(FailingInvoker));
        fabric.add_queue_trigger(QueueTrigger { queue_name: "q".into(), function_name: "fn".into(), batch_size: 10, wait_seconds: 0 }).await;

        fabric.poll_queues().await;

        let (ready, in_flight) = queues.approximate_depth("q").unwrap();
        assert_eq!((ready, in_flight), (0, 1), "failed invocation must leave the message in flight rather than deleting it");
    }

    #[tokio::test]
    async fn poll_object_notifications_invokes_matching_bucket_handler() {
        let storage = Arc::new(StorageEngine::in_memory("000000000000", "us-east-1").unwrap());
        storage.create_bucket("b").unwrap();
        storage.put_object("b", "k", b"hi", None, serde_json::json!({})).unwrap();

        let invoker = Arc::new(RecordingInvoker { calls: std::sync::Mutex::new(Vec::new()) });
        let fabric = EventFabric::new(storage.clone(), Arc::new(QueueEngine::new()), invoker.clone());
        fabric
            .register_object_notification(ObjectNotificationTarget {
                bucket: "b".into(),
                event_prefix: "ObjectCreated".into(),
                function_name: "fn".into(),
            })
            .await;

        fabric.poll_object_notifications().await;
        fabric.poll_object_notifications().await;

        let calls = invoker.calls.lock().unwrap();
        assert_eq!(calls.len(), 1, "second poll with no new mutations shouldn't re-invoke");
        assert_eq!(calls[0].1["Records"][0]["eventName"], "ObjectCreated:Put");
    }
}
