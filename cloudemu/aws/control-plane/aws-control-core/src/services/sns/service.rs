//! Pub/sub topic service (component G wire adapter).

use aws_data_core::fabric::Invoker;
use aws_data_core::pubsub::PubSubFabric;
use aws_data_core::queue::QueueEngine;
use aws_data_core::storage::StorageEngine;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

pub struct SnsService {
    pub storage: Arc<StorageEngine>,
    pub fabric: Arc<PubSubFabric>,
    pub queues: Arc<QueueEngine>,
    invoker: Arc<dyn Invoker>,
    /// Maps subscription ARN -> the background forwarder task, so
    /// unsubscribe can stop it instead of leaking a dangling task.
    pub(crate) forwarders: Mutex<HashMap<String, tokio::task::JoinHandle<()>>>,
}

impl SnsService {
    pub fn new(storage: Arc<StorageEngine>, fabric: Arc<PubSubFabric>, queues: Arc<QueueEngine>, invoker: Arc<dyn Invoker>) -> Self {
        Self { storage, fabric, queues, invoker, forwarders: Mutex::new(HashMap::new()) }
    }

    /// SNS-to-SQS delivery is push-only in the real service; here a
    /// background task drains the fan-out channel into the target
    /// queue, since `PubSubFabric::subscribe` hands the receiver back
    /// to the caller rather than delivering for it.
    pub async fn spawn_sqs_forwarder(self: &Arc<Self>, subscription_arn: String, mut rx: tokio::sync::mpsc::UnboundedReceiver<aws_data_core::pubsub::PublishedMessage>, queue_name: String) {
        let queues = self.queues.clone();
        let handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let _ = queues.send_message(&queue_name, msg.body, HashMap::new(), None, None);
            }
        });
        self.forwarders.lock().await.insert(subscription_arn, handle);
    }

    /// Same idea as [`Self::spawn_sqs_forwarder`], but for a `lambda`
    /// subscription: each fanned-out message is wrapped in a synthetic
    /// SNS event shape and invoked directly rather than sent to a
    /// queue. Invocation failures are logged and dropped — SNS itself
    /// retries with backoff before giving up on a push subscription,
    /// which this emulator doesn't model.
    pub async fn spawn_lambda_forwarder(self: &Arc<Self>, subscription_arn: String, mut rx: tokio::sync::mpsc::UnboundedReceiver<aws_data_core::pubsub::PublishedMessage>, function_name: String) {
        let invoker = self.invoker.clone();
        let handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let event = json!({
                    "Records": [{
                        "EventSource": "aws:sns",
                        "Sns": {
                            "MessageId": msg.message_id,
                            "TopicArn": msg.topic_arn,
                            "Subject": msg.subject,
                            "Message": msg.body,
                            "MessageAttributes": msg.attributes,
                        }
                    }]
                });
                if let Err(e) = invoker.invoke(&function_name, event).await {
                    warn!(function = %function_name, error = %e, "sns lambda subscriber invocation failed");
                }
            }
        });
        self.forwarders.lock().await.insert(subscription_arn, handle);
    }

    pub async fn stop_forwarder(&self, subscription_arn: &str) {
        if let Some(handle) = self.forwarders.lock().await.remove(subscription_arn) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use aws_data_core::storage::StorageEngine;
    use serde_json::Value;
    use tokio::sync::Mutex as TokioMutex;

    struct RecordingInvoker {
        calls: TokioMutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Invoker for RecordingInvoker {
        async fn invoke(&self, function_name: &str, payload: Value) -> aws_data_core::error::Result<Value> {
            self.calls.lock().await.push((function_name.to_string(), payload));
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn lambda_subscription_gets_invoked_on_publish() {
        let storage = Arc::new(StorageEngine::in_memory("000000000000", "us-east-1").unwrap());
        let pubsub = PubSubFabric::new();
        let queues = Arc::new(QueueEngine::new());
        let invoker = Arc::new(RecordingInvoker { calls: TokioMutex::new(Vec::new()) });
        let sns = Arc::new(SnsService::new(storage, pubsub.clone(), queues, invoker.clone()));

        let rx = pubsub.subscribe("t", "s1", "lambda", "arn:aws:lambda:::function:my-fn", None).await;
        sns.spawn_lambda_forwarder("s1".into(), rx, "my-fn".into()).await;

        pubsub
            .publish(aws_data_core::pubsub::PublishedMessage {
                message_id: "m1".into(),
                topic_arn: "t".into(),
                subject: None,
                body: "hello".into(),
                attributes: HashMap::new(),
            })
            .await;

        // the forwarder task runs concurrently; give it a chance to drain
        for _ in 0..50 {
            if !invoker.calls.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let calls = invoker.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "my-fn");
        assert_eq!(calls[0].1["Records"][0]["Sns"]["Message"], "hello");
    }
}
