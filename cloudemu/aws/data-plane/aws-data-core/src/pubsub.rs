//! Pub/sub fan-out (component G, topic half): in-memory subscriber
//! registry keyed by topic ARN. Topic/subscription *definitions* are
//! persisted (`storage::eventbridge`'s sibling, `storage`'s
//! `sns_topics`/`sns_subscriptions` tables); delivery itself never
//! touches disk, matching the at-least-once, best-effort nature of the
//! real service's push delivery.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedMessage {
    pub message_id: String,
    pub topic_arn: String,
    pub subject: Option<String>,
    pub body: String,
    pub attributes: HashMap<String, serde_json::Value>,
}

#[derive(Clone)]
struct Subscriber {
    arn: String,
    protocol: String,
    endpoint: String,
    filter_policy: Option<serde_json::Value>,
    sender: mpsc::UnboundedSender<PublishedMessage>,
}

#[derive(Default)]
pub struct PubSubFabric {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
}

impl PubSubFabric {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a subscription and hand back the receiving end. The
    /// caller (an `sqs` queue endpoint, an `http(s)` webhook pusher,
    /// whatever the protocol implies) owns draining the channel.
    pub async fn subscribe(
        &self,
        topic_arn: &str,
        subscription_arn: &str,
        protocol: &str,
        endpoint: &str,
        filter_policy: Option<serde_json::Value>,
    ) -> mpsc::UnboundedReceiver<PublishedMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subs = self.subscribers.write().await;
        subs.entry(topic_arn.to_string()).or_default().push(Subscriber {
            arn: subscription_arn.to_string(),
            protocol: protocol.to_string(),
            endpoint: endpoint.to_string(),
            filter_policy,
            sender: tx,
        });
        rx
    }

    pub async fn unsubscribe(&self, topic_arn: &str, subscription_arn: &str) {
        let mut subs = self.subscribers.write().await;
        if let Some(list) = subs.get_mut(topic_arn) {
            list.retain(|s| s.arn != subscription_arn);
        }
    }

    pub async fn subscriber_count(&self, topic_arn: &str) -> usize {
        self.subscribers.read().await.get(topic_arn).map(Vec::len).unwrap_or(0)
    }

    /// Deliver to every subscriber whose filter policy matches the
    /// message attributes (no policy means unconditional delivery).
    /// Dead channels (subscriber dropped its receiver) are pruned
    /// rather than left to accumulate.
    pub async fn publish(&self, message: PublishedMessage) -> usize {
        let mut subs = self.subscribers.write().await;
        let Some(list) = subs.get_mut(&message.topic_arn) else { return 0 };

        let mut delivered = 0;
        list.retain(|sub| {
            if !filter_matches(sub.filter_policy.as_ref(), &message.attributes) {
                return true;
            }
            match sub.sender.send(message.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        delivered
    }

    pub async fn protocol_of(&self, topic_arn: &str, subscription_arn: &str) -> Option<(String, String)> {
        let subs = self.subscribers.read().await;
        subs.get(topic_arn)?.iter().find(|s| s.arn == subscription_arn).map(|s| (s.protocol.clone(), s.endpoint.clone()))
    }
}

fn filter_matches(policy: Option<&serde_json::Value>, attributes: &HashMap<String, serde_json::Value>) -> bool {
    let Some(policy) = policy.and_then(|p| p.as_object()) else { return true };
    policy.iter().all(|(key, matcher)| {
        let Some(value) = attributes.get(key) else { return false };
        match matcher {
            serde_json::Value::Array(candidates) => candidates.iter().any(|c| c == value),
            other => other == value,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(topic: &str, attrs: HashMap<String, serde_json::Value>) -> PublishedMessage {
        PublishedMessage { message_id: "m1".into(), topic_arn: topic.into(), subject: None, body: "hi".into(), attributes: attrs }
    }

    #[tokio::test]
    async fn publish_reaches_matching_subscriber_only() {
        let fabric = PubSubFabric::new();
        let mut rx_match = fabric.subscribe("t", "s1", "sqs", "q1", Some(serde_json::json!({"kind": ["order"]}))).await;
        let mut rx_nomatch = fabric.subscribe("t", "s2", "sqs", "q2", Some(serde_json::json!({"kind": ["invoice"]}))).await;

        let mut attrs = HashMap::new();
        attrs.insert("kind".to_string(), serde_json::json!("order"));
        let delivered = fabric.publish(msg("t", attrs)).await;

        assert_eq!(delivered, 1);
        assert!(rx_match.try_recv().is_ok());
        assert!(rx_nomatch.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let fabric = PubSubFabric::new();
        fabric.subscribe("t", "s1", "sqs", "q1", None).await;
        fabric.unsubscribe("t", "s1").await;
        assert_eq!(fabric.subscriber_count("t").await, 0);
    }
}
