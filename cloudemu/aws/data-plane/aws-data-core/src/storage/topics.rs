//! Pub/sub topic (component G topic half) persisted definitions: topics
//! and their subscriptions. Fan-out delivery itself is in-memory
//! (`crate::pubsub::PubSubFabric`); this module only owns what a
//! `ListTopics`/`ListSubscriptionsByTopic` call needs to read back.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicRecord {
    pub arn: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub arn: String,
    pub topic_arn: String,
    pub protocol: String,
    pub endpoint: String,
    pub filter_policy: Option<String>,
    pub pending_confirmation: bool,
}

impl StorageEngine {
    pub fn create_topic(&self, name: &str) -> Result<TopicRecord> {
        let arn = format!("arn:aws:sns:{}:{}:{}", self.region, self.account_id, name);
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO sns_topics (arn, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(arn) DO NOTHING",
            params![arn, name, now],
        )?;
        Ok(TopicRecord { arn, name: name.to_string(), created_at: now })
    }

    pub fn list_topics(&self) -> Result<Vec<TopicRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT arn, name, created_at FROM sns_topics ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(TopicRecord { arn: row.get(0)?, name: row.get(1)?, created_at: row.get(2)? })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_topic(&self, arn: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM sns_subscriptions WHERE topic_arn = ?1", params![arn])?;
        let changed = conn.execute("DELETE FROM sns_topics WHERE arn = ?1", params![arn])?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("Topic".into(), arn.into()));
        }
        Ok(())
    }

    pub fn create_subscription(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint: &str,
        filter_policy: Option<&str>,
    ) -> Result<SubscriptionRecord> {
        let sub_arn = format!("{topic_arn}:{}", Self::new_id());
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO sns_subscriptions (arn, topic_arn, protocol, endpoint, filter_policy, pending_confirmation)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
            params![sub_arn, topic_arn, protocol, endpoint, filter_policy],
        )?;
        Ok(SubscriptionRecord {
            arn: sub_arn,
            topic_arn: topic_arn.to_string(),
            protocol: protocol.to_string(),
            endpoint: endpoint.to_string(),
            filter_policy: filter_policy.map(str::to_string),
            pending_confirmation: false,
        })
    }

    pub fn list_subscriptions_by_topic(&self, topic_arn: &str) -> Result<Vec<SubscriptionRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT arn, topic_arn, protocol, endpoint, filter_policy, pending_confirmation FROM sns_subscriptions WHERE topic_arn = ?1",
        )?;
        let rows = stmt.query_map(params![topic_arn], row_to_subscription)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_subscription(&self, arn: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute("DELETE FROM sns_subscriptions WHERE arn = ?1", params![arn])?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("Subscription".into(), arn.into()));
        }
        Ok(())
    }
}

fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<SubscriptionRecord> {
    let pending: i64 = row.get(5)?;
    Ok(SubscriptionRecord {
        arn: row.get(0)?,
        topic_arn: row.get(1)?,
        protocol: row.get(2)?,
        endpoint: row.get(3)?,
        filter_policy: row.get(4)?,
        pending_confirmation: pending != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    #[test]
    fn subscription_round_trip() {
        let engine = engine();
        let topic = engine.create_topic("alerts").unwrap();
        engine.create_subscription(&topic.arn, "sqs", "arn:aws:sqs:::q", None).unwrap();
        let subs = engine.list_subscriptions_by_topic(&topic.arn).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].protocol, "sqs");
    }

    #[test]
    fn delete_topic_cascades_subscriptions() {
        let engine = engine();
        let topic = engine.create_topic("t").unwrap();
        engine.create_subscription(&topic.arn, "sqs", "arn:x", None).unwrap();
        engine.delete_topic(&topic.arn).unwrap();
        assert!(engine.list_subscriptions_by_topic(&topic.arn).unwrap().is_empty());
    }
}
