//! Event bus (component G) persisted definitions: buses, rules and
//! targets. Actual event matching/dispatch is in-memory fan-out
//! (`crate::eventbus`); this module only owns what a `DescribeRule` or
//! `ListTargetsByRule` call needs to read back.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusRecord {
    pub name: String,
    pub arn: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRuleRecord {
    pub bus_name: String,
    pub name: String,
    pub event_pattern: Option<String>,
    pub schedule_expression: Option<String>,
    pub state: String,
    pub arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTargetRecord {
    pub rule_name: String,
    pub target_id: String,
    pub arn: String,
    pub input_transformer: Option<String>,
}

impl StorageEngine {
    pub fn create_event_bus(&self, name: &str) -> Result<EventBusRecord> {
        let arn = format!("arn:aws:events:{}:{}:event-bus/{}", self.region, self.account_id, name);
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO event_buses (name, arn, created_at) VALUES (?1, ?2, ?3)",
            params![name, arn, now],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                EmulatorError::AlreadyExists(format!("event bus {name} already exists"))
            } else {
                EmulatorError::Database(e.to_string())
            }
        })?;
        Ok(EventBusRecord { name: name.to_string(), arn, created_at: now })
    }

    pub fn list_event_buses(&self) -> Result<Vec<EventBusRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name, arn, created_at FROM event_buses ORDER BY name")?;
        let rows = stmt.query_map([], |row| Ok(EventBusRecord { name: row.get(0)?, arn: row.get(1)?, created_at: row.get(2)? }))?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_event_bus(&self, name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM event_targets WHERE bus_name = ?1", params![name])?;
        conn.execute("DELETE FROM event_rules WHERE bus_name = ?1", params![name])?;
        let changed = conn.execute("DELETE FROM event_buses WHERE name = ?1", params![name])?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("EventBus".into(), name.into()));
        }
        Ok(())
    }

    pub fn put_rule(
        &self,
        bus_name: &str,
        name: &str,
        event_pattern: Option<&str>,
        schedule_expression: Option<&str>,
        state: &str,
    ) -> Result<EventRuleRecord> {
        let arn = format!("arn:aws:events:{}:{}:rule/{}/{}", self.region, self.account_id, bus_name, name);
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO event_rules (bus_name, name, event_pattern, schedule_expression, state, arn)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(bus_name, name) DO UPDATE SET event_pattern = excluded.event_pattern, schedule_expression = excluded.schedule_expression, state = excluded.state",
            params![bus_name, name, event_pattern, schedule_expression, state, arn],
        )?;
        Ok(EventRuleRecord {
            bus_name: bus_name.to_string(),
            name: name.to_string(),
            event_pattern: event_pattern.map(str::to_string),
            schedule_expression: schedule_expression.map(str::to_string),
            state: state.to_string(),
            arn,
        })
    }

    pub fn list_rules(&self, bus_name: &str) -> Result<Vec<EventRuleRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT bus_name, name, event_pattern, schedule_expression, state, arn FROM event_rules WHERE bus_name = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![bus_name], |row| {
            Ok(EventRuleRecord {
                bus_name: row.get(0)?,
                name: row.get(1)?,
                event_pattern: row.get(2)?,
                schedule_expression: row.get(3)?,
                state: row.get(4)?,
                arn: row.get(5)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_rule(&self, bus_name: &str, name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM event_targets WHERE bus_name = ?1 AND rule_name = ?2", params![bus_name, name])?;
        let changed = conn.execute("DELETE FROM event_rules WHERE bus_name = ?1 AND name = ?2", params![bus_name, name])?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("Rule".into(), name.into()));
        }
        Ok(())
    }

    pub fn put_targets(&self, bus_name: &str, rule_name: &str, targets: &[(String, String, Option<String>)]) -> Result<()> {
        let conn = self.get_connection()?;
        for (target_id, arn, input_transformer) in targets {
            conn.execute(
                "INSERT INTO event_targets (bus_name, rule_name, target_id, arn, input_transformer) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(bus_name, rule_name, target_id) DO UPDATE SET arn = excluded.arn, input_transformer = excluded.input_transformer",
                params![bus_name, rule_name, target_id, arn, input_transformer],
            )?;
        }
        Ok(())
    }

    pub fn list_targets(&self, bus_name: &str, rule_name: &str) -> Result<Vec<EventTargetRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT rule_name, target_id, arn, input_transformer FROM event_targets WHERE bus_name = ?1 AND rule_name = ?2",
        )?;
        let rows = stmt.query_map(params![bus_name, rule_name], |row| {
            Ok(EventTargetRecord { rule_name: row.get(0)?, target_id: row.get(1)?, arn: row.get(2)?, input_transformer: row.get(3)? })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn remove_targets(&self, bus_name: &str, rule_name: &str, target_ids: &[String]) -> Result<()> {
        let conn = self.get_connection()?;
        for id in target_ids {
            conn.execute(
                "DELETE FROM event_targets WHERE bus_name = ?1 AND rule_name = ?2 AND target_id = ?3",
                params![bus_name, rule_name, id],
            )?;
        }
        Ok(())
    }

    /// Every enabled rule on the bus, regardless of pattern — pattern
    /// matching itself happens in `crate::eventbus` against the live
    /// event, not here.
    pub fn enabled_rules(&self, bus_name: &str) -> Result<Vec<EventRuleRecord>> {
        Ok(self.list_rules(bus_name)?.into_iter().filter(|r| r.state == "ENABLED").collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    #[test]
    fn rule_and_target_round_trip() {
        let engine = engine();
        engine.create_event_bus("default").unwrap();
        engine.put_rule("default", "r1", Some("{\"source\":[\"app\"]}"), None, "ENABLED").unwrap();
        engine.put_targets("default", "r1", &[("t1".into(), "arn:aws:sqs:::q".into(), None)]).unwrap();

        let targets = engine.list_targets("default", "r1").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].arn, "arn:aws:sqs:::q");

        let enabled = engine.enabled_rules("default").unwrap();
        assert_eq!(enabled.len(), 1);
    }

    #[test]
    fn delete_bus_cascades_rules_and_targets() {
        let engine = engine();
        engine.create_event_bus("b").unwrap();
        engine.put_rule("b", "r", None, None, "ENABLED").unwrap();
        engine.put_targets("b", "r", &[("t".into(), "arn:x".into(), None)]).unwrap();
        engine.delete_event_bus("b").unwrap();
        assert!(engine.list_rules("b").unwrap().is_empty());
    }
}
