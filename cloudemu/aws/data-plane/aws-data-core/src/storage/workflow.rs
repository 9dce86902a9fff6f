//! Workflow engine (component I) persistence: state machine
//! definitions and execution history. The ASL interpreter itself lives
//! in the control plane, which drives this module purely as a record
//! of what's been started and how it played out.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineRecord {
    pub name: String,
    pub arn: String,
    pub definition: serde_json::Value,
    pub role_arn: Option<String>,
    pub workflow_type: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub arn: String,
    pub state_machine_arn: String,
    pub name: String,
    pub status: String,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub cause: Option<String>,
    pub started_at: String,
    pub stopped_at: Option<String>,
    pub history: Vec<serde_json::Value>,
}

impl StorageEngine {
    pub fn create_state_machine(&self, name: &str, definition: serde_json::Value, role_arn: Option<&str>, workflow_type: &str) -> Result<StateMachineRecord> {
        let arn = format!("arn:aws:states:{}:{}:stateMachine:{}", self.region, self.account_id, name);
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO sf_state_machines (name, arn, definition, role_arn, workflow_type, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![name, arn, definition.to_string(), role_arn, workflow_type, now],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                EmulatorError::AlreadyExists(format!("state machine {name} already exists"))
            } else {
                EmulatorError::Database(e.to_string())
            }
        })?;
        Ok(StateMachineRecord { name: name.to_string(), arn, definition, role_arn: role_arn.map(str::to_string), workflow_type: workflow_type.to_string(), created_at: now })
    }

    pub fn describe_state_machine(&self, arn: &str) -> Result<StateMachineRecord> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT name, arn, definition, role_arn, workflow_type, created_at FROM sf_state_machines WHERE arn = ?1",
            params![arn],
            row_to_state_machine,
        )
        .map_err(|_| EmulatorError::StateMachineDoesNotExist(arn.to_string()))
    }

    pub fn state_machine_by_name(&self, name: &str) -> Result<StateMachineRecord> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT name, arn, definition, role_arn, workflow_type, created_at FROM sf_state_machines WHERE name = ?1",
            params![name],
            row_to_state_machine,
        )
        .map_err(|_| EmulatorError::StateMachineDoesNotExist(name.to_string()))
    }

    pub fn list_state_machines(&self) -> Result<Vec<StateMachineRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name, arn, definition, role_arn, workflow_type, created_at FROM sf_state_machines ORDER BY name")?;
        let rows = stmt.query_map([], row_to_state_machine)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn delete_state_machine(&self, arn: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute("DELETE FROM sf_state_machines WHERE arn = ?1", params![arn])?;
        if changed == 0 {
            return Err(EmulatorError::StateMachineDoesNotExist(arn.to_string()));
        }
        Ok(())
    }

    pub fn start_execution(&self, state_machine_arn: &str, name: &str, input: serde_json::Value) -> Result<ExecutionRecord> {
        let arn = format!("{}:execution:{}", state_machine_arn.replace(":stateMachine:", ":execution:"), name);
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO sf_executions (arn, state_machine_arn, name, status, input, output, error, cause, started_at, stopped_at, history)
             VALUES (?1, ?2, ?3, 'RUNNING', ?4, NULL, NULL, NULL, ?5, NULL, '[]')",
            params![arn, state_machine_arn, name, input.to_string(), now],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                EmulatorError::AlreadyExists(format!("execution {name} already exists"))
            } else {
                EmulatorError::Database(e.to_string())
            }
        })?;
        Ok(ExecutionRecord {
            arn,
            state_machine_arn: state_machine_arn.to_string(),
            name: name.to_string(),
            status: "RUNNING".into(),
            input,
            output: None,
            error: None,
            cause: None,
            started_at: now,
            stopped_at: None,
            history: vec![],
        })
    }

    pub fn append_history(&self, execution_arn: &str, event: serde_json::Value) -> Result<()> {
        let mut record = self.describe_execution(execution_arn)?;
        record.history.push(event);
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE sf_executions SET history = ?1 WHERE arn = ?2",
            params![serde_json::to_string(&record.history)?, execution_arn],
        )?;
        Ok(())
    }

    pub fn finish_execution(&self, execution_arn: &str, status: &str, output: Option<serde_json::Value>, error: Option<&str>, cause: Option<&str>) -> Result<()> {
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE sf_executions SET status = ?1, output = ?2, error = ?3, cause = ?4, stopped_at = ?5 WHERE arn = ?6",
            params![status, output.map(|o| o.to_string()), error, cause, now, execution_arn],
        )?;
        if changed == 0 {
            return Err(EmulatorError::ExecutionDoesNotExist(execution_arn.to_string()));
        }
        Ok(())
    }

    pub fn describe_execution(&self, arn: &str) -> Result<ExecutionRecord> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT arn, state_machine_arn, name, status, input, output, error, cause, started_at, stopped_at, history FROM sf_executions WHERE arn = ?1",
            params![arn],
            row_to_execution,
        )
        .map_err(|_| EmulatorError::ExecutionDoesNotExist(arn.to_string()))
    }

    pub fn list_executions(&self, state_machine_arn: &str, status_filter: Option<&str>) -> Result<Vec<ExecutionRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT arn, state_machine_arn, name, status, input, output, error, cause, started_at, stopped_at, history
             FROM sf_executions WHERE state_machine_arn = ?1 ORDER BY started_at DESC",
        )?;
        let rows = stmt
            .query_map(params![state_machine_arn], row_to_execution)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(match status_filter {
            Some(s) => rows.into_iter().filter(|e| e.status == s).collect(),
            None => rows,
        })
    }
}

fn row_to_state_machine(row: &rusqlite::Row) -> rusqlite::Result<StateMachineRecord> {
    let definition_json: String = row.get(2)?;
    Ok(StateMachineRecord {
        name: row.get(0)?,
        arn: row.get(1)?,
        definition: serde_json::from_str(&definition_json).unwrap_or(serde_json::json!({})),
        role_arn: row.get(3)?,
        workflow_type: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn row_to_execution(row: &rusqlite::Row) -> rusqlite::Result<ExecutionRecord> {
    let input_json: String = row.get(4)?;
    let output_json: Option<String> = row.get(5)?;
    let history_json: String = row.get(10)?;
    Ok(ExecutionRecord {
        arn: row.get(0)?,
        state_machine_arn: row.get(1)?,
        name: row.get(2)?,
        status: row.get(3)?,
        input: serde_json::from_str(&input_json).unwrap_or(serde_json::json!({})),
        output: output_json.and_then(|s| serde_json::from_str(&s).ok()),
        error: row.get(6)?,
        cause: row.get(7)?,
        started_at: row.get(8)?,
        stopped_at: row.get(9)?,
        history: serde_json::from_str(&history_json).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    #[test]
    fn start_append_history_and_finish() {
        let engine = engine();
        let sm = engine.create_state_machine("sm", serde_json::json!({"StartAt": "A"}), None, "STANDARD").unwrap();
        let exec = engine.start_execution(&sm.arn, "run1", serde_json::json!({"x": 1})).unwrap();
        engine.append_history(&exec.arn, serde_json::json!({"type": "ExecutionStarted"})).unwrap();
        engine.finish_execution(&exec.arn, "SUCCEEDED", Some(serde_json::json!({"y": 2})), None, None).unwrap();

        let record = engine.describe_execution(&exec.arn).unwrap();
        assert_eq!(record.status, "SUCCEEDED");
        assert_eq!(record.history.len(), 1);
        assert_eq!(record.output.unwrap(), serde_json::json!({"y": 2}));
    }

    #[test]
    fn list_executions_filters_by_status() {
        let engine = engine();
        let sm = engine.create_state_machine("sm", serde_json::json!({}), None, "STANDARD").unwrap();
        let e1 = engine.start_execution(&sm.arn, "r1", serde_json::json!({})).unwrap();
        engine.start_execution(&sm.arn, "r2", serde_json::json!({})).unwrap();
        engine.finish_execution(&e1.arn, "SUCCEEDED", None, None, None).unwrap();

        let running = engine.list_executions(&sm.arn, Some("RUNNING")).unwrap();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].name, "r2");
    }
}
