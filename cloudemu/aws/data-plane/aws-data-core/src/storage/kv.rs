//! KV engine (component D): a single-partition-plus-sort-key document
//! store with conditional writes, update expressions, secondary
//! indexes, change streams, and a simulated eventually-consistent read
//! path. Grounded on the DynamoDB wire dialect this engine backs.
//!
//! Items are stored as plain JSON (never DynamoDB-tagged — that
//! conversion happens at the wire adapter via [`crate::codec`]).
//! Partition/sort key values are stringified into the `pk`/`sk`
//! columns purely for SQL indexing; the authoritative typed values
//! live inside the stored `item` JSON blob.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use crate::expr::{self, Names, Values};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySchema {
    pub partition_key: String,
    pub sort_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GsiDefinition {
    pub name: String,
    pub partition_key: String,
    pub sort_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescription {
    pub name: String,
    pub arn: String,
    pub key_schema: KeySchema,
    pub gsis: Vec<GsiDefinition>,
    pub billing_mode: String,
    pub status: String,
    pub created_at: String,
}

pub struct CreateTableParams {
    pub name: String,
    pub key_schema: KeySchema,
    pub gsis: Vec<GsiDefinition>,
    pub billing_mode: String,
}

/// A single mutation, as handed to the event propagation fabric's
/// KV change-stream consumer.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord {
    pub sequence_number: i64,
    pub table_name: String,
    pub event_name: ChangeEventName,
    pub keys: Map<String, Value>,
    pub old_image: Option<Map<String, Value>>,
    pub new_image: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum ChangeEventName {
    Insert,
    Modify,
    Remove,
}

struct VersionRecord {
    written_at: Instant,
    previous: Option<Map<String, Value>>,
}

/// How long a stale read may still observe the pre-write snapshot,
/// simulating the brief inconsistency window of a non-`ConsistentRead`
/// GetItem against a real regional store.
const EVENTUAL_CONSISTENCY_WINDOW: Duration = Duration::from_millis(50);

#[derive(Default)]
pub(crate) struct KvRuntime {
    change_log: HashMap<String, VecDeque<ChangeRecord>>,
    versions: HashMap<(String, String, String), VersionRecord>,
}

static SEQUENCE: AtomicI64 = AtomicI64::new(1);

const CHANGE_LOG_CAP: usize = 10_000;

impl StorageEngine {
    pub fn create_table(&self, p: CreateTableParams) -> Result<TableDescription> {
        let arn = format!("arn:aws:dynamodb:{}:{}:table/{}", self.region, self.account_id, p.name);
        let now = Self::now_rfc3339();
        let key_schema_json = serde_json::to_string(&p.key_schema)?;
        let gsis_json = serde_json::to_string(&p.gsis)?;

        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO ddb_tables (name, arn, key_schema, attribute_definitions, gsis, billing_mode, status, created_at)
             VALUES (?1, ?2, ?3, '[]', ?4, ?5, 'ACTIVE', ?6)",
            params![p.name, arn, key_schema_json, gsis_json, p.billing_mode, now],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                EmulatorError::AlreadyExists(format!("table {} already exists", p.name))
            } else {
                EmulatorError::Database(e.to_string())
            }
        })?;

        Ok(TableDescription {
            name: p.name,
            arn,
            key_schema: p.key_schema,
            gsis: p.gsis,
            billing_mode: p.billing_mode,
            status: "ACTIVE".to_string(),
            created_at: now,
        })
    }

    pub fn describe_table(&self, name: &str) -> Result<TableDescription> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT name, arn, key_schema, gsis, billing_mode, status, created_at FROM ddb_tables WHERE name = ?1",
            params![name],
            row_to_table,
        )
        .map_err(|_| EmulatorError::NotFound("Table".into(), name.into()))
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name FROM ddb_tables ORDER BY name")?;
        let names = stmt.query_map([], |row| row.get(0))?.collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn delete_table(&self, name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM ddb_items WHERE table_name = ?1", params![name])?;
        let changed = conn.execute("DELETE FROM ddb_tables WHERE name = ?1", params![name])?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("Table".into(), name.into()));
        }
        Ok(())
    }

    fn key_tuple(&self, schema: &KeySchema, item: &Map<String, Value>) -> Result<(String, String)> {
        let pk = item.get(&schema.partition_key).ok_or_else(|| {
            EmulatorError::InvalidArgument(format!("missing partition key {}", schema.partition_key))
        })?;
        let sk = match &schema.sort_key {
            Some(name) => item
                .get(name)
                .ok_or_else(|| EmulatorError::InvalidArgument(format!("missing sort key {name}")))?
                .clone(),
            None => Value::Null,
        };
        Ok((stringify_key(pk), stringify_key(&sk)))
    }

    /// Insert or fully replace an item. `condition_expr` (DynamoDB
    /// `ConditionExpression` syntax) is evaluated against the
    /// pre-write item (empty object if none existed) before applying.
    pub fn put_item(
        &self,
        table: &str,
        item: Map<String, Value>,
        condition_expr: Option<&str>,
        names: &Names,
        values: &Values,
    ) -> Result<Option<Map<String, Value>>> {
        let desc = self.describe_table(table)?;
        let (pk, sk) = self.key_tuple(&desc.key_schema, &item)?;

        let existing = self.read_item_row(table, &pk, &sk)?;
        if let Some(expr_str) = condition_expr {
            let probe = existing.clone().unwrap_or_default();
            if !expr::evaluate_condition(expr_str, &probe, names, values)? {
                return Err(EmulatorError::ConditionalCheckFailed(
                    "the conditional request failed".into(),
                ));
            }
        }

        let now = chrono::Utc::now().timestamp_millis();
        let item_json = serde_json::to_string(&Value::Object(item.clone()))?;
        {
            let conn = self.get_connection()?;
            conn.execute(
                "INSERT INTO ddb_items (table_name, pk, sk, item, version_ts) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(table_name, pk, sk) DO UPDATE SET item = excluded.item, version_ts = excluded.version_ts",
                params![table, pk, sk, item_json, now],
            )?;
        }

        self.record_change(
            table,
            &item,
            if existing.is_some() { ChangeEventName::Modify } else { ChangeEventName::Insert },
            existing.clone(),
            Some(item.clone()),
        );
        self.stash_version(table, &pk, &sk, existing.clone());

        Ok(existing)
    }

    pub fn get_item(&self, table: &str, key: &Map<String, Value>, consistent_read: bool) -> Result<Option<Map<String, Value>>> {
        let desc = self.describe_table(table)?;
        let (pk, sk) = self.key_tuple(&desc.key_schema, key)?;

        if !consistent_read {
            if let Some(stale) = self.maybe_stale_read(table, &pk, &sk) {
                return Ok(stale);
            }
        }
        self.read_item_row(table, &pk, &sk)
    }

    pub fn delete_item(
        &self,
        table: &str,
        key: &Map<String, Value>,
        condition_expr: Option<&str>,
        names: &Names,
        values: &Values,
    ) -> Result<Option<Map<String, Value>>> {
        let desc = self.describe_table(table)?;
        let (pk, sk) = self.key_tuple(&desc.key_schema, key)?;
        let existing = self.read_item_row(table, &pk, &sk)?;

        if let Some(expr_str) = condition_expr {
            let probe = existing.clone().unwrap_or_default();
            if !expr::evaluate_condition(expr_str, &probe, names, values)? {
                return Err(EmulatorError::ConditionalCheckFailed(
                    "the conditional request failed".into(),
                ));
            }
        }

        if existing.is_some() {
            let conn = self.get_connection()?;
            conn.execute(
                "DELETE FROM ddb_items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
                params![table, pk, sk],
            )?;
            self.record_change(table, key, ChangeEventName::Remove, existing.clone(), None);
            self.stash_version(table, &pk, &sk, existing.clone());
        }

        Ok(existing)
    }

    pub fn update_item(
        &self,
        table: &str,
        key: &Map<String, Value>,
        update_expr: &str,
        condition_expr: Option<&str>,
        names: &Names,
        values: &Values,
    ) -> Result<Map<String, Value>> {
        let desc = self.describe_table(table)?;
        let (pk, sk) = self.key_tuple(&desc.key_schema, key)?;
        let existing = self.read_item_row(table, &pk, &sk)?;

        if let Some(expr_str) = condition_expr {
            let probe = existing.clone().unwrap_or_default();
            if !expr::evaluate_condition(expr_str, &probe, names, values)? {
                return Err(EmulatorError::ConditionalCheckFailed(
                    "the conditional request failed".into(),
                ));
            }
        }

        let mut item = existing.clone().unwrap_or_else(|| key.clone());
        expr::apply_update(update_expr, &mut item, names, values)?;

        let now = chrono::Utc::now().timestamp_millis();
        let item_json = serde_json::to_string(&Value::Object(item.clone()))?;
        {
            let conn = self.get_connection()?;
            conn.execute(
                "INSERT INTO ddb_items (table_name, pk, sk, item, version_ts) VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(table_name, pk, sk) DO UPDATE SET item = excluded.item, version_ts = excluded.version_ts",
                params![table, pk, sk, item_json, now],
            )?;
        }

        self.record_change(
            table,
            &item,
            if existing.is_some() { ChangeEventName::Modify } else { ChangeEventName::Insert },
            existing,
            Some(item.clone()),
        );
        self.stash_version(table, &pk, &sk, None);

        Ok(item)
    }

    /// Query a single partition (optionally through a GSI, filtered
    /// at read time rather than via a materialized index table — a
    /// table without the GSI's partition key attribute simply never
    /// matches, which is this engine's answer to "skip the index row
    /// when the partition key is absent").
    #[allow(clippy::too_many_arguments)]
    pub fn query(
        &self,
        table: &str,
        index_name: Option<&str>,
        partition_value: &Value,
        sort_key_condition: Option<&str>,
        filter_expr: Option<&str>,
        names: &Names,
        values: &Values,
        scan_index_forward: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>> {
        let desc = self.describe_table(table)?;
        let (pk_name, sk_name) = match index_name {
            Some(idx) => {
                let gsi = desc
                    .gsis
                    .iter()
                    .find(|g| g.name == idx)
                    .ok_or_else(|| EmulatorError::InvalidArgument(format!("no such index {idx}")))?;
                (gsi.partition_key.clone(), gsi.sort_key.clone())
            }
            None => (desc.key_schema.partition_key.clone(), desc.key_schema.sort_key.clone()),
        };

        let all = self.scan_all_items(table)?;
        let mut matched: Vec<Map<String, Value>> = all
            .into_iter()
            .filter(|item| item.get(&pk_name).map(|v| v == partition_value).unwrap_or(false))
            .filter(|item| match (sort_key_condition, &sk_name) {
                (Some(cond), Some(name)) => {
                    let mut probe = Map::new();
                    if let Some(v) = item.get(name) {
                        probe.insert(name.clone(), v.clone());
                    }
                    expr::evaluate_condition(cond, &probe, names, values).unwrap_or(false)
                }
                _ => true,
            })
            .filter(|item| match filter_expr {
                Some(f) => expr::evaluate_filter(f, item, names, values).unwrap_or(false),
                None => true,
            })
            .collect();

        if let Some(name) = &sk_name {
            matched.sort_by(|a, b| compare_values(a.get(name), b.get(name)));
            if !scan_index_forward {
                matched.reverse();
            }
        }
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    pub fn scan(
        &self,
        table: &str,
        filter_expr: Option<&str>,
        names: &Names,
        values: &Values,
        limit: Option<usize>,
    ) -> Result<Vec<Map<String, Value>>> {
        let mut items = self.scan_all_items(table)?;
        if let Some(f) = filter_expr {
            items.retain(|item| expr::evaluate_filter(f, item, names, values).unwrap_or(false));
        }
        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    pub fn batch_write(&self, table: &str, puts: Vec<Map<String, Value>>, deletes: Vec<Map<String, Value>>) -> Result<()> {
        for item in puts {
            self.put_item(table, item, None, &Names::new(), &Values::new())?;
        }
        for key in deletes {
            self.delete_item(table, &key, None, &Names::new(), &Values::new())?;
        }
        Ok(())
    }

    pub fn batch_get(&self, table: &str, keys: &[Map<String, Value>]) -> Result<Vec<Map<String, Value>>> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(item) = self.get_item(table, key, false)? {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Pull up to `limit` change records newer than `after_sequence`
    /// for the fabric's KV consumer.
    pub fn poll_changes(&self, table: &str, after_sequence: i64, limit: usize) -> Vec<ChangeRecord> {
        let rt = self.kv_runtime.lock();
        rt.change_log
            .get(table)
            .map(|log| {
                log.iter()
                    .filter(|c| c.sequence_number > after_sequence)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn scan_all_items(&self, table: &str) -> Result<Vec<Map<String, Value>>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT item FROM ddb_items WHERE table_name = ?1")?;
        let rows = stmt
            .query_map(params![table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        rows.into_iter()
            .map(|s| {
                let v: Value = serde_json::from_str(&s)?;
                Ok(v.as_object().cloned().unwrap_or_default())
            })
            .collect()
    }

    fn read_item_row(&self, table: &str, pk: &str, sk: &str) -> Result<Option<Map<String, Value>>> {
        let conn = self.get_connection()?;
        let row: Option<String> = conn
            .query_row(
                "SELECT item FROM ddb_items WHERE table_name = ?1 AND pk = ?2 AND sk = ?3",
                params![table, pk, sk],
                |row| row.get(0),
            )
            .ok();
        match row {
            Some(s) => Ok(Some(serde_json::from_str::<Value>(&s)?.as_object().cloned().unwrap_or_default())),
            None => Ok(None),
        }
    }

    fn record_change(
        &self,
        table: &str,
        keys_item: &Map<String, Value>,
        event: ChangeEventName,
        old_image: Option<Map<String, Value>>,
        new_image: Option<Map<String, Value>>,
    ) {
        let seq = SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let keys = keys_item.clone();
        let mut rt = self.kv_runtime.lock();
        let log = rt.change_log.entry(table.to_string()).or_default();
        log.push_back(ChangeRecord {
            sequence_number: seq,
            table_name: table.to_string(),
            event_name: event,
            keys,
            old_image,
            new_image,
        });
        while log.len() > CHANGE_LOG_CAP {
            log.pop_front();
        }
    }

    fn stash_version(&self, table: &str, pk: &str, sk: &str, previous: Option<Map<String, Value>>) {
        let mut rt = self.kv_runtime.lock();
        rt.versions.insert(
            (table.to_string(), pk.to_string(), sk.to_string()),
            VersionRecord { written_at: Instant::now(), previous },
        );
    }

    fn maybe_stale_read(&self, table: &str, pk: &str, sk: &str) -> Option<Option<Map<String, Value>>> {
        let rt = self.kv_runtime.lock();
        let rec = rt.versions.get(&(table.to_string(), pk.to_string(), sk.to_string()))?;
        if rec.written_at.elapsed() < EVENTUAL_CONSISTENCY_WINDOW {
            Some(rec.previous.clone())
        } else {
            None
        }
    }
}

fn stringify_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(std::cmp::Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => std::cmp::Ordering::Equal,
    }
}

fn row_to_table(row: &rusqlite::Row) -> rusqlite::Result<TableDescription> {
    let key_schema_json: String = row.get(2)?;
    let gsis_json: String = row.get(3)?;
    Ok(TableDescription {
        name: row.get(0)?,
        arn: row.get(1)?,
        key_schema: serde_json::from_str(&key_schema_json).unwrap_or(KeySchema { partition_key: "id".into(), sort_key: None }),
        gsis: serde_json::from_str(&gsis_json).unwrap_or_default(),
        billing_mode: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    fn schema() -> KeySchema {
        KeySchema { partition_key: "pk".into(), sort_key: Some("sk".into()) }
    }

    #[test]
    fn put_get_delete_round_trip() {
        let engine = engine();
        engine
            .create_table(CreateTableParams { name: "t".into(), key_schema: schema(), gsis: vec![], billing_mode: "PAY_PER_REQUEST".into() })
            .unwrap();

        let item = json!({"pk": "a", "sk": "1", "name": "widget"}).as_object().unwrap().clone();
        engine.put_item("t", item.clone(), None, &Names::new(), &Values::new()).unwrap();

        let key = json!({"pk": "a", "sk": "1"}).as_object().unwrap().clone();
        let got = engine.get_item("t", &key, true).unwrap().unwrap();
        assert_eq!(got.get("name").unwrap(), "widget");

        engine.delete_item("t", &key, None, &Names::new(), &Values::new()).unwrap();
        assert!(engine.get_item("t", &key, true).unwrap().is_none());
    }

    #[test]
    fn conditional_put_rejects_when_exists() {
        let engine = engine();
        engine
            .create_table(CreateTableParams { name: "t".into(), key_schema: schema(), gsis: vec![], billing_mode: "PAY_PER_REQUEST".into() })
            .unwrap();
        let item = json!({"pk": "a", "sk": "1"}).as_object().unwrap().clone();
        engine.put_item("t", item.clone(), None, &Names::new(), &Values::new()).unwrap();

        let result = engine.put_item("t", item, Some("attribute_not_exists(pk)"), &Names::new(), &Values::new());
        assert!(matches!(result, Err(EmulatorError::ConditionalCheckFailed(_))));
    }

    #[test]
    fn query_respects_sort_key_condition() {
        let engine = engine();
        engine
            .create_table(CreateTableParams { name: "t".into(), key_schema: schema(), gsis: vec![], billing_mode: "PAY_PER_REQUEST".into() })
            .unwrap();
        for i in 0..5 {
            let item = json!({"pk": "a", "sk": i.to_string(), "n": i}).as_object().unwrap().clone();
            engine.put_item("t", item, None, &Names::new(), &Values::new()).unwrap();
        }

        let mut values = Values::new();
        values.insert(":s".into(), json!("2"));
        let results = engine
            .query("t", None, &json!("a"), Some("sk > :s"), None, &Names::new(), &values, true, None)
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn update_item_applies_set_expression() {
        let engine = engine();
        engine
            .create_table(CreateTableParams { name: "t".into(), key_schema: schema(), gsis: vec![], billing_mode: "PAY_PER_REQUEST".into() })
            .unwrap();
        let key = json!({"pk": "a", "sk": "1"}).as_object().unwrap().clone();
        engine.put_item("t", key.clone(), None, &Names::new(), &Values::new()).unwrap();

        let mut values = Values::new();
        values.insert(":c".into(), json!(1));
        let updated = engine.update_item("t", &key, "SET counter = :c", None, &Names::new(), &values).unwrap();
        assert_eq!(updated.get("counter").unwrap(), &json!(1));
    }
}
