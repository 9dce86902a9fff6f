//! Secrets store: named secrets with a version history and AWSCURRENT/
//! AWSPREVIOUS staging labels, modeled the way the real service tracks
//! "current" via a label pointer rather than a version counter.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub name: String,
    pub arn: String,
    pub description: Option<String>,
    pub current_version_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretVersion {
    pub version_id: String,
    pub secret_value: String,
    pub stages: Vec<String>,
    pub created_at: String,
}

impl StorageEngine {
    pub fn create_secret(&self, name: &str, secret_value: &str, description: Option<&str>) -> Result<SecretRecord> {
        let conn = self.get_connection()?;
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM secrets WHERE name = ?1 AND deleted_at IS NULL",
            params![name],
            |r| r.get(0),
        )?;
        if existing > 0 {
            return Err(EmulatorError::AlreadyExists(format!("secret {name} already exists")));
        }

        let arn = format!("arn:aws:secretsmanager:{}:{}:secret:{}", self.region, self.account_id, name);
        let now = Self::now_rfc3339();
        let version_id = Self::new_id();

        conn.execute(
            "INSERT INTO secrets (name, arn, description, current_version_id, created_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL)
             ON CONFLICT(name) DO UPDATE SET description = excluded.description, current_version_id = excluded.current_version_id, created_at = excluded.created_at, deleted_at = NULL",
            params![name, arn, description, version_id, now],
        )?;
        conn.execute(
            "INSERT INTO secret_versions (secret_name, version_id, secret_value, stages, created_at)
             VALUES (?1, ?2, ?3, '[\"AWSCURRENT\"]', ?4)",
            params![name, version_id, secret_value, now],
        )?;

        Ok(SecretRecord { name: name.to_string(), arn, description: description.map(str::to_string), current_version_id: Some(version_id), created_at: now })
    }

    pub fn get_secret_value(&self, name: &str, version_id: Option<&str>, version_stage: Option<&str>) -> Result<SecretVersion> {
        let conn = self.get_connection()?;
        let row = if let Some(v) = version_id {
            conn.query_row(
                "SELECT version_id, secret_value, stages, created_at FROM secret_versions WHERE secret_name = ?1 AND version_id = ?2",
                params![name, v],
                row_to_version,
            )
        } else {
            let stage = version_stage.unwrap_or("AWSCURRENT");
            conn.query_row(
                "SELECT version_id, secret_value, stages, created_at FROM secret_versions WHERE secret_name = ?1 AND stages LIKE ?2",
                params![name, format!("%\"{stage}\"%")],
                row_to_version,
            )
        };
        row.map_err(|_| EmulatorError::NotFound("Secret".into(), name.into()))
    }

    /// New version becomes AWSCURRENT; the prior AWSCURRENT is
    /// relabeled AWSPREVIOUS, matching the rotation contract every SDK
    /// client already assumes.
    pub fn put_secret_value(&self, name: &str, secret_value: &str) -> Result<SecretVersion> {
        let conn = self.get_connection()?;
        let exists: i64 = conn.query_row("SELECT COUNT(*) FROM secrets WHERE name = ?1 AND deleted_at IS NULL", params![name], |r| r.get(0))?;
        if exists == 0 {
            return Err(EmulatorError::NotFound("Secret".into(), name.into()));
        }

        conn.execute(
            "UPDATE secret_versions SET stages = '[\"AWSPREVIOUS\"]' WHERE secret_name = ?1 AND stages LIKE '%\"AWSCURRENT\"%'",
            params![name],
        )?;

        let version_id = Self::new_id();
        let now = Self::now_rfc3339();
        conn.execute(
            "INSERT INTO secret_versions (secret_name, version_id, secret_value, stages, created_at) VALUES (?1, ?2, ?3, '[\"AWSCURRENT\"]', ?4)",
            params![name, version_id, secret_value, now],
        )?;
        conn.execute("UPDATE secrets SET current_version_id = ?1 WHERE name = ?2", params![version_id, name])?;

        Ok(SecretVersion { version_id, secret_value: secret_value.to_string(), stages: vec!["AWSCURRENT".into()], created_at: now })
    }

    pub fn describe_secret(&self, name: &str) -> Result<SecretRecord> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT name, arn, description, current_version_id, created_at FROM secrets WHERE name = ?1 AND deleted_at IS NULL",
            params![name],
            |row| {
                Ok(SecretRecord {
                    name: row.get(0)?,
                    arn: row.get(1)?,
                    description: row.get(2)?,
                    current_version_id: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .map_err(|_| EmulatorError::NotFound("Secret".into(), name.into()))
    }

    pub fn list_secrets(&self) -> Result<Vec<SecretRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name, arn, description, current_version_id, created_at FROM secrets WHERE deleted_at IS NULL ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(SecretRecord {
                name: row.get(0)?,
                arn: row.get(1)?,
                description: row.get(2)?,
                current_version_id: row.get(3)?,
                created_at: row.get(4)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Soft delete: marks `deleted_at` so the name can't be reused by
    /// `describe_secret`/`get_secret_value` but the rows stay around
    /// (mirroring the real service's recovery window, without actually
    /// implementing a scheduled-deletion timer).
    pub fn delete_secret(&self, name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE secrets SET deleted_at = ?1 WHERE name = ?2 AND deleted_at IS NULL",
            params![Self::now_rfc3339(), name],
        )?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("Secret".into(), name.into()));
        }
        Ok(())
    }
}

fn row_to_version(row: &rusqlite::Row) -> rusqlite::Result<SecretVersion> {
    let stages_json: String = row.get(2)?;
    Ok(SecretVersion {
        version_id: row.get(0)?,
        secret_value: row.get(1)?,
        stages: serde_json::from_str(&stages_json).unwrap_or_default(),
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    #[test]
    fn create_and_get_round_trip() {
        let engine = engine();
        engine.create_secret("s", "hunter2", None).unwrap();
        let v = engine.get_secret_value("s", None, None).unwrap();
        assert_eq!(v.secret_value, "hunter2");
        assert_eq!(v.stages, vec!["AWSCURRENT"]);
    }

    #[test]
    fn put_secret_value_relabels_previous() {
        let engine = engine();
        engine.create_secret("s", "v1", None).unwrap();
        engine.put_secret_value("s", "v2").unwrap();

        let current = engine.get_secret_value("s", None, Some("AWSCURRENT")).unwrap();
        assert_eq!(current.secret_value, "v2");
        let previous = engine.get_secret_value("s", None, Some("AWSPREVIOUS")).unwrap();
        assert_eq!(previous.secret_value, "v1");
    }

    #[test]
    fn delete_prevents_further_reads() {
        let engine = engine();
        engine.create_secret("s", "v1", None).unwrap();
        engine.delete_secret("s").unwrap();
        assert!(matches!(engine.describe_secret("s"), Err(EmulatorError::NotFound(_, _))));
    }
}
