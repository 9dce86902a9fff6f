//! Parameter store: flat namespace of versioned String/StringList/
//! SecureString values. SecureString values are stored as plain text —
//! this emulator has no KMS component to encrypt them against, the
//! same simplification the secrets store makes for at-rest encryption.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub value: String,
    pub parameter_type: String,
    pub version: i64,
    pub last_modified: String,
}

impl StorageEngine {
    pub fn put_parameter(&self, name: &str, value: &str, parameter_type: &str, overwrite: bool) -> Result<i64> {
        let conn = self.get_connection()?;
        let existing: Option<i64> = conn
            .query_row("SELECT version FROM parameters WHERE name = ?1", params![name], |r| r.get(0))
            .ok();

        if existing.is_some() && !overwrite {
            return Err(EmulatorError::AlreadyExists(format!("parameter {name} already exists")));
        }

        let version = existing.map(|v| v + 1).unwrap_or(1);
        let now = Self::now_rfc3339();
        conn.execute(
            "INSERT INTO parameters (name, value, type, version, last_modified) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, type = excluded.type, version = excluded.version, last_modified = excluded.last_modified",
            params![name, value, parameter_type, version, now],
        )?;
        Ok(version)
    }

    pub fn get_parameter(&self, name: &str) -> Result<ParameterRecord> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT name, value, type, version, last_modified FROM parameters WHERE name = ?1",
            params![name],
            row_to_parameter,
        )
        .map_err(|_| EmulatorError::NotFound("Parameter".into(), name.into()))
    }

    pub fn get_parameters_by_path(&self, path: &str, recursive: bool) -> Result<Vec<ParameterRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name, value, type, version, last_modified FROM parameters ORDER BY name")?;
        let rows = stmt.query_map([], row_to_parameter)?.collect::<std::result::Result<Vec<_>, _>>()?;
        let prefix = if path.ends_with('/') { path.to_string() } else { format!("{path}/") };
        Ok(rows
            .into_iter()
            .filter(|p| p.name.starts_with(&prefix))
            .filter(|p| recursive || !p.name[prefix.len()..].contains('/'))
            .collect())
    }

    pub fn delete_parameter(&self, name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute("DELETE FROM parameters WHERE name = ?1", params![name])?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("Parameter".into(), name.into()));
        }
        Ok(())
    }
}

fn row_to_parameter(row: &rusqlite::Row) -> rusqlite::Result<ParameterRecord> {
    Ok(ParameterRecord {
        name: row.get(0)?,
        value: row.get(1)?,
        parameter_type: row.get(2)?,
        version: row.get(3)?,
        last_modified: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    #[test]
    fn put_without_overwrite_rejects_duplicate() {
        let engine = engine();
        engine.put_parameter("/app/db/host", "localhost", "String", false).unwrap();
        assert!(matches!(
            engine.put_parameter("/app/db/host", "other", "String", false),
            Err(EmulatorError::AlreadyExists(_))
        ));
    }

    #[test]
    fn overwrite_bumps_version() {
        let engine = engine();
        engine.put_parameter("/app/db/host", "v1", "String", false).unwrap();
        let v2 = engine.put_parameter("/app/db/host", "v2", "String", true).unwrap();
        assert_eq!(v2, 2);
        assert_eq!(engine.get_parameter("/app/db/host").unwrap().value, "v2");
    }

    #[test]
    fn path_query_respects_recursion() {
        let engine = engine();
        engine.put_parameter("/app/db/host", "h", "String", false).unwrap();
        engine.put_parameter("/app/db/creds/user", "u", "String", false).unwrap();
        engine.put_parameter("/app/cache/host", "c", "String", false).unwrap();

        let shallow = engine.get_parameters_by_path("/app/db", false).unwrap();
        assert_eq!(shallow.len(), 1);

        let deep = engine.get_parameters_by_path("/app/db", true).unwrap();
        assert_eq!(deep.len(), 2);
    }
}
