//! Function compute runtime (component: functions) persistence.
//!
//! Code packages are stored content-addressed via
//! [`StorageEngine::store_object_data`]; only the digest lives in the
//! `lambda_functions` row.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};

pub struct CreateFunctionParams<'a> {
    pub name: &'a str,
    pub runtime: &'a str,
    pub role: &'a str,
    pub handler: &'a str,
    pub code_bytes: &'a [u8],
    pub timeout_secs: u32,
    pub memory_mb: u32,
    pub environment: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionMetadata {
    pub name: String,
    pub arn: String,
    pub runtime: String,
    pub role: String,
    pub handler: String,
    pub timeout_secs: u32,
    pub memory_mb: u32,
    pub environment: serde_json::Value,
    pub last_modified: String,
    pub code_sha256: String,
}

impl StorageEngine {
    pub fn create_function(&self, p: CreateFunctionParams) -> Result<FunctionMetadata> {
        let arn = format!("arn:aws:lambda:{}:{}:function:{}", self.region, self.account_id, p.name);
        let last_modified = Self::now_rfc3339();
        let code_hash = self.store_object_data(p.code_bytes)?;
        let environment = p.environment.to_string();

        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO lambda_functions
                (name, arn, runtime, role, handler, code_hash, timeout_secs, memory_mb, environment, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![p.name, arn, p.runtime, p.role, p.handler, code_hash, p.timeout_secs, p.memory_mb, environment, last_modified],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                EmulatorError::AlreadyExists(format!("function {} already exists", p.name))
            } else {
                EmulatorError::Database(e.to_string())
            }
        })?;

        Ok(FunctionMetadata {
            name: p.name.to_string(),
            arn,
            runtime: p.runtime.to_string(),
            role: p.role.to_string(),
            handler: p.handler.to_string(),
            timeout_secs: p.timeout_secs,
            memory_mb: p.memory_mb,
            environment: p.environment,
            last_modified,
            code_sha256: code_hash,
        })
    }

    pub fn get_function(&self, name: &str) -> Result<FunctionMetadata> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT name, arn, runtime, role, handler, code_hash, timeout_secs, memory_mb, environment, last_modified
             FROM lambda_functions WHERE name = ?1 OR arn = ?1",
            params![name],
            row_to_function,
        )
        .map_err(|_| EmulatorError::NotFound("Function".into(), name.into()))
    }

    pub fn get_function_code(&self, name: &str) -> Result<Vec<u8>> {
        let hash: String = {
            let conn = self.get_connection()?;
            conn.query_row(
                "SELECT code_hash FROM lambda_functions WHERE name = ?1 OR arn = ?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|_| EmulatorError::NotFound("Function".into(), name.into()))?
        };
        self.read_object_data(&hash)
    }

    pub fn update_function_code(&self, name: &str, code_bytes: &[u8]) -> Result<FunctionMetadata> {
        let hash = self.store_object_data(code_bytes)?;
        let now = Self::now_rfc3339();
        {
            let conn = self.get_connection()?;
            conn.execute(
                "UPDATE lambda_functions SET code_hash = ?1, last_modified = ?2 WHERE name = ?3",
                params![hash, now, name],
            )?;
        }
        self.get_function(name)
    }

    pub fn delete_function(&self, name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute("DELETE FROM lambda_functions WHERE name = ?1 OR arn = ?1", params![name])?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("Function".into(), name.into()));
        }
        Ok(())
    }

    pub fn list_functions(&self) -> Result<Vec<FunctionMetadata>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT name, arn, runtime, role, handler, code_hash, timeout_secs, memory_mb, environment, last_modified
             FROM lambda_functions ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_function)?.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_function(row: &rusqlite::Row) -> rusqlite::Result<FunctionMetadata> {
    let env_text: String = row.get(8)?;
    Ok(FunctionMetadata {
        name: row.get(0)?,
        arn: row.get(1)?,
        runtime: row.get(2)?,
        role: row.get(3)?,
        handler: row.get(4)?,
        code_sha256: row.get(5)?,
        timeout_secs: row.get(6)?,
        memory_mb: row.get(7)?,
        environment: serde_json::from_str(&env_text).unwrap_or(serde_json::Value::Null),
        last_modified: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_and_list_function() {
        let engine = StorageEngine::in_memory("000000000000", "us-east-1").unwrap();
        engine
            .create_function(CreateFunctionParams {
                name: "hello",
                runtime: "provided.al2",
                role: "arn:aws:iam::000000000000:role/lambda",
                handler: "index.handler",
                code_bytes: b"fake zip bytes",
                timeout_secs: 3,
                memory_mb: 128,
                environment: serde_json::json!({"FOO": "bar"}),
            })
            .unwrap();

        let got = engine.get_function("hello").unwrap();
        assert_eq!(got.handler, "index.handler");
        assert_eq!(engine.get_function_code("hello").unwrap(), b"fake zip bytes");
        assert_eq!(engine.list_functions().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_name_rejected() {
        let engine = StorageEngine::in_memory("000000000000", "us-east-1").unwrap();
        let make = || CreateFunctionParams {
            name: "dup",
            runtime: "nodejs20.x",
            role: "role",
            handler: "h",
            code_bytes: b"x",
            timeout_secs: 3,
            memory_mb: 128,
            environment: serde_json::Value::Null,
        };
        engine.create_function(make()).unwrap();
        assert!(matches!(engine.create_function(make()), Err(EmulatorError::AlreadyExists(_))));
    }
}
