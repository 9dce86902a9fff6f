use crate::config::Config;
use crate::error::{EmulatorError, Result};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Shared SQLite-backed metadata store plus a content-addressed blob
/// directory for object/function-code payloads too large to keep
/// inline in a row.
///
/// One instance is built at process start and handed to every service
/// handler behind an `Arc`; SQLite's own locking plus the outer
/// `Mutex<Connection>` are enough concurrency control for the single
/// connection this emulator keeps open.
pub struct StorageEngine {
    db: Mutex<Connection>,
    blob_dir: Option<PathBuf>,
    pub account_id: String,
    pub region: String,
    pub(super) kv_runtime: Mutex<super::kv::KvRuntime>,
    pub(super) object_runtime: Mutex<super::object::ObjectRuntime>,
}

impl StorageEngine {
    pub fn new(data_dir: &std::path::Path, account_id: &str, region: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("ldk.sqlite3");
        let conn = Connection::open(db_path)?;
        let blob_dir = data_dir.join("blobs");
        std::fs::create_dir_all(&blob_dir)?;
        let engine = StorageEngine {
            db: Mutex::new(conn),
            blob_dir: Some(blob_dir),
            account_id: account_id.to_string(),
            region: region.to_string(),
            kv_runtime: Mutex::new(Default::default()),
            object_runtime: Mutex::new(Default::default()),
        };
        engine.init_schema()?;
        Ok(engine)
    }

    pub fn in_memory(account_id: &str, region: &str) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let engine = StorageEngine {
            db: Mutex::new(conn),
            blob_dir: None,
            account_id: account_id.to_string(),
            region: region.to_string(),
            kv_runtime: Mutex::new(Default::default()),
            object_runtime: Mutex::new(Default::default()),
        };
        engine.init_schema()?;
        Ok(engine)
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        if config.in_memory {
            Self::in_memory(&config.account_id, &config.region)
        } else {
            Self::new(&config.data_dir, &config.account_id, &config.region)
        }
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute_batch(super::schema::SCHEMA)?;
        Ok(())
    }

    pub(super) fn get_connection(&self) -> Result<MutexGuard<'_, Connection>> {
        Ok(self.db.lock())
    }

    /// Write `bytes` to the blob store, keyed by their SHA-256 digest,
    /// and return the hex digest. Idempotent: re-storing identical
    /// content is a no-op past the hash computation.
    pub fn store_object_data(&self, bytes: &[u8]) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hex::encode(hasher.finalize());
        if let Some(dir) = &self.blob_dir {
            let path = dir.join(&digest);
            if !path.exists() {
                std::fs::write(path, bytes)?;
            }
        } else {
            // in-memory engines keep blobs in the same sqlite file
            let conn = self.get_connection()?;
            conn.execute(
                "INSERT OR IGNORE INTO blobs (hash, data) VALUES (?1, ?2)",
                rusqlite::params![digest, bytes],
            )?;
        }
        Ok(digest)
    }

    pub fn read_object_data(&self, digest: &str) -> Result<Vec<u8>> {
        if let Some(dir) = &self.blob_dir {
            let path = dir.join(digest);
            std::fs::read(&path).map_err(|_| EmulatorError::NotFound("Blob".into(), digest.into()))
        } else {
            let conn = self.get_connection()?;
            conn.query_row(
                "SELECT data FROM blobs WHERE hash = ?1",
                rusqlite::params![digest],
                |row| row.get(0),
            )
            .map_err(|_| EmulatorError::NotFound("Blob".into(), digest.into()))
        }
    }

    pub fn delete_object_data(&self, digest: &str) -> Result<()> {
        if let Some(dir) = &self.blob_dir {
            let path = dir.join(digest);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        } else {
            let conn = self.get_connection()?;
            conn.execute("DELETE FROM blobs WHERE hash = ?1", rusqlite::params![digest])?;
        }
        Ok(())
    }

    pub fn now_rfc3339() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip_in_memory() {
        let engine = StorageEngine::in_memory("000000000000", "us-east-1").unwrap();
        let digest = engine.store_object_data(b"hello world").unwrap();
        assert_eq!(engine.read_object_data(&digest).unwrap(), b"hello world");
    }

    #[test]
    fn schema_initializes_without_error() {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap();
    }
}
