//! Object store (component F): bucket/key/version metadata in SQLite,
//! payload bytes content-addressed through [`StorageEngine::store_object_data`].
//! Versioned buckets keep every version row and flip `is_latest`;
//! unversioned buckets overwrite the sole row in place.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};

/// A single bucket mutation, as handed to the event propagation
/// fabric's object-notification consumer.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectNotificationRecord {
    pub sequence_number: i64,
    pub bucket: String,
    pub key: String,
    pub event_type: String,
}

#[derive(Default)]
pub(crate) struct ObjectRuntime {
    notification_log: VecDeque<ObjectNotificationRecord>,
}

static OBJECT_SEQUENCE: AtomicI64 = AtomicI64::new(1);

const NOTIFICATION_LOG_CAP: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketMetadata {
    pub name: String,
    pub region: String,
    pub versioning_enabled: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub bucket: String,
    pub key: String,
    pub version_id: String,
    pub content_hash: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: String,
    pub is_delete_marker: bool,
    pub metadata: serde_json::Value,
    pub last_modified: String,
}

pub struct ListObjectsPage {
    pub objects: Vec<ObjectMetadata>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

impl StorageEngine {
    pub fn create_bucket(&self, name: &str) -> Result<BucketMetadata> {
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO buckets (name, region, versioning_enabled, created_at) VALUES (?1, ?2, 0, ?3)",
            params![name, self.region, now],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                EmulatorError::BucketAlreadyExists(name.to_string())
            } else {
                EmulatorError::Database(e.to_string())
            }
        })?;
        Ok(BucketMetadata { name: name.to_string(), region: self.region.clone(), versioning_enabled: false, created_at: now })
    }

    pub fn delete_bucket(&self, name: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects WHERE bucket = ?1", params![name], |r| r.get(0))?;
        if count > 0 {
            return Err(EmulatorError::BucketNotEmpty(name.to_string()));
        }
        let changed = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
        if changed == 0 {
            return Err(EmulatorError::NoSuchBucket(name.to_string()));
        }
        Ok(())
    }

    pub fn list_buckets(&self) -> Result<Vec<BucketMetadata>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT name, region, versioning_enabled, created_at FROM buckets ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(BucketMetadata {
                name: row.get(0)?,
                region: row.get(1)?,
                versioning_enabled: row.get::<_, i64>(2)? != 0,
                created_at: row.get(3)?,
            })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn get_bucket(&self, name: &str) -> Result<BucketMetadata> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT name, region, versioning_enabled, created_at FROM buckets WHERE name = ?1",
            params![name],
            |row| {
                Ok(BucketMetadata {
                    name: row.get(0)?,
                    region: row.get(1)?,
                    versioning_enabled: row.get::<_, i64>(2)? != 0,
                    created_at: row.get(3)?,
                })
            },
        )
        .map_err(|_| EmulatorError::NoSuchBucket(name.to_string()))
    }

    pub fn set_bucket_versioning(&self, name: &str, enabled: bool) -> Result<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE buckets SET versioning_enabled = ?1 WHERE name = ?2",
            params![enabled, name],
        )?;
        if changed == 0 {
            return Err(EmulatorError::NoSuchBucket(name.to_string()));
        }
        Ok(())
    }

    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<ObjectMetadata> {
        let meta = self.put_object_inner(bucket, key, bytes, content_type, metadata)?;
        self.record_object_event(bucket, key, "ObjectCreated:Put");
        Ok(meta)
    }

    fn put_object_inner(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: Option<&str>,
        metadata: serde_json::Value,
    ) -> Result<ObjectMetadata> {
        let bucket_meta = self.get_bucket(bucket)?;
        let digest = self.store_object_data(bytes)?;
        let etag = format!("\"{digest}\"");
        let now = Self::now_rfc3339();
        let version_id = if bucket_meta.versioning_enabled { Self::new_id() } else { "null".to_string() };

        let conn = self.get_connection()?;
        if bucket_meta.versioning_enabled {
            conn.execute("UPDATE objects SET is_latest = 0 WHERE bucket = ?1 AND key = ?2", params![bucket, key])?;
        } else {
            conn.execute("DELETE FROM objects WHERE bucket = ?1 AND key = ?2", params![bucket, key])?;
        }
        conn.execute(
            "INSERT INTO objects (bucket, key, version_id, content_hash, size, content_type, etag, is_latest, is_delete_marker, metadata, last_modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, ?8, ?9)",
            params![bucket, key, version_id, digest, bytes.len() as i64, content_type, etag, metadata.to_string(), now],
        )?;

        Ok(ObjectMetadata {
            bucket: bucket.to_string(),
            key: key.to_string(),
            version_id,
            content_hash: digest,
            size: bytes.len() as u64,
            content_type: content_type.map(str::to_string),
            etag,
            is_delete_marker: false,
            metadata,
            last_modified: now,
        })
    }

    pub fn get_object(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Result<(ObjectMetadata, Vec<u8>)> {
        let meta = self.head_object(bucket, key, version_id)?;
        if meta.is_delete_marker {
            return Err(EmulatorError::NoSuchKey(key.to_string()));
        }
        let bytes = self.read_object_data(&meta.content_hash)?;
        Ok((meta, bytes))
    }

    pub fn head_object(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Result<ObjectMetadata> {
        let conn = self.get_connection()?;
        let row = match version_id {
            Some(v) => conn.query_row(
                "SELECT bucket, key, version_id, content_hash, size, content_type, etag, is_delete_marker, metadata, last_modified
                 FROM objects WHERE bucket = ?1 AND key = ?2 AND version_id = ?3",
                params![bucket, key, v],
                row_to_object,
            ),
            None => conn.query_row(
                "SELECT bucket, key, version_id, content_hash, size, content_type, etag, is_delete_marker, metadata, last_modified
                 FROM objects WHERE bucket = ?1 AND key = ?2 AND is_latest = 1",
                params![bucket, key],
                row_to_object,
            ),
        };
        row.map_err(|_| EmulatorError::NoSuchKey(key.to_string()))
    }

    /// Unversioned buckets hard-delete the row; versioned buckets push
    /// a delete marker as the new latest version, leaving prior
    /// versions retrievable by explicit `version_id`.
    pub fn delete_object(&self, bucket: &str, key: &str, version_id: Option<&str>) -> Result<Option<String>> {
        let bucket_meta = self.get_bucket(bucket)?;
        let conn = self.get_connection()?;

        if let Some(v) = version_id {
            conn.execute("DELETE FROM objects WHERE bucket = ?1 AND key = ?2 AND version_id = ?3", params![bucket, key, v])?;
            drop(conn);
            self.record_object_event(bucket, key, "ObjectRemoved:Delete");
            return Ok(None);
        }

        if !bucket_meta.versioning_enabled {
            conn.execute("DELETE FROM objects WHERE bucket = ?1 AND key = ?2", params![bucket, key])?;
            drop(conn);
            self.record_object_event(bucket, key, "ObjectRemoved:Delete");
            return Ok(None);
        }

        conn.execute("UPDATE objects SET is_latest = 0 WHERE bucket = ?1 AND key = ?2", params![bucket, key])?;
        let marker_version = Self::new_id();
        let now = Self::now_rfc3339();
        conn.execute(
            "INSERT INTO objects (bucket, key, version_id, content_hash, size, content_type, etag, is_latest, is_delete_marker, metadata, last_modified)
             VALUES (?1, ?2, ?3, '', 0, NULL, '', 1, 1, '{}', ?4)",
            params![bucket, key, marker_version, now],
        )?;
        drop(conn);
        self.record_object_event(bucket, key, "ObjectRemoved:Delete");
        Ok(Some(marker_version))
    }

    pub fn list_objects(&self, bucket: &str, prefix: Option<&str>, delimiter: Option<&str>, max_keys: usize) -> Result<ListObjectsPage> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT bucket, key, version_id, content_hash, size, content_type, etag, is_delete_marker, metadata, last_modified
             FROM objects WHERE bucket = ?1 AND is_latest = 1 ORDER BY key",
        )?;
        let all: Vec<ObjectMetadata> = stmt
            .query_map(params![bucket], row_to_object)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut objects = Vec::new();
        let mut common_prefixes = std::collections::BTreeSet::new();
        for obj in all {
            if let Some(p) = prefix {
                if !obj.key.starts_with(p) {
                    continue;
                }
            }
            if let Some(delim) = delimiter {
                let rest = prefix.map(|p| &obj.key[p.len()..]).unwrap_or(&obj.key);
                if let Some(idx) = rest.find(delim) {
                    let prefix_len = prefix.map(str::len).unwrap_or(0) + idx + delim.len();
                    common_prefixes.insert(obj.key[..prefix_len].to_string());
                    continue;
                }
            }
            objects.push(obj);
        }

        let is_truncated = objects.len() > max_keys;
        objects.truncate(max_keys);
        Ok(ListObjectsPage {
            objects,
            common_prefixes: common_prefixes.into_iter().collect(),
            is_truncated,
            next_continuation_token: None,
        })
    }

    pub fn create_multipart_upload(&self, bucket: &str, key: &str, content_type: Option<&str>) -> Result<String> {
        self.get_bucket(bucket)?;
        let upload_id = Self::new_id();
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO multipart_uploads (upload_id, bucket, key, content_type, initiated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![upload_id, bucket, key, content_type, now],
        )?;
        Ok(upload_id)
    }

    pub fn upload_part(&self, upload_id: &str, part_number: u32, bytes: &[u8]) -> Result<String> {
        let digest = self.store_object_data(bytes)?;
        let etag = format!("\"{digest}\"");
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO multipart_parts (upload_id, part_number, content_hash, size, etag) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(upload_id, part_number) DO UPDATE SET content_hash = excluded.content_hash, size = excluded.size, etag = excluded.etag",
            params![upload_id, part_number, digest, bytes.len() as i64, etag],
        )?;
        Ok(etag)
    }

    pub fn complete_multipart_upload(&self, upload_id: &str) -> Result<ObjectMetadata> {
        let (bucket, key, content_type): (String, String, Option<String>) = {
            let conn = self.get_connection()?;
            conn.query_row(
                "SELECT bucket, key, content_type FROM multipart_uploads WHERE upload_id = ?1",
                params![upload_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|_| EmulatorError::InvalidRequest(format!("no such upload {upload_id}")))?
        };

        let parts: Vec<(i64, String)> = {
            let conn = self.get_connection()?;
            let mut stmt = conn.prepare(
                "SELECT part_number, content_hash FROM multipart_parts WHERE upload_id = ?1 ORDER BY part_number",
            )?;
            stmt.query_map(params![upload_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };

        let mut assembled = Vec::new();
        for (_, hash) in &parts {
            assembled.extend(self.read_object_data(hash)?);
        }

        {
            let conn = self.get_connection()?;
            conn.execute("DELETE FROM multipart_parts WHERE upload_id = ?1", params![upload_id])?;
            conn.execute("DELETE FROM multipart_uploads WHERE upload_id = ?1", params![upload_id])?;
        }

        let meta = self.put_object_inner(&bucket, &key, &assembled, content_type.as_deref(), serde_json::json!({}))?;
        self.record_object_event(&bucket, &key, "ObjectCreated:CompleteMultipartUpload");
        Ok(meta)
    }

    pub fn abort_multipart_upload(&self, upload_id: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute("DELETE FROM multipart_parts WHERE upload_id = ?1", params![upload_id])?;
        conn.execute("DELETE FROM multipart_uploads WHERE upload_id = ?1", params![upload_id])?;
        Ok(())
    }

    fn record_object_event(&self, bucket: &str, key: &str, event_type: &str) {
        let seq = OBJECT_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let mut rt = self.object_runtime.lock();
        rt.notification_log.push_back(ObjectNotificationRecord {
            sequence_number: seq,
            bucket: bucket.to_string(),
            key: key.to_string(),
            event_type: event_type.to_string(),
        });
        while rt.notification_log.len() > NOTIFICATION_LOG_CAP {
            rt.notification_log.pop_front();
        }
    }

    /// Pull up to `limit` notification records newer than
    /// `after_sequence`, for the event fabric's notification consumer.
    pub fn poll_object_notifications(&self, after_sequence: i64, limit: usize) -> Vec<ObjectNotificationRecord> {
        let rt = self.object_runtime.lock();
        rt.notification_log.iter().filter(|r| r.sequence_number > after_sequence).take(limit).cloned().collect()
    }
}

fn row_to_object(row: &rusqlite::Row) -> rusqlite::Result<ObjectMetadata> {
    let metadata_json: String = row.get(8)?;
    Ok(ObjectMetadata {
        bucket: row.get(0)?,
        key: row.get(1)?,
        version_id: row.get(2)?,
        content_hash: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        content_type: row.get(5)?,
        etag: row.get(6)?,
        is_delete_marker: row.get::<_, i64>(7)? != 0,
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
        last_modified: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    #[test]
    fn put_get_round_trip() {
        let engine = engine();
        engine.create_bucket("b").unwrap();
        engine.put_object("b", "k", b"payload", Some("text/plain"), serde_json::json!({})).unwrap();
        let (meta, bytes) = engine.get_object("b", "k", None).unwrap();
        assert_eq!(bytes, b"payload");
        assert_eq!(meta.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn versioned_bucket_keeps_prior_versions() {
        let engine = engine();
        engine.create_bucket("b").unwrap();
        engine.set_bucket_versioning("b", true).unwrap();
        let v1 = engine.put_object("b", "k", b"one", None, serde_json::json!({})).unwrap();
        let v2 = engine.put_object("b", "k", b"two", None, serde_json::json!({})).unwrap();
        assert_ne!(v1.version_id, v2.version_id);

        let (_, latest) = engine.get_object("b", "k", None).unwrap();
        assert_eq!(latest, b"two");
        let (_, old) = engine.get_object("b", "k", Some(&v1.version_id)).unwrap();
        assert_eq!(old, b"one");
    }

    #[test]
    fn multipart_upload_assembles_parts_in_order() {
        let engine = engine();
        engine.create_bucket("b").unwrap();
        let upload_id = engine.create_multipart_upload("b", "k", None).unwrap();
        engine.upload_part(&upload_id, 1, b"hello ").unwrap();
        engine.upload_part(&upload_id, 2, b"world").unwrap();
        let meta = engine.complete_multipart_upload(&upload_id).unwrap();
        let (_, bytes) = engine.get_object("b", &meta.key, None).unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn delete_nonexistent_bucket_errors() {
        let engine = engine();
        assert!(matches!(engine.delete_bucket("nope"), Err(EmulatorError::NoSuchBucket(_))));
    }
}
