//! Identity provider (component H): user pools, groups, users and
//! their attributes. Password hashing uses a salted SHA-256 digest —
//! adequate for a local emulator, not a production credential store.

use super::StorageEngine;
use crate::error::{EmulatorError, Result};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPoolRecord {
    pub id: String,
    pub name: String,
    pub arn: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroupRecord {
    pub pool_id: String,
    pub name: String,
    pub description: Option<String>,
    pub precedence: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub pool_id: String,
    pub username: String,
    pub sub: String,
    pub status: String,
    pub groups: Vec<String>,
    pub attributes: HashMap<String, String>,
    pub created_at: String,
}

fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

impl StorageEngine {
    pub fn create_user_pool(&self, name: &str) -> Result<UserPoolRecord> {
        let id = format!("{}_{}", self.region, &Self::new_id().replace('-', "")[..9]);
        let arn = format!("arn:aws:cognito-idp:{}:{}:userpool/{}", self.region, self.account_id, id);
        let now = Self::now_rfc3339();
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO cognito_user_pools (id, name, arn, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![id, name, arn, now],
        )?;
        Ok(UserPoolRecord { id, name: name.to_string(), arn, created_at: now })
    }

    pub fn get_user_pool(&self, id: &str) -> Result<UserPoolRecord> {
        let conn = self.get_connection()?;
        conn.query_row(
            "SELECT id, name, arn, created_at FROM cognito_user_pools WHERE id = ?1",
            params![id],
            |row| Ok(UserPoolRecord { id: row.get(0)?, name: row.get(1)?, arn: row.get(2)?, created_at: row.get(3)? }),
        )
        .map_err(|_| EmulatorError::NotFound("UserPool".into(), id.into()))
    }

    pub fn list_user_pools(&self) -> Result<Vec<UserPoolRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT id, name, arn, created_at FROM cognito_user_pools ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(UserPoolRecord { id: row.get(0)?, name: row.get(1)?, arn: row.get(2)?, created_at: row.get(3)? })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn create_group(&self, pool_id: &str, name: &str, description: Option<&str>, precedence: Option<i64>) -> Result<UserGroupRecord> {
        self.get_user_pool(pool_id)?;
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO cognito_groups (pool_id, name, description, precedence) VALUES (?1, ?2, ?3, ?4)",
            params![pool_id, name, description, precedence],
        )?;
        Ok(UserGroupRecord { pool_id: pool_id.to_string(), name: name.to_string(), description: description.map(str::to_string), precedence })
    }

    pub fn list_groups(&self, pool_id: &str) -> Result<Vec<UserGroupRecord>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT pool_id, name, description, precedence FROM cognito_groups WHERE pool_id = ?1 ORDER BY name")?;
        let rows = stmt.query_map(params![pool_id], |row| {
            Ok(UserGroupRecord { pool_id: row.get(0)?, name: row.get(1)?, description: row.get(2)?, precedence: row.get(3)? })
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn sign_up(&self, pool_id: &str, username: &str, password: &str, attributes: HashMap<String, String>) -> Result<UserRecord> {
        self.get_user_pool(pool_id)?;
        let conn = self.get_connection()?;
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cognito_users WHERE pool_id = ?1 AND username = ?2",
            params![pool_id, username],
            |r| r.get(0),
        )?;
        if existing > 0 {
            return Err(EmulatorError::UsernameExists(username.to_string()));
        }

        let sub = Self::new_id();
        let salt = Self::new_id();
        let hash = hash_password(password, &salt);
        let now = Self::now_rfc3339();
        conn.execute(
            "INSERT INTO cognito_users (pool_id, username, sub, password_hash, password_salt, status, groups, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'UNCONFIRMED', '[]', ?6)",
            params![pool_id, username, sub, hash, salt, now],
        )?;
        for (k, v) in &attributes {
            conn.execute(
                "INSERT INTO cognito_user_attributes (pool_id, username, attr_name, attr_value) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(pool_id, username, attr_name) DO UPDATE SET attr_value = excluded.attr_value",
                params![pool_id, username, k, v],
            )?;
        }

        Ok(UserRecord { pool_id: pool_id.to_string(), username: username.to_string(), sub, status: "UNCONFIRMED".into(), groups: vec![], attributes, created_at: now })
    }

    pub fn confirm_sign_up(&self, pool_id: &str, username: &str) -> Result<()> {
        let conn = self.get_connection()?;
        let changed = conn.execute(
            "UPDATE cognito_users SET status = 'CONFIRMED' WHERE pool_id = ?1 AND username = ?2",
            params![pool_id, username],
        )?;
        if changed == 0 {
            return Err(EmulatorError::NotFound("User".into(), username.into()));
        }
        Ok(())
    }

    pub fn authenticate(&self, pool_id: &str, username: &str, password: &str) -> Result<UserRecord> {
        let conn = self.get_connection()?;
        let (stored_hash, salt, status): (String, String, String) = conn
            .query_row(
                "SELECT password_hash, password_salt, status FROM cognito_users WHERE pool_id = ?1 AND username = ?2",
                params![pool_id, username],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|_| EmulatorError::NotAuthorized("incorrect username or password".into()))?;

        if hash_password(password, &salt) != stored_hash {
            return Err(EmulatorError::NotAuthorized("incorrect username or password".into()));
        }
        if status != "CONFIRMED" {
            return Err(EmulatorError::UserNotConfirmed(username.to_string()));
        }

        self.get_user(pool_id, username)
    }

    pub fn get_user(&self, pool_id: &str, username: &str) -> Result<UserRecord> {
        let conn = self.get_connection()?;
        let (sub, status, groups_json, created_at): (String, String, String, String) = conn
            .query_row(
                "SELECT sub, status, groups, created_at FROM cognito_users WHERE pool_id = ?1 AND username = ?2",
                params![pool_id, username],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .map_err(|_| EmulatorError::NotFound("User".into(), username.into()))?;

        let mut stmt = conn.prepare("SELECT attr_name, attr_value FROM cognito_user_attributes WHERE pool_id = ?1 AND username = ?2")?;
        let attributes = stmt
            .query_map(params![pool_id, username], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(UserRecord {
            pool_id: pool_id.to_string(),
            username: username.to_string(),
            sub,
            status,
            groups: serde_json::from_str(&groups_json).unwrap_or_default(),
            attributes,
            created_at,
        })
    }

    pub fn add_user_to_group(&self, pool_id: &str, username: &str, group: &str) -> Result<()> {
        let mut user = self.get_user(pool_id, username)?;
        if !user.groups.contains(&group.to_string()) {
            user.groups.push(group.to_string());
        }
        let conn = self.get_connection()?;
        conn.execute(
            "UPDATE cognito_users SET groups = ?1 WHERE pool_id = ?2 AND username = ?3",
            params![serde_json::to_string(&user.groups)?, pool_id, username],
        )?;
        Ok(())
    }

    pub fn list_users(&self, pool_id: &str) -> Result<Vec<UserRecord>> {
        let conn = self.get_connection()?;
        let usernames: Vec<String> = {
            let mut stmt = conn.prepare("SELECT username FROM cognito_users WHERE pool_id = ?1 ORDER BY username")?;
            stmt.query_map(params![pool_id], |row| row.get(0))?.collect::<std::result::Result<Vec<_>, _>>()?
        };
        drop(conn);
        usernames.into_iter().map(|u| self.get_user(pool_id, &u)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> StorageEngine {
        StorageEngine::in_memory("000000000000", "us-east-1").unwrap()
    }

    #[test]
    fn sign_up_confirm_authenticate() {
        let engine = engine();
        let pool = engine.create_user_pool("pool").unwrap();
        engine.sign_up(&pool.id, "alice", "s3cret!", HashMap::new()).unwrap();

        assert!(matches!(engine.authenticate(&pool.id, "alice", "s3cret!"), Err(EmulatorError::UserNotConfirmed(_))));

        engine.confirm_sign_up(&pool.id, "alice").unwrap();
        let user = engine.authenticate(&pool.id, "alice", "s3cret!").unwrap();
        assert_eq!(user.status, "CONFIRMED");

        assert!(matches!(engine.authenticate(&pool.id, "alice", "wrong"), Err(EmulatorError::NotAuthorized(_))));
    }

    #[test]
    fn duplicate_username_rejected() {
        let engine = engine();
        let pool = engine.create_user_pool("pool").unwrap();
        engine.sign_up(&pool.id, "bob", "pw", HashMap::new()).unwrap();
        assert!(matches!(
            engine.sign_up(&pool.id, "bob", "pw2", HashMap::new()),
            Err(EmulatorError::UsernameExists(_))
        ));
    }

    #[test]
    fn group_membership_persists() {
        let engine = engine();
        let pool = engine.create_user_pool("pool").unwrap();
        engine.create_group(&pool.id, "admins", None, Some(1)).unwrap();
        engine.sign_up(&pool.id, "carol", "pw", HashMap::new()).unwrap();
        engine.add_user_to_group(&pool.id, "carol", "admins").unwrap();
        let user = engine.get_user(&pool.id, "carol").unwrap();
        assert_eq!(user.groups, vec!["admins".to_string()]);
    }
}
