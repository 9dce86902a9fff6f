//! IAM stub persistence: just enough role/policy/user bookkeeping for
//! the identity middleware's `StringEquals`/`ArnLike` evaluation and
//! for the management surface to list what a request is allowed to do.
//! This is not a faithful IAM policy engine: no policy simulation, no
//! permission boundaries, no SCPs.

use super::StorageEngine;
use crate::error::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamRole {
    pub name: String,
    pub arn: String,
    pub path: String,
    pub assume_role_policy_document: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamPolicy {
    pub name: String,
    pub arn: String,
    pub path: String,
    pub default_version_id: String,
    pub document: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamUser {
    pub name: String,
    pub arn: String,
    pub path: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamAccessKey {
    pub user_name: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolePolicyAttachment {
    pub role_name: String,
    pub policy_arn: String,
}

impl StorageEngine {
    pub fn create_role(&self, name: &str, document: &str) -> Result<IamRole> {
        let conn = self.get_connection()?;
        let arn = format!("arn:aws:iam::{}:role/{}", self.account_id, name);
        let path = "/";

        conn.execute(
            "INSERT INTO aws_iam_roles (arn, name, path, assume_role_policy_document, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![arn, name, path, document, chrono::Utc::now().timestamp()],
        )?;

        Ok(IamRole {
            name: name.to_string(),
            arn,
            path: path.to_string(),
            assume_role_policy_document: document.to_string(),
            description: None,
        })
    }

    pub fn get_role(&self, name: &str) -> Result<IamRole> {
        let conn = self.get_connection()?;
        let role = conn.query_row(
            "SELECT arn, path, assume_role_policy_document, description FROM aws_iam_roles WHERE name = ?1",
            params![name],
            |row| {
                Ok(IamRole {
                    name: name.to_string(),
                    arn: row.get(0)?,
                    path: row.get(1)?,
                    assume_role_policy_document: row.get(2)?,
                    description: row.get(3)?,
                })
            },
        )?;
        Ok(role)
    }

    pub fn list_roles(&self) -> Result<Vec<IamRole>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT name, arn, path, assume_role_policy_document, description FROM aws_iam_roles",
        )?;
        let roles = stmt
            .query_map([], |row| {
                Ok(IamRole {
                    name: row.get(0)?,
                    arn: row.get(1)?,
                    path: row.get(2)?,
                    assume_role_policy_document: row.get(3)?,
                    description: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<IamRole>, _>>()?;
        Ok(roles)
    }

    pub fn create_policy(&self, name: &str, document: &str) -> Result<IamPolicy> {
        let conn = self.get_connection()?;
        let arn = format!("arn:aws:iam::{}:policy/{}", self.account_id, name);
        let path = "/";
        let version = "v1";

        conn.execute(
            "INSERT INTO aws_iam_policies (arn, name, path, default_version_id, document, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![arn, name, path, version, document, chrono::Utc::now().timestamp()],
        )?;

        Ok(IamPolicy {
            name: name.to_string(),
            arn,
            path: path.to_string(),
            default_version_id: version.to_string(),
            document: document.to_string(),
        })
    }

    pub fn list_policies(&self) -> Result<Vec<IamPolicy>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT name, arn, path, default_version_id, document FROM aws_iam_policies",
        )?;
        let policies = stmt
            .query_map([], |row| {
                Ok(IamPolicy {
                    name: row.get(0)?,
                    arn: row.get(1)?,
                    path: row.get(2)?,
                    default_version_id: row.get(3)?,
                    document: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<IamPolicy>, _>>()?;
        Ok(policies)
    }

    pub fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT OR IGNORE INTO aws_iam_role_policy_attachments (role_name, policy_arn, created_at)
             VALUES (?1, ?2, ?3)",
            params![role_name, policy_arn, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    pub fn list_attached_policies(&self, role_name: &str) -> Result<Vec<String>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT policy_arn FROM aws_iam_role_policy_attachments WHERE role_name = ?1",
        )?;
        let arns = stmt
            .query_map(params![role_name], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(arns)
    }

    pub fn create_user(&self, name: &str) -> Result<IamUser> {
        let conn = self.get_connection()?;
        let id = format!("AIDA{}", &Self::new_id().replace('-', "").to_uppercase()[..16]);
        let arn = format!("arn:aws:iam::{}:user/{}", self.account_id, name);
        let path = "/";

        conn.execute(
            "INSERT INTO aws_iam_users (id, name, arn, path, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, name, arn, path, chrono::Utc::now().timestamp()],
        )?;

        Ok(IamUser { id, name: name.to_string(), arn, path: path.to_string() })
    }

    pub fn list_iam_users(&self) -> Result<Vec<IamUser>> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT id, name, arn, path FROM aws_iam_users")?;
        let users = stmt
            .query_map([], |row| {
                Ok(IamUser { id: row.get(0)?, name: row.get(1)?, arn: row.get(2)?, path: row.get(3)? })
            })?
            .collect::<std::result::Result<Vec<IamUser>, _>>()?;
        Ok(users)
    }

    pub fn create_access_key(&self, user_name: &str) -> Result<IamAccessKey> {
        let conn = self.get_connection()?;
        let access_key = format!("AKIA{}", &Self::new_id().replace('-', "").to_uppercase()[..16]);
        let secret = Self::new_id().replace('-', "");
        let status = "Active";

        conn.execute(
            "INSERT INTO aws_iam_access_keys (access_key_id, user_name, secret_access_key, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![access_key, user_name, secret, status, chrono::Utc::now().timestamp()],
        )?;

        Ok(IamAccessKey {
            user_name: user_name.to_string(),
            access_key_id: access_key,
            secret_access_key: secret,
            status: status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_policy_attachment_round_trip() {
        let engine = StorageEngine::in_memory("000000000000", "us-east-1").unwrap();
        let role = engine.create_role("app-role", "{}").unwrap();
        let policy = engine.create_policy("app-policy", "{}").unwrap();
        engine.attach_role_policy(&role.name, &policy.arn).unwrap();
        assert_eq!(engine.list_attached_policies(&role.name).unwrap(), vec![policy.arn]);
    }
}
