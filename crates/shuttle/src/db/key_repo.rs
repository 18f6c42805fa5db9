//! Key repository.
//!
//! Shared keys (commits) have a null `container_id` and are attached to
//! commits through `commit_keys`. Exclusive keys carry their `container_id`
//! and are active only while `position` is set.

use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use super::container_repo::{ContainerKind, ContainerRow};
use super::{json_column, now, to_json, DatabaseError};

/// Lowercase hex SHA-256 of `input`.
pub fn sha256_hex(input: &str) -> String {
    format!("{:x}", Sha256::digest(input.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRow {
    pub id: i64,
    pub project_id: i64,
    pub container_id: Option<i64>,
    pub key: String,
    pub key_sha: String,
    pub source_copy: String,
    pub source_copy_sha: String,
    pub position: Option<i64>,
    pub fencers: Vec<String>,
    pub ready: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl KeyRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let fencers: String = row.get("fencers")?;
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            container_id: row.get("container_id")?,
            key: row.get("key")?,
            key_sha: row.get("key_sha")?,
            source_copy: row.get("source_copy")?,
            source_copy_sha: row.get("source_copy_sha")?,
            position: row.get("position")?,
            fencers: json_column(8, &fencers)?,
            ready: row.get("ready")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Shared keys belong to the project and join commits many-to-many.
    pub fn is_shared(&self) -> bool {
        self.container_id.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct NewKey {
    pub project_id: i64,
    pub container_id: Option<i64>,
    pub key: String,
    pub source_copy: String,
    pub position: Option<i64>,
    pub fencers: Vec<String>,
}

pub fn insert(conn: &Connection, key: &NewKey) -> Result<KeyRow, DatabaseError> {
    conn.execute(
        "INSERT INTO keys (project_id, container_id, key, key_sha, source_copy,
         source_copy_sha, position, fencers, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            key.project_id,
            key.container_id,
            key.key,
            sha256_hex(&key.key),
            key.source_copy,
            sha256_hex(&key.source_copy),
            key.position,
            to_json("fencers", &key.fencers)?,
            now(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<KeyRow>, DatabaseError> {
    Ok(conn
        .query_row("SELECT * FROM keys WHERE id = ?1", params![id], KeyRow::from_row)
        .optional()?)
}

/// Finds a project-scoped shared key by slot and source hash.
pub fn find_shared(
    conn: &Connection,
    project_id: i64,
    key_sha: &str,
    source_copy_sha: &str,
) -> Result<Option<KeyRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM keys
              WHERE project_id = ?1 AND container_id IS NULL
                AND key_sha = ?2 AND source_copy_sha = ?3",
            params![project_id, key_sha, source_copy_sha],
            KeyRow::from_row,
        )
        .optional()?)
}

/// Finds a container-scoped key by slot, active or not.
pub fn find_in_container(
    conn: &Connection,
    container_id: i64,
    key_sha: &str,
) -> Result<Option<KeyRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM keys WHERE container_id = ?1 AND key_sha = ?2",
            params![container_id, key_sha],
            KeyRow::from_row,
        )
        .optional()?)
}

/// Finds the key a commit already holds under `key_sha`, whatever its source.
pub fn find_commit_member(
    conn: &Connection,
    container_id: i64,
    key_sha: &str,
) -> Result<Option<KeyRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT k.* FROM keys k
               JOIN commit_keys ck ON ck.key_id = k.id
              WHERE ck.container_id = ?1 AND k.key_sha = ?2
              LIMIT 1",
            params![container_id, key_sha],
            KeyRow::from_row,
        )
        .optional()?)
}

/// Replaces a key's source copy (and hash) in place.
pub fn update_source(
    conn: &Connection,
    id: i64,
    source_copy: &str,
    fencers: &[String],
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE keys SET source_copy = ?2, source_copy_sha = ?3, fencers = ?4, updated_at = ?5
          WHERE id = ?1",
        params![
            id,
            source_copy,
            sha256_hex(source_copy),
            to_json("fencers", &fencers)?,
            now()
        ],
    )?;
    Ok(())
}

pub fn set_position(conn: &Connection, id: i64, position: Option<i64>) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE keys SET position = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, position, now()],
    )?;
    Ok(())
}

/// Renames a key's slot, keeping `key_sha` in step.
pub fn rename_slot(conn: &Connection, id: i64, new_key: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE keys SET key = ?2, key_sha = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, new_key, sha256_hex(new_key), now()],
    )?;
    Ok(())
}

/// Sets every key of an exclusive container inactive.
pub fn deactivate_container(conn: &Connection, container_id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE keys SET position = NULL, updated_at = ?2
          WHERE container_id = ?1 AND position IS NOT NULL",
        params![container_id, now()],
    )?)
}

pub fn update_ready(conn: &Connection, id: i64, ready: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE keys SET ready = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, ready, now()],
    )?;
    Ok(())
}

/// The container's active keys: commit members for commits, positioned keys
/// (in position order) for the exclusive kinds.
pub fn active_for_container(
    conn: &Connection,
    container: &ContainerRow,
) -> Result<Vec<KeyRow>, DatabaseError> {
    let (sql, id) = match container.kind {
        ContainerKind::Commit => (
            "SELECT k.* FROM keys k
               JOIN commit_keys ck ON ck.key_id = k.id
              WHERE ck.container_id = ?1
              ORDER BY k.id",
            container.id,
        ),
        _ => (
            "SELECT * FROM keys WHERE container_id = ?1 AND position IS NOT NULL
              ORDER BY position",
            container.id,
        ),
    };
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![id], KeyRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Every key ever created for an exclusive container, active or not.
pub fn all_for_container(conn: &Connection, container_id: i64) -> Result<Vec<KeyRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM keys WHERE container_id = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map(params![container_id], KeyRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// IDs of the project's keys that are currently active in some container.
pub fn active_ids_for_project(conn: &Connection, project_id: i64) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id FROM keys
          WHERE project_id = ?1
            AND ((container_id IS NOT NULL AND position IS NOT NULL)
                 OR id IN (SELECT key_id FROM commit_keys))
          ORDER BY id",
    )?;
    let ids = stmt
        .query_map(params![project_id], |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}
