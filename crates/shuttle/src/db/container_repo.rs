//! Container repository: commits, articles, assets and key groups share the
//! `containers` table, discriminated by `kind`.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::project_repo::LocaleTarget;
use super::{from_json, json_column, now, to_json, DatabaseError};

/// The importable unit kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Commit,
    Article,
    Asset,
    KeyGroup,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Commit => "commit",
            ContainerKind::Article => "article",
            ContainerKind::Asset => "asset",
            ContainerKind::KeyGroup => "key_group",
        }
    }

    /// Entity type name used in coordination keys (`loading:<EntityType>:<id>`).
    pub fn entity_type(&self) -> &'static str {
        match self {
            ContainerKind::Commit => "Commit",
            ContainerKind::Article => "Article",
            ContainerKind::Asset => "Asset",
            ContainerKind::KeyGroup => "KeyGroup",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ContainerKind::Commit),
            "article" => Ok(ContainerKind::Article),
            "asset" => Ok(ContainerKind::Asset),
            "key_group" => Ok(ContainerKind::KeyGroup),
            other => Err(format!("unknown container kind '{}'", other)),
        }
    }
}

impl ToSql for ContainerKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ContainerKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// One entry of a container's import error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub at: String,
    pub message: String,
}

/// A container row.
#[derive(Debug, Clone)]
pub struct ContainerRow {
    pub id: i64,
    pub project_id: i64,
    pub kind: ContainerKind,
    pub name: String,
    pub source_copy: Option<String>,
    pub imported_source_copy: Option<String>,
    pub targeted_locales: Option<Vec<LocaleTarget>>,
    pub loading: bool,
    pub ready: bool,
    pub import_batch_id: Option<String>,
    pub import_started_at: Option<String>,
    pub import_finished_at: Option<String>,
    pub first_completed_at: Option<String>,
    pub error_log: Vec<ErrorLogEntry>,
    pub created_at: String,
    pub updated_at: String,
}

impl ContainerRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let targeted: Option<String> = row.get("targeted_locales")?;
        let error_log: String = row.get("error_log")?;
        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            kind: row.get("kind")?,
            name: row.get("name")?,
            source_copy: row.get("source_copy")?,
            imported_source_copy: row.get("imported_source_copy")?,
            targeted_locales: targeted.map(|raw| json_column(6, &raw)).transpose()?,
            loading: row.get("loading")?,
            ready: row.get("ready")?,
            import_batch_id: row.get("import_batch_id")?,
            import_started_at: row.get("import_started_at")?,
            import_finished_at: row.get("import_finished_at")?,
            first_completed_at: row.get("first_completed_at")?,
            error_log: json_column(13, &error_log)?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields accepted when creating a container.
#[derive(Debug, Clone)]
pub struct NewContainer {
    pub project_id: i64,
    pub kind: ContainerKind,
    pub name: String,
    pub source_copy: Option<String>,
    pub targeted_locales: Option<Vec<LocaleTarget>>,
}

/// Inserts a container and returns the stored row.
pub fn insert(conn: &Connection, container: &NewContainer) -> Result<ContainerRow, DatabaseError> {
    let targeted = container
        .targeted_locales
        .as_ref()
        .map(|t| to_json("targeted_locales", t))
        .transpose()?;
    conn.execute(
        "INSERT INTO containers (project_id, kind, name, source_copy, targeted_locales,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            container.project_id,
            container.kind,
            container.name,
            container.source_copy,
            targeted,
            now(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
}

/// Finds a container by its ID.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<ContainerRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM containers WHERE id = ?1",
            params![id],
            ContainerRow::from_row,
        )
        .optional()?)
}

/// Finds a container by its natural identity within a project.
pub fn find_by_name(
    conn: &Connection,
    project_id: i64,
    kind: ContainerKind,
    name: &str,
) -> Result<Option<ContainerRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM containers WHERE project_id = ?1 AND kind = ?2 AND name = ?3",
            params![project_id, kind, name],
            ContainerRow::from_row,
        )
        .optional()?)
}

/// Lists all containers of a project, oldest first.
pub fn list_for_project(
    conn: &Connection,
    project_id: i64,
) -> Result<Vec<ContainerRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM containers WHERE project_id = ?1 ORDER BY id")?;
    let rows = stmt
        .query_map(params![project_id], ContainerRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// IDs of every container that holds the key: commits through `commit_keys`,
/// exclusive containers through `keys.container_id` (active keys only).
pub fn ids_for_key(conn: &Connection, key_id: i64) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT container_id FROM commit_keys WHERE key_id = ?1
         UNION
         SELECT container_id FROM keys
          WHERE id = ?1 AND container_id IS NOT NULL AND position IS NOT NULL
         ORDER BY 1",
    )?;
    let ids = stmt
        .query_map(params![key_id], |r| r.get(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(ids)
}

/// Replaces the editable source copy (articles and key groups).
pub fn update_source_copy(
    conn: &Connection,
    id: i64,
    source_copy: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE containers SET source_copy = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, source_copy, now()],
    )?;
    Ok(())
}

/// Persists only the `loading` flag.
pub fn update_loading(conn: &Connection, id: i64, loading: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE containers SET loading = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, loading, now()],
    )?;
    Ok(())
}

/// Persists the readiness flag, stamping `first_completed_at` the first time
/// the container becomes ready.
pub fn update_ready(conn: &Connection, id: i64, ready: bool) -> Result<(), DatabaseError> {
    let ts = now();
    conn.execute(
        "UPDATE containers
            SET ready = ?2,
                first_completed_at = CASE WHEN ?2 AND first_completed_at IS NULL
                                          THEN ?3 ELSE first_completed_at END,
                updated_at = ?3
          WHERE id = ?1",
        params![id, ready, ts],
    )?;
    Ok(())
}

/// Marks the start of an import: records the batch, clears the previous
/// error log and readiness.
pub fn begin_import(conn: &Connection, id: i64, batch_id: &str) -> Result<(), DatabaseError> {
    let ts = now();
    conn.execute(
        "UPDATE containers
            SET import_batch_id = ?2, import_started_at = ?3, import_finished_at = NULL,
                error_log = '[]', ready = 0, updated_at = ?3
          WHERE id = ?1",
        params![id, batch_id, ts],
    )?;
    Ok(())
}

/// Records the text whose paragraphs the stored key slots now describe.
pub fn update_imported_source_copy(
    conn: &Connection,
    id: i64,
    imported_source_copy: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE containers SET imported_source_copy = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, imported_source_copy, now()],
    )?;
    Ok(())
}

/// Marks the end of an import: clears the batch and stores the rebase baseline.
pub fn finish_import(
    conn: &Connection,
    id: i64,
    imported_source_copy: Option<&str>,
) -> Result<(), DatabaseError> {
    let ts = now();
    conn.execute(
        "UPDATE containers
            SET import_batch_id = NULL, import_finished_at = ?2,
                imported_source_copy = COALESCE(?3, imported_source_copy), updated_at = ?2
          WHERE id = ?1",
        params![id, ts, imported_source_copy],
    )?;
    Ok(())
}

/// Appends a message to the container's error log.
pub fn append_error(conn: &Connection, id: i64, message: &str) -> Result<(), DatabaseError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT error_log FROM containers WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(raw) = raw else {
        return Ok(());
    };
    let mut log: Vec<ErrorLogEntry> = from_json("error_log", &raw)?;
    let ts = now();
    log.push(ErrorLogEntry {
        at: ts.clone(),
        message: message.to_string(),
    });
    conn.execute(
        "UPDATE containers SET error_log = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, to_json("error_log", &log)?, ts],
    )?;
    Ok(())
}

/// Attaches a shared key to a commit. Returns true when the membership is new.
pub fn attach_commit_key(
    conn: &Connection,
    container_id: i64,
    key_id: i64,
) -> Result<bool, DatabaseError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO commit_keys (container_id, key_id) VALUES (?1, ?2)",
        params![container_id, key_id],
    )?;
    Ok(inserted > 0)
}

/// Drops every key membership of a commit ahead of a re-import.
pub fn clear_commit_keys(conn: &Connection, container_id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "DELETE FROM commit_keys WHERE container_id = ?1",
        params![container_id],
    )?)
}
