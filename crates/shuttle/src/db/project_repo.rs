//! Project repository: CRUD operations for the `projects` table.

use std::collections::BTreeMap;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{json_column, now, to_json, DatabaseError};

/// One locale a project (or container) translates into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleTarget {
    pub locale: String,
    /// Required locales gate readiness; optional ones are translated but never block it.
    #[serde(default)]
    pub required: bool,
}

impl LocaleTarget {
    pub fn required(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
            required: true,
        }
    }

    pub fn optional(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
            required: false,
        }
    }
}

/// Path filters applied to one importer for a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    #[serde(default)]
    pub only_paths: Vec<String>,
    #[serde(default)]
    pub skip_paths: Vec<String>,
}

/// A project row.
#[derive(Debug, Clone)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    pub base_locale: String,
    pub targeted_locales: Vec<LocaleTarget>,
    pub key_inclusions: Vec<String>,
    pub key_exclusions: Vec<String>,
    pub key_locale_exclusions: BTreeMap<String, Vec<String>>,
    pub importer_rules: BTreeMap<String, PathRule>,
    pub webhook_url: Option<String>,
    pub loading: bool,
    pub locale_sync_batch_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let targeted: String = row.get("targeted_locales")?;
        let inclusions: String = row.get("key_inclusions")?;
        let exclusions: String = row.get("key_exclusions")?;
        let locale_exclusions: String = row.get("key_locale_exclusions")?;
        let rules: String = row.get("importer_rules")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            base_locale: row.get("base_locale")?,
            targeted_locales: json_column(3, &targeted)?,
            key_inclusions: json_column(4, &inclusions)?,
            key_exclusions: json_column(5, &exclusions)?,
            key_locale_exclusions: json_column(6, &locale_exclusions)?,
            importer_rules: json_column(7, &rules)?,
            webhook_url: row.get("webhook_url")?,
            loading: row.get("loading")?,
            locale_sync_batch_id: row.get("locale_sync_batch_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Fields accepted when creating a project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub base_locale: String,
    #[serde(default)]
    pub targeted_locales: Vec<LocaleTarget>,
    #[serde(default)]
    pub key_inclusions: Vec<String>,
    #[serde(default)]
    pub key_exclusions: Vec<String>,
    #[serde(default)]
    pub key_locale_exclusions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub importer_rules: BTreeMap<String, PathRule>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Inserts a project and returns the stored row.
pub fn insert(conn: &Connection, project: &NewProject) -> Result<ProjectRow, DatabaseError> {
    let ts = now();
    conn.execute(
        "INSERT INTO projects (name, base_locale, targeted_locales, key_inclusions,
         key_exclusions, key_locale_exclusions, importer_rules, webhook_url,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            project.name,
            project.base_locale,
            to_json("targeted_locales", &project.targeted_locales)?,
            to_json("key_inclusions", &project.key_inclusions)?,
            to_json("key_exclusions", &project.key_exclusions)?,
            to_json("key_locale_exclusions", &project.key_locale_exclusions)?,
            to_json("importer_rules", &project.importer_rules)?,
            project.webhook_url,
            ts,
        ],
    )?;
    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
}

/// Finds a project by its ID.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<ProjectRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM projects WHERE id = ?1",
            params![id],
            ProjectRow::from_row,
        )
        .optional()?)
}

/// Replaces the targeted locale list.
pub fn update_targeted_locales(
    conn: &Connection,
    id: i64,
    targets: &[LocaleTarget],
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE projects SET targeted_locales = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, to_json("targeted_locales", &targets)?, now()],
    )?;
    Ok(())
}

/// Persists only the `loading` flag.
pub fn update_loading(conn: &Connection, id: i64, loading: bool) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE projects SET loading = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, loading, now()],
    )?;
    Ok(())
}

/// Records (or clears) the batch driving a project-wide locale re-sync.
pub fn set_locale_sync_batch(
    conn: &Connection,
    id: i64,
    batch_id: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE projects SET locale_sync_batch_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, batch_id, now()],
    )?;
    Ok(())
}
