//! Translation repository: one row per (key, locale).

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRow {
    pub id: i64,
    pub key_id: i64,
    pub locale: String,
    pub source_copy: String,
    pub copy: Option<String>,
    /// `None` = not reviewed, `Some(false)` = rejected, `Some(true)` = approved.
    pub approved: Option<bool>,
    pub translated: bool,
    pub translator: Option<String>,
    pub reviewer: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TranslationRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            key_id: row.get("key_id")?,
            locale: row.get("locale")?,
            source_copy: row.get("source_copy")?,
            copy: row.get("copy")?,
            approved: row.get("approved")?,
            translated: row.get("translated")?,
            translator: row.get("translator")?,
            reviewer: row.get("reviewer")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    pub fn is_approved(&self) -> bool {
        self.approved == Some(true)
    }
}

#[derive(Debug, Clone)]
pub struct NewTranslation {
    pub key_id: i64,
    pub locale: String,
    pub source_copy: String,
    pub copy: Option<String>,
    pub approved: Option<bool>,
}

fn is_translated(copy: Option<&str>) -> bool {
    copy.map(|c| !c.trim().is_empty()).unwrap_or(false)
}

pub fn insert(conn: &Connection, t: &NewTranslation) -> Result<TranslationRow, DatabaseError> {
    conn.execute(
        "INSERT INTO translations (key_id, locale, source_copy, copy, approved, translated,
         created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![
            t.key_id,
            t.locale,
            t.source_copy,
            t.copy,
            t.approved,
            is_translated(t.copy.as_deref()),
            now(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    find_by_id(conn, id)?.ok_or(DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<TranslationRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM translations WHERE id = ?1",
            params![id],
            TranslationRow::from_row,
        )
        .optional()?)
}

pub fn find(
    conn: &Connection,
    key_id: i64,
    locale: &str,
) -> Result<Option<TranslationRow>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT * FROM translations WHERE key_id = ?1 AND locale = ?2",
            params![key_id, locale],
            TranslationRow::from_row,
        )
        .optional()?)
}

/// All translations of a key, ordered by locale.
pub fn for_key(conn: &Connection, key_id: i64) -> Result<Vec<TranslationRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM translations WHERE key_id = ?1 ORDER BY locale")?;
    let rows = stmt
        .query_map(params![key_id], TranslationRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Refreshes the source snapshot; non-base rows lose their review state.
pub fn update_source_snapshot(
    conn: &Connection,
    id: i64,
    source_copy: &str,
    reset_approval: bool,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE translations
            SET source_copy = ?2,
                approved = CASE WHEN ?3 THEN NULL ELSE approved END,
                updated_at = ?4
          WHERE id = ?1",
        params![id, source_copy, reset_approval, now()],
    )?;
    Ok(())
}

/// Keeps the base-locale row mirroring the key's source and approved.
pub fn mirror_base(conn: &Connection, id: i64, source_copy: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE translations
            SET source_copy = ?2, copy = ?2, approved = 1, translated = ?3, updated_at = ?4
          WHERE id = ?1",
        params![id, source_copy, is_translated(Some(source_copy)), now()],
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM translations WHERE id = ?1", params![id])?;
    Ok(())
}

/// Resets approved, non-base translations of a key to "not reviewed".
/// Returns the number of rows changed.
pub fn reset_approvals(
    conn: &Connection,
    key_id: i64,
    base_locale: &str,
) -> Result<usize, DatabaseError> {
    Ok(conn.execute(
        "UPDATE translations SET approved = NULL, updated_at = ?3
          WHERE key_id = ?1 AND locale != ?2 AND approved = 1",
        params![key_id, base_locale, now()],
    )?)
}

/// Stores translator copy. The review state is cleared.
pub fn update_copy(
    conn: &Connection,
    id: i64,
    copy: Option<&str>,
    translator: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE translations
            SET copy = ?2, translated = ?3, translator = ?4, approved = NULL, updated_at = ?5
          WHERE id = ?1",
        params![id, copy, is_translated(copy), translator, now()],
    )?;
    Ok(())
}

pub fn update_approval(
    conn: &Connection,
    id: i64,
    approved: Option<bool>,
    reviewer: Option<&str>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE translations SET approved = ?2, reviewer = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, approved, reviewer, now()],
    )?;
    Ok(())
}

/// Approved translations in `locale` whose snapshot equals `source_copy`,
/// most recently updated first.
pub fn approved_exact(
    conn: &Connection,
    locale: &str,
    source_copy: &str,
) -> Result<Vec<TranslationRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM translations
          WHERE locale = ?1 AND source_copy = ?2 AND approved = 1
          ORDER BY updated_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(params![locale, source_copy], TranslationRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Approved translations in `locale` whose snapshot length lies in
/// `[min_len, max_len]` characters. Candidate pool for fuzzy matching.
pub fn approved_candidates(
    conn: &Connection,
    locale: &str,
    min_len: usize,
    max_len: usize,
) -> Result<Vec<TranslationRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM translations
          WHERE locale = ?1 AND approved = 1
            AND length(source_copy) BETWEEN ?2 AND ?3
          ORDER BY updated_at DESC, id DESC",
    )?;
    let rows = stmt
        .query_map(
            params![locale, min_len as i64, max_len as i64],
            TranslationRow::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::key_repo::{self, NewKey};
    use crate::db::project_repo::{self, NewProject};
    use crate::db::Database;

    fn key(conn: &Connection, name: &str, source: &str) -> i64 {
        let project_id = match project_repo::find_by_id(conn, 1).unwrap() {
            Some(p) => p.id,
            None => {
                project_repo::insert(
                    conn,
                    &NewProject {
                        name: "p".to_string(),
                        base_locale: "en".to_string(),
                        ..Default::default()
                    },
                )
                .unwrap()
                .id
            }
        };
        key_repo::insert(
            conn,
            &NewKey {
                project_id,
                container_id: None,
                key: name.to_string(),
                source_copy: source.to_string(),
                position: None,
                fencers: vec![],
            },
        )
        .unwrap()
        .id
    }

    fn stub(key_id: i64, locale: &str, source: &str) -> NewTranslation {
        NewTranslation {
            key_id,
            locale: locale.to_string(),
            source_copy: source.to_string(),
            copy: None,
            approved: None,
        }
    }

    #[test]
    fn test_one_row_per_key_and_locale() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let k = key(conn, "greeting", "Hello");
            insert(conn, &stub(k, "de", "Hello"))?;
            let err = insert(conn, &stub(k, "de", "Hello")).unwrap_err();
            assert!(err.is_constraint_violation());
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_copy_and_approval_tristate() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let k = key(conn, "greeting", "Hello");
            let t = insert(conn, &stub(k, "de", "Hello"))?;
            assert!(!t.translated);
            assert_eq!(t.approved, None);

            update_copy(conn, t.id, Some("Hallo"), Some("ana"))?;
            update_approval(conn, t.id, Some(false), Some("rev"))?;
            let rejected = find(conn, k, "de")?.unwrap();
            assert!(rejected.translated);
            assert_eq!(rejected.approved, Some(false));

            update_approval(conn, t.id, Some(true), Some("rev"))?;
            assert!(find(conn, k, "de")?.unwrap().is_approved());

            // New copy invalidates the review.
            update_copy(conn, t.id, Some("Hallo!"), Some("ana"))?;
            assert_eq!(find(conn, k, "de")?.unwrap().approved, None);

            update_copy(conn, t.id, Some("   "), None)?;
            assert!(!find(conn, k, "de")?.unwrap().translated);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_reset_approvals_spares_base_locale() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let k = key(conn, "title", "Welcome");
            let mut base = stub(k, "en", "Welcome");
            base.copy = Some("Welcome".to_string());
            base.approved = Some(true);
            insert(conn, &base)?;
            let mut de = stub(k, "de", "Welcome");
            de.approved = Some(true);
            insert(conn, &de)?;
            let mut fr = stub(k, "fr", "Welcome");
            fr.approved = Some(false);
            insert(conn, &fr)?;

            assert_eq!(reset_approvals(conn, k, "en")?, 1);
            assert_eq!(find(conn, k, "en")?.unwrap().approved, Some(true));
            assert_eq!(find(conn, k, "de")?.unwrap().approved, None);
            assert_eq!(find(conn, k, "fr")?.unwrap().approved, Some(false));
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_approved_exact_and_candidates() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let k1 = key(conn, "a", "Hello");
            let k2 = key(conn, "b", "Hello there");
            let mut t1 = stub(k1, "fr", "Hello");
            t1.copy = Some("Bonjour".to_string());
            t1.approved = Some(true);
            insert(conn, &t1)?;
            let mut t2 = stub(k2, "fr", "Hello there");
            t2.approved = Some(true);
            insert(conn, &t2)?;
            insert(conn, &stub(k2, "de", "Hello there"))?;

            let exact = approved_exact(conn, "fr", "Hello")?;
            assert_eq!(exact.len(), 1);
            assert_eq!(exact[0].copy.as_deref(), Some("Bonjour"));
            assert!(approved_exact(conn, "de", "Hello there")?.is_empty());

            assert_eq!(approved_candidates(conn, "fr", 1, 20)?.len(), 2);
            assert_eq!(approved_candidates(conn, "fr", 6, 20)?.len(), 1);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }
}
