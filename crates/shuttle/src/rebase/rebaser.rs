use rusqlite::Connection;

use super::diff::{changed_neighbors, diff, DiffOp};
use crate::db::key_repo::{self, sha256_hex, KeyRow};
use crate::db::translation_repo;
use crate::error::ImportError;
use crate::import::container::{paragraph_slot, Container};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebaseOutcome {
    /// Keys whose approvals were reset because they neighbour a change.
    pub reset_keys: usize,
    /// Approved translations turned back to "not reviewed".
    pub reset_translations: usize,
    pub renamed: usize,
    pub deactivated: usize,
}

/// Carries translator work from the last imported text of a paragraph
/// container over to its new text.
#[derive(Debug, Clone, Copy)]
pub struct Rebaser {
    radius: usize,
}

impl Default for Rebaser {
    fn default() -> Self {
        Self { radius: 1 }
    }
}

impl Rebaser {
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    /// Call inside a transaction so readers never see half-renamed slots.
    pub fn rebase(
        &self,
        conn: &Connection,
        container: &dyn Container,
        old_text: Option<&str>,
        new_text: &str,
    ) -> Result<RebaseOutcome, ImportError> {
        let row = container.row();
        let Some(splitter) = container.splitter() else {
            return Ok(RebaseOutcome::default());
        };
        let old = match old_text {
            Some(text) => splitter.split(text)?,
            None => Vec::new(),
        };
        let new = splitter.split(new_text)?;
        let ops = diff(&old, &new);

        let key_at = |conn: &Connection, index: usize| -> Result<Option<KeyRow>, ImportError> {
            let slot = paragraph_slot(index, &old[index]);
            Ok(key_repo::find_in_container(conn, row.id, &sha256_hex(&slot))?)
        };

        let mut outcome = RebaseOutcome::default();
        let base = &container.project().base_locale;
        for index in changed_neighbors(&ops, self.radius) {
            if let Some(key) = key_at(conn, index)? {
                let reset = translation_repo::reset_approvals(conn, key.id, base)?;
                if reset > 0 {
                    outcome.reset_keys += 1;
                    outcome.reset_translations += reset;
                }
            }
        }

        let mut moves: Vec<(KeyRow, String)> = Vec::new();
        for (from, to) in carried_paragraphs(&ops, &old, &new) {
            if from == to {
                continue;
            }
            if let Some(key) = key_at(conn, from)? {
                moves.push((key, paragraph_slot(to, &new[to])));
            }
        }

        // Park every moving key first so no final slot is still held by
        // another mover when it is claimed.
        for (key, _) in &moves {
            key_repo::rename_slot(conn, key.id, &format!("rebase-tmp:{}", key.id))?;
        }
        for (key, target) in &moves {
            if let Some(stale) = key_repo::find_in_container(conn, row.id, &sha256_hex(target))? {
                key_repo::rename_slot(conn, stale.id, &format!("retired:{}", stale.id))?;
            }
            key_repo::rename_slot(conn, key.id, target)?;
        }
        outcome.renamed = moves.len();

        outcome.deactivated = key_repo::deactivate_container(conn, row.id)?;

        log::info!(
            "Rebased {} {}: {} renamed, {} keys reset, {} deactivated",
            row.kind.entity_type(),
            row.id,
            outcome.renamed,
            outcome.reset_keys,
            outcome.deactivated
        );
        Ok(outcome)
    }
}

/// `(old, new)` index pairs of paragraphs that survive the edit: the equal
/// runs of the diff plus deleted paragraphs re-inserted verbatim elsewhere.
fn carried_paragraphs(ops: &[DiffOp], old: &[String], new: &[String]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    let mut inserted: Vec<usize> = ops
        .iter()
        .filter_map(|op| match op {
            DiffOp::Insert { new } => Some(*new),
            _ => None,
        })
        .collect();
    for op in ops {
        match *op {
            DiffOp::Equal { old: from, new: to } => pairs.push((from, to)),
            DiffOp::Delete { old: from } => {
                if let Some(slot) = inserted.iter().position(|&to| new[to] == old[from]) {
                    pairs.push((from, inserted.remove(slot)));
                }
            }
            DiffOp::Insert { .. } => {}
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::container_repo::{self, ContainerKind, NewContainer};
    use crate::db::project_repo::{self, LocaleTarget, NewProject};
    use crate::db::{Database, DatabaseError};
    use crate::import::container::load_container;
    use crate::import::materializer::{MaterializeOptions, Materializer};

    fn article(conn: &Connection, text: &str) -> i64 {
        let project = project_repo::insert(
            conn,
            &NewProject {
                name: "blog".to_string(),
                base_locale: "en".to_string(),
                targeted_locales: vec![LocaleTarget::required("de")],
                ..Default::default()
            },
        )
        .unwrap();
        container_repo::insert(
            conn,
            &NewContainer {
                project_id: project.id,
                kind: ContainerKind::Article,
                name: "post".to_string(),
                source_copy: Some(text.to_string()),
                targeted_locales: None,
            },
        )
        .unwrap()
        .id
    }

    /// Materializes the container's current paragraphs and approves every
    /// German translation, returning key ids by paragraph.
    fn import_and_approve(conn: &Connection, id: i64) -> Vec<i64> {
        let container = load_container(conn, id).unwrap().unwrap();
        let m = Materializer::for_container(container.as_ref());
        let mut ids = Vec::new();
        for (index, paragraph) in container.paragraphs().unwrap().iter().enumerate() {
            let materialized = m
                .materialize(
                    conn,
                    &index.to_string(),
                    paragraph,
                    &MaterializeOptions {
                        position: Some(index as i64),
                        ..Default::default()
                    },
                )
                .unwrap();
            let key_id = materialized.key().unwrap().key.id;
            let de = translation_repo::find(conn, key_id, "de").unwrap().unwrap();
            translation_repo::update_approval(conn, de.id, Some(true), None).unwrap();
            ids.push(key_id);
        }
        container.on_all_keys_imported(conn, container.row().source_copy.as_deref()).unwrap();
        ids
    }

    fn de_approved(conn: &Connection, key_id: i64) -> Option<bool> {
        translation_repo::find(conn, key_id, "de").unwrap().unwrap().approved
    }

    #[test]
    fn test_insert_resets_neighbours_only() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = article(conn, "A\n\nB\n\nC");
            let keys = import_and_approve(conn, id);

            container_repo::update_source_copy(conn, id, "A\n\nX\n\nB\n\nC")?;
            let container = load_container(conn, id)?.unwrap();
            let outcome = Rebaser::default()
                .rebase(conn, container.as_ref(), Some("A\n\nB\n\nC"), "A\n\nX\n\nB\n\nC")
                .unwrap();
            assert_eq!(outcome.reset_keys, 2);
            assert_eq!(outcome.renamed, 2);
            assert_eq!(outcome.deactivated, 3);

            assert_eq!(de_approved(conn, keys[0]), None);
            assert_eq!(de_approved(conn, keys[1]), None);
            assert_eq!(de_approved(conn, keys[2]), Some(true));

            let b = key_repo::find_by_id(conn, keys[1])?.unwrap();
            assert_eq!(b.key, paragraph_slot(2, "B"));
            assert_eq!(b.position, None);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_reimport_reactivates_moved_keys() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let id = article(conn, "A\n\nB");
            let keys = import_and_approve(conn, id);

            container_repo::update_source_copy(conn, id, "B\n\nA")?;
            let container = load_container(conn, id)?.unwrap();
            Rebaser::new(0)
                .rebase(conn, container.as_ref(), Some("A\n\nB"), "B\n\nA")
                .unwrap();

            let m = Materializer::for_container(container.as_ref());
            for (index, paragraph) in ["B", "A"].iter().enumerate() {
                m.materialize(
                    conn,
                    &index.to_string(),
                    paragraph,
                    &MaterializeOptions {
                        position: Some(index as i64),
                        ..Default::default()
                    },
                )
                .unwrap();
            }

            let active: Vec<i64> = key_repo::active_for_container(conn, container.row())?
                .into_iter()
                .map(|k| k.id)
                .collect();
            assert_eq!(active.len(), 2);
            assert!(active.contains(&keys[0]) && active.contains(&keys[1]));
            assert_eq!(key_repo::all_for_container(conn, id)?.len(), 2);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_swapped_paragraphs_are_carried() {
        let old: Vec<String> = vec!["A".into(), "B".into()];
        let new: Vec<String> = vec!["B".into(), "A".into()];
        let ops = diff(&old, &new);
        let mut pairs = carried_paragraphs(&ops, &old, &new);
        pairs.sort();
        assert_eq!(pairs, vec![(0, 1), (1, 0)]);
    }

    #[test]
    fn test_stale_slot_occupant_is_retired() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            // An inactive "1:B" left over from an earlier revision.
            let id = article(conn, "B");
            let stale = import_and_approve(conn, id);
            container_repo::update_source_copy(conn, id, "A\n\nB")?;
            let container = load_container(conn, id)?.unwrap();
            Rebaser::default()
                .rebase(conn, container.as_ref(), Some("B"), "A\n\nB")
                .unwrap();
            assert_eq!(
                key_repo::find_by_id(conn, stale[0])?.unwrap().key,
                paragraph_slot(1, "B")
            );

            let occupant = key_repo::insert(
                conn,
                &key_repo::NewKey {
                    project_id: container.row().project_id,
                    container_id: Some(id),
                    key: paragraph_slot(0, "B"),
                    source_copy: "B".to_string(),
                    position: None,
                    fencers: vec![],
                },
            )?;
            Rebaser::default()
                .rebase(conn, container.as_ref(), Some("A\n\nB"), "B")
                .unwrap();
            assert_eq!(
                key_repo::find_by_id(conn, stale[0])?.unwrap().key,
                paragraph_slot(0, "B")
            );
            assert_eq!(
                key_repo::find_by_id(conn, occupant.id)?.unwrap().key,
                format!("retired:{}", occupant.id)
            );
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }
}
