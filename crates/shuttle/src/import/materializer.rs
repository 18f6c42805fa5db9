//! Key/translation materialization.
//!
//! Turns one imported string into a key attached to its container and makes
//! sure the key carries exactly one translation per locale it is translated
//! into. Running it twice with the same input changes nothing.

use rusqlite::Connection;

use super::container::{Container, Membership};
use crate::db::key_repo::{self, sha256_hex, KeyRow, NewKey};
use crate::db::translation_repo::{self, NewTranslation};
use crate::db::{container_repo, DatabaseError};
use crate::error::ImportError;
use crate::locale::LocaleRequirements;
use crate::readiness::{self, KeyTransition};
use crate::rules::KeyRules;

#[derive(Debug, Clone, Default)]
pub struct MaterializeOptions {
    /// Position within an exclusive container. Ignored for commits.
    pub position: Option<i64>,
    pub fencers: Vec<String>,
    /// Leave readiness to a batched pass run by the caller.
    pub skip_readiness_hooks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Rejected by the project's key inclusion/exclusion rules.
    Excluded,
    /// The commit already holds a different key under the same slot.
    Collision,
}

/// What `sync_translations` did to a key's translations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationSync {
    pub created: usize,
    pub refreshed: usize,
    pub removed: usize,
    /// Approved translations of locales no longer targeted, kept for audit.
    pub retained: usize,
}

impl TranslationSync {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.refreshed == 0 && self.removed == 0
    }
}

#[derive(Debug, Clone)]
pub struct MaterializedKey {
    pub key: KeyRow,
    pub created: bool,
    pub source_updated: bool,
    pub membership_changed: bool,
    pub translations: TranslationSync,
    /// Present unless readiness hooks were skipped.
    pub readiness: Option<KeyTransition>,
}

impl MaterializedKey {
    pub fn is_noop(&self) -> bool {
        !self.created
            && !self.source_updated
            && !self.membership_changed
            && self.translations.is_noop()
            && !self.readiness.map(|t| t.changed()).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub enum Materialized {
    Key(MaterializedKey),
    Skipped(SkipReason),
}

impl Materialized {
    pub fn key(&self) -> Option<&MaterializedKey> {
        match self {
            Materialized::Key(k) => Some(k),
            Materialized::Skipped(_) => None,
        }
    }
}

pub struct Materializer<'c> {
    container: &'c dyn Container,
    requirements: LocaleRequirements,
    rules: Option<KeyRules>,
}

impl<'c> Materializer<'c> {
    pub fn for_container(container: &'c dyn Container) -> Self {
        let rules = container
            .applies_key_rules()
            .then(|| KeyRules::for_project(container.project()));
        Self {
            requirements: container.locale_requirements(),
            container,
            rules,
        }
    }

    pub fn requirements(&self) -> &LocaleRequirements {
        &self.requirements
    }

    pub fn materialize(
        &self,
        conn: &Connection,
        identifier: &str,
        source_copy: &str,
        opts: &MaterializeOptions,
    ) -> Result<Materialized, ImportError> {
        if let Some(rules) = &self.rules {
            if !rules.admits(identifier) {
                log::debug!("Key '{}' excluded by project rules", identifier);
                return Ok(Materialized::Skipped(SkipReason::Excluded));
            }
        }

        let row = self.container.row();
        let slot = self.container.key_slot(identifier, source_copy);
        let key_sha = sha256_hex(&slot);
        let new_key = NewKey {
            project_id: row.project_id,
            container_id: None,
            key: slot.clone(),
            source_copy: source_copy.to_string(),
            position: None,
            fencers: opts.fencers.clone(),
        };

        let mut source_updated = false;
        let (key, created, membership_changed) = match self.container.membership() {
            Membership::Shared => {
                let source_sha = sha256_hex(source_copy);
                if let Some(member) = key_repo::find_commit_member(conn, row.id, &key_sha)? {
                    if member.source_copy_sha != source_sha {
                        log::warn!(
                            "Commit {} already holds key '{}' with different source copy; skipping",
                            row.name,
                            slot
                        );
                        return Ok(Materialized::Skipped(SkipReason::Collision));
                    }
                }
                let (key, created) = insert_or_refind(conn, &new_key, |conn| {
                    key_repo::find_shared(conn, row.project_id, &key_sha, &source_sha)
                })?;
                let attached = container_repo::attach_commit_key(conn, row.id, key.id)?;
                (key, created, attached)
            }
            Membership::Exclusive => {
                match key_repo::find_in_container(conn, row.id, &key_sha)? {
                    Some(mut key) => {
                        if key.source_copy != source_copy || key.fencers != opts.fencers {
                            key_repo::update_source(conn, key.id, source_copy, &opts.fencers)?;
                            key.source_copy = source_copy.to_string();
                            key.source_copy_sha = sha256_hex(source_copy);
                            key.fencers = opts.fencers.clone();
                            source_updated = true;
                        }
                        let moved = key.position != opts.position;
                        if moved {
                            key_repo::set_position(conn, key.id, opts.position)?;
                            key.position = opts.position;
                        }
                        (key, false, moved)
                    }
                    None => {
                        let new_key = NewKey {
                            container_id: Some(row.id),
                            position: opts.position,
                            ..new_key
                        };
                        let (key, created) = insert_or_refind(conn, &new_key, |conn| {
                            key_repo::find_in_container(conn, row.id, &key_sha)
                        })?;
                        (key, created, true)
                    }
                }
            }
        };

        // A shared key answers to every commit holding it, not just this one.
        let shared_requirements;
        let requirements = if key.is_shared() {
            shared_requirements = readiness::requirements_for_key(conn, &key)?;
            &shared_requirements
        } else {
            &self.requirements
        };
        let translations = sync_translations(conn, &key, requirements)?;

        let readiness = if opts.skip_readiness_hooks {
            None
        } else {
            Some(readiness::recalculate_key(conn, key.id)?)
        };

        Ok(Materialized::Key(MaterializedKey {
            key,
            created,
            source_updated,
            membership_changed,
            translations,
            readiness,
        }))
    }
}

/// Inserts `new_key`; on a unique-constraint violation re-finds the row a
/// concurrent writer created, then tries the insert one more time.
fn insert_or_refind<F>(
    conn: &Connection,
    new_key: &NewKey,
    refind: F,
) -> Result<(KeyRow, bool), DatabaseError>
where
    F: Fn(&Connection) -> Result<Option<KeyRow>, DatabaseError>,
{
    if let Some(existing) = refind(conn)? {
        return Ok((existing, false));
    }
    match key_repo::insert(conn, new_key) {
        Ok(key) => Ok((key, true)),
        Err(e) if e.is_constraint_violation() => {
            log::debug!("Key '{}' inserted concurrently, re-finding", new_key.key);
            match refind(conn)? {
                Some(existing) => Ok((existing, false)),
                None => Ok((key_repo::insert(conn, new_key)?, true)),
            }
        }
        Err(e) => Err(e),
    }
}

/// Makes the key's translations match `requirements`: one per locale it is
/// translated into, base mirrored and approved, snapshots current. Rows for
/// locales no longer targeted are deleted unless approved.
pub fn sync_translations(
    conn: &Connection,
    key: &KeyRow,
    requirements: &LocaleRequirements,
) -> Result<TranslationSync, ImportError> {
    let locales = requirements.locales_for_key(&key.key);
    if locales.is_empty() {
        return Err(ImportError::NoLocales {
            key: key.key.clone(),
        });
    }

    let existing = translation_repo::for_key(conn, key.id)?;
    let mut sync = TranslationSync::default();

    for locale in &locales {
        let is_base = *locale == requirements.base;
        match existing.iter().find(|t| &t.locale == locale) {
            None => {
                translation_repo::insert(
                    conn,
                    &NewTranslation {
                        key_id: key.id,
                        locale: locale.clone(),
                        source_copy: key.source_copy.clone(),
                        copy: is_base.then(|| key.source_copy.clone()),
                        approved: is_base.then_some(true),
                    },
                )?;
                sync.created += 1;
            }
            Some(t) if is_base => {
                if t.source_copy != key.source_copy
                    || t.copy.as_deref() != Some(key.source_copy.as_str())
                    || !t.is_approved()
                {
                    translation_repo::mirror_base(conn, t.id, &key.source_copy)?;
                    sync.refreshed += 1;
                }
            }
            Some(t) => {
                if t.source_copy != key.source_copy {
                    translation_repo::update_source_snapshot(conn, t.id, &key.source_copy, true)?;
                    sync.refreshed += 1;
                }
            }
        }
    }

    for t in existing.iter().filter(|t| !locales.contains(&t.locale)) {
        if t.is_approved() {
            sync.retained += 1;
        } else {
            translation_repo::delete(conn, t.id)?;
            sync.removed += 1;
        }
    }

    if !sync.is_noop() {
        log::debug!(
            "Key {} translations: {} created, {} refreshed, {} removed",
            key.id,
            sync.created,
            sync.refreshed,
            sync.removed
        );
    }
    Ok(sync)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::container_repo::{ContainerKind, NewContainer};
    use crate::db::project_repo::{self, LocaleTarget, NewProject};
    use crate::db::Database;
    use crate::import::container::load_container;

    fn setup(conn: &Connection, kind: ContainerKind, project: NewProject) -> Box<dyn Container> {
        let project = project_repo::insert(conn, &project).unwrap();
        let row = container_repo::insert(
            conn,
            &NewContainer {
                project_id: project.id,
                kind,
                name: "rev-1".to_string(),
                source_copy: None,
                targeted_locales: None,
            },
        )
        .unwrap();
        load_container(conn, row.id).unwrap().unwrap()
    }

    fn project(targets: Vec<LocaleTarget>) -> NewProject {
        NewProject {
            name: "web".to_string(),
            base_locale: "en".to_string(),
            targeted_locales: targets,
            ..Default::default()
        }
    }

    fn opts(position: Option<i64>) -> MaterializeOptions {
        MaterializeOptions {
            position,
            ..Default::default()
        }
    }

    #[test]
    fn test_materialization_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let commit = setup(
                conn,
                ContainerKind::Commit,
                project(vec![LocaleTarget::required("de"), LocaleTarget::optional("fr")]),
            );
            let m = Materializer::for_container(commit.as_ref());

            let first = m.materialize(conn, "greeting", "Hello", &opts(None)).unwrap();
            let first = first.key().unwrap();
            assert!(first.created && first.membership_changed);
            assert_eq!(first.translations.created, 3);

            let second = m.materialize(conn, "greeting", "Hello", &opts(None)).unwrap();
            let second = second.key().unwrap();
            assert!(second.is_noop());
            assert_eq!(second.key.id, first.key.id);
            assert_eq!(translation_repo::for_key(conn, first.key.id)?.len(), 3);

            let base = translation_repo::find(conn, first.key.id, "en")?.unwrap();
            assert_eq!(base.copy.as_deref(), Some("Hello"));
            assert!(base.is_approved());
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_key_rules_and_locale_exclusions() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let mut p = project(vec![LocaleTarget::required("de"), LocaleTarget::required("ja")]);
            p.key_exclusions = vec!["debug.*".to_string()];
            p.key_locale_exclusions
                .insert("ja".to_string(), vec!["legal.*".to_string()]);
            let commit = setup(conn, ContainerKind::Commit, p);
            let m = Materializer::for_container(commit.as_ref());

            assert!(matches!(
                m.materialize(conn, "debug.banner", "x", &opts(None)).unwrap(),
                Materialized::Skipped(SkipReason::Excluded)
            ));

            let legal = m.materialize(conn, "legal.terms", "Terms", &opts(None)).unwrap();
            let locales: Vec<String> = translation_repo::for_key(conn, legal.key().unwrap().key.id)?
                .into_iter()
                .map(|t| t.locale)
                .collect();
            assert_eq!(locales, vec!["de", "en"]);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_commit_slot_collision_is_skipped() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let commit = setup(conn, ContainerKind::Commit, project(vec![]));
            let m = Materializer::for_container(commit.as_ref());
            m.materialize(conn, "title", "One", &opts(None)).unwrap();
            assert!(matches!(
                m.materialize(conn, "title", "Two", &opts(None)).unwrap(),
                Materialized::Skipped(SkipReason::Collision)
            ));
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_asset_source_change_resets_review() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let asset = setup(conn, ContainerKind::Asset, project(vec![LocaleTarget::required("de")]));
            let m = Materializer::for_container(asset.as_ref());
            let first = m.materialize(conn, "cta", "Buy", &opts(Some(0))).unwrap();
            let key_id = first.key().unwrap().key.id;
            let de = translation_repo::find(conn, key_id, "de")?.unwrap();
            translation_repo::update_copy(conn, de.id, Some("Kaufen"), None)?;
            translation_repo::update_approval(conn, de.id, Some(true), None)?;

            let second = m.materialize(conn, "cta", "Buy now", &opts(Some(0))).unwrap();
            let second = second.key().unwrap();
            assert_eq!(second.key.id, key_id);
            assert!(second.source_updated);

            let de = translation_repo::find(conn, key_id, "de")?.unwrap();
            assert_eq!(de.source_copy, "Buy now");
            assert_eq!(de.copy.as_deref(), Some("Kaufen"));
            assert_eq!(de.approved, None);
            assert_eq!(
                translation_repo::find(conn, key_id, "en")?.unwrap().copy.as_deref(),
                Some("Buy now")
            );
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_untargeted_locales_removed_unless_approved() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let asset = setup(
                conn,
                ContainerKind::Asset,
                project(vec![LocaleTarget::required("de"), LocaleTarget::required("fr")]),
            );
            let m = Materializer::for_container(asset.as_ref());
            let key = m.materialize(conn, "cta", "Buy", &opts(Some(0))).unwrap();
            let key = key.key().unwrap().key.clone();
            let fr = translation_repo::find(conn, key.id, "fr")?.unwrap();
            translation_repo::update_approval(conn, fr.id, Some(true), None)?;

            let narrowed = LocaleRequirements::new("en", &[], &Default::default());
            let sync = sync_translations(conn, &key, &narrowed).unwrap();
            assert_eq!(sync.removed, 1);
            assert_eq!(sync.retained, 1);
            assert!(translation_repo::find(conn, key.id, "de")?.is_none());
            assert!(translation_repo::find(conn, key.id, "fr")?.is_some());
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }

    #[test]
    fn test_inline_readiness_hook() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let asset = setup(conn, ContainerKind::Asset, project(vec![LocaleTarget::optional("de")]));
            let m = Materializer::for_container(asset.as_ref());
            let hooked = m.materialize(conn, "a", "A", &opts(Some(0))).unwrap();
            let transition = hooked.key().unwrap().readiness.unwrap();
            assert!(transition.ready && transition.changed());

            let skipped = m
                .materialize(
                    conn,
                    "b",
                    "B",
                    &MaterializeOptions {
                        position: Some(1),
                        skip_readiness_hooks: true,
                        ..Default::default()
                    },
                )
                .unwrap();
            assert!(skipped.key().unwrap().readiness.is_none());
            assert!(!skipped.key().unwrap().key.ready);
            Ok::<_, DatabaseError>(())
        })
        .unwrap();
    }
}
