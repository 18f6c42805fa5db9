//! Translator and reviewer write path.
//!
//! Every operation validates synchronously and only then touches the
//! database and enqueues readiness work.

use serde::Serialize;

use crate::db::key_repo::{self, KeyRow};
use crate::db::project_repo::{self, ProjectRow};
use crate::db::translation_repo::{self, TranslationRow};
use crate::db::DatabaseError;
use crate::error::{ShuttleError, ValidationError};
use crate::import::fencing;
use crate::jobs::{KeyReadinessArgs, KeyReadinessJob};
use crate::locale::Locale;
use crate::services::Services;

/// Outcome of a locale copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocaleCopy {
    pub copied: usize,
    pub skipped: usize,
}

struct Loaded {
    translation: TranslationRow,
    key: KeyRow,
    project: ProjectRow,
}

fn load(services: &Services, translation_id: i64) -> Result<Loaded, ShuttleError> {
    services
        .db
        .with_conn(|conn| {
            let Some(translation) = translation_repo::find_by_id(conn, translation_id)? else {
                return Ok(None);
            };
            let Some(key) = key_repo::find_by_id(conn, translation.key_id)? else {
                return Ok(None);
            };
            let project = project_repo::find_by_id(conn, key.project_id)?;
            Ok::<_, DatabaseError>(project.map(|project| Loaded {
                translation,
                key,
                project,
            }))
        })?
        .ok_or_else(|| ShuttleError::NotFound(format!("translation {}", translation_id)))
}

fn reload(services: &Services, translation_id: i64) -> Result<TranslationRow, ShuttleError> {
    services
        .db
        .with_conn(|conn| translation_repo::find_by_id(conn, translation_id))?
        .ok_or_else(|| ShuttleError::NotFound(format!("translation {}", translation_id)))
}

fn schedule_key_readiness(services: &Services, key_id: i64) -> Result<(), ShuttleError> {
    services
        .db
        .with_conn(|conn| services.compiler.invalidate_for_key(conn, key_id))?;
    services
        .client
        .perform_once::<KeyReadinessJob>(&KeyReadinessArgs { key_id })?;
    Ok(())
}

/// Stores translator copy. Blank copy clears the translation. Copy that
/// drops a fenced token of the source is rejected.
pub fn translate(
    services: &Services,
    translation_id: i64,
    copy: Option<&str>,
    translator: Option<&str>,
) -> Result<TranslationRow, ShuttleError> {
    let Loaded {
        translation,
        key,
        project,
    } = load(services, translation_id)?;
    if translation.locale == project.base_locale {
        return Err(ValidationError::BaseTranslation.into());
    }
    if let Some(copy) = copy.filter(|c| !c.trim().is_empty()) {
        let missing = fencing::missing_fences(&key.fencers, &key.source_copy, copy);
        if !missing.is_empty() {
            return Err(ValidationError::MissingFences { missing }.into());
        }
    }

    services
        .db
        .with_conn(|conn| translation_repo::update_copy(conn, translation.id, copy, translator))?;
    log::info!(
        "Translation {} ({}) of key {} updated",
        translation.id,
        translation.locale,
        key.id
    );
    // New copy always clears the review; readiness only moves if it was approved.
    if translation.is_approved() {
        schedule_key_readiness(services, key.id)?;
    } else {
        services
            .db
            .with_conn(|conn| services.compiler.invalidate_for_key(conn, key.id))?;
    }
    services.search.reindex(&[key.id]);
    reload(services, translation.id)
}

/// Approves or rejects a translation and schedules the readiness cascade.
pub fn review(
    services: &Services,
    translation_id: i64,
    approved: bool,
    reviewer: Option<&str>,
) -> Result<TranslationRow, ShuttleError> {
    let Loaded {
        translation,
        key,
        project,
    } = load(services, translation_id)?;
    if translation.locale == project.base_locale {
        return Err(ValidationError::BaseTranslation.into());
    }

    services.db.with_conn(|conn| {
        translation_repo::update_approval(conn, translation.id, Some(approved), reviewer)
    })?;
    log::info!(
        "Translation {} ({}) {}",
        translation.id,
        translation.locale,
        if approved { "approved" } else { "rejected" }
    );
    if translation.is_approved() != approved {
        schedule_key_readiness(services, key.id)?;
    }
    reload(services, translation.id)
}

/// Copies translated copy from one locale of a project onto another for
/// every active key. Copied translations land unreviewed. Existing copy
/// in the target locale is kept unless `overwrite` is set.
pub fn copy_locale(
    services: &Services,
    project_id: i64,
    from: &str,
    to: &str,
    overwrite: bool,
) -> Result<LocaleCopy, ShuttleError> {
    Locale::parse(from)?;
    Locale::parse(to)?;
    let conflict = |reason: &str| ValidationError::ConflictingLocaleCopy {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    };
    if from == to {
        return Err(conflict("source and target are the same locale").into());
    }

    let project = services
        .db
        .with_conn(|conn| project_repo::find_by_id(conn, project_id))?
        .ok_or_else(|| ShuttleError::NotFound(format!("project {}", project_id)))?;
    if to == project.base_locale {
        return Err(conflict("the base locale mirrors the source copy").into());
    }
    let targeted = |locale: &str| project.targeted_locales.iter().any(|t| t.locale == locale);
    if !targeted(to) {
        return Err(ValidationError::LocaleNotTargeted {
            project_id,
            locale: to.to_string(),
        }
        .into());
    }
    if from != project.base_locale && !targeted(from) {
        return Err(ValidationError::LocaleNotTargeted {
            project_id,
            locale: from.to_string(),
        }
        .into());
    }

    let (summary, unapproved) = services.db.transaction(|tx| {
        let mut summary = LocaleCopy::default();
        let mut unapproved = Vec::new();
        for key_id in key_repo::active_ids_for_project(tx, project.id)? {
            let source = translation_repo::find(tx, key_id, from)?.filter(|t| t.translated);
            let target = translation_repo::find(tx, key_id, to)?;
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            if target.translated && !overwrite {
                summary.skipped += 1;
                continue;
            }
            translation_repo::update_copy(tx, target.id, source.copy.as_deref(), None)?;
            if target.is_approved() {
                unapproved.push(key_id);
            }
            summary.copied += 1;
        }
        Ok::<_, DatabaseError>((summary, unapproved))
    })?;

    services.compiler.invalidate_project(project.id)?;
    for key_id in unapproved {
        services
            .client
            .perform_once::<KeyReadinessJob>(&KeyReadinessArgs { key_id })?;
    }
    log::info!(
        "Copied {} translation(s) from {} to {} in project {} ({} kept)",
        summary.copied,
        from,
        to,
        project.id,
        summary.skipped
    );
    Ok(summary)
}
