//! Copy-forward of approved translations onto newly created keys.

use serde::{Deserialize, Serialize};

use crate::db::{key_repo, project_repo, translation_repo};
use crate::error::JobError;
use crate::worker::{JobContext, Worker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationPrefillArgs {
    pub key_ids: Vec<i64>,
}

/// Fills untranslated translations of new keys from exact translation-memory
/// matches. A match found in the target locale itself stays approved; one
/// borrowed from a fallback locale goes to review.
pub struct TranslationPrefill;

impl Worker for TranslationPrefill {
    type Args = TranslationPrefillArgs;
    const CLASS: &'static str = "TranslationPrefill";

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        let matcher = &ctx.services().matcher;
        let filled = ctx.db().transaction(|tx| {
            let mut filled = 0;
            for key_id in &args.key_ids {
                let Some(key) = key_repo::find_by_id(tx, *key_id)? else {
                    continue;
                };
                let Some(project) = project_repo::find_by_id(tx, key.project_id)? else {
                    continue;
                };
                // Matches are resolved before any write so a locale never
                // borrows copy this key just received.
                let mut fills = Vec::new();
                for t in translation_repo::for_key(tx, key.id)? {
                    if t.locale == project.base_locale || t.translated {
                        continue;
                    }
                    let Some(found) = matcher.find_reusable_translation(tx, &t.locale, &key.source_copy)? else {
                        continue;
                    };
                    if found.key_id != key.id {
                        fills.push((t, found));
                    }
                }
                for (t, found) in fills {
                    translation_repo::update_copy(tx, t.id, found.copy.as_deref(), None)?;
                    if found.locale == t.locale {
                        translation_repo::update_approval(tx, t.id, Some(true), None)?;
                    }
                    filled += 1;
                }
            }
            Ok::<_, JobError>(filled)
        })?;
        if filled > 0 {
            log::info!("Prefilled {} translation(s) from translation memory", filled);
        }
        Ok(())
    }
}
