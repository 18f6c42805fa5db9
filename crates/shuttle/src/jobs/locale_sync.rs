//! Project-wide translation re-sync after the targeted locales change.
//!
//! Phase one re-syncs every active key in a batch with readiness hooks
//! suppressed; the finisher then recalculates each container exactly once.

use serde::{Deserialize, Serialize};

use super::readiness::publish_transition;
use crate::coordination::BatchStatus;
use crate::db::project_repo::{self, ProjectRow};
use crate::db::{container_repo, key_repo};
use crate::error::JobError;
use crate::import::sync_translations;
use crate::readiness;
use crate::worker::{BatchHandler, JobContext, Worker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLocaleSyncArgs {
    pub project_id: i64,
}

pub struct ProjectLocaleSync;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTranslationSyncArgs {
    pub key_id: i64,
}

/// Brings one key's translations in line with its current requirements.
pub struct KeyTranslationSync;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleSyncContext {
    pub project_id: i64,
}

pub struct ProjectLocaleSyncFinisher;

fn load_project(ctx: &JobContext<'_>, id: i64) -> Result<ProjectRow, JobError> {
    ctx.db()
        .with_conn(|conn| project_repo::find_by_id(conn, id))?
        .ok_or_else(|| JobError::NotFound(format!("project {}", id)))
}

impl Worker for ProjectLocaleSync {
    type Args = ProjectLocaleSyncArgs;
    const CLASS: &'static str = "ProjectLocaleSync";

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        let services = ctx.services();
        let mut project = load_project(ctx, args.project_id)?;
        let key_ids = ctx
            .db()
            .with_conn(|conn| key_repo::active_ids_for_project(conn, project.id))?;

        let batch = ctx.new_batch::<ProjectLocaleSyncFinisher>(
            &format!("Locale sync of project {}", project.id),
            &LocaleSyncContext {
                project_id: project.id,
            },
        )?;
        let bid = batch.bid().to_string();
        ctx.db()
            .with_conn(|conn| project_repo::set_locale_sync_batch(conn, project.id, Some(&bid)))?;
        services.tracker.add_worker(&mut project, &bid)?;

        log::info!(
            "Re-syncing {} key(s) of project {} (batch {})",
            key_ids.len(),
            project.id,
            bid
        );
        batch.jobs(|b| {
            for key_id in &key_ids {
                b.enqueue::<KeyTranslationSync>(&KeyTranslationSyncArgs { key_id: *key_id })?;
            }
            Ok::<_, JobError>(())
        })?;
        Ok(())
    }
}

impl Worker for KeyTranslationSync {
    type Args = KeyTranslationSyncArgs;
    const CLASS: &'static str = "KeyTranslationSync";

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        let sync = ctx.db().transaction(|tx| {
            // Deleted keys make the job moot.
            let Some(key) = key_repo::find_by_id(tx, args.key_id)? else {
                return Ok(None);
            };
            let requirements = readiness::requirements_for_key(tx, &key)?;
            let sync = sync_translations(tx, &key, &requirements)?;
            readiness::recalculate_key(tx, key.id)?;
            Ok::<_, JobError>(Some(sync))
        })?;
        if let Some(sync) = sync {
            log::debug!(
                "Key {}: {} created, {} removed, {} retained",
                args.key_id,
                sync.created,
                sync.removed,
                sync.retained
            );
        }
        Ok(())
    }
}

impl BatchHandler for ProjectLocaleSyncFinisher {
    type Context = LocaleSyncContext;
    const CLASS: &'static str = "ProjectLocaleSyncFinisher";

    fn on_success(
        &self,
        ctx: &JobContext<'_>,
        status: &BatchStatus,
        context: Self::Context,
    ) -> Result<(), JobError> {
        let services = ctx.services();
        let mut project = load_project(ctx, context.project_id)?;

        if project.locale_sync_batch_id.as_deref() == Some(status.bid.as_str()) {
            let transitions = ctx.db().transaction(|tx| {
                project_repo::set_locale_sync_batch(tx, project.id, None)?;
                let mut transitions = Vec::new();
                for container in container_repo::list_for_project(tx, project.id)? {
                    if container.loading {
                        continue;
                    }
                    transitions.push(readiness::recalculate_container(tx, container.id)?);
                }
                Ok::<_, JobError>(transitions)
            })?;
            for transition in &transitions {
                publish_transition(services, transition)?;
            }
            log::info!(
                "Locale sync of project {} finished; {} container(s) recalculated",
                project.id,
                transitions.len()
            );
        } else {
            log::info!(
                "Locale sync batch {} of project {} was superseded",
                status.bid,
                project.id
            );
        }

        services.tracker.remove_worker(&mut project, Some(&status.bid))?;
        Ok(())
    }
}
