//! Readiness cascade jobs and transition publishing.

use serde::{Deserialize, Serialize};

use super::webhook::{DeliverWebhook, DeliverWebhookArgs};
use crate::db::{container_repo, project_repo};
use crate::error::JobError;
use crate::notify::{ContainerSummary, ReadinessEvent};
use crate::readiness::{self, ContainerTransition};
use crate::services::Services;
use crate::worker::{JobContext, Queue, Worker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReadinessArgs {
    pub key_id: i64,
}

/// Recalculates a key after an approval change and cascades to its containers.
pub struct KeyReadinessJob;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerReadinessArgs {
    pub container_id: i64,
}

pub struct ContainerReadinessJob;

impl Worker for KeyReadinessJob {
    type Args = KeyReadinessArgs;
    const CLASS: &'static str = "KeyReadinessJob";
    const QUEUE: Queue = Queue::High;

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        let (transition, containers) = ctx.db().with_conn(|conn| {
            let transition = readiness::recalculate_key(conn, args.key_id)?;
            ctx.services().compiler.invalidate_for_key(conn, args.key_id)?;
            let containers = if transition.changed() {
                container_repo::ids_for_key(conn, args.key_id)?
            } else {
                Vec::new()
            };
            Ok::<_, JobError>((transition, containers))
        })?;

        for container_id in containers {
            ctx.perform_once::<ContainerReadinessJob>(&ContainerReadinessArgs { container_id })?;
        }
        log::debug!(
            "Key {} readiness {} -> {}",
            transition.key_id,
            transition.was_ready,
            transition.ready
        );
        Ok(())
    }
}

impl Worker for ContainerReadinessJob {
    type Args = ContainerReadinessArgs;
    const CLASS: &'static str = "ContainerReadinessJob";
    const QUEUE: Queue = Queue::High;

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        let transition = ctx.db().with_conn(|conn| {
            let container = container_repo::find_by_id(conn, args.container_id)?
                .ok_or_else(|| JobError::NotFound(format!("container {}", args.container_id)))?;
            if container.loading {
                // The import finisher recalculates once loading flips off.
                log::debug!("Container {} is loading; skipping recalculation", container.id);
                return Ok(None);
            }
            Ok::<_, JobError>(Some(readiness::recalculate_container(conn, container.id)?))
        })?;

        if let Some(transition) = transition {
            publish_transition(ctx.services(), &transition)?;
        }
        Ok(())
    }
}

/// Purges compiled output and, when readiness changed, tells the broadcast
/// channel, the notifier and the project's webhook. Notification failures
/// are logged and never undo the transition.
pub(crate) fn publish_transition(
    services: &Services,
    transition: &ContainerTransition,
) -> Result<(), JobError> {
    services.compiler.invalidate_container(transition.container_id);
    if !transition.changed() {
        return Ok(());
    }

    let found = services.db.with_conn(|conn| {
        let project = project_repo::find_by_id(conn, transition.project_id)?;
        let container = container_repo::find_by_id(conn, transition.container_id)?;
        Ok::<_, JobError>(project.zip(container))
    })?;
    let Some((project, container)) = found else {
        return Ok(());
    };

    let summary = ContainerSummary::new(&project, &container);
    services.events.send(ReadinessEvent::new(summary.clone()));
    if let Err(e) = services.notifier.notify(&summary) {
        log::warn!("Notifier failed for container {}: {}", container.id, e);
    }

    if transition.became_ready() {
        if let Some(url) = &project.webhook_url {
            let payload = serde_json::to_value(&summary)?;
            if let Err(e) = services.client.perform_async::<DeliverWebhook>(&DeliverWebhookArgs {
                url: url.clone(),
                payload,
            }) {
                log::warn!("Could not enqueue webhook for container {}: {}", container.id, e);
            }
        }
    }
    Ok(())
}
