//! Importing a container: fetch, parse, rebase, then materialize in a batch.

use serde::{Deserialize, Serialize};

use super::prefill::{TranslationPrefill, TranslationPrefillArgs};
use super::readiness::{publish_transition, ContainerReadinessArgs, ContainerReadinessJob};
use crate::coordination::BatchStatus;
use crate::db::container_repo::{self, ContainerRow};
use crate::db::key_repo;
use crate::error::{ImportError, JobError};
use crate::import::{
    fetch_with_timeout, fencing, load_container, Container, ImportEntry, MaterializeOptions,
    Materialized, Materializer, Membership,
};
use crate::readiness;
use crate::worker::{BatchHandler, JobContext, Worker};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportContainerArgs {
    pub container_id: i64,
}

/// Entry point of an import. Enqueue with `perform_once`.
pub struct ImportContainer;

/// One imported string and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkEntry {
    pub identifier: String,
    pub source_copy: String,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub fencers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeChunkArgs {
    pub container_id: i64,
    pub entries: Vec<ChunkEntry>,
}

pub struct MaterializeChunk;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFinisherContext {
    pub container_id: i64,
    /// Source copy the import split. Already stored as the baseline when
    /// the batch opened; written again on finish.
    #[serde(default)]
    pub imported_text: Option<String>,
}

/// Runs once every chunk of an import batch has succeeded.
pub struct ImportFinisher;

fn container_gone(id: i64) -> JobError {
    JobError::NotFound(format!("container {}", id))
}

fn load(ctx: &JobContext<'_>, id: i64) -> Result<Box<dyn Container>, JobError> {
    ctx.db()
        .with_conn(|conn| load_container(conn, id))?
        .ok_or_else(|| container_gone(id))
}

/// Records a failed import on the container and releases `jid`, leaving the
/// container not ready.
fn abandon_import(
    ctx: &JobContext<'_>,
    row: &mut ContainerRow,
    jid: &str,
    error: &str,
) -> Result<(), JobError> {
    ctx.db().with_conn(|conn| {
        container_repo::append_error(conn, row.id, error)?;
        container_repo::update_ready(conn, row.id, false)
    })?;
    ctx.services().tracker.remove_worker(row, Some(jid))?;
    Ok(())
}

impl ImportContainer {
    /// Entries to materialize plus per-blob errors, and the text that was split.
    fn collect_entries(
        &self,
        ctx: &JobContext<'_>,
        container: &dyn Container,
    ) -> Result<(Vec<ChunkEntry>, Vec<String>, Option<String>), ImportError> {
        let row = container.row();

        if container.is_paragraph_organized() {
            let entries = container
                .paragraphs()?
                .into_iter()
                .enumerate()
                .map(|(index, paragraph)| ChunkEntry {
                    identifier: index.to_string(),
                    fencers: fencing::detect(&paragraph),
                    source_copy: paragraph,
                    position: Some(index as i64),
                })
                .collect();
            let text = row.source_copy.clone().unwrap_or_default();
            return Ok((entries, Vec::new(), Some(text)));
        }

        let services = ctx.services();
        let blobs = fetch_with_timeout(
            services.source.clone(),
            container.project(),
            row,
            services.config.import.fetch_timeout(),
        )?;
        let content = services
            .importers
            .import_blobs(&blobs, &container.project().importer_rules);

        let positional = container.membership() == Membership::Exclusive;
        let entries = content
            .entries
            .into_iter()
            .enumerate()
            .map(|(index, ImportEntry { identifier, source_copy, fencers })| ChunkEntry {
                identifier,
                source_copy,
                position: positional.then_some(index as i64),
                fencers,
            })
            .collect();
        Ok((entries, content.errors, None))
    }
}

/// Recalculates a container that is no longer loading and publishes the result.
fn settle_readiness(
    ctx: &JobContext<'_>,
    row: &ContainerRow,
) -> Result<readiness::ContainerTransition, JobError> {
    let transition = ctx
        .db()
        .with_conn(|conn| readiness::recalculate_container(conn, row.id))?;
    publish_transition(ctx.services(), &transition)?;
    Ok(transition)
}

impl Worker for ImportContainer {
    type Args = ImportContainerArgs;
    const CLASS: &'static str = "ImportContainer";

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        let services = ctx.services();
        let container = load(ctx, args.container_id)?;
        let mut row = container.row().clone();
        services.tracker.add_worker(&mut row, ctx.jid())?;

        let (entries, blob_errors, imported_text) = match self.collect_entries(ctx, container.as_ref()) {
            Ok(collected) => collected,
            Err(e) => {
                let message = e.to_string();
                let err = JobError::from(e);
                if !err.is_transient() || ctx.is_final_attempt() {
                    abandon_import(ctx, &mut row, ctx.jid(), &message)?;
                }
                return Err(err);
            }
        };

        let description = format!("Import {} {}", row.kind.entity_type(), row.id);
        let batch = ctx.new_batch::<ImportFinisher>(
            &description,
            &ImportFinisherContext {
                container_id: row.id,
                imported_text: imported_text.clone(),
            },
        )?;
        let bid = batch.bid().to_string();

        // Slots, baseline and the owning batch commit together, so chunks of
        // an older batch and the next diff both see a consistent state.
        ctx.db().transaction(|tx| {
            match container.membership() {
                Membership::Shared => {
                    container_repo::clear_commit_keys(tx, row.id)?;
                }
                Membership::Exclusive => {
                    if let Some(text) = imported_text.as_deref() {
                        let baseline = container_repo::find_by_id(tx, row.id)?
                            .and_then(|current| current.imported_source_copy);
                        services.rebaser.rebase(tx, container.as_ref(), baseline.as_deref(), text)?;
                        container_repo::update_imported_source_copy(tx, row.id, text)?;
                    } else {
                        key_repo::deactivate_container(tx, row.id)?;
                    }
                }
            }
            container_repo::begin_import(tx, row.id, &bid)?;
            for error in &blob_errors {
                container_repo::append_error(tx, row.id, error)?;
            }
            Ok::<_, JobError>(())
        })?;
        services.tracker.add_worker(&mut row, &bid)?;

        let chunk_size = services.config.jobs.materialize_chunk_size;
        log::info!(
            "Importing {} entries into {} {} (batch {})",
            entries.len(),
            row.kind.entity_type(),
            row.id,
            bid
        );
        batch.jobs(|b| {
            for chunk in entries.chunks(chunk_size) {
                b.enqueue::<MaterializeChunk>(&MaterializeChunkArgs {
                    container_id: row.id,
                    entries: chunk.to_vec(),
                })?;
            }
            Ok::<_, JobError>(())
        })?;

        services.tracker.remove_worker(&mut row, Some(ctx.jid()))?;
        Ok(())
    }
}

impl Worker for MaterializeChunk {
    type Args = MaterializeChunkArgs;
    const CLASS: &'static str = "MaterializeChunk";

    fn perform(&self, ctx: &JobContext<'_>, args: Self::Args) -> Result<(), JobError> {
        let container = load(ctx, args.container_id)?;
        let materializer = Materializer::for_container(container.as_ref());

        let result = ctx.db().transaction(|tx| {
            let current = container_repo::find_by_id(tx, args.container_id)?
                .ok_or_else(|| container_gone(args.container_id))?;
            if current.import_batch_id.as_deref() != ctx.batch_id() {
                return Err(JobError::NotFound(format!(
                    "import batch {} of container {} was replaced",
                    ctx.batch_id().unwrap_or("(none)"),
                    args.container_id
                )));
            }
            let mut created = Vec::new();
            let mut touched = Vec::new();
            for entry in &args.entries {
                let opts = MaterializeOptions {
                    position: entry.position,
                    fencers: entry.fencers.clone(),
                    skip_readiness_hooks: true,
                };
                if let Materialized::Key(key) =
                    materializer.materialize(tx, &entry.identifier, &entry.source_copy, &opts)?
                {
                    if key.created {
                        created.push(key.key.id);
                    }
                    if !key.is_noop() {
                        touched.push(key.key.id);
                    }
                }
            }
            Ok::<_, JobError>((created, touched))
        });

        let (created, touched) = match result {
            Ok(ids) => ids,
            Err(e @ JobError::NotFound(_)) => return Err(e),
            Err(e) => {
                if !e.is_transient() || ctx.is_final_attempt() {
                    let message = format!("Materializing {} entries failed: {}", args.entries.len(), e);
                    ctx.db()
                        .with_conn(|conn| container_repo::append_error(conn, args.container_id, &message))?;
                }
                return Err(e);
            }
        };

        if !created.is_empty() {
            ctx.enqueue::<TranslationPrefill>(&TranslationPrefillArgs { key_ids: created })?;
        }
        if !touched.is_empty() {
            ctx.services().search.reindex(&touched);
        }
        Ok(())
    }
}

impl BatchHandler for ImportFinisher {
    type Context = ImportFinisherContext;
    const CLASS: &'static str = "ImportFinisher";

    fn on_success(
        &self,
        ctx: &JobContext<'_>,
        status: &BatchStatus,
        context: Self::Context,
    ) -> Result<(), JobError> {
        let services = ctx.services();
        let container = load(ctx, context.container_id)?;
        let mut row = container.row().clone();

        if row.import_batch_id.as_deref() != Some(status.bid.as_str()) {
            log::info!(
                "Import batch {} of {} {} was superseded",
                status.bid,
                row.kind.entity_type(),
                row.id
            );
            services.tracker.remove_worker(&mut row, Some(&status.bid))?;
            // The newer import may have finished while this batch held the
            // container loading; its readiness was deferred to here.
            if !row.loading && row.import_batch_id.is_none() {
                settle_readiness(ctx, &row)?;
            }
            return Ok(());
        }

        let cascade = ctx.db().transaction(|tx| {
            container.on_all_keys_imported(tx, context.imported_text.as_deref())?;
            let mut cascade = Vec::new();
            for key in key_repo::active_for_container(tx, &row)? {
                let transition = readiness::recalculate_key(tx, key.id)?;
                if transition.changed() && key.is_shared() {
                    cascade.extend(
                        container_repo::ids_for_key(tx, key.id)?
                            .into_iter()
                            .filter(|id| *id != row.id),
                    );
                }
            }
            Ok::<_, JobError>(cascade)
        })?;

        let mut others = cascade;
        others.sort_unstable();
        others.dedup();
        for container_id in others {
            ctx.perform_once::<ContainerReadinessJob>(&ContainerReadinessArgs { container_id })?;
        }

        services.tracker.remove_worker(&mut row, Some(&status.bid))?;
        services.compiler.invalidate_container(row.id);
        if row.loading {
            log::debug!("{} {} still has workers; readiness deferred", row.kind.entity_type(), row.id);
            return Ok(());
        }

        let transition = settle_readiness(ctx, &row)?;
        log::info!(
            "Import of {} {} finished ({} jobs), {}",
            row.kind.entity_type(),
            row.id,
            status.total,
            if transition.ready { "ready" } else { "not ready" }
        );
        Ok(())
    }
}
