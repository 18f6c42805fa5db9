//! Background jobs of the import and readiness pipeline.

pub mod import;
pub mod locale_sync;
pub mod prefill;
pub mod readiness;
pub mod webhook;

pub use import::{
    ChunkEntry, ImportContainer, ImportContainerArgs, ImportFinisher, ImportFinisherContext,
    MaterializeChunk, MaterializeChunkArgs,
};
pub use locale_sync::{
    KeyTranslationSync, KeyTranslationSyncArgs, LocaleSyncContext, ProjectLocaleSync,
    ProjectLocaleSyncArgs, ProjectLocaleSyncFinisher,
};
pub use prefill::{TranslationPrefill, TranslationPrefillArgs};
pub use readiness::{
    ContainerReadinessArgs, ContainerReadinessJob, KeyReadinessArgs, KeyReadinessJob,
};
pub use webhook::{DeliverWebhook, DeliverWebhookArgs};

use crate::worker::JobRegistry;

/// Registers every job class and batch callback the pipeline enqueues.
pub fn register_all(registry: &mut JobRegistry) {
    registry
        .register(ImportContainer)
        .register(MaterializeChunk)
        .register(TranslationPrefill)
        .register(KeyReadinessJob)
        .register(ContainerReadinessJob)
        .register(ProjectLocaleSync)
        .register(KeyTranslationSync)
        .register(DeliverWebhook)
        .register_handler(ImportFinisher)
        .register_handler(ProjectLocaleSyncFinisher);
}
