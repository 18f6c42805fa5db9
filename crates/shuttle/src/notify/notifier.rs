use super::ContainerSummary;
use crate::error::NotifyError;

/// Told about every container readiness transition. Failures are logged by
/// the caller and never undo the transition.
pub trait Notifier: Send + Sync {
    fn notify(&self, summary: &ContainerSummary) -> Result<(), NotifyError>;
}

/// Writes transitions to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, summary: &ContainerSummary) -> Result<(), NotifyError> {
        log::info!(
            "{} '{}' in project '{}' is {}",
            summary.kind.entity_type(),
            summary.name,
            summary.project_name,
            if summary.ready { "ready" } else { "no longer ready" }
        );
        Ok(())
    }
}
