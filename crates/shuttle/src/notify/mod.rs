//! Readiness notifications: in-process events, the injected notifier,
//! webhook delivery and the search index seam.

mod events;
mod notifier;
mod search;
mod webhook;

pub use events::{ContainerSummary, ReadinessBroadcaster, ReadinessEvent};
pub use notifier::{LogNotifier, Notifier};
pub use search::{NoopSearchIndex, SearchIndex};
pub use webhook::WebhookClient;
