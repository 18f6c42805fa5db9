//! The shared services every job and facade call runs against.

use std::sync::Arc;

use crate::compile::CompileService;
use crate::config::Config;
use crate::coordination::{WorkCoordinator, WorkerTracker};
use crate::db::Database;
use crate::import::{ContentSource, ImporterRegistry};
use crate::locale::TranslationMatcher;
use crate::notify::{Notifier, ReadinessBroadcaster, SearchIndex, WebhookClient};
use crate::rebase::Rebaser;
use crate::worker::JobClient;

pub struct Services {
    pub config: Arc<Config>,
    pub db: Database,
    pub coordinator: Arc<dyn WorkCoordinator>,
    pub client: JobClient,
    pub tracker: WorkerTracker,
    pub matcher: TranslationMatcher,
    pub importers: ImporterRegistry,
    pub source: Arc<dyn ContentSource>,
    pub rebaser: Rebaser,
    pub compiler: CompileService,
    pub notifier: Arc<dyn Notifier>,
    pub events: ReadinessBroadcaster,
    pub search: Arc<dyn SearchIndex>,
    pub webhooks: WebhookClient,
}
