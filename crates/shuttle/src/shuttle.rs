//! The `Shuttle` facade: wires the services together and exposes the
//! synchronous write paths that validate, persist and enqueue.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::compile::CompileService;
use crate::config::Config;
use crate::coordination::{MemoryCoordinator, WorkCoordinator, WorkerTracker};
use crate::db::container_repo::{self, ContainerKind, ContainerRow, NewContainer};
use crate::db::key_repo::{self, KeyRow};
use crate::db::project_repo::{self, LocaleTarget, NewProject, ProjectRow};
use crate::db::translation_repo::{self, TranslationRow};
use crate::db::{default_database_path, Database};
use crate::error::{ConfigError, Result, ShuttleError, ValidationError};
use crate::import::{ContentSource, DirectorySource, ImporterRegistry};
use crate::jobs::{self, ImportContainer, ImportContainerArgs, ProjectLocaleSync, ProjectLocaleSyncArgs};
use crate::locale::{validate_targets, FallbackTable, FuzzyMatch, Locale, TranslationMatcher};
use crate::notify::{
    LogNotifier, NoopSearchIndex, Notifier, ReadinessBroadcaster, ReadinessEvent, SearchIndex,
    WebhookClient,
};
use crate::readiness::{self, ProjectReadiness};
use crate::rebase::Rebaser;
use crate::review::{self, LocaleCopy};
use crate::rules::GlobList;
use crate::services::Services;
use crate::worker::{FailedJob, JobClient, JobQueue, JobRegistry, JobRunner, WorkerPool};

/// Builds a [`Shuttle`]. Every collaborator has a default; tests swap in
/// in-memory ones.
pub struct ShuttleBuilder {
    config: Config,
    database: Option<Database>,
    source: Option<Arc<dyn ContentSource>>,
    notifier: Option<Arc<dyn Notifier>>,
    search: Option<Arc<dyn SearchIndex>>,
    coordinator: Option<Arc<dyn WorkCoordinator>>,
    importers: Option<ImporterRegistry>,
}

impl ShuttleBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            database: None,
            source: None,
            notifier: None,
            search: None,
            coordinator: None,
            importers: None,
        }
    }

    pub fn database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn search(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn coordinator(mut self, coordinator: Arc<dyn WorkCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn importers(mut self, importers: ImporterRegistry) -> Self {
        self.importers = Some(importers);
        self
    }

    pub fn build(self) -> Result<Shuttle> {
        let config = self.config;
        let db = match self.database {
            Some(db) => db,
            None => {
                let path = config
                    .database_path
                    .clone()
                    .or_else(default_database_path)
                    .ok_or_else(|| ConfigError::Validation {
                        message: "database_path is not set and no home directory was found"
                            .to_string(),
                    })?;
                Database::open(&path)?
            }
        };
        let source = match self.source {
            Some(source) => source,
            None => {
                let root = config
                    .import
                    .source_root
                    .clone()
                    .or_else(DirectorySource::default_root)
                    .unwrap_or_else(|| PathBuf::from("content"));
                Arc::new(DirectorySource::new(root)) as Arc<dyn ContentSource>
            }
        };
        let coordinator = self
            .coordinator
            .unwrap_or_else(|| Arc::new(MemoryCoordinator::new()));

        let client = JobClient::new(
            Arc::new(JobQueue::new()),
            coordinator.clone(),
            config.jobs.lock_ttl(),
        );
        let matcher = TranslationMatcher::new(
            FallbackTable::with_overrides(&config.locales.fallbacks),
            config.locales.fuzzy_threshold,
            config.locales.fuzzy_limit,
        );
        let webhooks = WebhookClient::new(std::time::Duration::from_secs(
            config.notifications.webhook_timeout_secs,
        ))?;

        let services = Services {
            tracker: WorkerTracker::new(coordinator.clone(), db.clone()),
            compiler: CompileService::new(db.clone(), &config.cache),
            rebaser: Rebaser::new(config.rebase.neighbor_radius),
            events: ReadinessBroadcaster::new(config.notifications.broadcast_capacity),
            importers: self.importers.unwrap_or_default(),
            notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
            search: self.search.unwrap_or_else(|| Arc::new(NoopSearchIndex)),
            config: Arc::new(config),
            db,
            coordinator,
            client,
            matcher,
            source,
            webhooks,
        };

        let mut registry = JobRegistry::new();
        jobs::register_all(&mut registry);
        let runner = Arc::new(JobRunner::new(Arc::new(services), Arc::new(registry)));
        Ok(Shuttle { runner })
    }
}

/// Entry point for embedding the pipeline.
#[derive(Clone)]
pub struct Shuttle {
    runner: Arc<JobRunner>,
}

impl Shuttle {
    pub fn builder(config: Config) -> ShuttleBuilder {
        ShuttleBuilder::new(config)
    }

    pub fn services(&self) -> &Services {
        self.runner.services()
    }

    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    fn db(&self) -> &Database {
        &self.services().db
    }

    // Projects

    pub fn create_project(&self, project: &NewProject) -> Result<ProjectRow> {
        if project.name.trim().is_empty() {
            return Err(ValidationError::BlankName.into());
        }
        validate_targets(&project.base_locale, &project.targeted_locales)?;
        GlobList::compile(&project.key_inclusions)?;
        GlobList::compile(&project.key_exclusions)?;
        for (locale, patterns) in &project.key_locale_exclusions {
            Locale::parse(locale)?;
            GlobList::compile(patterns)?;
        }
        for rule in project.importer_rules.values() {
            GlobList::compile(&rule.only_paths)?;
            GlobList::compile(&rule.skip_paths)?;
        }

        let row = self.db().with_conn(|conn| project_repo::insert(conn, project))?;
        log::info!("Created project {} ({})", row.id, row.name);
        Ok(row)
    }

    pub fn project(&self, project_id: i64) -> Result<ProjectRow> {
        self.db()
            .with_conn(|conn| project_repo::find_by_id(conn, project_id))?
            .ok_or_else(|| ShuttleError::NotFound(format!("project {}", project_id)))
    }

    /// Replaces the targeted locales and schedules the project-wide re-sync.
    pub fn update_project_locales(&self, project_id: i64, targets: &[LocaleTarget]) -> Result<()> {
        let project = self.project(project_id)?;
        validate_targets(&project.base_locale, targets)?;
        self.db()
            .with_conn(|conn| project_repo::update_targeted_locales(conn, project.id, targets))?;
        self.services()
            .client
            .perform_once::<ProjectLocaleSync>(&ProjectLocaleSyncArgs {
                project_id: project.id,
            })?;
        Ok(())
    }

    pub fn project_readiness(&self, project_id: i64) -> Result<ProjectReadiness> {
        Ok(self
            .db()
            .with_conn(|conn| readiness::project_readiness(conn, project_id))?)
    }

    // Containers

    /// Creates a container, or returns the existing one with the same kind
    /// and name. Nothing is imported until [`Shuttle::submit_import`].
    pub fn create_container(
        &self,
        project_id: i64,
        kind: ContainerKind,
        name: &str,
        source_copy: Option<&str>,
        targeted_locales: Option<Vec<LocaleTarget>>,
    ) -> Result<ContainerRow> {
        if name.trim().is_empty() {
            return Err(ValidationError::BlankName.into());
        }
        let project = self.project(project_id)?;
        if let Some(targets) = &targeted_locales {
            validate_targets(&project.base_locale, targets)?;
        }
        let new = NewContainer {
            project_id,
            kind,
            name: name.to_string(),
            source_copy: source_copy.map(str::to_string),
            targeted_locales,
        };
        let row = self.db().with_conn(|conn| {
            match container_repo::insert(conn, &new) {
                Ok(row) => Ok(row),
                Err(e) if e.is_constraint_violation() => {
                    container_repo::find_by_name(conn, project_id, kind, name)?.ok_or(e)
                }
                Err(e) => Err(e),
            }
        })?;
        Ok(row)
    }

    pub fn container(&self, container_id: i64) -> Result<ContainerRow> {
        self.db()
            .with_conn(|conn| container_repo::find_by_id(conn, container_id))?
            .ok_or_else(|| ShuttleError::NotFound(format!("container {}", container_id)))
    }

    /// Schedules an import. Repeated calls before the job starts collapse
    /// into one; returns whether a job was enqueued.
    pub fn submit_import(&self, container_id: i64) -> Result<bool> {
        let container = self.container(container_id)?;
        let jid = self
            .services()
            .client
            .perform_once::<ImportContainer>(&ImportContainerArgs {
                container_id: container.id,
            })?;
        Ok(jid.is_some())
    }

    /// Replaces the text of an article or key group and re-imports it.
    pub fn update_source_copy(&self, container_id: i64, source_copy: &str) -> Result<bool> {
        let container = self.container(container_id)?;
        if !matches!(container.kind, ContainerKind::Article | ContainerKind::KeyGroup) {
            return Err(ValidationError::NoSourceCopy {
                kind: container.kind.entity_type().to_string(),
            }
            .into());
        }
        self.db()
            .with_conn(|conn| container_repo::update_source_copy(conn, container.id, source_copy))?;
        self.submit_import(container.id)
    }

    /// Active keys of a container, in position order for positioned kinds.
    pub fn keys(&self, container_id: i64) -> Result<Vec<KeyRow>> {
        let container = self.container(container_id)?;
        Ok(self
            .db()
            .with_conn(|conn| key_repo::active_for_container(conn, &container))?)
    }

    pub fn translations(&self, key_id: i64) -> Result<Vec<TranslationRow>> {
        Ok(self
            .db()
            .with_conn(|conn| translation_repo::for_key(conn, key_id))?)
    }

    /// Operator recovery for a container stuck loading. Returns how many
    /// worker ids were dropped.
    pub fn clear_workers(&self, container_id: i64) -> Result<usize> {
        let mut container = self.container(container_id)?;
        self.services().tracker.clear_workers(&mut container)
    }

    pub fn clear_project_workers(&self, project_id: i64) -> Result<usize> {
        let mut project = self.project(project_id)?;
        self.services().tracker.clear_workers(&mut project)
    }

    // Translation

    pub fn translate(
        &self,
        translation_id: i64,
        copy: Option<&str>,
        translator: Option<&str>,
    ) -> Result<TranslationRow> {
        review::translate(self.services(), translation_id, copy, translator)
    }

    pub fn review(
        &self,
        translation_id: i64,
        approved: bool,
        reviewer: Option<&str>,
    ) -> Result<TranslationRow> {
        review::review(self.services(), translation_id, approved, reviewer)
    }

    pub fn copy_locale(
        &self,
        project_id: i64,
        from: &str,
        to: &str,
        overwrite: bool,
    ) -> Result<LocaleCopy> {
        review::copy_locale(self.services(), project_id, from, to, overwrite)
    }

    pub fn find_reusable_translation(
        &self,
        locale: &str,
        source_copy: &str,
    ) -> Result<Option<TranslationRow>> {
        Locale::parse(locale)?;
        let matcher = &self.services().matcher;
        Ok(self
            .db()
            .with_conn(|conn| matcher.find_reusable_translation(conn, locale, source_copy))?)
    }

    pub fn fuzzy_matches(&self, locale: &str, source_copy: &str) -> Result<Vec<FuzzyMatch>> {
        Locale::parse(locale)?;
        let matcher = &self.services().matcher;
        Ok(self
            .db()
            .with_conn(|conn| matcher.fuzzy_matches(conn, locale, source_copy))?)
    }

    // Output

    pub fn compile(
        &self,
        container_id: i64,
        format: &str,
        locales: Option<&[String]>,
        partial: bool,
    ) -> Result<Arc<String>> {
        Ok(self
            .services()
            .compiler
            .compile(container_id, format, locales, partial)?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReadinessEvent> {
        self.services().events.subscribe()
    }

    // Jobs

    /// Drains the queue on the calling thread. Returns the number of job runs.
    pub fn run_until_idle(&self) -> usize {
        self.runner.run_until_idle()
    }

    pub fn start_pool(&self, worker_count: usize) -> Result<WorkerPool> {
        Ok(WorkerPool::new(Arc::clone(&self.runner), worker_count)?)
    }

    pub fn failed_jobs(&self) -> Vec<FailedJob> {
        self.runner.failed_jobs()
    }
}
