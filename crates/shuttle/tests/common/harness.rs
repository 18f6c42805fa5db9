//! Test harness wiring a `Shuttle` to an in-memory database and recording
//! collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use shuttle::config::Config;
use shuttle::{
    ContainerKind, ContainerRow, ContainerSummary, ContentSource, Database, ImportError, KeyRow,
    NewProject, NotifyError, Notifier, ProjectRow, SearchIndex, Shuttle, SourceBlob,
    TranslationRow,
};
use shuttle::worker::{Job, JobOutcome};

use super::builders::ConfigBuilder;

/// Content keyed by container name. Can be told to fail or stall.
#[derive(Default)]
pub struct MemorySource {
    blobs: Mutex<HashMap<String, Vec<SourceBlob>>>,
    failures: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn put(&self, container: &str, blobs: Vec<SourceBlob>) {
        self.blobs
            .lock()
            .unwrap()
            .insert(container.to_string(), blobs);
    }

    /// The next `n` fetches fail with a transient error.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn stall(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ContentSource for MemorySource {
    fn fetch(
        &self,
        _project: &ProjectRow,
        container: &ContainerRow,
    ) -> Result<Vec<SourceBlob>, ImportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ImportError::Fetch {
                what: container.name.clone(),
                reason: "connection reset".to_string(),
            });
        }
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(&container.name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Records every summary it is told about.
#[derive(Default)]
pub struct CollectingNotifier {
    seen: Mutex<Vec<ContainerSummary>>,
    failing: AtomicBool,
}

impl CollectingNotifier {
    pub fn seen(&self) -> Vec<ContainerSummary> {
        self.seen.lock().unwrap().clone()
    }

    pub fn for_container(&self, container_id: i64) -> Vec<bool> {
        self.seen()
            .into_iter()
            .filter(|s| s.container_id == container_id)
            .map(|s| s.ready)
            .collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, summary: &ContainerSummary) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(summary.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Request {
                url: "collector".to_string(),
                reason: "refused".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSearch {
    reindexed: Mutex<Vec<i64>>,
}

impl RecordingSearch {
    pub fn reindexed(&self) -> Vec<i64> {
        self.reindexed.lock().unwrap().clone()
    }
}

impl SearchIndex for RecordingSearch {
    fn reindex(&self, key_ids: &[i64]) {
        self.reindexed.lock().unwrap().extend_from_slice(key_ids);
    }
}

pub struct TestHarness {
    pub shuttle: Shuttle,
    pub source: Arc<MemorySource>,
    pub notifier: Arc<CollectingNotifier>,
    pub search: Arc<RecordingSearch>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(ConfigBuilder::new().build())
    }

    pub fn with_config(config: Config) -> Self {
        let source = Arc::new(MemorySource::default());
        let notifier = Arc::new(CollectingNotifier::default());
        let search = Arc::new(RecordingSearch::default());
        let shuttle = Shuttle::builder(config)
            .database(Database::open_in_memory().expect("in-memory database"))
            .source(source.clone())
            .notifier(notifier.clone())
            .search(search.clone())
            .build()
            .expect("build shuttle");
        Self {
            shuttle,
            source,
            notifier,
            search,
        }
    }

    pub fn project(&self, project: NewProject) -> ProjectRow {
        self.shuttle.create_project(&project).expect("create project")
    }

    /// Drains the job queue.
    pub fn run(&self) -> usize {
        self.shuttle.run_until_idle()
    }

    /// Runs queued jobs until one of `class` is next, then hands it back
    /// unrun, as if a busy worker had picked it up.
    pub fn take_job(&self, class: &str) -> Job {
        let queue = self.shuttle.services().client.queue();
        loop {
            let job = queue
                .try_pop()
                .unwrap_or_else(|| panic!("queue drained without a {} job", class));
            if job.class == class {
                return job;
            }
            self.shuttle.runner().run_job(job);
        }
    }

    pub fn run_job(&self, job: Job) -> JobOutcome {
        self.shuttle.runner().run_job(job)
    }

    /// Creates a commit whose content is one JSON blob and imports it.
    pub fn import_commit(&self, project: &ProjectRow, revision: &str, json: &str) -> ContainerRow {
        self.source.put(
            revision,
            vec![SourceBlob::new("config/locales/en.json", json.as_bytes())],
        );
        let commit = self
            .shuttle
            .create_container(project.id, ContainerKind::Commit, revision, None, None)
            .expect("create commit");
        self.shuttle.submit_import(commit.id).expect("submit import");
        self.run();
        self.container(commit.id)
    }

    /// Creates an article with `text` and imports it.
    pub fn import_article(&self, project: &ProjectRow, name: &str, text: &str) -> ContainerRow {
        let article = self
            .shuttle
            .create_container(project.id, ContainerKind::Article, name, Some(text), None)
            .expect("create article");
        self.shuttle.submit_import(article.id).expect("submit import");
        self.run();
        self.container(article.id)
    }

    pub fn container(&self, id: i64) -> ContainerRow {
        self.shuttle.container(id).expect("container exists")
    }

    pub fn keys(&self, container_id: i64) -> Vec<KeyRow> {
        self.shuttle.keys(container_id).expect("keys")
    }

    pub fn key_named(&self, container_id: i64, name: &str) -> KeyRow {
        self.keys(container_id)
            .into_iter()
            .find(|k| k.key == name)
            .unwrap_or_else(|| panic!("no key '{}' in container {}", name, container_id))
    }

    pub fn translation(&self, key_id: i64, locale: &str) -> TranslationRow {
        self.shuttle
            .translations(key_id)
            .expect("translations")
            .into_iter()
            .find(|t| t.locale == locale)
            .unwrap_or_else(|| panic!("key {} has no {} translation", key_id, locale))
    }

    /// Translates and approves `locale` for every active key of a container.
    pub fn approve_all(&self, container_id: i64, locale: &str) {
        for key in self.keys(container_id) {
            let t = self.translation(key.id, locale);
            if !t.translated {
                self.shuttle
                    .translate(t.id, Some(&format!("[{}] {}", locale, key.source_copy)), Some("tr"))
                    .expect("translate");
            }
            self.shuttle.review(t.id, true, Some("rev")).expect("review");
        }
        self.run();
    }

    /// Polls until `condition` holds or `timeout` passes.
    pub fn wait_for<F: Fn() -> bool>(&self, timeout: Duration, condition: F) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        condition()
    }
}
