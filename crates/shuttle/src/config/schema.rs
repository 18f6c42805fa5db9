use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// Defaults to `~/.shuttle/data/shuttle.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub rebase: RebaseConfig,
    #[serde(default)]
    pub locales: LocalesConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            worker_count: default_worker_count(),
            jobs: JobsConfig::default(),
            import: ImportConfig::default(),
            rebase: RebaseConfig::default(),
            locales: LocalesConfig::default(),
            notifications: NotificationsConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// How long an enqueue-once lock survives if its job never starts.
    #[serde(default = "default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_backoff_secs * 2^n`.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_materialize_chunk_size")]
    pub materialize_chunk_size: usize,
}

fn default_lock_ttl_secs() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_backoff_secs() -> u64 {
    15
}

fn default_materialize_chunk_size() -> usize {
    100
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: default_lock_ttl_secs(),
            max_retries: default_max_retries(),
            retry_backoff_secs: default_retry_backoff_secs(),
            materialize_chunk_size: default_materialize_chunk_size(),
        }
    }
}

impl JobsConfig {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.retry_backoff_secs.saturating_mul(1u64 << attempt.min(16)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Root of the on-disk content tree read by the directory source.
    #[serde(default)]
    pub source_root: Option<PathBuf>,
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            source_root: None,
        }
    }
}

impl ImportConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebaseConfig {
    /// Unchanged paragraphs within this distance of an edit lose approval.
    #[serde(default = "default_neighbor_radius")]
    pub neighbor_radius: usize,
}

fn default_neighbor_radius() -> usize {
    1
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            neighbor_radius: default_neighbor_radius(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalesConfig {
    /// Entries added to (or replacing) the built-in fallback table.
    #[serde(default)]
    pub fallbacks: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_fuzzy_limit")]
    pub fuzzy_limit: usize,
}

fn default_fuzzy_threshold() -> f64 {
    0.7
}

fn default_fuzzy_limit() -> usize {
    5
}

impl Default for LocalesConfig {
    fn default() -> Self {
        Self {
            fallbacks: BTreeMap::new(),
            fuzzy_threshold: default_fuzzy_threshold(),
            fuzzy_limit: default_fuzzy_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_webhook_timeout_secs")]
    pub webhook_timeout_secs: u64,
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_broadcast_capacity() -> usize {
    256
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            webhook_timeout_secs: default_webhook_timeout_secs(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_max_entries() -> u64 {
    1000
}

fn default_ttl_secs() -> u64 {
    3600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: Config = serde_json::from_str(r#"{ "version": "1.0" }"#).unwrap();
        assert!(config.worker_count > 0);
        assert_eq!(config.jobs.max_retries, 5);
        assert_eq!(config.rebase.neighbor_radius, 1);
        assert_eq!(config.locales.fuzzy_limit, 5);
        assert!((config.locales.fuzzy_threshold - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.logging.filter, "info");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_backoff_doubles() {
        let jobs = JobsConfig {
            retry_backoff_secs: 2,
            ..Default::default()
        };
        assert_eq!(jobs.backoff_for(0), Duration::from_secs(2));
        assert_eq!(jobs.backoff_for(3), Duration::from_secs(16));
    }
}
