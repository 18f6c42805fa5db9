//! Builders for test configs and projects.

#![allow(dead_code)]

use std::collections::BTreeMap;

use shuttle::config::Config;
use shuttle::{LocaleTarget, NewProject, PathRule};

/// Builder for `Config` instances tuned for fast tests: no retry backoff,
/// few retries, two workers.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = Config::default();
        config.worker_count = 2;
        config.jobs.max_retries = 1;
        config.jobs.retry_backoff_secs = 0;
        config.notifications.webhook_timeout_secs = 2;
        Self { config }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.jobs.max_retries = retries;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.import.fetch_timeout_secs = secs;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.jobs.materialize_chunk_size = size;
        self
    }

    pub fn neighbor_radius(mut self, radius: usize) -> Self {
        self.config.rebase.neighbor_radius = radius;
        self
    }

    pub fn fallback(mut self, locale: &str, fallbacks: &[&str]) -> Self {
        self.config.locales.fallbacks.insert(
            locale.to_string(),
            fallbacks.iter().map(|f| f.to_string()).collect(),
        );
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NewProject` with English as the base locale.
pub struct ProjectBuilder {
    project: NewProject,
}

impl ProjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            project: NewProject {
                name: name.to_string(),
                base_locale: "en".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn base(mut self, locale: &str) -> Self {
        self.project.base_locale = locale.to_string();
        self
    }

    pub fn required(mut self, locale: &str) -> Self {
        self.project.targeted_locales.push(LocaleTarget::required(locale));
        self
    }

    pub fn optional(mut self, locale: &str) -> Self {
        self.project.targeted_locales.push(LocaleTarget::optional(locale));
        self
    }

    pub fn include_keys(mut self, pattern: &str) -> Self {
        self.project.key_inclusions.push(pattern.to_string());
        self
    }

    pub fn exclude_keys(mut self, pattern: &str) -> Self {
        self.project.key_exclusions.push(pattern.to_string());
        self
    }

    pub fn exclude_keys_for(mut self, locale: &str, pattern: &str) -> Self {
        self.project
            .key_locale_exclusions
            .entry(locale.to_string())
            .or_default()
            .push(pattern.to_string());
        self
    }

    pub fn skip_paths(mut self, importer: &str, pattern: &str) -> Self {
        self.project
            .importer_rules
            .entry(importer.to_string())
            .or_insert_with(PathRule::default)
            .skip_paths
            .push(pattern.to_string());
        self
    }

    pub fn webhook(mut self, url: &str) -> Self {
        self.project.webhook_url = Some(url.to_string());
        self
    }

    pub fn build(self) -> NewProject {
        self.project
    }
}

/// A flat JSON string map, in the given order.
pub fn json_strings(pairs: &[(&str, &str)]) -> String {
    let map: BTreeMap<&str, &str> = pairs.iter().copied().collect();
    serde_json::to_string(&map).expect("serialize strings")
}
