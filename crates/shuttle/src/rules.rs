//! Glob rules over key identifiers and blob paths.

use glob::Pattern;

use crate::db::project_repo::{PathRule, ProjectRow};
use crate::error::ValidationError;

/// A compiled list of glob patterns.
#[derive(Debug, Clone, Default)]
pub struct GlobList {
    patterns: Vec<Pattern>,
}

impl GlobList {
    /// Compiles every pattern, failing on the first invalid one.
    pub fn compile(patterns: &[String]) -> Result<Self, ValidationError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| ValidationError::InvalidPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Compiles the valid patterns and logs the rest. Used on read paths,
    /// where the patterns were already validated when stored.
    pub fn lenient(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    log::warn!("Ignoring invalid glob '{}': {}", p, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(candidate))
    }
}

/// Project-level key inclusion/exclusion.
#[derive(Debug, Clone, Default)]
pub struct KeyRules {
    inclusions: GlobList,
    exclusions: GlobList,
}

impl KeyRules {
    pub fn for_project(project: &ProjectRow) -> Self {
        Self {
            inclusions: GlobList::lenient(&project.key_inclusions),
            exclusions: GlobList::lenient(&project.key_exclusions),
        }
    }

    /// A key is admitted when it matches an inclusion (or there are none)
    /// and matches no exclusion.
    pub fn admits(&self, key: &str) -> bool {
        (self.inclusions.is_empty() || self.inclusions.matches(key))
            && !self.exclusions.matches(key)
    }
}

/// Per-importer path filter.
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    only: GlobList,
    skip: GlobList,
}

impl PathFilter {
    pub fn from_rule(rule: &PathRule) -> Self {
        Self {
            only: GlobList::lenient(&rule.only_paths),
            skip: GlobList::lenient(&rule.skip_paths),
        }
    }

    pub fn allows(&self, path: &str) -> bool {
        (self.only.is_empty() || self.only.matches(path)) && !self.skip.matches(path)
    }
}
