//! Format importers: turn fetched blobs into key entries.

use std::collections::BTreeMap;

use serde_json::Value;

use super::fencing;
use super::source::SourceBlob;
use crate::db::project_repo::PathRule;
use crate::error::ImportError;
use crate::rules::PathFilter;

/// One translatable string found in a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub identifier: String,
    pub source_copy: String,
    pub fencers: Vec<String>,
}

impl ImportEntry {
    /// Entry with fencers detected from the source copy.
    pub fn detect(identifier: &str, source_copy: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            source_copy: source_copy.to_string(),
            fencers: fencing::detect(source_copy),
        }
    }
}

pub trait FormatImporter: Send + Sync {
    /// Name used to look up per-project path rules.
    fn name(&self) -> &'static str;

    fn accepts(&self, path: &str) -> bool;

    /// Must return the same entries, in the same order, for the same bytes.
    fn import(&self, blob: &SourceBlob) -> Result<Vec<ImportEntry>, ImportError>;
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

fn parse_error(blob: &SourceBlob, reason: impl ToString) -> ImportError {
    ImportError::Parse {
        path: blob.path.clone(),
        reason: reason.to_string(),
    }
}

/// Flattens nested objects into dotted keys. Non-string leaves are skipped.
fn flatten(prefix: &str, value: &Value, out: &mut Vec<ImportEntry>) {
    match value {
        Value::String(s) => out.push(ImportEntry::detect(prefix, s)),
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&path, child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(&format!("{}.{}", prefix, index), child, out);
            }
        }
        _ => {}
    }
}

fn entries_from_root(blob: &SourceBlob, root: Value) -> Result<Vec<ImportEntry>, ImportError> {
    if !root.is_object() {
        return Err(parse_error(blob, "top level must be a mapping of keys to strings"));
    }
    let mut entries = Vec::new();
    flatten("", &root, &mut entries);
    Ok(entries)
}

/// Flat or nested JSON string maps.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonImporter;

impl FormatImporter for JsonImporter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accepts(&self, path: &str) -> bool {
        has_extension(path, &["json"])
    }

    fn import(&self, blob: &SourceBlob) -> Result<Vec<ImportEntry>, ImportError> {
        let root: Value = serde_json::from_slice(&blob.bytes).map_err(|e| parse_error(blob, e))?;
        entries_from_root(blob, root)
    }
}

/// Flat or nested YAML string maps.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlImporter;

impl FormatImporter for YamlImporter {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn accepts(&self, path: &str) -> bool {
        has_extension(path, &["yml", "yaml"])
    }

    fn import(&self, blob: &SourceBlob) -> Result<Vec<ImportEntry>, ImportError> {
        let yaml: serde_yaml::Value =
            serde_yaml::from_slice(&blob.bytes).map_err(|e| parse_error(blob, e))?;
        let root = serde_json::to_value(yaml).map_err(|e| parse_error(blob, e))?;
        entries_from_root(blob, root)
    }
}

/// Entries and per-blob errors from one import pass.
#[derive(Debug, Default)]
pub struct ImportedContent {
    pub entries: Vec<ImportEntry>,
    pub errors: Vec<String>,
}

pub struct ImporterRegistry {
    importers: Vec<Box<dyn FormatImporter>>,
}

impl Default for ImporterRegistry {
    fn default() -> Self {
        Self {
            importers: vec![Box::new(JsonImporter), Box::new(YamlImporter)],
        }
    }
}

impl ImporterRegistry {
    pub fn empty() -> Self {
        Self {
            importers: Vec::new(),
        }
    }

    pub fn register(&mut self, importer: Box<dyn FormatImporter>) {
        self.importers.push(importer);
    }

    /// First importer that accepts `path` and whose project rule allows it.
    pub fn importer_for(
        &self,
        path: &str,
        rules: &BTreeMap<String, PathRule>,
    ) -> Option<&dyn FormatImporter> {
        self.importers
            .iter()
            .find(|importer| {
                importer.accepts(path)
                    && rules
                        .get(importer.name())
                        .map(|rule| PathFilter::from_rule(rule).allows(path))
                        .unwrap_or(true)
            })
            .map(|importer| importer.as_ref())
    }

    /// Imports every blob some importer claims. A blob that fails to parse
    /// is reported and skipped; the others still import.
    pub fn import_blobs(
        &self,
        blobs: &[SourceBlob],
        rules: &BTreeMap<String, PathRule>,
    ) -> ImportedContent {
        let mut content = ImportedContent::default();
        for blob in blobs {
            let Some(importer) = self.importer_for(&blob.path, rules) else {
                log::debug!("No importer for {}", blob.path);
                continue;
            };
            match importer.import(blob) {
                Ok(entries) => {
                    log::debug!("{} imported {} entries from {}", importer.name(), entries.len(), blob.path);
                    content.entries.extend(entries);
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", blob.path, e);
                    content.errors.push(e.to_string());
                }
            }
        }
        content
    }
}
