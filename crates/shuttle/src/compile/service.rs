use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use rusqlite::Connection;

use super::{build_manifest, Compiler, JsonManifestCompiler, YamlManifestCompiler};
use crate::config::CacheConfig;
use crate::db::{container_repo, Database, DatabaseError};
use crate::error::CompileError;

/// Compiles manifests and caches full compiles per `(container, format)`.
#[derive(Clone)]
pub struct CompileService {
    db: Database,
    compilers: Arc<Vec<Box<dyn Compiler>>>,
    cache: Cache<(i64, &'static str), Arc<String>>,
}

impl CompileService {
    pub fn new(db: Database, config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        let compilers: Vec<Box<dyn Compiler>> =
            vec![Box::new(JsonManifestCompiler), Box::new(YamlManifestCompiler)];
        Self {
            db,
            compilers: Arc::new(compilers),
            cache,
        }
    }

    fn compiler(&self, format: &str) -> Result<&dyn Compiler, CompileError> {
        self.compilers
            .iter()
            .find(|c| c.format() == format)
            .map(|c| c.as_ref())
            .ok_or_else(|| CompileError::UnknownFormat(format.to_string()))
    }

    /// Compiles a container. Only full, non-partial compiles are cached.
    pub fn compile(
        &self,
        container_id: i64,
        format: &str,
        selection: Option<&[String]>,
        partial: bool,
    ) -> Result<Arc<String>, CompileError> {
        let compiler = self.compiler(format)?;
        let cacheable = selection.is_none() && !partial;
        let cache_key = (container_id, compiler.format());

        if cacheable {
            if let Some(hit) = self.cache.get(&cache_key) {
                log::debug!("Compile cache hit for container {} ({})", container_id, format);
                return Ok(hit);
            }
        }

        let manifest = self
            .db
            .with_conn(|conn| build_manifest(conn, container_id, selection, partial))?;
        let output = Arc::new(compiler.compile(&manifest)?);
        if cacheable {
            self.cache.insert(cache_key, output.clone());
        }
        Ok(output)
    }

    pub fn invalidate_container(&self, container_id: i64) {
        for compiler in self.compilers.iter() {
            self.cache.invalidate(&(container_id, compiler.format()));
        }
    }

    /// Drops cached output of every container holding the key.
    pub fn invalidate_for_key(&self, conn: &Connection, key_id: i64) -> Result<(), DatabaseError> {
        for container_id in container_repo::ids_for_key(conn, key_id)? {
            self.invalidate_container(container_id);
        }
        Ok(())
    }

    /// Drops cached output of every container of a project.
    pub fn invalidate_project(&self, project_id: i64) -> Result<(), DatabaseError> {
        let containers = self
            .db
            .with_conn(|conn| container_repo::list_for_project(conn, project_id))?;
        for container in containers {
            self.invalidate_container(container.id);
        }
        Ok(())
    }

    pub fn is_cached(&self, container_id: i64, format: &str) -> bool {
        self.compiler(format)
            .map(|c| self.cache.contains_key(&(container_id, c.format())))
            .unwrap_or(false)
    }
}
