//! Worker-set tracking: an entity is `loading` exactly while jobs are
//! registered against it.

use std::sync::Arc;

use super::coordinator::WorkCoordinator;
use crate::db::container_repo::{self, ContainerRow};
use crate::db::project_repo::{self, ProjectRow};
use crate::db::{Database, DatabaseError};
use crate::error::ShuttleError;

/// An entity whose `loading` flag mirrors its worker set.
pub trait TrackedEntity {
    fn entity_type(&self) -> &'static str;
    fn entity_id(&self) -> i64;
    fn is_loading(&self) -> bool;
    fn set_loading(&mut self, loading: bool);
    fn save_loading(&self, db: &Database) -> Result<(), DatabaseError>;
}

/// Coordination key holding the entity's worker set.
pub fn worker_set_key(entity: &dyn TrackedEntity) -> String {
    format!("loading:{}:{}", entity.entity_type(), entity.entity_id())
}

impl TrackedEntity for ContainerRow {
    fn entity_type(&self) -> &'static str {
        self.kind.entity_type()
    }

    fn entity_id(&self) -> i64 {
        self.id
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn save_loading(&self, db: &Database) -> Result<(), DatabaseError> {
        db.with_conn(|conn| container_repo::update_loading(conn, self.id, self.loading))
    }
}

impl TrackedEntity for ProjectRow {
    fn entity_type(&self) -> &'static str {
        "Project"
    }

    fn entity_id(&self) -> i64 {
        self.id
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn save_loading(&self, db: &Database) -> Result<(), DatabaseError> {
        db.with_conn(|conn| project_repo::update_loading(conn, self.id, self.loading))
    }
}

#[derive(Clone)]
pub struct WorkerTracker {
    coordinator: Arc<dyn WorkCoordinator>,
    db: Database,
}

impl WorkerTracker {
    pub fn new(coordinator: Arc<dyn WorkCoordinator>, db: Database) -> Self {
        Self { coordinator, db }
    }

    /// Registers `jid` and flips `loading` on if it was off.
    pub fn add_worker(&self, entity: &mut dyn TrackedEntity, jid: &str) -> Result<(), ShuttleError> {
        let key = worker_set_key(entity);
        let size = self.coordinator.add_worker(&key, jid)?;
        log::debug!("{} now has {} worker(s)", key, size);
        if !entity.is_loading() {
            entity.set_loading(true);
            entity.save_loading(&self.db)?;
        }
        Ok(())
    }

    /// Deregisters `jid`; flips `loading` off once the set is empty.
    /// A `None` jid is a no-op.
    pub fn remove_worker(
        &self,
        entity: &mut dyn TrackedEntity,
        jid: Option<&str>,
    ) -> Result<(), ShuttleError> {
        let Some(jid) = jid else {
            return Ok(());
        };
        let key = worker_set_key(entity);
        let remaining = self.coordinator.remove_worker(&key, jid)?;
        log::debug!("{} has {} worker(s) left", key, remaining);
        if remaining == 0 && entity.is_loading() {
            entity.set_loading(false);
            entity.save_loading(&self.db)?;
        }
        Ok(())
    }

    pub fn list_workers(&self, entity: &dyn TrackedEntity) -> Result<Vec<String>, ShuttleError> {
        Ok(self.coordinator.workers(&worker_set_key(entity))?)
    }

    /// Operator escape hatch for entities stuck `loading`.
    pub fn clear_workers(&self, entity: &mut dyn TrackedEntity) -> Result<usize, ShuttleError> {
        let key = worker_set_key(entity);
        let dropped = self.coordinator.clear_workers(&key)?;
        if dropped > 0 {
            log::warn!("Cleared {} stuck worker(s) from {}", dropped, key);
        }
        if entity.is_loading() {
            entity.set_loading(false);
            entity.save_loading(&self.db)?;
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::coordinator::MemoryCoordinator;
    use crate::db::container_repo::{ContainerKind, NewContainer};
    use crate::db::project_repo::NewProject;

    fn setup() -> (WorkerTracker, Database, ContainerRow) {
        let db = Database::open_in_memory().unwrap();
        let container = db
            .with_conn(|conn| {
                let project = project_repo::insert(
                    conn,
                    &NewProject {
                        name: "p".to_string(),
                        base_locale: "en".to_string(),
                        ..Default::default()
                    },
                )?;
                container_repo::insert(
                    conn,
                    &NewContainer {
                        project_id: project.id,
                        kind: ContainerKind::Commit,
                        name: "deadbeef".to_string(),
                        source_copy: None,
                        targeted_locales: None,
                    },
                )
            })
            .unwrap();
        let tracker = WorkerTracker::new(Arc::new(MemoryCoordinator::new()), db.clone());
        (tracker, db, container)
    }

    fn stored_loading(db: &Database, id: i64) -> bool {
        db.with_conn(|conn| container_repo::find_by_id(conn, id))
            .unwrap()
            .unwrap()
            .loading
    }

    #[test]
    fn test_worker_set_drives_loading() {
        let (tracker, db, mut commit) = setup();
        assert_eq!(worker_set_key(&commit), format!("loading:Commit:{}", commit.id));

        tracker.add_worker(&mut commit, "j1").unwrap();
        tracker.add_worker(&mut commit, "j2").unwrap();
        assert!(stored_loading(&db, commit.id));

        tracker.remove_worker(&mut commit, Some("j1")).unwrap();
        assert!(commit.loading);
        assert!(stored_loading(&db, commit.id));

        tracker.remove_worker(&mut commit, Some("j2")).unwrap();
        assert!(!commit.loading);
        assert!(!stored_loading(&db, commit.id));
    }

    #[test]
    fn test_remove_none_is_noop() {
        let (tracker, db, mut commit) = setup();
        tracker.add_worker(&mut commit, "j1").unwrap();
        tracker.remove_worker(&mut commit, None).unwrap();
        assert!(stored_loading(&db, commit.id));
        assert_eq!(tracker.list_workers(&commit).unwrap(), vec!["j1"]);
    }

    #[test]
    fn test_clear_workers_unsticks_entity() {
        let (tracker, db, mut commit) = setup();
        tracker.add_worker(&mut commit, "lost-1").unwrap();
        tracker.add_worker(&mut commit, "lost-2").unwrap();
        assert_eq!(tracker.clear_workers(&mut commit).unwrap(), 2);
        assert!(!stored_loading(&db, commit.id));
        assert!(tracker.list_workers(&commit).unwrap().is_empty());
    }
}
