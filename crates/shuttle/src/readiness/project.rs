use rusqlite::Connection;
use serde::Serialize;

use super::ReadinessState;
use crate::db::{container_repo, project_repo};
use crate::error::ReadinessError;

/// Container counts for a project, derived on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectReadiness {
    pub project_id: i64,
    pub containers: usize,
    pub loading: usize,
    pub ready: usize,
    pub not_ready: usize,
    pub project_loading: bool,
}

impl ProjectReadiness {
    /// Loading while the project or any container is loading; ready when
    /// every container is ready (a project without containers included).
    pub fn state(&self) -> ReadinessState {
        if self.project_loading || self.loading > 0 {
            ReadinessState::Loading
        } else if self.not_ready == 0 {
            ReadinessState::Ready
        } else {
            ReadinessState::NotReady
        }
    }
}

pub fn project_readiness(
    conn: &Connection,
    project_id: i64,
) -> Result<ProjectReadiness, ReadinessError> {
    let project = project_repo::find_by_id(conn, project_id)?.ok_or(ReadinessError::NotFound {
        entity: "Project",
        id: project_id,
    })?;

    let mut summary = ProjectReadiness {
        project_id,
        project_loading: project.loading,
        ..Default::default()
    };
    for container in container_repo::list_for_project(conn, project_id)? {
        summary.containers += 1;
        match ReadinessState::of(&container) {
            ReadinessState::Loading => summary.loading += 1,
            ReadinessState::Ready => summary.ready += 1,
            ReadinessState::NotReady => summary.not_ready += 1,
        }
    }
    Ok(summary)
}
