use rusqlite::Connection;

use crate::db::container_repo::{self, ContainerRow};
use crate::db::key_repo::{self, KeyRow};
use crate::db::project_repo::{self, LocaleTarget, ProjectRow};
use crate::db::translation_repo;
use crate::error::ReadinessError;
use crate::locale::LocaleRequirements;

/// Result of recalculating one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    pub key_id: i64,
    pub was_ready: bool,
    pub ready: bool,
}

impl KeyTransition {
    pub fn changed(&self) -> bool {
        self.was_ready != self.ready
    }
}

/// Result of recalculating one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerTransition {
    pub container_id: i64,
    pub project_id: i64,
    pub was_ready: bool,
    pub ready: bool,
}

impl ContainerTransition {
    pub fn changed(&self) -> bool {
        self.was_ready != self.ready
    }

    pub fn became_ready(&self) -> bool {
        !self.was_ready && self.ready
    }
}

fn load_project(conn: &Connection, id: i64) -> Result<ProjectRow, ReadinessError> {
    project_repo::find_by_id(conn, id)?.ok_or(ReadinessError::NotFound {
        entity: "Project",
        id,
    })
}

fn load_container(conn: &Connection, id: i64) -> Result<ContainerRow, ReadinessError> {
    container_repo::find_by_id(conn, id)?.ok_or(ReadinessError::NotFound {
        entity: "Container",
        id,
    })
}

/// Locale requirements that apply to `key`.
///
/// Exclusive keys follow their container. Shared keys combine the targets of
/// every commit holding them (a locale required by any of them is required);
/// a shared key no commit holds falls back to the project's requirements.
pub fn requirements_for_key(
    conn: &Connection,
    key: &KeyRow,
) -> Result<LocaleRequirements, ReadinessError> {
    let project = load_project(conn, key.project_id)?;

    if let Some(container_id) = key.container_id {
        let container = load_container(conn, container_id)?;
        return Ok(LocaleRequirements::for_container(&project, &container));
    }

    let container_ids = container_repo::ids_for_key(conn, key.id)?;
    if container_ids.is_empty() {
        return Ok(LocaleRequirements::for_project(&project));
    }

    let mut targets: Vec<LocaleTarget> = Vec::new();
    for id in container_ids {
        let container = load_container(conn, id)?;
        targets.extend(
            container
                .targeted_locales
                .unwrap_or_else(|| project.targeted_locales.clone()),
        );
    }
    Ok(LocaleRequirements::new(
        &project.base_locale,
        &targets,
        &project.key_locale_exclusions,
    ))
}

/// Locales that must be approved for `key` to be ready.
pub fn required_locales(conn: &Connection, key: &KeyRow) -> Result<Vec<String>, ReadinessError> {
    Ok(requirements_for_key(conn, key)?.required_for_key(&key.key))
}

/// Recomputes and persists a key's readiness.
pub fn recalculate_key(conn: &Connection, key_id: i64) -> Result<KeyTransition, ReadinessError> {
    let key = key_repo::find_by_id(conn, key_id)?.ok_or(ReadinessError::NotFound {
        entity: "Key",
        id: key_id,
    })?;
    let required = required_locales(conn, &key)?;
    let translations = translation_repo::for_key(conn, key.id)?;

    let ready = required.iter().all(|locale| {
        translations
            .iter()
            .any(|t| &t.locale == locale && t.is_approved())
    });

    if ready != key.ready {
        key_repo::update_ready(conn, key.id, ready)?;
        log::debug!("Key {} readiness {} -> {}", key.id, key.ready, ready);
    }

    Ok(KeyTransition {
        key_id: key.id,
        was_ready: key.ready,
        ready,
    })
}

/// Recomputes and persists a container's readiness from its active keys.
///
/// Readiness is undefined while the container is loading; calling this then
/// is a bug in the caller and returns [`ReadinessError::StillLoading`].
pub fn recalculate_container(
    conn: &Connection,
    container_id: i64,
) -> Result<ContainerTransition, ReadinessError> {
    let container = load_container(conn, container_id)?;
    if container.loading {
        log::error!(
            "Readiness recalculated for {} {} while it is still loading",
            container.kind.entity_type(),
            container.id
        );
        return Err(ReadinessError::StillLoading {
            entity: container.kind.entity_type(),
            id: container.id,
        });
    }

    let keys = key_repo::active_for_container(conn, &container)?;
    let ready = keys.iter().all(|k| k.ready);

    if ready != container.ready {
        container_repo::update_ready(conn, container.id, ready)?;
        log::info!(
            "{} {} is now {}",
            container.kind.entity_type(),
            container.id,
            if ready { "ready" } else { "not ready" }
        );
    }

    Ok(ContainerTransition {
        container_id: container.id,
        project_id: container.project_id,
        was_ready: container.ready,
        ready,
    })
}
