use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::db::{container_repo, key_repo, project_repo, translation_repo};
use crate::error::CompileError;
use crate::locale::LocaleRequirements;

/// Approved copy of a container's active keys, per locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub container_id: i64,
    pub locales: BTreeMap<String, BTreeMap<String, String>>,
}

/// Builds the manifest for `selection` (every locale of the container when
/// `None`). Unless `partial`, the container must be ready.
pub fn build_manifest(
    conn: &Connection,
    container_id: i64,
    selection: Option<&[String]>,
    partial: bool,
) -> Result<Manifest, CompileError> {
    let container = container_repo::find_by_id(conn, container_id)?
        .ok_or(CompileError::NotFound(container_id))?;
    let project = project_repo::find_by_id(conn, container.project_id)?
        .ok_or(CompileError::NotFound(container_id))?;

    if !partial {
        if container.loading {
            return Err(CompileError::Loading(container_id));
        }
        if !container.ready {
            return Err(CompileError::NotReady(container_id));
        }
    }

    let requirements = LocaleRequirements::for_container(&project, &container);
    let locales = match selection {
        Some(selected) => {
            if let Some(unknown) = selected.iter().find(|l| !requirements.is_known(l)) {
                return Err(CompileError::UnknownLocale(unknown.clone()));
            }
            selected.to_vec()
        }
        None => requirements.all_locales(),
    };

    let keys = key_repo::active_for_container(conn, &container)?;
    let mut manifest = Manifest {
        container_id,
        locales: BTreeMap::new(),
    };
    for locale in locales {
        let mut strings = BTreeMap::new();
        for key in &keys {
            if let Some(t) = translation_repo::find(conn, key.id, &locale)? {
                if let (true, Some(copy)) = (t.is_approved(), t.copy) {
                    strings.insert(key.key.clone(), copy);
                }
            }
        }
        manifest.locales.insert(locale, strings);
    }
    Ok(manifest)
}
