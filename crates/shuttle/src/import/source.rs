//! Content sources: where commit and asset bytes come from.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError};
use walkdir::WalkDir;

use crate::db::container_repo::{ContainerKind, ContainerRow};
use crate::db::project_repo::ProjectRow;
use crate::error::ImportError;

/// One file of fetched content. `path` is relative and `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlob {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl SourceBlob {
    pub fn new(path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.to_string(),
            bytes: bytes.into(),
        }
    }
}

pub trait ContentSource: Send + Sync {
    /// Blobs making up `container`. Articles and key groups carry their
    /// content inline and fetch nothing.
    fn fetch(&self, project: &ProjectRow, container: &ContainerRow) -> Result<Vec<SourceBlob>, ImportError>;
}

/// Reads `<root>/<project>/<revision>/**` for commits and
/// `<root>/<project>/assets/<name>` for assets.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/.shuttle/content`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".shuttle").join("content"))
    }

    fn read(path: &Path) -> Result<Vec<u8>, ImportError> {
        std::fs::read(path).map_err(|e| ImportError::ReadBlob {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl ContentSource for DirectorySource {
    fn fetch(&self, project: &ProjectRow, container: &ContainerRow) -> Result<Vec<SourceBlob>, ImportError> {
        let project_dir = self.root.join(&project.name);
        match container.kind {
            ContainerKind::Commit => {
                let revision_dir = project_dir.join(&container.name);
                if !revision_dir.is_dir() {
                    return Err(ImportError::Fetch {
                        what: format!("commit {}", container.name),
                        reason: format!("{} does not exist", revision_dir.display()),
                    });
                }
                let mut blobs = Vec::new();
                for entry in WalkDir::new(&revision_dir)
                    .min_depth(1)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(|e| e.ok())
                {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let Ok(relative) = entry.path().strip_prefix(&revision_dir) else {
                        continue;
                    };
                    let path = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    blobs.push(SourceBlob {
                        path,
                        bytes: Self::read(entry.path())?,
                    });
                }
                log::debug!("Read {} blob(s) for commit {}", blobs.len(), container.name);
                Ok(blobs)
            }
            ContainerKind::Asset => {
                let path = project_dir.join("assets").join(&container.name);
                if !path.is_file() {
                    return Err(ImportError::Fetch {
                        what: format!("asset {}", container.name),
                        reason: format!("{} does not exist", path.display()),
                    });
                }
                Ok(vec![SourceBlob {
                    path: container.name.clone(),
                    bytes: Self::read(&path)?,
                }])
            }
            ContainerKind::Article | ContainerKind::KeyGroup => Ok(Vec::new()),
        }
    }
}

/// Runs `source.fetch` on a helper thread and gives up after `timeout`.
/// A timed-out fetch keeps running in the background; its result is dropped.
pub fn fetch_with_timeout(
    source: Arc<dyn ContentSource>,
    project: &ProjectRow,
    container: &ContainerRow,
    timeout: Duration,
) -> Result<Vec<SourceBlob>, ImportError> {
    let (tx, rx) = bounded(1);
    let project = project.clone();
    let container = container.clone();
    let what = format!("{} {}", container.kind, container.name);

    thread::Builder::new()
        .name("shuttle-fetch".to_string())
        .spawn(move || {
            let _ = tx.send(source.fetch(&project, &container));
        })
        .map_err(|e| ImportError::Fetch {
            what: what.clone(),
            reason: format!("failed to spawn fetch thread: {}", e),
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(ImportError::Timeout {
            what,
            seconds: timeout.as_secs(),
        }),
        Err(RecvTimeoutError::Disconnected) => Err(ImportError::Fetch {
            what,
            reason: "fetch thread exited without a result".to_string(),
        }),
    }
}
