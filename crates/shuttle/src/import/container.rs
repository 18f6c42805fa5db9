//! Container kinds and how each one organizes its keys.

use rusqlite::Connection;

use super::splitter::{BlankLineSplitter, JsonArraySplitter, ParagraphSplitter};
use crate::db::container_repo::{self, ContainerKind, ContainerRow};
use crate::db::key_repo::sha256_hex;
use crate::db::project_repo::{self, ProjectRow};
use crate::db::DatabaseError;
use crate::error::ImportError;
use crate::locale::LocaleRequirements;

/// How a container holds its keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// Project-scoped keys joined through `commit_keys`.
    Shared,
    /// Keys owned through `container_id`, active while positioned.
    Exclusive,
}

pub trait Container: Send + Sync {
    fn row(&self) -> &ContainerRow;

    fn project(&self) -> &ProjectRow;

    fn membership(&self) -> Membership;

    /// The key slot for one imported string.
    fn key_slot(&self, identifier: &str, _source_copy: &str) -> String {
        identifier.to_string()
    }

    /// Paragraph-organized containers split their source copy and rebase on re-import.
    fn splitter(&self) -> Option<Box<dyn ParagraphSplitter>> {
        None
    }

    fn locale_requirements(&self) -> LocaleRequirements {
        LocaleRequirements::for_container(self.project(), self.row())
    }

    /// Project key inclusion/exclusion rules only make sense for free-form slots.
    fn applies_key_rules(&self) -> bool {
        self.splitter().is_none()
    }

    /// Runs once every key of an import has been materialized. `imported_text`
    /// is the source copy the import split, if any.
    fn on_all_keys_imported(
        &self,
        conn: &Connection,
        _imported_text: Option<&str>,
    ) -> Result<(), DatabaseError> {
        container_repo::finish_import(conn, self.row().id, None)
    }

    fn is_paragraph_organized(&self) -> bool {
        self.splitter().is_some()
    }

    /// Current source copy split into paragraphs. Free-form containers have none.
    fn paragraphs(&self) -> Result<Vec<String>, ImportError> {
        match (self.splitter(), self.row().source_copy.as_deref()) {
            (Some(splitter), Some(text)) => splitter.split(text),
            _ => Ok(Vec::new()),
        }
    }
}

/// `index:sha256(paragraph)`.
pub fn paragraph_slot(index: usize, paragraph: &str) -> String {
    format!("{}:{}", index, sha256_hex(paragraph))
}

/// A source revision. Keys are shared with other commits of the project.
pub struct Commit {
    row: ContainerRow,
    project: ProjectRow,
}

impl Container for Commit {
    fn row(&self) -> &ContainerRow {
        &self.row
    }

    fn project(&self) -> &ProjectRow {
        &self.project
    }

    fn membership(&self) -> Membership {
        Membership::Shared
    }
}

/// An uploaded file, one exclusive key per string in it.
pub struct Asset {
    row: ContainerRow,
    project: ProjectRow,
}

impl Container for Asset {
    fn row(&self) -> &ContainerRow {
        &self.row
    }

    fn project(&self) -> &ProjectRow {
        &self.project
    }

    fn membership(&self) -> Membership {
        Membership::Exclusive
    }
}

/// Freeform text, one key per blank-line separated paragraph.
pub struct Article {
    row: ContainerRow,
    project: ProjectRow,
}

impl Container for Article {
    fn row(&self) -> &ContainerRow {
        &self.row
    }

    fn project(&self) -> &ProjectRow {
        &self.project
    }

    fn membership(&self) -> Membership {
        Membership::Exclusive
    }

    fn key_slot(&self, identifier: &str, source_copy: &str) -> String {
        format!("{}:{}", identifier, sha256_hex(source_copy))
    }

    fn splitter(&self) -> Option<Box<dyn ParagraphSplitter>> {
        Some(Box::new(BlankLineSplitter))
    }

    fn on_all_keys_imported(
        &self,
        conn: &Connection,
        imported_text: Option<&str>,
    ) -> Result<(), DatabaseError> {
        container_repo::finish_import(conn, self.row.id, imported_text)
    }
}

/// A named list of strings stored as a JSON array.
pub struct KeyGroup {
    row: ContainerRow,
    project: ProjectRow,
}

impl Container for KeyGroup {
    fn row(&self) -> &ContainerRow {
        &self.row
    }

    fn project(&self) -> &ProjectRow {
        &self.project
    }

    fn membership(&self) -> Membership {
        Membership::Exclusive
    }

    fn key_slot(&self, identifier: &str, source_copy: &str) -> String {
        format!("{}:{}", identifier, sha256_hex(source_copy))
    }

    fn splitter(&self) -> Option<Box<dyn ParagraphSplitter>> {
        Some(Box::new(JsonArraySplitter))
    }

    fn on_all_keys_imported(
        &self,
        conn: &Connection,
        imported_text: Option<&str>,
    ) -> Result<(), DatabaseError> {
        container_repo::finish_import(conn, self.row.id, imported_text)
    }
}

/// Wraps a row in the container type for its kind.
pub fn for_row(project: ProjectRow, row: ContainerRow) -> Box<dyn Container> {
    match row.kind {
        ContainerKind::Commit => Box::new(Commit { row, project }),
        ContainerKind::Asset => Box::new(Asset { row, project }),
        ContainerKind::Article => Box::new(Article { row, project }),
        ContainerKind::KeyGroup => Box::new(KeyGroup { row, project }),
    }
}

/// Loads a container and its project. `None` when either is gone.
pub fn load_container(
    conn: &Connection,
    id: i64,
) -> Result<Option<Box<dyn Container>>, DatabaseError> {
    let Some(row) = container_repo::find_by_id(conn, id)? else {
        return Ok(None);
    };
    let Some(project) = project_repo::find_by_id(conn, row.project_id)? else {
        return Ok(None);
    };
    Ok(Some(for_row(project, row)))
}
