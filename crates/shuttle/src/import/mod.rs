//! Import pipeline: fetching content, parsing it into entries and
//! materializing keys and translations.

pub mod container;
pub mod fencing;
pub mod format;
pub mod materializer;
pub mod source;
pub mod splitter;

pub use container::{load_container, paragraph_slot, Container, Membership};
pub use format::{FormatImporter, ImportEntry, ImportedContent, ImporterRegistry};
pub use materializer::{
    sync_translations, MaterializeOptions, Materialized, MaterializedKey, Materializer, SkipReason,
    TranslationSync,
};
pub use source::{fetch_with_timeout, ContentSource, DirectorySource, SourceBlob};
pub use splitter::{BlankLineSplitter, JsonArraySplitter, ParagraphSplitter};
