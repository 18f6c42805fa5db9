pub mod compile;
pub mod config;
pub mod coordination;
pub mod db;
pub mod error;
pub mod import;
pub mod jobs;
pub mod locale;
pub mod notify;
pub mod readiness;
pub mod rebase;
pub mod review;
pub mod rules;
pub mod services;
pub mod shuttle;
pub mod telemetry;
pub mod worker;

pub use compile::{CompileService, Compiler, Manifest};
pub use config::{load_config, Config};
pub use coordination::{MemoryCoordinator, WorkCoordinator, WorkerTracker};
pub use db::container_repo::{ContainerKind, ContainerRow};
pub use db::key_repo::KeyRow;
pub use db::project_repo::{LocaleTarget, NewProject, PathRule, ProjectRow};
pub use db::translation_repo::TranslationRow;
pub use db::{Database, DatabaseError};
pub use error::{
    CompileError, ConfigError, CoordinatorError, ImportError, JobError, NotifyError,
    ReadinessError, Result, ShuttleError, ValidationError, WorkerError,
};
pub use import::{ContentSource, DirectorySource, FormatImporter, SourceBlob};
pub use locale::{FallbackTable, Locale, TranslationMatcher};
pub use notify::{ContainerSummary, Notifier, ReadinessEvent, SearchIndex};
pub use readiness::{ProjectReadiness, ReadinessState};
pub use review::LocaleCopy;
pub use services::Services;
pub use shuttle::{Shuttle, ShuttleBuilder};
pub use telemetry::init_logging;
pub use worker::{FailedJob, JobRunner, WorkerPool};
