use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShuttleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Coordination error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Readiness error: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Errors raised synchronously on the request path, before any job is enqueued.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Malformed locale code '{0}'")]
    MalformedLocale(String),

    #[error("Base locale '{0}' cannot also be a targeted locale")]
    BaseLocaleTargeted(String),

    #[error("Locale '{0}' is listed more than once")]
    DuplicateLocale(String),

    #[error("Locale '{locale}' is not targeted by project {project_id}")]
    LocaleNotTargeted { project_id: i64, locale: String },

    #[error("Cannot copy locale '{from}' onto '{to}': {reason}")]
    ConflictingLocaleCopy {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Translation is missing required tokens: {}", missing.join(", "))]
    MissingFences { missing: Vec<String> },

    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("{kind} containers have no editable source copy")]
    NoSourceCopy { kind: String },

    #[error("Name must not be blank")]
    BlankName,

    #[error("Base locale translations cannot be edited")]
    BaseTranslation,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Timed out after {seconds}s fetching content for {what}")]
    Timeout { what: String, seconds: u64 },

    #[error("Failed to fetch content for {what}: {reason}")]
    Fetch { what: String, reason: String },

    #[error("Failed to read '{path}': {source}")]
    ReadBlob {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {reason}")]
    Parse { path: String, reason: String },

    #[error("Database error during import: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Readiness error during import: {0}")]
    Readiness(#[from] ReadinessError),

    #[error("Key '{key}' materialized with no locales")]
    NoLocales { key: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),

    #[error("Cannot open a batch from a job already running inside batch {0}")]
    NestedBatch(String),

    #[error("Unknown batch {0}")]
    UnknownBatch(String),

    #[error("Batch {0} has already completed")]
    BatchCompleted(String),
}

#[derive(Error, Debug)]
pub enum ReadinessError {
    #[error("{entity} {id} is still loading; readiness is undefined")]
    StillLoading { entity: &'static str, id: i64 },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Container {0} is not ready")]
    NotReady(i64),

    #[error("Container {0} is still loading")]
    Loading(i64),

    #[error("Container {0} not found")]
    NotFound(i64),

    #[error("Locale '{0}' is not recognized for this container")]
    UnknownLocale(String),

    #[error("Unknown output format '{0}'")]
    UnknownFormat(String),

    #[error("Serialization failed: {0}")]
    Serialize(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Webhook request to '{url}' timed out")]
    Timeout { url: String },

    #[error("Webhook request to '{url}' failed: {reason}")]
    Request { url: String, reason: String },

    #[error("Webhook '{url}' answered with status {status}")]
    Status { url: String, status: u16 },
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Job queue closed")]
    ChannelClosed,

    #[error("Failed to serialize job arguments: {0}")]
    Arguments(#[from] serde_json::Error),

    #[error("Coordination error: {0}")]
    Coordinator(#[from] CoordinatorError),
}

/// Outcome classes a job can fail with; the runner picks retry, moot
/// success or terminal failure from the variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("transient: {0}")]
    Transient(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("{0}")]
    Fatal(String),
}

impl JobError {
    pub fn is_transient(&self) -> bool {
        matches!(self, JobError::Transient(_))
    }
}

impl From<crate::db::DatabaseError> for JobError {
    fn from(e: crate::db::DatabaseError) -> Self {
        if e.is_busy() {
            JobError::Transient(e.to_string())
        } else {
            JobError::Fatal(e.to_string())
        }
    }
}

impl From<CoordinatorError> for JobError {
    fn from(e: CoordinatorError) -> Self {
        match e {
            CoordinatorError::Unavailable(_) => JobError::Transient(e.to_string()),
            CoordinatorError::NestedBatch(_) => JobError::Invariant(e.to_string()),
            _ => JobError::Fatal(e.to_string()),
        }
    }
}

impl From<ReadinessError> for JobError {
    fn from(e: ReadinessError) -> Self {
        match e {
            ReadinessError::StillLoading { .. } => JobError::Invariant(e.to_string()),
            ReadinessError::NotFound { .. } => JobError::NotFound(e.to_string()),
            ReadinessError::Database(db) => db.into(),
        }
    }
}

impl From<ImportError> for JobError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Timeout { .. } | ImportError::Fetch { .. } => {
                JobError::Transient(e.to_string())
            }
            ImportError::NoLocales { .. } => JobError::Invariant(e.to_string()),
            ImportError::Database(db) => db.into(),
            ImportError::Readiness(r) => r.into(),
            _ => JobError::Fatal(e.to_string()),
        }
    }
}

impl From<NotifyError> for JobError {
    fn from(e: NotifyError) -> Self {
        match e {
            NotifyError::Status { status, .. } if status < 500 && status != 429 => {
                JobError::Fatal(e.to_string())
            }
            _ => JobError::Transient(e.to_string()),
        }
    }
}

impl From<WorkerError> for JobError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Coordinator(c) => c.into(),
            _ => JobError::Fatal(e.to_string()),
        }
    }
}

impl From<ShuttleError> for JobError {
    fn from(e: ShuttleError) -> Self {
        match e {
            ShuttleError::Database(db) => db.into(),
            ShuttleError::Coordinator(c) => c.into(),
            ShuttleError::Readiness(r) => r.into(),
            ShuttleError::Import(i) => i.into(),
            ShuttleError::Worker(w) => w.into(),
            ShuttleError::Notify(n) => n.into(),
            ShuttleError::NotFound(what) => JobError::NotFound(what),
            other => JobError::Fatal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        JobError::Fatal(format!("invalid job arguments: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, ShuttleError>;
