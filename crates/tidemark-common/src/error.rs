use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid filename {filename:?}: {reason}")]
    InvalidFilename { filename: String, reason: String },

    #[error("invalid version {0:?}")]
    InvalidVersion(String),

    #[error("duplicate {direction} version {version}: {first} and {second}")]
    DuplicateVersion {
        direction: String,
        version: String,
        first: String,
        second: String,
    },

    #[error("migrations directory {path} is unreadable: {reason}")]
    RepositoryUnreadable { path: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous match for {query}: {candidates:?}")]
    AmbiguousMatch {
        query: String,
        candidates: Vec<String>,
    },

    #[error("schema migrations table {0:?} does not exist, run `init` first")]
    SchemaMigrationsDoesNotExist(String),

    #[error(
        "schema migrations table {0:?} is missing the label/executed_at columns, run `upgrade` first"
    )]
    SchemaMigrationsMissingColumns(String),

    /// A plan step failed; `step` steps before it were applied and left in place.
    #[error("migration {migration} failed at step {step}")]
    ExecutionFailed {
        step: usize,
        migration: String,
        source: Box<Error>,
    },

    #[error("cancelled after {completed} completed step(s)")]
    Cancelled { completed: usize },

    #[error("driver is not connected")]
    NotConnected,

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Number of plan steps that completed before this error, when known.
    pub fn completed_steps(&self) -> Option<usize> {
        match self {
            Error::ExecutionFailed { step, .. } => Some(*step),
            Error::Cancelled { completed } => Some(*completed),
            _ => None,
        }
    }

    pub fn invalid_filename(filename: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidFilename {
            filename: filename.into(),
            reason: reason.into(),
        }
    }
}
