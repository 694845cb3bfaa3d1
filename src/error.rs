use std::path::PathBuf;

use crate::sources::ScriptPhase;

/// Error type for the migradir crate.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// A version directory does not conform to the expected layout.
    #[error("invalid migration layout at {path}: {reason}")]
    InvalidLayout { path: PathBuf, reason: String },
    /// The version ledger table is missing or malformed.
    #[error("version table problem: {0}")]
    Structural(String),
    /// The requested operation is not permitted in the database's current state.
    #[error("{0}")]
    OperationNotAllowed(String),
    /// The database is non-empty but carries no recognizable version ledger,
    /// so there is no safe starting point for migration.
    #[error("database cannot be migrated: {0}")]
    UnmigratableDatabase(String),
    /// A script could not be loaded from its locator.
    #[error("failed to load script {locator}: {reason}")]
    ScriptLoad { locator: String, reason: String },
    /// A single SQL statement failed. Carries the offending statement text.
    #[error("statement `{statement}` failed: {source}")]
    Statement {
        statement: String,
        #[source]
        source: Box<Error>,
    },
    /// A version failed during one of its phases. Wraps the underlying cause
    /// so callers can see exactly where a run stopped.
    #[error("version {version} failed during {phase} phase: {source}")]
    Version {
        version: String,
        phase: ScriptPhase,
        #[source]
        source: Box<Error>,
    },
    /// Cooperative cancellation was observed.
    #[error("operation cancelled")]
    Cancelled,
    /// A result value was accessed as the wrong data type.
    #[error("invalid conversion: requested wrong data type '{requested}' of field '{column}'")]
    InvalidConversion {
        column: String,
        requested: &'static str,
    },
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Sqlite(rusqlite::Error),
    #[error("{0}")]
    Generic(String),
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

impl Error {
    /// Attach version/phase context to a failure. Cancellation passes through
    /// untouched so it is never reported as a version failure.
    pub(crate) fn in_phase(self, version: &str, phase: ScriptPhase) -> Error {
        match self {
            Error::Cancelled => Error::Cancelled,
            other => Error::Version {
                version: version.to_string(),
                phase,
                source: Box::new(other),
            },
        }
    }
}
