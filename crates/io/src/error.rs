use std::path::PathBuf;

use icr_core::{SourceKind, ValidationDiagnostic};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Base location could not be created or written to.
    #[error("cannot create run directory under {path}: {message}")]
    NotWritable { path: PathBuf, message: String },
    /// Run suffix or explicit run id is unusable as a directory name.
    #[error("invalid run name '{0}': must be non-empty and contain no path separators")]
    InvalidRunName(String),
    /// Explicit run id names a directory that already exists.
    #[error("run '{0}' already exists")]
    RunExists(String),
    #[error("an explicit run id cannot be combined with a suffix")]
    RunIdWithSuffix,
    #[error(transparent)]
    Config(#[from] icr_config::ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// One store per run: the file must not exist before the run creates it.
    #[error("run store already exists: {0}")]
    AlreadyExists(PathBuf),
    #[error("cannot enable WAL journal mode (got '{0}')")]
    WalUnavailable(String),
    /// Schema or metadata creation failed; the store was removed.
    #[error("schema initialization failed: {0}")]
    Schema(String),
    #[error("stored row in '{table}' at position {position} is unreadable: {message}")]
    Corrupt {
        table: String,
        position: i64,
        message: String,
    },
    #[error("run store has no metadata row")]
    MissingMetadata,
    #[error("store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Unreadable/empty source or missing required column. Nothing from this
    /// source's rows was persisted; its fatal diagnostics were.
    #[error("{message}")]
    Fatal {
        input: SourceKind,
        message: String,
        diagnostics: Vec<ValidationDiagnostic>,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}
