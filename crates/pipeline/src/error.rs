use std::path::PathBuf;

use icr_config::ConfigError;
use icr_core::SummaryError;
use icr_io::{IngestError, StoreError, WorkspaceError};
use icr_recon::CompareError;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Compare(#[from] CompareError),
    #[error(transparent)]
    Summary(#[from] SummaryError),
    /// Ingestion left warnings the caller has not confirmed.
    #[error("run has {count} ingestion warning(s); acknowledge them before comparing")]
    WarningsNotAcknowledged { count: usize },
    #[error("comparison already ran for this run")]
    AlreadyCompared,
    #[error("cannot write {path}: {message}")]
    Output { path: PathBuf, message: String },
}

impl RunError {
    /// Errors after which the run cannot continue. Unacknowledged warnings
    /// are the only recoverable case.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::WarningsNotAcknowledged { .. })
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Compare(CompareError::ContractViolation { .. }))
    }
}
