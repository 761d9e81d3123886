// Run-scoped file IO: workspace layout, record store, source ingestion

pub mod canonical;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod sheet;
pub mod store;
pub mod workspace;

pub use canonical::{build_canonical_set, load_canonical_set};
pub use error::{IngestError, StoreError, WorkspaceError};
pub use fingerprint::{fingerprint_file, fingerprint_sources};
pub use ingest::{
    ingest_sources, validate_record, IngestPhase, IngestionReport, SourcePaths, SourceStats,
};
pub use store::{
    PendingStore, RecordFilter, RecordStore, StoreReader, StoreTransaction, StoredDiagnostic,
    StoredRecord,
};
pub use workspace::Workspace;

/// Record store schema version. Stored in SQLite's `user_version`.
pub const STORE_SCHEMA_VERSION: u32 = 1;
