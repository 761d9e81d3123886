//! Per-run record store on SQLite.
//!
//! One file per run (`data/run.sqlite`), WAL journal so readers never wait on
//! the ingestion writer. Raw-row and diagnostic tables are insert-only:
//! triggers abort any UPDATE or DELETE, so a correction means a new run.
//!
//! Lifecycle: [`RecordStore::open`] yields a [`PendingStore`]; only
//! [`PendingStore::initialize_schema`] turns it into a writable
//! [`RecordStore`]. A failed initialization deletes the file, so no
//! half-built store is ever handed out.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, Transaction};

use icr_core::{
    BuildInfo, DiagnosticKind, Position, RawRecord, RunContext, Severity, SourceKind,
    ValidationDiagnostic,
};

use crate::error::StoreError;
use crate::workspace::Workspace;
use crate::STORE_SCHEMA_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE metadata (
    run_id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    app_version TEXT NOT NULL,
    git_commit TEXT NOT NULL,
    build_date TEXT NOT NULL,
    input_fingerprint TEXT NOT NULL
);

CREATE TABLE raw_reference_catalog (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    row_number INTEGER NOT NULL,
    row_json TEXT NOT NULL
);

CREATE TABLE raw_vessel_index (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    row_number INTEGER NOT NULL,
    row_json TEXT NOT NULL
);

CREATE TABLE raw_onboard_inventory (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    row_number INTEGER NOT NULL,
    row_json TEXT NOT NULL
);

CREATE TABLE validation_diagnostics (
    position INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    row_number INTEGER,            -- NULL for file-level findings
    column_name TEXT,              -- NULL for row-level findings
    error_kind TEXT NOT NULL,
    message TEXT NOT NULL,
    severity TEXT NOT NULL CHECK (severity IN ('warning', 'fatal'))
);
"#;

/// Tables that reject UPDATE and DELETE.
const APPEND_ONLY_TABLES: [&str; 5] = [
    "metadata",
    "raw_reference_catalog",
    "raw_vessel_index",
    "raw_onboard_inventory",
    "validation_diagnostics",
];

fn append_only_triggers() -> String {
    let mut sql = String::new();
    for table in APPEND_ONLY_TABLES {
        for op in ["UPDATE", "DELETE"] {
            sql.push_str(&format!(
                "CREATE TRIGGER {table}_no_{lower}\n\
                 BEFORE {op} ON {table}\n\
                 BEGIN\n    SELECT RAISE(ABORT, '{table} is append-only');\nEND;\n",
                lower = op.to_lowercase(),
            ));
        }
    }
    sql
}

// ---------------------------------------------------------------------------
// Open + initialize
// ---------------------------------------------------------------------------

/// A freshly created store file with WAL enabled but no schema yet.
pub struct PendingStore {
    conn: Connection,
    path: PathBuf,
    run_id: String,
}

/// Initialized, writable store for one run.
pub struct RecordStore {
    conn: Connection,
    path: PathBuf,
    run_id: String,
}

impl RecordStore {
    /// Create the run's store file. Refuses a file that already exists.
    pub fn open(workspace: &Workspace) -> Result<PendingStore, StoreError> {
        Self::open_at(&workspace.store_path(), workspace.run_id())
    }

    pub(crate) fn open_at(path: &Path, run_id: &str) -> Result<PendingStore, StoreError> {
        if path.exists() {
            return Err(StoreError::AlreadyExists(path.to_path_buf()));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE;
        let conn = Connection::open_with_flags(path, flags)?;
        if let Err(e) = enable_wal(&conn) {
            drop(conn);
            remove_store_files(path);
            return Err(e);
        }

        Ok(PendingStore {
            conn,
            path: path.to_path_buf(),
            run_id: run_id.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Start the single write transaction of an ingestion pass. Dropping the
    /// returned handle without [`StoreTransaction::commit`] rolls back.
    pub fn begin(&mut self) -> Result<StoreTransaction<'_>, StoreError> {
        let tx = self.conn.transaction()?;
        Ok(StoreTransaction { tx })
    }

    /// Open a separate read-only connection. Under WAL it sees the last
    /// committed state and never blocks on an open write transaction.
    pub fn reader(&self) -> Result<StoreReader, StoreError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        Ok(StoreReader { conn })
    }

    pub fn read_raw_records(&self, filter: RecordFilter) -> Result<Vec<StoredRecord>, StoreError> {
        read_raw_records(&self.conn, filter)
    }

    pub fn read_diagnostics(&self) -> Result<Vec<StoredDiagnostic>, StoreError> {
        read_diagnostics(&self.conn)
    }

    pub fn read_metadata(&self) -> Result<RunContext, StoreError> {
        read_metadata(&self.conn)
    }
}

impl PendingStore {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create every table and trigger and record the run metadata, all in one
    /// transaction. On failure the store file is deleted.
    pub fn initialize_schema(self, context: &RunContext) -> Result<RecordStore, StoreError> {
        let PendingStore {
            mut conn,
            path,
            run_id,
        } = self;

        if context.run_id != run_id {
            drop(conn);
            remove_store_files(&path);
            return Err(StoreError::Schema(format!(
                "metadata names run '{}' but the store belongs to '{run_id}'",
                context.run_id
            )));
        }

        match create_schema(&mut conn, context) {
            Ok(()) => {
                log::debug!("[{run_id}] record store initialized at {}", path.display());
                Ok(RecordStore { conn, path, run_id })
            }
            Err(e) => {
                drop(conn);
                remove_store_files(&path);
                Err(StoreError::Schema(e.to_string()))
            }
        }
    }
}

fn enable_wal(conn: &Connection) -> Result<(), StoreError> {
    let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        return Err(StoreError::WalUnavailable(mode));
    }
    Ok(())
}

fn create_schema(conn: &mut Connection, context: &RunContext) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.execute_batch(&append_only_triggers())?;
    tx.pragma_update(None, "user_version", STORE_SCHEMA_VERSION)?;
    tx.execute(
        "INSERT INTO metadata (run_id, created_at, app_version, git_commit, build_date, input_fingerprint) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            context.run_id,
            context.created_at_iso(),
            context.build.app_version,
            context.build.git_commit,
            context.build.build_date,
            context.combined_fingerprint(),
        ],
    )?;
    tx.commit()
}

fn remove_store_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        let _ = fs::remove_file(PathBuf::from(name));
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// One ingestion pass's write transaction. Insert-only.
pub struct StoreTransaction<'a> {
    tx: Transaction<'a>,
}

impl StoreTransaction<'_> {
    pub fn append_raw_record(&self, record: &RawRecord) -> Result<Position, StoreError> {
        let json = record.values_json().map_err(|e| StoreError::Corrupt {
            table: record.source.raw_table().to_string(),
            position: -1,
            message: e.to_string(),
        })?;
        let sql = format!(
            "INSERT INTO {} (row_number, row_json) VALUES (?1, ?2)",
            record.source.raw_table()
        );
        self.tx.execute(&sql, params![record.row_number, json])?;
        Ok(Position(self.tx.last_insert_rowid() as u64))
    }

    pub fn append_diagnostic(&self, diagnostic: &ValidationDiagnostic) -> Result<Position, StoreError> {
        self.tx.execute(
            "INSERT INTO validation_diagnostics (source, row_number, column_name, error_kind, message, severity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                diagnostic.source.as_str(),
                diagnostic.row_number,
                diagnostic.column,
                diagnostic.kind.as_str(),
                diagnostic.message,
                diagnostic.severity.as_str(),
            ],
        )?;
        Ok(Position(self.tx.last_insert_rowid() as u64))
    }

    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<(), StoreError> {
        self.tx.rollback()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Which raw tables a read covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFilter {
    pub source: Option<SourceKind>,
}

impl RecordFilter {
    pub fn all() -> Self {
        Self { source: None }
    }

    pub fn source(source: SourceKind) -> Self {
        Self {
            source: Some(source),
        }
    }

    fn sources(&self) -> Vec<SourceKind> {
        match self.source {
            Some(s) => vec![s],
            None => SourceKind::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub position: Position,
    pub record: RawRecord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDiagnostic {
    pub position: Position,
    pub diagnostic: ValidationDiagnostic,
}

/// Read-only connection to a run's store.
pub struct StoreReader {
    conn: Connection,
}

impl StoreReader {
    pub fn read_raw_records(&self, filter: RecordFilter) -> Result<Vec<StoredRecord>, StoreError> {
        read_raw_records(&self.conn, filter)
    }

    pub fn read_diagnostics(&self) -> Result<Vec<StoredDiagnostic>, StoreError> {
        read_diagnostics(&self.conn)
    }

    pub fn read_metadata(&self) -> Result<RunContext, StoreError> {
        read_metadata(&self.conn)
    }
}

/// Records of the selected sources, in source order, then by original row
/// number, then by position.
fn read_raw_records(conn: &Connection, filter: RecordFilter) -> Result<Vec<StoredRecord>, StoreError> {
    let mut out = Vec::new();
    for source in filter.sources() {
        let table = source.raw_table();
        let sql = format!(
            "SELECT position, row_number, row_json FROM {table} ORDER BY row_number, position"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        for row in rows {
            let (position, row_number, json) = row?;
            let values: BTreeMap<String, Option<String>> =
                serde_json::from_str(&json).map_err(|e| StoreError::Corrupt {
                    table: table.to_string(),
                    position,
                    message: e.to_string(),
                })?;
            out.push(StoredRecord {
                position: Position(position as u64),
                record: RawRecord {
                    source,
                    row_number,
                    values,
                },
            });
        }
    }
    Ok(out)
}

fn read_diagnostics(conn: &Connection) -> Result<Vec<StoredDiagnostic>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT position, source, row_number, column_name, error_kind, message, severity \
         FROM validation_diagnostics ORDER BY position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<u32>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (position, source, row_number, column, kind, message, severity) = row?;
        let corrupt = |what: &str, value: &str| StoreError::Corrupt {
            table: "validation_diagnostics".to_string(),
            position,
            message: format!("unknown {what} '{value}'"),
        };
        let diagnostic = ValidationDiagnostic {
            source: SourceKind::parse(&source).ok_or_else(|| corrupt("source", &source))?,
            row_number,
            column,
            kind: DiagnosticKind::parse(&kind).ok_or_else(|| corrupt("error kind", &kind))?,
            message,
            severity: Severity::parse(&severity).ok_or_else(|| corrupt("severity", &severity))?,
        };
        out.push(StoredDiagnostic {
            position: Position(position as u64),
            diagnostic,
        });
    }
    Ok(out)
}

fn read_metadata(conn: &Connection) -> Result<RunContext, StoreError> {
    let row = conn.query_row(
        "SELECT run_id, created_at, app_version, git_commit, build_date, input_fingerprint FROM metadata",
        [],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        },
    );
    let (run_id, created_at, app_version, git_commit, build_date, fingerprint) = match row {
        Ok(r) => r,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(StoreError::MissingMetadata),
        Err(e) => return Err(e.into()),
    };

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table: "metadata".to_string(),
            position: 1,
            message: format!("bad created_at '{created_at}': {e}"),
        })?;

    Ok(RunContext::new(
        run_id,
        created_at,
        RunContext::parse_fingerprints(&fingerprint),
        BuildInfo {
            app_version,
            git_commit,
            build_date,
        },
    ))
}
