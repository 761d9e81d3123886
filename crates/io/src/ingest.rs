//! Source ingestion.
//!
//! Each source walks a fixed state machine:
//!
//! ```text
//! Load -> NormalizeColumns -> ValidateSchema -> ValidateRows -> Persist -> Done
//!   \__________________________/
//!              Failed
//! ```
//!
//! Sources are ingested in [`SourceKind::ALL`] order and the first fatal
//! source stops the pass. Every data row is persisted, including empty and
//! invalid ones; findings go to the diagnostics table. A fatal source writes
//! its diagnostics in their own transaction and no raw rows.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use icr_config::{ComplianceConfig, SourceSchema};
use icr_core::{DiagnosticKind, RawRecord, SourceKind, ValidationDiagnostic};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::sheet::{read_table, Table, TableRow};
use crate::store::RecordStore;

// ---------------------------------------------------------------------------
// Inputs + results
// ---------------------------------------------------------------------------

/// Paths of the three source files for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePaths {
    pub reference_catalog: PathBuf,
    pub vessel_index: PathBuf,
    pub onboard_inventory: PathBuf,
}

impl SourcePaths {
    pub fn new(
        reference_catalog: impl Into<PathBuf>,
        vessel_index: impl Into<PathBuf>,
        onboard_inventory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reference_catalog: reference_catalog.into(),
            vessel_index: vessel_index.into(),
            onboard_inventory: onboard_inventory.into(),
        }
    }

    pub fn path(&self, source: SourceKind) -> &Path {
        match source {
            SourceKind::ReferenceCatalog => &self.reference_catalog,
            SourceKind::VesselIndex => &self.vessel_index,
            SourceKind::OnboardInventory => &self.onboard_inventory,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPhase {
    Load,
    NormalizeColumns,
    ValidateSchema,
    ValidateRows,
    Persist,
    Done,
    Failed,
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::NormalizeColumns => "normalize_columns",
            Self::ValidateSchema => "validate_schema",
            Self::ValidateRows => "validate_rows",
            Self::Persist => "persist",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-source outcome of a successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub source: SourceKind,
    pub path: PathBuf,
    pub rows_seen: usize,
    pub rows_persisted: usize,
    pub warnings: usize,
    pub phase: IngestPhase,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub run_id: String,
    pub sources: Vec<SourceStats>,
    /// Every warning diagnostic, in persisted order.
    pub warnings: Vec<ValidationDiagnostic>,
}

impl IngestionReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn rows_persisted(&self) -> usize {
        self.sources.iter().map(|s| s.rows_persisted).sum()
    }

    pub fn stats(&self, source: SourceKind) -> Option<&SourceStats> {
        self.sources.iter().find(|s| s.source == source)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Ingest all three sources into `store`.
///
/// Returns [`IngestError::Fatal`] for the first source that cannot be
/// ingested. Sources before it stay committed; the caller must not compare.
pub fn ingest_sources(
    store: &mut RecordStore,
    paths: &SourcePaths,
    config: &ComplianceConfig,
) -> Result<IngestionReport, IngestError> {
    let run_id = store.run_id().to_string();
    let mut report = IngestionReport {
        run_id: run_id.clone(),
        sources: Vec::with_capacity(SourceKind::ALL.len()),
        warnings: Vec::new(),
    };

    for source in SourceKind::ALL {
        let ingest = SourceIngest::new(&run_id, source, paths.path(source), config.schema(source));
        let (stats, warnings) = ingest.run(store)?;
        log::info!(
            "[{run_id}] {source}: {} rows persisted, {} warnings",
            stats.rows_persisted,
            stats.warnings
        );
        report.sources.push(stats);
        report.warnings.extend(warnings);
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Per-source state machine
// ---------------------------------------------------------------------------

struct SourceIngest<'a> {
    run_id: &'a str,
    source: SourceKind,
    path: &'a Path,
    schema: SourceSchema,
    phase: IngestPhase,
    diagnostics: Vec<ValidationDiagnostic>,
}

/// Canonical column → index of its first occurrence in the header row.
type ColumnMap = Vec<(String, usize)>;

impl<'a> SourceIngest<'a> {
    fn new(run_id: &'a str, source: SourceKind, path: &'a Path, schema: SourceSchema) -> Self {
        Self {
            run_id,
            source,
            path,
            schema,
            phase: IngestPhase::Load,
            diagnostics: Vec::new(),
        }
    }

    fn run(mut self, store: &mut RecordStore) -> Result<(SourceStats, Vec<ValidationDiagnostic>), IngestError> {
        self.enter(IngestPhase::Load);
        let (header, rows) = match self.load() {
            Ok(loaded) => loaded,
            Err(fatal) => return Err(self.fail(store, fatal)?),
        };

        self.enter(IngestPhase::NormalizeColumns);
        let columns = self.normalize_columns(&header);

        self.enter(IngestPhase::ValidateSchema);
        if let Err(fatal) = self.validate_schema(&header, &columns) {
            return Err(self.fail(store, fatal)?);
        }

        self.enter(IngestPhase::ValidateRows);
        let records: Vec<RawRecord> = rows
            .iter()
            .map(|row| self.validate_row(row, &columns))
            .collect();

        self.enter(IngestPhase::Persist);
        self.persist(store, &records)?;
        self.enter(IngestPhase::Done);

        let warnings: Vec<ValidationDiagnostic> =
            self.diagnostics.into_iter().filter(|d| !d.is_fatal()).collect();
        let stats = SourceStats {
            source: self.source,
            path: self.path.to_path_buf(),
            rows_seen: rows.len(),
            rows_persisted: records.len(),
            warnings: warnings.len(),
            phase: IngestPhase::Done,
        };
        Ok((stats, warnings))
    }

    fn enter(&mut self, phase: IngestPhase) {
        log::debug!("[{}] {}: {} -> {}", self.run_id, self.source, self.phase, phase);
        self.phase = phase;
    }

    fn diagnostic(
        &self,
        kind: DiagnosticKind,
        row_number: Option<u32>,
        column: Option<&str>,
        message: String,
    ) -> ValidationDiagnostic {
        ValidationDiagnostic::new(self.source, kind, row_number, column, message)
    }

    // -- Load ---------------------------------------------------------------

    /// Header and data rows, or the fatal diagnostic that ends this source.
    fn load(&self) -> Result<(TableRow, Vec<TableRow>), Vec<ValidationDiagnostic>> {
        let source = self.source;
        let display = self.path.display();

        let Table { header, rows } = read_table(self.path).map_err(|e| {
            vec![self.diagnostic(
                DiagnosticKind::UnreadableFile,
                None,
                None,
                format!("{source}: cannot read {display}: {e}"),
            )]
        })?;

        let header = header.ok_or_else(|| {
            vec![self.diagnostic(
                DiagnosticKind::EmptyWorksheet,
                None,
                None,
                format!("{source}: first worksheet of {display} is empty"),
            )]
        })?;

        if header.is_blank() {
            return Err(vec![self.diagnostic(
                DiagnosticKind::MissingHeader,
                Some(header.row_number),
                None,
                format!("{source}: header row {} of {display} is blank", header.row_number),
            )]);
        }

        if rows.is_empty() {
            return Err(vec![self.diagnostic(
                DiagnosticKind::EmptyWorksheet,
                None,
                None,
                format!("{source}: {display} has a header but no data rows"),
            )]);
        }

        Ok((header, rows))
    }

    // -- NormalizeColumns ---------------------------------------------------

    fn normalize_columns(&mut self, header: &TableRow) -> ColumnMap {
        let mut columns: ColumnMap = Vec::new();
        for (idx, cell) in header.cells.iter().enumerate() {
            let Some(name) = self.schema.canonical_name(cell) else {
                continue;
            };
            if columns.iter().any(|(existing, _)| *existing == name) {
                let diag = self.diagnostic(
                    DiagnosticKind::DuplicateHeader,
                    Some(header.row_number),
                    Some(name.as_str()),
                    format!(
                        "{}: duplicate header '{name}' in column {}, first occurrence kept",
                        self.source,
                        idx + 1
                    ),
                );
                self.diagnostics.push(diag);
                continue;
            }
            columns.push((name, idx));
        }
        columns
    }

    // -- ValidateSchema -----------------------------------------------------

    fn validate_schema(&self, header: &TableRow, columns: &ColumnMap) -> Result<(), Vec<ValidationDiagnostic>> {
        let mut missing: Vec<&str> = self
            .schema
            .required_columns
            .iter()
            .map(String::as_str)
            .filter(|req| !columns.iter().any(|(name, _)| name == req))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort_unstable();

        Err(missing
            .into_iter()
            .map(|column| {
                self.diagnostic(
                    DiagnosticKind::MissingRequiredColumn,
                    Some(header.row_number),
                    Some(column),
                    format!(
                        "{}: required column '{column}' not found in {}",
                        self.source,
                        self.path.display()
                    ),
                )
            })
            .collect())
    }

    // -- ValidateRows -------------------------------------------------------

    fn validate_row(&mut self, row: &TableRow, columns: &ColumnMap) -> RawRecord {
        let values: BTreeMap<String, Option<String>> = columns
            .iter()
            .map(|(name, idx)| (name.clone(), row.cell(*idx).map(str::to_string)))
            .collect();
        let record = RawRecord {
            source: self.source,
            row_number: row.row_number,
            values,
        };
        let findings = validate_record(&record, &self.schema);
        self.diagnostics.extend(findings);
        record
    }

    // -- Persist ------------------------------------------------------------

    fn persist(&self, store: &mut RecordStore, records: &[RawRecord]) -> Result<(), IngestError> {
        for diag in &self.diagnostics {
            log::warn!("[{}] {}", self.run_id, diag.message);
        }

        let tx = store.begin()?;
        for record in records {
            tx.append_raw_record(record)?;
        }
        for diag in &self.diagnostics {
            tx.append_diagnostic(diag)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Record header warnings plus the fatal findings, then build the error.
    fn fail(
        &mut self,
        store: &mut RecordStore,
        fatal: Vec<ValidationDiagnostic>,
    ) -> Result<IngestError, IngestError> {
        log::debug!("[{}] {}: {} -> {}", self.run_id, self.source, self.phase, IngestPhase::Failed);
        self.phase = IngestPhase::Failed;

        let message = match fatal.as_slice() {
            [only] => only.message.clone(),
            many => {
                let columns: Vec<&str> = many.iter().filter_map(|d| d.column.as_deref()).collect();
                format!(
                    "{}: required columns not found in {}: {}",
                    self.source,
                    self.path.display(),
                    columns.join(", ")
                )
            }
        };
        log::error!("[{}] {message}", self.run_id);

        self.diagnostics.extend(fatal);
        let tx = store.begin()?;
        for diag in &self.diagnostics {
            tx.append_diagnostic(diag)?;
        }
        tx.commit()?;

        Ok(IngestError::Fatal {
            input: self.source,
            message,
            diagnostics: std::mem::take(&mut self.diagnostics),
        })
    }
}

/// Row-level findings for one record. Pure; safe to run rows in any order.
///
/// An empty row yields only `empty_row`. A row missing a key yields one
/// `missing_key_field` per key and skips the optional-field checks.
pub fn validate_record(record: &RawRecord, schema: &SourceSchema) -> Vec<ValidationDiagnostic> {
    let source = record.source;
    let row = record.row_number;

    if record.is_empty() {
        return vec![ValidationDiagnostic::new(
            source,
            DiagnosticKind::EmptyRow,
            Some(row),
            None,
            format!("{source}: row {row} is empty"),
        )];
    }

    let missing_keys: Vec<ValidationDiagnostic> = schema
        .key_columns
        .iter()
        .filter(|key| record.is_blank(key))
        .map(|key| {
            ValidationDiagnostic::new(
                source,
                DiagnosticKind::MissingKeyField,
                Some(row),
                Some(key.as_str()),
                format!("{source}: missing key field '{key}' on row {row}"),
            )
        })
        .collect();
    if !missing_keys.is_empty() {
        return missing_keys;
    }

    schema
        .warning_columns
        .iter()
        .filter(|column| record.is_blank(column))
        .map(|column| {
            ValidationDiagnostic::new(
                source,
                DiagnosticKind::MissingOptionalField,
                Some(row),
                Some(column.as_str()),
                format!("{source}: missing optional field '{column}' on row {row}"),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use icr_core::{BuildInfo, RunContext};

    const REFERENCE: &str = "item,itmdesc,itmclss,upccode,edition,currdate\n\
                             A1,Chart A,C,111,5,2026-01-01\n\
                             A2,Chart B,C,222,3,2026-01-01\n";
    const INDEX: &str = "shipid,shipname,custno,imono,shipstat,email,note1,note2,note3\n\
                         V1,Aurora,100,9000001,active,v1@example.com,AMS,,\n";
    const ONBOARD: &str = "shipid,item,edition,storeedt,descrip\n\
                           V1,A1,4,4,Chart A\n";

    struct Fixture {
        _dir: tempfile::TempDir,
        store: RecordStore,
        paths: SourcePaths,
    }

    fn fixture(reference: &str, index: &str, onboard: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let p = dir.path().join(name);
            std::fs::write(&p, body).unwrap();
            p
        };
        let paths = SourcePaths::new(
            write("reference.csv", reference),
            write("index.csv", index),
            write("onboard.csv", onboard),
        );
        let ctx = RunContext::new("t1", Utc::now(), Vec::new(), BuildInfo::current());
        let store = RecordStore::open_at(&dir.path().join("run.sqlite"), "t1")
            .unwrap()
            .initialize_schema(&ctx)
            .unwrap();
        Fixture {
            _dir: dir,
            store,
            paths,
        }
    }

    #[test]
    fn clean_sources_have_no_warnings() {
        let mut fx = fixture(REFERENCE, INDEX, ONBOARD);
        let report = ingest_sources(&mut fx.store, &fx.paths, &ComplianceConfig::default()).unwrap();
        assert!(!report.has_warnings());
        assert_eq!(report.rows_persisted(), 4);
        assert!(report.sources.iter().all(|s| s.phase == IngestPhase::Done));

        let stored = fx
            .store
            .read_raw_records(crate::RecordFilter::source(SourceKind::OnboardInventory))
            .unwrap();
        assert_eq!(stored[0].record.get("onboard_edition"), Some("4"));
        assert_eq!(stored[0].record.row_number, 2);
    }

    #[test]
    fn blank_csv_line_is_an_empty_row_warning() {
        let onboard = "shipid,item,edition,storeedt,descrip\nV1,A1,4,4,Chart A\n\nV1,A2,3,3,Chart B\n";
        let mut fx = fixture(REFERENCE, INDEX, onboard);
        let report = ingest_sources(&mut fx.store, &fx.paths, &ComplianceConfig::default()).unwrap();

        let stats = report.stats(SourceKind::OnboardInventory).unwrap();
        assert_eq!(stats.rows_seen, 3);
        assert_eq!(stats.rows_persisted, 3);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].kind, DiagnosticKind::EmptyRow);
        assert_eq!(report.warnings[0].row_number, Some(3));

        let stored = fx
            .store
            .read_raw_records(crate::RecordFilter::source(SourceKind::OnboardInventory))
            .unwrap();
        let rows: Vec<u32> = stored.iter().map(|s| s.record.row_number).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        assert!(stored[1].record.is_empty());
    }

    #[test]
    fn duplicate_header_keeps_first_column() {
        let reference = "item,ITEM ,itmdesc,itmclss,upccode,edition,currdate\n\
                         A1,ZZ,Chart A,C,111,5,2026-01-01\n";
        let mut fx = fixture(reference, INDEX, ONBOARD);
        let report = ingest_sources(&mut fx.store, &fx.paths, &ComplianceConfig::default()).unwrap();

        assert_eq!(report.warnings.len(), 1);
        let warning = &report.warnings[0];
        assert_eq!(warning.kind, DiagnosticKind::DuplicateHeader);
        assert_eq!(warning.column.as_deref(), Some("item"));
        assert_eq!(warning.row_number, Some(1));

        let stored = fx
            .store
            .read_raw_records(crate::RecordFilter::source(SourceKind::ReferenceCatalog))
            .unwrap();
        assert_eq!(stored[0].record.get("item"), Some("A1"));
    }

    #[test]
    fn invalid_rows_are_persisted_with_warnings() {
        let onboard = "shipid,item,edition,storeedt,descrip\n\
                       V1,A1,4,4,Chart A\n\
                       ,,,,\n\
                       V1,,2,2,Unknown\n";
        let index = "shipid,shipname,custno,imono,shipstat,email,note1,note2,note3\n\
                     V1,Aurora,100,9000001,active,,AMS,,\n";
        let mut fx = fixture(REFERENCE, index, onboard);
        let report = ingest_sources(&mut fx.store, &fx.paths, &ComplianceConfig::default()).unwrap();

        let kinds: Vec<DiagnosticKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::MissingOptionalField,
                DiagnosticKind::EmptyRow,
                DiagnosticKind::MissingKeyField,
            ]
        );
        let onboard_stats = report.stats(SourceKind::OnboardInventory).unwrap();
        assert_eq!(onboard_stats.rows_seen, 3);
        assert_eq!(onboard_stats.rows_persisted, 3);

        let diags = fx.store.read_diagnostics().unwrap();
        assert_eq!(diags.len(), 3);
    }

    #[test]
    fn missing_required_column_is_fatal_and_persists_no_rows() {
        let onboard = "shipid,item,storeedt,descrip\nV1,A1,4,Chart A\n";
        let mut fx = fixture(REFERENCE, INDEX, onboard);
        let err = ingest_sources(&mut fx.store, &fx.paths, &ComplianceConfig::default()).unwrap_err();

        match &err {
            IngestError::Fatal { input, diagnostics, message } => {
                assert_eq!(*input, SourceKind::OnboardInventory);
                assert_eq!(diagnostics.len(), 1);
                assert_eq!(diagnostics[0].column.as_deref(), Some("onboard_edition"));
                assert!(message.contains("onboard_edition"));
            }
            other => panic!("expected fatal, got {other:?}"),
        }
        assert!(err.is_fatal());

        let onboard_rows = fx
            .store
            .read_raw_records(crate::RecordFilter::source(SourceKind::OnboardInventory))
            .unwrap();
        assert!(onboard_rows.is_empty());
        let diags = fx.store.read_diagnostics().unwrap();
        assert!(diags.iter().any(|d| d.diagnostic.is_fatal()));
    }

    #[test]
    fn first_fatal_source_stops_ingestion() {
        let mut fx = fixture(REFERENCE, INDEX, ONBOARD);
        fx.paths.vessel_index = fx.paths.vessel_index.with_file_name("absent.xlsx");
        let err = ingest_sources(&mut fx.store, &fx.paths, &ComplianceConfig::default()).unwrap_err();
        assert!(matches!(err, IngestError::Fatal { input: SourceKind::VesselIndex, .. }));

        let all = fx.store.read_raw_records(crate::RecordFilter::all()).unwrap();
        assert!(all.iter().all(|r| r.record.source == SourceKind::ReferenceCatalog));
    }

    #[test]
    fn header_only_source_is_empty() {
        let mut fx = fixture("item,itmdesc,itmclss,upccode,edition,currdate\n", INDEX, ONBOARD);
        let err = ingest_sources(&mut fx.store, &fx.paths, &ComplianceConfig::default()).unwrap_err();
        match err {
            IngestError::Fatal { diagnostics, .. } => {
                assert_eq!(diagnostics[0].kind, DiagnosticKind::EmptyWorksheet);
            }
            other => panic!("expected fatal, got {other:?}"),
        }
    }

    #[test]
    fn validate_record_skips_optional_checks_when_key_missing() {
        let schema = SourceSchema::defaults(SourceKind::VesselIndex);
        let mut values = BTreeMap::new();
        values.insert("ship_id".to_string(), None);
        values.insert("ship_name".to_string(), Some("Aurora".to_string()));
        values.insert("email".to_string(), None);
        let record = RawRecord {
            source: SourceKind::VesselIndex,
            row_number: 7,
            values,
        };
        let findings = validate_record(&record, &schema);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, DiagnosticKind::MissingKeyField);
        assert_eq!(findings[0].row_number, Some(7));
    }
}
