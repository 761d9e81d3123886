// Full runs over CSV and workbook sources in a temporary runs directory.

use std::path::Path;

use icr_config::ComplianceConfig;
use icr_core::{Counter, EntryLevel, IssueKind, Phase, RunSummary};
use icr_io::{SourcePaths, WorkspaceError};
use icr_pipeline::{DeliveryBundle, Run, RunError, RunOptions, ISSUES_FILE, SUMMARY_FILE};
use icr_recon::Selection;

const REFERENCE: &str = "item,itmdesc,itmclss,upccode,edition,currdate\n\
                         A1,Chart A,C,111,v2.0,2026-01-01\n\
                         A2,Chart B,C,222,v2.0,2026-01-01\n\
                         A4,Chart D,C,444,v2.0,2026-01-01\n";
const INDEX: &str = "shipid,shipname,custno,imono,shipstat,email,note1,note2,note3\n\
                     V1,Aurora,100,9000001,active,v1@fleet.example,AMS,,\n\
                     V2,Borealis,101,9000002,active,v2@fleet.example,,,\n";
const ONBOARD: &str = "shipid,item,edition,storeedt,descrip\n\
                       V1,A1, v2.0 ,v2.0,Chart A\n\
                       V1,A2,,,Chart B\n\
                       V1,A3,v1.0,v1.0,Chart C\n\
                       V1,A4,v1.0,v1.0,Chart D\n\
                       V2,A4,v1.0,v1.0,Chart D\n";

fn write_sources(dir: &Path, reference: &str, index: &str, onboard: &str) -> SourcePaths {
    let write = |name: &str, body: &str| {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    };
    SourcePaths::new(
        write("reference.csv", reference),
        write("index.csv", index),
        write("onboard.csv", onboard),
    )
}

fn options(base: &Path) -> RunOptions {
    RunOptions {
        base_dir: Some(base.join("runs")),
        ..RunOptions::default()
    }
}

fn read_summary(path: &Path) -> RunSummary {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn clean_run_produces_bundle_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_sources(dir.path(), REFERENCE, INDEX, ONBOARD);

    let run = Run::start(paths, ComplianceConfig::default(), &options(dir.path())).unwrap();
    let mut ingested = run.ingest().unwrap();
    assert!(!ingested.requires_acknowledgement());

    let bundle = ingested.compare(&Selection::All).unwrap();
    assert_eq!(bundle.vessels.len(), 1);
    let v1 = &bundle.vessels[0];
    assert_eq!(v1.contact.ship_id, "V1");
    assert_eq!(v1.contact.vessel_email.as_deref(), Some("v1@fleet.example"));
    let kinds: Vec<IssueKind> = v1.issues.iter().map(|i| i.kind).collect();
    assert_eq!(
        kinds,
        vec![IssueKind::MissingOnboard, IssueKind::MissingReference, IssueKind::Outdated]
    );

    let summary = ingested.summary();
    assert_eq!(summary.counter(Counter::RowsIngested), 10);
    assert_eq!(summary.counter(Counter::IngestionWarnings), 0);
    assert_eq!(summary.counter(Counter::VesselsFound), 1);
    assert_eq!(summary.counter(Counter::VesselsSelected), 1);
    assert_eq!(summary.counter(Counter::VesselsProcessed), 1);
    assert_eq!(summary.counter(Counter::VesselsWithIssues), 1);
    assert_eq!(summary.counter(Counter::TotalIssueRows), 3);

    let ws = ingested.workspace();
    let written: DeliveryBundle =
        serde_json::from_str(&std::fs::read_to_string(ws.output_file(ISSUES_FILE)).unwrap()).unwrap();
    assert_eq!(written, bundle);
    assert_eq!(read_summary(&ws.output_file(SUMMARY_FILE)), *ingested.summary());
    assert!(ws.store_path().is_file());
}

#[test]
fn warnings_pause_until_acknowledged() {
    let dir = tempfile::tempdir().unwrap();
    let index = "shipid,shipname,custno,imono,shipstat,email,note1,note2,note3\n\
                 V1,Aurora,100,9000001,active,,AMS,,\n";
    let paths = write_sources(dir.path(), REFERENCE, index, ONBOARD);

    let mut ingested = Run::start(paths, ComplianceConfig::default(), &options(dir.path()))
        .unwrap()
        .ingest()
        .unwrap();
    assert!(ingested.requires_acknowledgement());
    assert_eq!(ingested.summary().counter(Counter::IngestionWarnings), 1);

    let err = ingested.compare(&Selection::All).unwrap_err();
    assert!(matches!(err, RunError::WarningsNotAcknowledged { count: 1 }));
    assert!(!err.is_fatal());

    ingested.acknowledge_warnings();
    let bundle = ingested.compare(&Selection::All).unwrap();
    assert_eq!(bundle.issue_count(), 3);

    let again = ingested.compare(&Selection::All).unwrap_err();
    assert!(matches!(again, RunError::AlreadyCompared));
}

#[test]
fn fatal_source_ends_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let onboard = "shipid,item,storeedt,descrip\nV1,A1,v2.0,Chart A\n";
    let paths = write_sources(dir.path(), REFERENCE, INDEX, onboard);

    let run = Run::start(paths, ComplianceConfig::default(), &options(dir.path())).unwrap();
    let summary_path = run.workspace().output_file(SUMMARY_FILE);
    let err = run.ingest().err().unwrap();

    assert!(err.is_fatal());
    assert!(err.to_string().contains("onboard_edition"));

    let summary = read_summary(&summary_path);
    let errors: Vec<_> = summary
        .entries_for(Phase::Ingestion)
        .filter(|e| e.level == EntryLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(summary.counter(Counter::RowsIngested), 0);
}

#[test]
fn store_read_failure_leaves_comparison_available() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_sources(dir.path(), REFERENCE, INDEX, ONBOARD);
    let mut ingested = Run::start(paths, ComplianceConfig::default(), &options(dir.path()))
        .unwrap()
        .ingest()
        .unwrap();

    let store = ingested.workspace().store_path();
    let aside = store.with_extension("moved");
    std::fs::rename(&store, &aside).unwrap();
    let err = ingested.compare(&Selection::All).unwrap_err();
    assert!(matches!(err, RunError::Store(_)));

    std::fs::rename(&aside, &store).unwrap();
    let bundle = ingested.compare(&Selection::All).unwrap();
    assert_eq!(bundle.issue_count(), 3);
}

#[test]
fn selecting_an_ineligible_vessel_is_a_contract_violation() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_sources(dir.path(), REFERENCE, INDEX, ONBOARD);
    let mut ingested = Run::start(paths, ComplianceConfig::default(), &options(dir.path()))
        .unwrap()
        .ingest()
        .unwrap();

    let err = ingested.compare(&Selection::only(["V2"])).unwrap_err();
    assert!(err.is_contract_violation());
    let errors = ingested
        .summary()
        .entries_for(Phase::Comparison)
        .filter(|e| e.level == EntryLevel::Error)
        .count();
    assert_eq!(errors, 1);
}

#[test]
fn delivery_failure_is_recorded_without_touching_issues() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_sources(dir.path(), REFERENCE, INDEX, ONBOARD);
    let mut ingested = Run::start(paths, ComplianceConfig::default(), &options(dir.path()))
        .unwrap()
        .ingest()
        .unwrap();
    ingested.compare(&Selection::All).unwrap();

    let issues_path = ingested.workspace().output_file(ISSUES_FILE);
    let before = std::fs::read(&issues_path).unwrap();

    ingested
        .record_delivery_failure(Some("V1"), "mail relay refused the message")
        .unwrap();

    assert_eq!(std::fs::read(&issues_path).unwrap(), before);
    let summary = read_summary(&ingested.workspace().output_file(SUMMARY_FILE));
    let delivery: Vec<_> = summary.entries_for(Phase::Delivery).collect();
    assert_eq!(delivery.len(), 1);
    assert_eq!(delivery[0].vessel.as_deref(), Some("V1"));
    assert_eq!(summary.counter(Counter::TotalIssueRows), 3);
}

#[test]
fn explicit_run_id_is_used_once() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_sources(dir.path(), REFERENCE, INDEX, ONBOARD);
    let opts = RunOptions {
        run_id: Some("audit-2026-10".into()),
        ..options(dir.path())
    };

    let run = Run::start(paths.clone(), ComplianceConfig::default(), &opts).unwrap();
    assert_eq!(run.context().run_id, "audit-2026-10");
    let err = Run::start(paths.clone(), ComplianceConfig::default(), &opts).err().unwrap();
    assert!(matches!(err, RunError::Workspace(WorkspaceError::RunExists(_))));

    let both = RunOptions {
        run_id: Some("audit-2026-11".into()),
        suffix: Some("weekly".into()),
        ..options(dir.path())
    };
    let err = Run::start(paths, ComplianceConfig::default(), &both).err().unwrap();
    assert!(matches!(err, RunError::Workspace(WorkspaceError::RunIdWithSuffix)));
}

#[test]
fn workbook_sources_run_end_to_end() {
    use rust_xlsxwriter::Workbook;

    let dir = tempfile::tempdir().unwrap();
    let csv = write_sources(dir.path(), REFERENCE, INDEX, ONBOARD);

    let onboard_xlsx = dir.path().join("onboard.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (r, row) in [
        ["ShipID", "Item", "Edition", "StoreEdt", "Descrip"],
        ["V1", "a4", "v2.0", "v2.0", "Chart D"],
    ]
    .iter()
    .enumerate()
    {
        for (c, value) in row.iter().enumerate() {
            sheet.write_string(r as u32, c as u16, *value).unwrap();
        }
    }
    workbook.save(&onboard_xlsx).unwrap();

    let paths = SourcePaths::new(csv.reference_catalog, csv.vessel_index, onboard_xlsx);
    let mut ingested = Run::start(paths, ComplianceConfig::default(), &options(dir.path()))
        .unwrap()
        .ingest()
        .unwrap();
    let bundle = ingested.compare(&Selection::All).unwrap();
    assert_eq!(bundle.issue_count(), 0);
    assert_eq!(ingested.summary().counter(Counter::VesselsProcessed), 1);
}
