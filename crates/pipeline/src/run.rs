//! Run orchestration.
//!
//! A run moves forward only: [`Run::start`] → [`Run::ingest`] →
//! [`IngestedRun::compare`]. A fatal ingestion consumes the [`Run`], so a
//! store that failed ingestion can never reach comparison. Warnings pause the
//! run until [`IngestedRun::acknowledge_warnings`] is called.

use std::path::PathBuf;

use icr_config::ComplianceConfig;
use icr_core::{BuildInfo, Counter, EntryLevel, Phase, RunContext, RunSummary, Severity};
use icr_io::{
    fingerprint_sources, ingest_sources, load_canonical_set, IngestError, IngestionReport,
    RecordStore, SourcePaths, Workspace, WorkspaceError,
};
use icr_recon::{compare, ComparisonOutcome, Selection};

use crate::delivery::{write_json, DeliveryBundle};
use crate::error::RunError;
use crate::logging::init_run_logging;
use crate::{ISSUES_FILE, SUMMARY_FILE};

/// Where and how to create the run workspace.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Runs directory; the per-user default when `None`.
    pub base_dir: Option<PathBuf>,
    /// Appended to the generated run id.
    pub suffix: Option<String>,
    /// Exact run id in place of a generated one. Not combinable with `suffix`.
    pub run_id: Option<String>,
    /// Install the process-wide log subscriber writing to `logs/run.log`.
    pub install_logging: bool,
}

/// A run with an initialized, still empty record store.
pub struct Run {
    workspace: Workspace,
    context: RunContext,
    config: ComplianceConfig,
    paths: SourcePaths,
    store: RecordStore,
    summary: RunSummary,
}

impl Run {
    pub fn start(
        paths: SourcePaths,
        config: ComplianceConfig,
        options: &RunOptions,
    ) -> Result<Self, RunError> {
        config.validate()?;

        if options.run_id.is_some() && options.suffix.is_some() {
            return Err(WorkspaceError::RunIdWithSuffix.into());
        }
        let workspace = match (&options.run_id, &options.base_dir) {
            (Some(id), Some(base)) => Workspace::create_with_id(base, id)?,
            (Some(id), None) => {
                Workspace::create_with_id(&icr_config::paths::default_runs_dir()?, id)?
            }
            (None, Some(base)) => Workspace::create_in(base, options.suffix.as_deref())?,
            (None, None) => Workspace::create(options.suffix.as_deref())?,
        };

        if options.install_logging && !init_run_logging(&workspace.log_file()) {
            log::debug!("run log subscriber not installed; using the existing logger");
        }

        let context = RunContext::new(
            workspace.run_id(),
            workspace.created_at(),
            fingerprint_sources(&paths),
            BuildInfo::current(),
        );
        let store = RecordStore::open(&workspace)?.initialize_schema(&context)?;
        let summary = RunSummary::new(workspace.run_id());

        log::info!(
            "[{}] run started at {} ({})",
            context.run_id,
            workspace.root().display(),
            context.combined_fingerprint()
        );

        Ok(Self {
            workspace,
            context,
            config,
            paths,
            store,
            summary,
        })
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Ingest all sources. A fatal source ends the run: the failure is
    /// written to the run manifest and the run is dropped.
    pub fn ingest(mut self) -> Result<IngestedRun, RunError> {
        let run_id = self.context.run_id.clone();
        match ingest_sources(&mut self.store, &self.paths, &self.config) {
            Ok(report) => {
                self.record_ingestion(&report)?;
                self.write_summary()?;
                if report.has_warnings() {
                    log::warn!(
                        "[{run_id}] run has {} warning(s); waiting for acknowledgement",
                        report.warnings.len()
                    );
                }
                Ok(IngestedRun {
                    run: self,
                    report,
                    acknowledged: false,
                    compared: false,
                })
            }
            Err(err) => {
                if let IngestError::Fatal { diagnostics, .. } = &err {
                    for diag in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
                        self.summary
                            .append(Phase::Ingestion, EntryLevel::Warning, None, &diag.message);
                    }
                }
                self.summary
                    .append(Phase::Ingestion, EntryLevel::Error, None, err.to_string());
                self.write_summary()?;
                Err(err.into())
            }
        }
    }

    fn record_ingestion(&mut self, report: &IngestionReport) -> Result<(), RunError> {
        self.summary.increment(
            Phase::Ingestion,
            Counter::RowsIngested,
            report.rows_persisted() as u64,
        )?;
        self.summary.increment(
            Phase::Ingestion,
            Counter::IngestionWarnings,
            report.warnings.len() as u64,
        )?;
        for stats in &report.sources {
            self.summary.append(
                Phase::Ingestion,
                EntryLevel::Info,
                None,
                format!(
                    "{}: {} rows persisted from {}",
                    stats.source,
                    stats.rows_persisted,
                    stats.path.display()
                ),
            );
        }
        for warning in &report.warnings {
            self.summary
                .append(Phase::Ingestion, EntryLevel::Warning, None, &warning.message);
        }
        Ok(())
    }

    fn write_summary(&self) -> Result<(), RunError> {
        write_json(&self.workspace.output_file(SUMMARY_FILE), &self.summary)
    }
}

/// A run whose sources are ingested and committed.
pub struct IngestedRun {
    run: Run,
    report: IngestionReport,
    acknowledged: bool,
    compared: bool,
}

impl IngestedRun {
    pub fn report(&self) -> &IngestionReport {
        &self.report
    }

    pub fn workspace(&self) -> &Workspace {
        &self.run.workspace
    }

    pub fn context(&self) -> &RunContext {
        &self.run.context
    }

    pub fn summary(&self) -> &RunSummary {
        &self.run.summary
    }

    /// True while ingestion warnings are waiting for confirmation.
    pub fn requires_acknowledgement(&self) -> bool {
        self.report.has_warnings() && !self.acknowledged
    }

    /// Caller's explicit decision to proceed despite ingestion warnings.
    pub fn acknowledge_warnings(&mut self) {
        if self.report.has_warnings() && !self.acknowledged {
            log::info!(
                "[{}] {} ingestion warning(s) acknowledged",
                self.run.context.run_id,
                self.report.warnings.len()
            );
            self.run.summary.append(
                Phase::Ingestion,
                EntryLevel::Info,
                None,
                format!("{} warning(s) acknowledged", self.report.warnings.len()),
            );
        }
        self.acknowledged = true;
    }

    /// Compare the selected vessels and write the issue bundle and manifest
    /// to `output/`. Runs at most once.
    pub fn compare(&mut self, selection: &Selection) -> Result<DeliveryBundle, RunError> {
        if self.requires_acknowledgement() {
            return Err(RunError::WarningsNotAcknowledged {
                count: self.report.warnings.len(),
            });
        }
        if self.compared {
            return Err(RunError::AlreadyCompared);
        }

        let run_id = self.run.context.run_id.clone();
        let set = load_canonical_set(&self.run.store.reader()?)?;
        self.compared = true;
        log::debug!(
            "[{run_id}] canonical set: {} vessels, {} onboard rows, {} reference rows",
            set.vessels.len(),
            set.onboard.len(),
            set.reference.len()
        );

        let outcome = match compare(&set, &self.run.config, selection) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("[{run_id}] {err}");
                self.run
                    .summary
                    .append(Phase::Comparison, EntryLevel::Error, None, err.to_string());
                self.run.write_summary()?;
                return Err(err.into());
            }
        };

        self.record_selection(&outcome)?;
        self.record_comparison(&outcome)?;
        log::info!(
            "[{run_id}] {} vessels processed, {} with issues, {} issue rows",
            outcome.vessels_processed(),
            outcome.vessels_with_issues(),
            outcome.total_issues()
        );

        let bundle = DeliveryBundle::new(self.run.context.clone(), &outcome, self.run.summary.clone());
        write_json(&self.run.workspace.output_file(ISSUES_FILE), &bundle)?;
        self.run.write_summary()?;
        Ok(bundle)
    }

    fn record_selection(&mut self, outcome: &ComparisonOutcome) -> Result<(), RunError> {
        let summary = &mut self.run.summary;
        summary.increment(Phase::Selection, Counter::VesselsFound, outcome.eligible.len() as u64)?;
        summary.increment(
            Phase::Selection,
            Counter::VesselsSelected,
            outcome.vessels.len() as u64,
        )?;
        summary.append(
            Phase::Selection,
            EntryLevel::Info,
            None,
            format!(
                "{} of {} AMS-eligible vessels selected",
                outcome.vessels.len(),
                outcome.eligible.len()
            ),
        );
        Ok(())
    }

    fn record_comparison(&mut self, outcome: &ComparisonOutcome) -> Result<(), RunError> {
        let summary = &mut self.run.summary;
        summary.increment(
            Phase::Comparison,
            Counter::VesselsProcessed,
            outcome.vessels_processed() as u64,
        )?;
        summary.increment(
            Phase::Comparison,
            Counter::VesselsWithIssues,
            outcome.vessels_with_issues() as u64,
        )?;
        summary.increment(
            Phase::Comparison,
            Counter::TotalIssueRows,
            outcome.total_issues() as u64,
        )?;
        for note in &outcome.notes {
            summary.append(
                Phase::Comparison,
                EntryLevel::Info,
                note.ship_id.as_deref(),
                &note.message,
            );
        }
        for vessel in &outcome.vessels {
            summary.append(
                Phase::Comparison,
                EntryLevel::Info,
                Some(vessel.vessel.ship_id.as_str()),
                format!("{} issue(s)", vessel.issues.len()),
            );
        }
        Ok(())
    }

    /// Record a failed hand-off for a vessel (or the whole run). Never
    /// retries and never touches the record store; only the manifest grows.
    pub fn record_delivery_failure(
        &mut self,
        ship_id: Option<&str>,
        message: &str,
    ) -> Result<(), RunError> {
        log::error!("[{}] delivery failed: {message}", self.run.context.run_id);
        self.run
            .summary
            .append(Phase::Delivery, EntryLevel::Error, ship_id, message);
        self.run.write_summary()
    }
}
