//! Append-only run manifest.
//!
//! Every counter has exactly one owning [`Phase`]; only that phase may
//! increment it, and counters never decrease. Entries are appended with a
//! monotonically increasing position and are never removed or rewritten.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Ingestion,
    Selection,
    Comparison,
    Delivery,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingestion => write!(f, "ingestion"),
            Self::Selection => write!(f, "selection"),
            Self::Comparison => write!(f, "comparison"),
            Self::Delivery => write!(f, "delivery"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    RowsIngested,
    IngestionWarnings,
    VesselsFound,
    VesselsSelected,
    VesselsProcessed,
    VesselsWithIssues,
    TotalIssueRows,
}

impl Counter {
    /// The only phase allowed to increment this counter.
    pub fn owner(&self) -> Phase {
        match self {
            Self::RowsIngested | Self::IngestionWarnings => Phase::Ingestion,
            Self::VesselsFound | Self::VesselsSelected => Phase::Selection,
            Self::VesselsProcessed | Self::VesselsWithIssues | Self::TotalIssueRows => {
                Phase::Comparison
            }
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RowsIngested => "rows_ingested",
            Self::IngestionWarnings => "ingestion_warnings",
            Self::VesselsFound => "vessels_found",
            Self::VesselsSelected => "vessels_selected",
            Self::VesselsProcessed => "vessels_processed",
            Self::VesselsWithIssues => "vessels_with_issues",
            Self::TotalIssueRows => "total_issue_rows",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub position: u64,
    pub phase: Phase,
    pub level: EntryLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vessel: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub rows_ingested: u64,
    pub ingestion_warnings: u64,
    pub vessels_found: u64,
    pub vessels_selected: u64,
    pub vessels_processed: u64,
    pub vessels_with_issues: u64,
    pub total_issue_rows: u64,
}

impl Counters {
    fn slot(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::RowsIngested => &mut self.rows_ingested,
            Counter::IngestionWarnings => &mut self.ingestion_warnings,
            Counter::VesselsFound => &mut self.vessels_found,
            Counter::VesselsSelected => &mut self.vessels_selected,
            Counter::VesselsProcessed => &mut self.vessels_processed,
            Counter::VesselsWithIssues => &mut self.vessels_with_issues,
            Counter::TotalIssueRows => &mut self.total_issue_rows,
        }
    }

    pub fn get(&self, counter: Counter) -> u64 {
        match counter {
            Counter::RowsIngested => self.rows_ingested,
            Counter::IngestionWarnings => self.ingestion_warnings,
            Counter::VesselsFound => self.vessels_found,
            Counter::VesselsSelected => self.vessels_selected,
            Counter::VesselsProcessed => self.vessels_processed,
            Counter::VesselsWithIssues => self.vessels_with_issues,
            Counter::TotalIssueRows => self.total_issue_rows,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummaryError {
    #[error("phase '{phase}' cannot update counter '{counter}' (owned by '{owner}')")]
    CounterNotOwned {
        phase: Phase,
        counter: Counter,
        owner: Phase,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    counters: Counters,
    entries: Vec<SummaryEntry>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            counters: Counters::default(),
            entries: Vec::new(),
        }
    }

    /// Add `by` to a counter owned by `phase`. Returns the new value.
    pub fn increment(&mut self, phase: Phase, counter: Counter, by: u64) -> Result<u64, SummaryError> {
        let owner = counter.owner();
        if owner != phase {
            return Err(SummaryError::CounterNotOwned { phase, counter, owner });
        }
        let slot = self.counters.slot(counter);
        *slot = slot.saturating_add(by);
        Ok(*slot)
    }

    /// Append an entry and return its position.
    pub fn append(
        &mut self,
        phase: Phase,
        level: EntryLevel,
        vessel: Option<&str>,
        message: impl Into<String>,
    ) -> u64 {
        let position = self.entries.len() as u64 + 1;
        self.entries.push(SummaryEntry {
            position,
            phase,
            level,
            vessel: vessel.map(str::to_string),
            message: message.into(),
        });
        position
    }

    pub fn counter(&self, counter: Counter) -> u64 {
        self.counters.get(counter)
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn entries_for(&self, phase: Phase) -> impl Iterator<Item = &SummaryEntry> {
        self.entries.iter().filter(move |e| e.phase == phase)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
