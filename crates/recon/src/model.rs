use std::collections::BTreeSet;

use icr_core::{IssueRecord, VesselRecord};
use serde::{Deserialize, Serialize};

/// Which AMS-eligible vessels the engine processes. A hard filter: vessels
/// outside it are skipped with no partial accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    #[default]
    All,
    /// Ship ids as they appear in the vessel index.
    Only(BTreeSet<String>),
}

impl Selection {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(ids.into_iter().map(Into::into).collect())
    }
}

/// Issues for one processed vessel, sorted by (item key, kind, edition).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselIssues {
    pub vessel: VesselRecord,
    pub issues: Vec<IssueRecord>,
}

/// Something worth recording in the run summary that is not an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineNote {
    pub ship_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    /// Ship ids of every AMS-eligible vessel, sorted.
    pub eligible: Vec<String>,
    /// Selected eligible vessels in ship-id order, including those with no
    /// issues.
    pub vessels: Vec<VesselIssues>,
    pub notes: Vec<EngineNote>,
}

impl ComparisonOutcome {
    pub fn vessels_processed(&self) -> usize {
        self.vessels.len()
    }

    pub fn vessels_with_issues(&self) -> usize {
        self.vessels.iter().filter(|v| !v.issues.is_empty()).count()
    }

    pub fn total_issues(&self) -> usize {
        self.vessels.iter().map(|v| v.issues.len()).sum()
    }

    /// All issues, vessel by vessel.
    pub fn issues(&self) -> impl Iterator<Item = &IssueRecord> {
        self.vessels.iter().flat_map(|v| v.issues.iter())
    }

    pub fn for_vessel(&self, ship_id: &str) -> Option<&VesselIssues> {
        self.vessels.iter().find(|v| v.vessel.ship_id == ship_id)
    }
}
