//! The read-only hand-off to reporting and delivery collaborators.

use std::fs;
use std::path::Path;

use icr_core::{IssueRecord, RunContext, RunSummary, VesselRecord};
use icr_recon::ComparisonOutcome;
use serde::{Deserialize, Serialize};

use crate::error::RunError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselContact {
    pub ship_id: String,
    pub name: Option<String>,
    pub vessel_email: Option<String>,
    pub office_email: Option<String>,
}

impl From<&VesselRecord> for VesselContact {
    fn from(v: &VesselRecord) -> Self {
        Self {
            ship_id: v.ship_id.clone(),
            name: v.name.clone(),
            vessel_email: v.vessel_email.clone(),
            office_email: v.office_email.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselBundle {
    pub contact: VesselContact,
    pub issues: Vec<IssueRecord>,
}

/// Issues grouped by vessel, each vessel's contact fields, and the run
/// manifest as of the end of comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryBundle {
    pub context: RunContext,
    pub vessels: Vec<VesselBundle>,
    pub summary: RunSummary,
}

impl DeliveryBundle {
    pub fn new(context: RunContext, outcome: &ComparisonOutcome, summary: RunSummary) -> Self {
        let vessels = outcome
            .vessels
            .iter()
            .map(|v| VesselBundle {
                contact: VesselContact::from(&v.vessel),
                issues: v.issues.clone(),
            })
            .collect();
        Self {
            context,
            vessels,
            summary,
        }
    }

    /// Vessels that have at least one issue.
    pub fn vessels_with_issues(&self) -> impl Iterator<Item = &VesselBundle> {
        self.vessels.iter().filter(|v| !v.issues.is_empty())
    }

    pub fn issue_count(&self) -> usize {
        self.vessels.iter().map(|v| v.issues.len()).sum()
    }
}

/// Pretty JSON, written whole.
pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), RunError> {
    let output_err = |message: String| RunError::Output {
        path: path.to_path_buf(),
        message,
    };
    let json = serde_json::to_string_pretty(value).map_err(|e| output_err(e.to_string()))?;
    fs::write(path, json).map_err(|e| output_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use icr_core::{BuildInfo, IssueKind};
    use icr_recon::VesselIssues;
    use std::collections::BTreeMap;

    fn context() -> RunContext {
        let created_at = "2026-10-17T08:00:00Z".parse().unwrap();
        RunContext::new("r1", created_at, Vec::new(), BuildInfo::current())
    }

    fn vessel(id: &str) -> VesselRecord {
        VesselRecord {
            ship_id: id.into(),
            name: Some("Aurora".into()),
            customer_no: Some("100".into()),
            imo_no: None,
            status: None,
            vessel_email: Some("master@aurora.example".into()),
            office_email: Some("ops@owner.example".into()),
            ams: None,
            attributes: BTreeMap::new(),
            row_number: 2,
        }
    }

    #[test]
    fn bundle_keeps_contact_fields_and_issue_order() {
        let outcome = ComparisonOutcome {
            eligible: vec!["V1".into(), "V2".into()],
            vessels: vec![
                VesselIssues {
                    vessel: vessel("V1"),
                    issues: vec![IssueRecord {
                        ship_id: "V1".into(),
                        item_id: "A4".into(),
                        onboard_edition: Some("v1.0".into()),
                        current_edition: Some("v2.0".into()),
                        kind: IssueKind::Outdated,
                    }],
                },
                VesselIssues {
                    vessel: vessel("V2"),
                    issues: Vec::new(),
                },
            ],
            notes: Vec::new(),
        };
        let bundle = DeliveryBundle::new(context(), &outcome, RunSummary::new("r1"));

        assert_eq!(bundle.vessels.len(), 2);
        assert_eq!(bundle.vessels_with_issues().count(), 1);
        assert_eq!(bundle.issue_count(), 1);
        let contact = &bundle.vessels[0].contact;
        assert_eq!(contact.office_email.as_deref(), Some("ops@owner.example"));

        let json = serde_json::to_string(&bundle).unwrap();
        assert!(json.contains("\"OUTDATED\""));
        assert!(!json.contains("customer_no"));
    }

    #[test]
    fn write_json_reports_path_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("no-such-dir").join("issues.json");
        let err = write_json(&missing, &RunSummary::new("r1")).unwrap_err();
        assert!(matches!(err, RunError::Output { .. }));
    }
}
