use std::collections::BTreeMap;

use icr_config::{AmsRule, ComplianceConfig};
use icr_core::{CanonicalSet, IssueKind, IssueRecord, OnboardItemRecord, ReferenceItemRecord, VesselRecord};

use crate::classify::{classify, ItemFacts, Verdict};
use crate::dedupe::{dedupe, Candidate};
use crate::eligibility::AmsMatcher;
use crate::error::CompareError;
use crate::matcher::{group_onboard, index_reference, index_vessels};
use crate::model::{ComparisonOutcome, EngineNote, Selection, VesselIssues};
use crate::normalize::{match_key, normalize_edition};

/// Compare onboard inventory against the reference catalog for every
/// selected AMS-eligible vessel.
///
/// Deterministic and side-effect free: the same set, config and selection
/// always give the same outcome, whatever order the records arrive in.
pub fn compare(
    set: &CanonicalSet,
    config: &ComplianceConfig,
    selection: &Selection,
) -> Result<ComparisonOutcome, CompareError> {
    check_contract(set)?;

    let matching = &config.matching;
    let ams = AmsMatcher::compile(&AmsRule {
        column: config.ams_column(),
        ..config.ams.clone()
    })?;
    let mut notes = Vec::new();

    // Eligibility
    let eligible: BTreeMap<String, &VesselRecord> =
        index_vessels(&set.vessels, matching.vessel_case_sensitive, &mut notes)
            .into_iter()
            .filter(|(_, vessel)| ams.is_eligible(vessel))
            .collect();

    // Selection
    let selected = resolve_selection(&eligible, selection, matching.vessel_case_sensitive)?;

    // Lookup tables
    let reference = index_reference(&set.reference, matching.item_case_sensitive);
    let onboard = group_onboard(&set.onboard, matching.vessel_case_sensitive);

    let mut vessels = Vec::with_capacity(selected.len());
    for (key, vessel) in selected {
        let items = onboard.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        if items.is_empty() {
            notes.push(EngineNote {
                ship_id: Some(vessel.ship_id.clone()),
                message: format!("vessel '{}' has no onboard inventory rows", vessel.ship_id),
            });
        }
        let issues = vessel_issues(vessel, items, &reference, config);
        log::debug!("vessel {}: {} items, {} issues", vessel.ship_id, items.len(), issues.len());
        vessels.push(VesselIssues {
            vessel: vessel.clone(),
            issues,
        });
    }

    let mut eligible_ids: Vec<String> = eligible.values().map(|v| v.ship_id.clone()).collect();
    eligible_ids.sort();
    vessels.sort_by(|a, b| a.vessel.ship_id.cmp(&b.vessel.ship_id));

    Ok(ComparisonOutcome {
        eligible: eligible_ids,
        vessels,
        notes,
    })
}

/// Blank ship ids are filtered during canonicalization; one here is a defect.
fn check_contract(set: &CanonicalSet) -> Result<(), CompareError> {
    if let Some(v) = set.vessels.iter().find(|v| v.ship_id.trim().is_empty()) {
        return Err(CompareError::violation(
            format!("vessel index row {}", v.row_number),
            "canonical vessel record has a blank ship id",
        ));
    }
    if let Some(item) = set.onboard.iter().find(|i| i.ship_id.trim().is_empty()) {
        return Err(CompareError::violation(
            format!("onboard inventory row {}", item.row_number),
            "canonical onboard record has a blank ship id",
        ));
    }
    Ok(())
}

fn resolve_selection<'a>(
    eligible: &BTreeMap<String, &'a VesselRecord>,
    selection: &Selection,
    case_sensitive: bool,
) -> Result<BTreeMap<String, &'a VesselRecord>, CompareError> {
    match selection {
        Selection::All => Ok(eligible.clone()),
        Selection::Only(ids) => {
            let mut picked = BTreeMap::new();
            for id in ids {
                let key = match_key(id, case_sensitive);
                let vessel = eligible.get(&key).ok_or_else(|| {
                    CompareError::violation(
                        "selection",
                        format!("vessel '{id}' is not AMS-eligible"),
                    )
                })?;
                picked.insert(key, *vessel);
            }
            Ok(picked)
        }
    }
}

fn vessel_issues(
    vessel: &VesselRecord,
    items: &[&OnboardItemRecord],
    reference: &BTreeMap<String, &ReferenceItemRecord>,
    config: &ComplianceConfig,
) -> Vec<IssueRecord> {
    let matching = &config.matching;
    let fold = matching.edition_case_fold;

    let candidates: Vec<Candidate> = items
        .iter()
        .filter_map(|item| {
            let item_key = match_key(&item.item_id, matching.item_case_sensitive);
            let found = reference.get(&item_key).copied();
            let onboard_edition = normalize_edition(item.onboard_edition.as_deref(), fold);
            let current_edition =
                found.and_then(|r| normalize_edition(r.current_edition.as_deref(), fold));

            let facts = ItemFacts {
                onboard_edition: onboard_edition.as_deref(),
                reference: found,
                current_edition: current_edition.as_deref(),
            };
            let Verdict::Issue(kind) = classify(&facts) else {
                return None;
            };
            if kind == IssueKind::MissingOnboard && !matching.report_missing_onboard {
                return None;
            }

            Some(Candidate {
                item_key,
                edition_key: onboard_edition,
                issue: IssueRecord {
                    ship_id: vessel.ship_id.clone(),
                    item_id: item.item_id.trim().to_string(),
                    onboard_edition: trimmed(item.onboard_edition.as_deref()),
                    current_edition: found.and_then(|r| trimmed(r.current_edition.as_deref())),
                    kind,
                },
            })
        })
        .collect();

    dedupe(candidates).into_iter().map(|c| c.issue).collect()
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
