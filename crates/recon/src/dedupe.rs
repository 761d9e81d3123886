//! Per-vessel issue deduplication.
//!
//! Key: (item match key, issue kind, normalized onboard edition). When two
//! candidates share a key the one with the smallest (item id, onboard
//! edition, current edition) is kept, so the result does not depend on the
//! order candidates arrive in. Output is sorted by key.

use std::collections::BTreeMap;

use icr_core::{IssueKind, IssueRecord};

/// An issue plus the normalized forms it is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub item_key: String,
    pub edition_key: Option<String>,
    pub issue: IssueRecord,
}

type DedupKey = (String, IssueKind, Option<String>);

impl Candidate {
    fn key(&self) -> DedupKey {
        (self.item_key.clone(), self.issue.kind, self.edition_key.clone())
    }

    fn rank(&self) -> (&str, Option<&str>, Option<&str>) {
        (
            self.issue.item_id.as_str(),
            self.issue.onboard_edition.as_deref(),
            self.issue.current_edition.as_deref(),
        )
    }
}

pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut kept: BTreeMap<DedupKey, Candidate> = BTreeMap::new();
    for candidate in candidates {
        let key = candidate.key();
        let replace = kept
            .get(&key)
            .map_or(true, |existing| candidate.rank() < existing.rank());
        if replace {
            kept.insert(key, candidate);
        }
    }
    kept.into_values().collect()
}
