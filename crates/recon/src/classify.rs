//! Issue classification as an ordered rule table.
//!
//! Rules are tried top to bottom and the first whose predicate holds decides
//! the verdict. The last rule always holds, so every item gets exactly one
//! verdict.

use icr_core::{IssueKind, ReferenceItemRecord};

/// One onboard item with its reference lookup, editions already normalized.
#[derive(Debug, Clone, Copy)]
pub struct ItemFacts<'a> {
    pub onboard_edition: Option<&'a str>,
    pub reference: Option<&'a ReferenceItemRecord>,
    pub current_edition: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Clean,
    Issue(IssueKind),
}

pub type Rule = (fn(&ItemFacts<'_>) -> bool, Verdict);

pub const RULES: [Rule; 4] = [
    (onboard_edition_blank, Verdict::Issue(IssueKind::MissingOnboard)),
    (reference_missing, Verdict::Issue(IssueKind::MissingReference)),
    (editions_differ, Verdict::Issue(IssueKind::Outdated)),
    (always, Verdict::Clean),
];

fn onboard_edition_blank(f: &ItemFacts<'_>) -> bool {
    f.onboard_edition.is_none()
}

fn reference_missing(f: &ItemFacts<'_>) -> bool {
    f.reference.is_none()
}

fn editions_differ(f: &ItemFacts<'_>) -> bool {
    f.onboard_edition != f.current_edition
}

fn always(_: &ItemFacts<'_>) -> bool {
    true
}

pub fn classify(facts: &ItemFacts<'_>) -> Verdict {
    RULES
        .iter()
        .find(|(applies, _)| applies(facts))
        .map(|(_, verdict)| *verdict)
        .unwrap_or(Verdict::Clean)
}
