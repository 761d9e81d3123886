//! `icr-core`: shared data model for inventory compliance runs.
//!
//! Plain data only: run identity, raw rows as persisted, validation
//! diagnostics, the canonical records the comparison engine consumes, the
//! issues it produces, and the append-only run summary.

pub mod model;
pub mod summary;

pub use model::{
    BuildInfo, CanonicalSet, DiagnosticKind, InputFingerprint, IssueKind, IssueRecord,
    OnboardItemRecord, Position, RawRecord, ReferenceItemRecord, RunContext, Severity,
    SourceKind, ValidationDiagnostic, VesselRecord,
};
pub use summary::{Counter, EntryLevel, Phase, RunSummary, SummaryEntry, SummaryError};
