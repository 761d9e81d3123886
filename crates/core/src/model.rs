use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One of the three external tabular inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    ReferenceCatalog,
    VesselIndex,
    OnboardInventory,
}

impl SourceKind {
    /// Ingestion order. Reads over "all sources" follow it too.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::ReferenceCatalog,
        SourceKind::VesselIndex,
        SourceKind::OnboardInventory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReferenceCatalog => "reference_catalog",
            Self::VesselIndex => "vessel_index",
            Self::OnboardInventory => "onboard_inventory",
        }
    }

    /// Name of the append-only raw table holding this source's rows.
    pub fn raw_table(&self) -> &'static str {
        match self {
            Self::ReferenceCatalog => "raw_reference_catalog",
            Self::VesselIndex => "raw_vessel_index",
            Self::OnboardInventory => "raw_onboard_inventory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// Application build identifiers recorded with every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub app_version: String,
    pub git_commit: String,
    pub build_date: String,
}

impl BuildInfo {
    /// Identifiers baked in at compile time. `ICR_GIT_COMMIT` and
    /// `ICR_BUILD_DATE` are optional; absent values read as "unknown".
    pub fn current() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            git_commit: option_env!("ICR_GIT_COMMIT").unwrap_or("unknown").to_string(),
            build_date: option_env!("ICR_BUILD_DATE").unwrap_or("unknown").to_string(),
        }
    }
}

/// SHA-256 of one source file, formatted `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFingerprint {
    pub source: SourceKind,
    pub hash: String,
}

/// Identity of a single run. Built once at workspace initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: String,
    pub created_at: DateTime<Utc>,
    pub fingerprints: Vec<InputFingerprint>,
    pub build: BuildInfo,
}

impl RunContext {
    pub fn new(
        run_id: impl Into<String>,
        created_at: DateTime<Utc>,
        mut fingerprints: Vec<InputFingerprint>,
        build: BuildInfo,
    ) -> Self {
        fingerprints.sort_by_key(|f| f.source);
        Self {
            run_id: run_id.into(),
            created_at,
            fingerprints,
            build,
        }
    }

    /// `2026-10-17T08:30:00Z` style timestamp, as stored in run metadata.
    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// All fingerprints as `source=hash` pairs joined by `;`, in source order.
    pub fn combined_fingerprint(&self) -> String {
        self.fingerprints
            .iter()
            .map(|f| format!("{}={}", f.source, f.hash))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Inverse of [`combined_fingerprint`](Self::combined_fingerprint).
    /// Pairs naming an unknown source are skipped.
    pub fn parse_fingerprints(combined: &str) -> Vec<InputFingerprint> {
        combined
            .split(';')
            .filter_map(|pair| {
                let (source, hash) = pair.split_once('=')?;
                Some(InputFingerprint {
                    source: SourceKind::parse(source)?,
                    hash: hash.to_string(),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Raw rows + diagnostics
// ---------------------------------------------------------------------------

/// Stable slot of an appended row in an append-only table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position(pub u64);

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One normalized input row, keyed by canonical column name.
///
/// `row_number` is the 1-based sheet row (the header is row 1). Blank cells
/// are `None`; present values are already trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: SourceKind,
    pub row_number: u32,
    pub values: BTreeMap<String, Option<String>>,
}

impl RawRecord {
    /// Value of a column, `None` when absent or blank.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .get(column)
            .and_then(|v| v.as_deref())
            .filter(|v| !v.trim().is_empty())
    }

    pub fn is_blank(&self, column: &str) -> bool {
        self.get(column).is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.values.keys().all(|k| self.is_blank(k))
    }

    /// Compact JSON of the values. Keys serialize in sorted order.
    pub fn values_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Fatal,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Fatal => "fatal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "warning" => Some(Self::Warning),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnreadableFile,
    EmptyWorksheet,
    MissingHeader,
    MissingRequiredColumn,
    DuplicateHeader,
    EmptyRow,
    MissingKeyField,
    MissingOptionalField,
}

impl DiagnosticKind {
    pub const ALL: [DiagnosticKind; 8] = [
        Self::UnreadableFile,
        Self::EmptyWorksheet,
        Self::MissingHeader,
        Self::MissingRequiredColumn,
        Self::DuplicateHeader,
        Self::EmptyRow,
        Self::MissingKeyField,
        Self::MissingOptionalField,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnreadableFile => "unreadable_file",
            Self::EmptyWorksheet => "empty_worksheet",
            Self::MissingHeader => "missing_header",
            Self::MissingRequiredColumn => "missing_required_column",
            Self::DuplicateHeader => "duplicate_header",
            Self::EmptyRow => "empty_row",
            Self::MissingKeyField => "missing_key_field",
            Self::MissingOptionalField => "missing_optional_field",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }

    /// Severity this kind is always reported with.
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnreadableFile
            | Self::EmptyWorksheet
            | Self::MissingHeader
            | Self::MissingRequiredColumn => Severity::Fatal,
            Self::DuplicateHeader
            | Self::EmptyRow
            | Self::MissingKeyField
            | Self::MissingOptionalField => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validation finding recorded during ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDiagnostic {
    pub source: SourceKind,
    pub row_number: Option<u32>,
    pub column: Option<String>,
    pub kind: DiagnosticKind,
    pub message: String,
    pub severity: Severity,
}

impl ValidationDiagnostic {
    pub fn new(
        source: SourceKind,
        kind: DiagnosticKind,
        row_number: Option<u32>,
        column: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            row_number,
            column: column.map(str::to_string),
            kind,
            message: message.into(),
            severity: kind.severity(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VesselRecord {
    pub ship_id: String,
    pub name: Option<String>,
    pub customer_no: Option<String>,
    pub imo_no: Option<String>,
    pub status: Option<String>,
    pub vessel_email: Option<String>,
    pub office_email: Option<String>,
    pub ams: Option<String>,
    /// Index columns without a dedicated field (notes, custom columns).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub row_number: u32,
}

impl VesselRecord {
    /// Look up a vessel-index column by canonical name.
    pub fn field(&self, column: &str) -> Option<&str> {
        match column {
            "ship_id" => Some(self.ship_id.as_str()),
            "ship_name" => self.name.as_deref(),
            "customer_no" => self.customer_no.as_deref(),
            "imo_no" => self.imo_no.as_deref(),
            "status" => self.status.as_deref(),
            "email" => self.vessel_email.as_deref(),
            "office_email" => self.office_email.as_deref(),
            "ams" => self.ams.as_deref(),
            other => self.attributes.get(other).map(String::as_str),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardItemRecord {
    pub ship_id: String,
    pub item_id: String,
    pub onboard_edition: Option<String>,
    pub store_edition: Option<String>,
    pub description: Option<String>,
    pub row_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceItemRecord {
    pub item_id: String,
    pub current_edition: Option<String>,
    pub description: Option<String>,
    pub current_date: Option<String>,
    pub row_number: u32,
}

/// The three canonical record sets handed to the comparison engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSet {
    pub vessels: Vec<VesselRecord>,
    pub onboard: Vec<OnboardItemRecord>,
    pub reference: Vec<ReferenceItemRecord>,
}

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    Outdated,
    MissingOnboard,
    MissingReference,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outdated => "OUTDATED",
            Self::MissingOnboard => "MISSING_ONBOARD",
            Self::MissingReference => "MISSING_REFERENCE",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discrepancy for a vessel/item pair. Editions are the original
/// (trimmed) values, not the normalized comparison forms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IssueRecord {
    pub ship_id: String,
    pub item_id: String,
    pub onboard_edition: Option<String>,
    pub current_edition: Option<String>,
    pub kind: IssueKind,
}
