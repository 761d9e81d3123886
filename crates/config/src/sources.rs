// Per-source column schemas: canonical names, header aliases, required,
// key and warning columns.

use std::collections::BTreeMap;

use icr_core::SourceKind;
use serde::{Deserialize, Serialize};

/// Normalize a header cell: trim, then case-fold.
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Fully resolved column schema for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSchema {
    pub source: SourceKind,
    /// Canonical columns that must exist after normalization (fatal if absent).
    pub required_columns: Vec<String>,
    /// Columns a row cannot be blank in (warning per row if blank).
    pub key_columns: Vec<String>,
    /// Optional columns whose blank values are worth a warning.
    pub warning_columns: Vec<String>,
    /// Normalized header alias → canonical column name.
    pub aliases: BTreeMap<String, String>,
}

impl SourceSchema {
    /// Built-in schema for a source.
    pub fn defaults(source: SourceKind) -> Self {
        let (required, keys, warnings, aliases): (&[&str], &[&str], &[&str], &[(&str, &str)]) =
            match source {
                SourceKind::ReferenceCatalog => (
                    &[
                        "item",
                        "description",
                        "class_id",
                        "upc_code",
                        "current_edition",
                        "current_date",
                    ],
                    &["item"],
                    &[],
                    &[
                        ("itmdesc", "description"),
                        ("itmclss", "class_id"),
                        ("upccode", "upc_code"),
                        ("edition", "current_edition"),
                        ("currdate", "current_date"),
                    ],
                ),
                SourceKind::VesselIndex => (
                    &[
                        "ship_id",
                        "ship_name",
                        "customer_no",
                        "imo_no",
                        "status",
                        "email",
                        "note1",
                        "note2",
                        "note3",
                    ],
                    &["ship_id"],
                    &["email"],
                    &[
                        ("shipid", "ship_id"),
                        ("shipname", "ship_name"),
                        ("custno", "customer_no"),
                        ("imono", "imo_no"),
                        ("shipstat", "status"),
                        ("officeemail", "office_email"),
                    ],
                ),
                SourceKind::OnboardInventory => (
                    &["ship_id", "item", "onboard_edition", "store_edition", "description"],
                    &["ship_id", "item"],
                    &[],
                    &[
                        ("shipid", "ship_id"),
                        ("edition", "onboard_edition"),
                        ("storeedt", "store_edition"),
                        ("descrip", "description"),
                    ],
                ),
            };

        let to_vec = |cols: &[&str]| cols.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            source,
            required_columns: to_vec(required),
            key_columns: to_vec(keys),
            warning_columns: to_vec(warnings),
            aliases: aliases
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// Canonical column name for a raw header cell, or `None` for a blank header.
    pub fn canonical_name(&self, raw_header: &str) -> Option<String> {
        let normalized = normalize_header(raw_header);
        if normalized.is_empty() {
            return None;
        }
        Some(self.aliases.get(&normalized).cloned().unwrap_or(normalized))
    }

    fn apply(mut self, overrides: &SourceOverrides) -> Self {
        let normalize_all =
            |cols: &[String]| cols.iter().map(|c| normalize_header(c)).collect::<Vec<_>>();
        if let Some(cols) = &overrides.required_columns {
            self.required_columns = normalize_all(cols);
        }
        if let Some(cols) = &overrides.key_columns {
            self.key_columns = normalize_all(cols);
        }
        if let Some(cols) = &overrides.warning_columns {
            self.warning_columns = normalize_all(cols);
        }
        for (from, to) in &overrides.aliases {
            self.aliases.insert(normalize_header(from), normalize_header(to));
        }
        self
    }
}

/// User overrides for one source. Column lists replace the defaults when
/// present; aliases extend (and may shadow) the default alias table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOverrides {
    pub required_columns: Option<Vec<String>>,
    pub key_columns: Option<Vec<String>>,
    pub warning_columns: Option<Vec<String>>,
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub reference_catalog: SourceOverrides,
    pub vessel_index: SourceOverrides,
    pub onboard_inventory: SourceOverrides,
}

impl SourcesConfig {
    pub fn overrides(&self, source: SourceKind) -> &SourceOverrides {
        match source {
            SourceKind::ReferenceCatalog => &self.reference_catalog,
            SourceKind::VesselIndex => &self.vessel_index,
            SourceKind::OnboardInventory => &self.onboard_inventory,
        }
    }

    /// Defaults for `source` with this config's overrides applied.
    pub fn schema(&self, source: SourceKind) -> SourceSchema {
        SourceSchema::defaults(source).apply(self.overrides(source))
    }
}
