// Run configuration
// Loaded from a TOML file; every key is optional.

use std::fs;
use std::path::Path;

use icr_core::SourceKind;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::sources::{SourceSchema, SourcesConfig};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Immutable configuration for one run. Passed by reference into ingestion
/// and comparison; never mutated once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub ams: AmsRule,
    pub matching: MatchingOptions,
    pub sources: SourcesConfig,
}

// ---------------------------------------------------------------------------
// AMS eligibility
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmsRuleKind {
    /// Column value contains `value` as a substring.
    Contains,
    /// Column value equals `value`.
    Equals,
    /// Column value reads as a truthy flag (`true`, `yes`, `y`, `1`, `x`).
    Boolean,
    /// Column value matches the regular expression in `value`.
    Regex,
}

impl std::fmt::Display for AmsRuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contains => write!(f, "contains"),
            Self::Equals => write!(f, "equals"),
            Self::Boolean => write!(f, "boolean"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

/// Exactly one rule decides which index vessels are AMS-eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmsRule {
    pub kind: AmsRuleKind,
    /// Canonical vessel-index column the rule reads.
    pub column: String,
    #[serde(default)]
    pub value: String,
    /// Applies to `contains` and `equals`. Regex rules carry their own flags.
    #[serde(default)]
    pub case_sensitive: bool,
}

impl Default for AmsRule {
    fn default() -> Self {
        Self {
            kind: AmsRuleKind::Contains,
            column: "note1".to_string(),
            value: "AMS".to_string(),
            case_sensitive: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingOptions {
    /// Vessel ids must match exactly (after trimming).
    pub vessel_case_sensitive: bool,
    /// Item ids must match exactly (after trimming).
    pub item_case_sensitive: bool,
    /// Case-fold editions before comparing them.
    pub edition_case_fold: bool,
    /// Emit MISSING_ONBOARD rows.
    pub report_missing_onboard: bool,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            vessel_case_sensitive: true,
            item_case_sensitive: false,
            edition_case_fold: false,
            report_missing_onboard: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ComplianceConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let mut config: ComplianceConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.ams.column = config.ams_column();
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&contents)
    }

    /// Resolved column schema for a source.
    pub fn schema(&self, source: SourceKind) -> SourceSchema {
        self.sources.schema(source)
    }

    /// Canonical vessel-index column the AMS rule reads. A raw source header
    /// resolves through the vessel index aliases, so `ShipStat` reads `status`.
    pub fn ams_column(&self) -> String {
        self.schema(SourceKind::VesselIndex)
            .canonical_name(&self.ams.column)
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ams.column.trim().is_empty() {
            return Err(ConfigError::Validation("ams.column must not be empty".into()));
        }

        match self.ams.kind {
            AmsRuleKind::Boolean => {}
            AmsRuleKind::Contains | AmsRuleKind::Equals => {
                if self.ams.value.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "ams.value is required for '{}' rules",
                        self.ams.kind
                    )));
                }
            }
            AmsRuleKind::Regex => {
                if self.ams.value.is_empty() {
                    return Err(ConfigError::Validation(
                        "ams.value is required for 'regex' rules".into(),
                    ));
                }
                regex::Regex::new(&self.ams.value).map_err(|e| {
                    ConfigError::Validation(format!("ams.value is not a valid regex: {e}"))
                })?;
            }
        }

        for source in SourceKind::ALL {
            let schema = self.schema(source);
            if schema.required_columns.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "sources.{source}: required_columns must not be empty"
                )));
            }
            if schema.required_columns.iter().any(|c| c.is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "sources.{source}: required_columns contains a blank name"
                )));
            }
            for (from, to) in &schema.aliases {
                if from.is_empty() || to.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "sources.{source}: alias '{from}' -> '{to}' has a blank side"
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
