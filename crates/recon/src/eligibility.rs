//! AMS eligibility: the one configured rule deciding which index vessels
//! are processed at all.

use icr_config::{AmsRule, AmsRuleKind};
use icr_core::VesselRecord;
use regex::Regex;

use crate::error::CompareError;

/// Values a `boolean` rule reads as true (compared case-insensitively).
const TRUTHY: [&str; 5] = ["true", "yes", "y", "1", "x"];

#[derive(Debug, Clone)]
enum Test {
    Contains { needle: String, case_sensitive: bool },
    Equals { value: String, case_sensitive: bool },
    Boolean,
    Regex(Regex),
}

/// An [`AmsRule`] compiled once per comparison.
#[derive(Debug, Clone)]
pub struct AmsMatcher {
    column: String,
    test: Test,
}

impl AmsMatcher {
    pub fn compile(rule: &AmsRule) -> Result<Self, CompareError> {
        let fold = |s: &str| {
            if rule.case_sensitive {
                s.to_string()
            } else {
                s.to_lowercase()
            }
        };
        let test = match rule.kind {
            AmsRuleKind::Contains => Test::Contains {
                needle: fold(&rule.value),
                case_sensitive: rule.case_sensitive,
            },
            AmsRuleKind::Equals => Test::Equals {
                value: fold(rule.value.trim()),
                case_sensitive: rule.case_sensitive,
            },
            AmsRuleKind::Boolean => Test::Boolean,
            AmsRuleKind::Regex => Test::Regex(
                Regex::new(&rule.value).map_err(|e| CompareError::InvalidRule(e.to_string()))?,
            ),
        };
        Ok(Self {
            column: rule.column.clone(),
            test,
        })
    }

    /// A vessel with no value in the rule's column is never eligible.
    pub fn is_eligible(&self, vessel: &VesselRecord) -> bool {
        let Some(value) = vessel.field(&self.column).map(str::trim) else {
            return false;
        };
        match &self.test {
            Test::Contains {
                needle,
                case_sensitive,
            } => {
                if *case_sensitive {
                    value.contains(needle.as_str())
                } else {
                    value.to_lowercase().contains(needle.as_str())
                }
            }
            Test::Equals {
                value: expected,
                case_sensitive,
            } => {
                if *case_sensitive {
                    value == expected
                } else {
                    value.to_lowercase() == *expected
                }
            }
            Test::Boolean => TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t)),
            Test::Regex(re) => re.is_match(value),
        }
    }
}
