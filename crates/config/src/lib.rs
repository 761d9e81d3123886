// Configuration loading

pub mod error;
pub mod paths;
pub mod settings;
pub mod sources;

pub use error::ConfigError;
pub use settings::{AmsRule, AmsRuleKind, ComplianceConfig, MatchingOptions};
pub use sources::{normalize_header, SourceOverrides, SourceSchema, SourcesConfig};
