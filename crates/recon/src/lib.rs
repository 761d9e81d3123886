//! `icr-recon`: Inventory comparison engine.
//!
//! Pure engine crate: receives canonical record sets, returns per-vessel
//! classified issues. No store or file IO dependencies.

pub mod classify;
pub mod dedupe;
pub mod eligibility;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod normalize;

pub use engine::compare;
pub use error::CompareError;
pub use model::{ComparisonOutcome, EngineNote, Selection, VesselIssues};
