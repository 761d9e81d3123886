//! `icr-pipeline`: one inventory compliance run, end to end.
//!
//! [`Run::start`] creates the workspace and record store, [`Run::ingest`]
//! loads the three sources, and [`IngestedRun::compare`] produces the
//! [`DeliveryBundle`] handed to reporting and delivery collaborators.

pub mod delivery;
pub mod error;
pub mod logging;
pub mod run;

pub use delivery::{DeliveryBundle, VesselBundle, VesselContact};
pub use error::RunError;
pub use run::{IngestedRun, Run, RunOptions};

/// Issue bundle file name under the workspace `output/` directory.
pub const ISSUES_FILE: &str = "issues.json";
/// Run manifest file name under the workspace `output/` directory.
pub const SUMMARY_FILE: &str = "run_summary.json";
