// Per-user data locations
// Runs live under <data_local_dir>/InventoryComplianceReporter/runs

use std::path::PathBuf;

use crate::error::ConfigError;

pub const APP_DIR_NAME: &str = "InventoryComplianceReporter";
pub const RUNS_DIR_NAME: &str = "runs";

/// Per-user writable application data directory.
///
/// `%LOCALAPPDATA%` on Windows, `~/Library/Application Support` on macOS,
/// `$XDG_DATA_HOME` (or `~/.local/share`) elsewhere. Not created here.
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .map(|base| base.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoDataDir)
}

/// Base directory all run workspaces are created under.
pub fn default_runs_dir() -> Result<PathBuf, ConfigError> {
    Ok(app_data_dir()?.join(RUNS_DIR_NAME))
}
