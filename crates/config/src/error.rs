use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("cannot read config {path}: {message}")]
    Io { path: PathBuf, message: String },
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config validation error (bad regex, empty column list, etc.).
    #[error("config validation error: {0}")]
    Validation(String),
    /// No per-user data directory could be resolved.
    #[error("cannot resolve a per-user data directory")]
    NoDataDir,
}
