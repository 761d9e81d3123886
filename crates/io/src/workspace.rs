//! Per-run workspace layout.
//!
//! A run owns one directory named by its run id, with fixed sub-locations:
//!
//! ```text
//! <base>/<run_id>/
//!   data/run.sqlite   record store
//!   logs/run.log      run log
//!   output/           manifests and issue bundles
//!   tmp/              scratch
//! ```
//!
//! Every other component asks the [`Workspace`] for paths.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::WorkspaceError;

const DATA_DIR: &str = "data";
const LOGS_DIR: &str = "logs";
const OUTPUT_DIR: &str = "output";
const SCRATCH_DIR: &str = "tmp";
const STORE_FILE: &str = "run.sqlite";
const LOG_FILE: &str = "run.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    run_id: String,
    root: PathBuf,
    created_at: DateTime<Utc>,
}

impl Workspace {
    /// Create a run workspace under the per-user runs directory.
    pub fn create(suffix: Option<&str>) -> Result<Self, WorkspaceError> {
        let base = icr_config::paths::default_runs_dir()?;
        Self::create_in(&base, suffix)
    }

    /// Create a run workspace under `base` with a timestamp run id.
    ///
    /// If the id is already taken a two-digit counter is appended
    /// (`_02`, `_03`, ...) until an unused directory is claimed.
    pub fn create_in(base: &Path, suffix: Option<&str>) -> Result<Self, WorkspaceError> {
        let now = Utc::now();
        let run_id = generate_run_id(now, suffix)?;
        ensure_base(base)?;
        let (run_id, root) = reserve_run_dir(base, &run_id)?;
        Self::finish(run_id, root, now)
    }

    /// Create a run workspace with a caller-chosen run id. Never reuses an
    /// existing directory.
    pub fn create_with_id(base: &Path, run_id: &str) -> Result<Self, WorkspaceError> {
        let run_id = clean_run_name(run_id)?;
        ensure_base(base)?;
        let root = base.join(&run_id);
        match fs::create_dir(&root) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::RunExists(run_id));
            }
            Err(e) => return Err(not_writable(&root, e)),
        }
        Self::finish(run_id, root, Utc::now())
    }

    fn finish(run_id: String, root: PathBuf, created_at: DateTime<Utc>) -> Result<Self, WorkspaceError> {
        for sub in [DATA_DIR, LOGS_DIR, OUTPUT_DIR, SCRATCH_DIR] {
            let dir = root.join(sub);
            if let Err(e) = fs::create_dir_all(&dir) {
                // Release the reserved run directory.
                let _ = fs::remove_dir_all(&root);
                return Err(not_writable(&dir, e));
            }
        }
        Ok(Self {
            run_id,
            root,
            created_at,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join(SCRATCH_DIR)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir().join(STORE_FILE)
    }

    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join(LOG_FILE)
    }

    /// Path of a named artifact in `output/`.
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.output_dir().join(name)
    }
}

/// `YYYYMMDD_HHMMSS_ffffffZ`, optionally followed by `_<suffix>`.
pub fn generate_run_id(now: DateTime<Utc>, suffix: Option<&str>) -> Result<String, WorkspaceError> {
    let timestamp = now.format("%Y%m%d_%H%M%S_%6fZ").to_string();
    match suffix.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(timestamp),
        Some(s) => Ok(format!("{timestamp}_{}", clean_run_name(s)?)),
    }
}

fn clean_run_name(name: &str) -> Result<String, WorkspaceError> {
    let cleaned = name.trim().replace(' ', "-");
    let bad = cleaned.is_empty()
        || cleaned == "."
        || cleaned == ".."
        || cleaned.contains('/')
        || cleaned.contains('\\')
        || cleaned.contains(std::path::MAIN_SEPARATOR);
    if bad {
        return Err(WorkspaceError::InvalidRunName(name.to_string()));
    }
    Ok(cleaned)
}

fn ensure_base(base: &Path) -> Result<(), WorkspaceError> {
    fs::create_dir_all(base).map_err(|e| not_writable(base, e))
}

fn reserve_run_dir(base: &Path, run_id: &str) -> Result<(String, PathBuf), WorkspaceError> {
    let mut candidate = run_id.to_string();
    let mut counter = 1u32;
    loop {
        let dir = base.join(&candidate);
        match fs::create_dir(&dir) {
            Ok(()) => return Ok((candidate, dir)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter += 1;
                candidate = format!("{run_id}_{counter:02}");
            }
            Err(e) => return Err(not_writable(&dir, e)),
        }
    }
}

fn not_writable(path: &Path, err: std::io::Error) -> WorkspaceError {
    WorkspaceError::NotWritable {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
