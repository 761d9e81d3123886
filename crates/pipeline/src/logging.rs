// Run log sink: `log` records from every crate go to the current run's
// logs/run.log. Level comes from ICR_LOG (EnvFilter syntax), default "info".
//
// The subscriber is process-wide and installed once; each run re-points the
// shared sink at its own file, so runs in one process never share a log.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "ICR_LOG";

/// Log file of the most recently started run. `None` discards output.
static SINK: Mutex<Option<File>> = Mutex::new(None);
/// Whether our subscriber owns the process-wide slot.
static INSTALLED: OnceLock<bool> = OnceLock::new();

fn sink() -> MutexGuard<'static, Option<File>> {
    SINK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Writer handed to the fmt layer; forwards to whatever file the sink holds.
struct RunLogWriter;

impl Write for RunLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match sink().as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match sink().as_mut() {
            Some(file) => file.write_all(buf),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match sink().as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Point the run log at `log_file`, installing the subscriber on first use.
///
/// Returns false if the file cannot be opened (the sink is then cleared, so
/// nothing leaks into an earlier run's log) or another subscriber already
/// owns the process. Logging stays best-effort; it never fails a run.
pub fn init_run_logging(log_file: &Path) -> bool {
    let file = OpenOptions::new().create(true).append(true).open(log_file);
    let opened = file.is_ok();
    *sink() = file.ok();
    if !opened {
        return false;
    }

    *INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_target(true)
            .with_writer(|| RunLogWriter)
            .try_init()
            .is_ok()
    })
}
