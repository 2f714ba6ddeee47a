//! # Diagnostics Module
//!
//! Best-effort, append-only status log shared by every execution context.
//!
//! This module handles:
//! - Timestamping each record (`[MM/DD/YYYY HH:MM:SS] line`)
//! - Serializing writers so records never interleave
//! - Swallowing I/O failures so logging can never take the service down
//! - A disabled sink behind the same interface for release builds
//!
//! The destination is opened, written and closed for every record, all under
//! one lock. Callers must not rely on the output for correctness.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Local;
use tracing::debug;

use crate::config::DiagnosticsConfig;

/// Timestamp layout of every record.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Result of one `log` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutcome {
    /// Sink is compiled or configured off; nothing was attempted
    Disabled,
    /// Record appended
    Written,
    /// Destination could not be opened or written
    Failed,
}

/// Destination for diagnostic lines.
pub trait DiagnosticsSink: Send + Sync {
    /// Append one timestamped record.
    fn log(&self, line: &str) -> LogOutcome;
}

/// No-op sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSink;

impl DiagnosticsSink for DisabledSink {
    fn log(&self, _line: &str) -> LogOutcome {
        LogOutcome::Disabled
    }
}

/// Appends records to a file.
///
/// # Examples
///
/// ```no_run
/// use hidplus_bridge::diagnostics::{DiagnosticsSink, FileSink, LogOutcome};
///
/// let sink = FileSink::new("hidplus/log.txt");
/// assert_eq!(sink.log("READY"), LogOutcome::Written);
/// ```
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    /// Destination path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, record: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record.as_bytes())?;
        file.flush()
    }
}

impl DiagnosticsSink for FileSink {
    fn log(&self, line: &str) -> LogOutcome {
        let record = format_record(&Local::now().format(TIMESTAMP_FORMAT).to_string(), line);

        // Guard drops on every path out of this block, including the error path.
        let result = {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.append(&record)
        };

        match result {
            Ok(()) => LogOutcome::Written,
            Err(e) => {
                debug!("Diagnostics write to {} failed: {}", self.path.display(), e);
                LogOutcome::Failed
            }
        }
    }
}

fn format_record(timestamp: &str, line: &str) -> String {
    format!("[{}] {}\n", timestamp, line)
}

/// Build the sink selected by configuration
///
/// Returns [`DisabledSink`] when diagnostics are turned off in the config or the
/// crate is built with the `quiet` feature. Otherwise the parent directory of the
/// destination is created on a best-effort basis and a [`FileSink`] is returned.
pub fn sink_from_config(config: &DiagnosticsConfig) -> Arc<dyn DiagnosticsSink> {
    if cfg!(feature = "quiet") || !config.enabled {
        return Arc::new(DisabledSink);
    }

    let sink = FileSink::new(&config.path);
    if let Some(parent) = sink.path().parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                debug!("Could not create {}: {}", parent.display(), e);
            }
        }
    }
    Arc::new(sink)
}
