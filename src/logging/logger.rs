//! Structured logger with dry-run awareness and summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{Log, OperationEntry, OperationStatus};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Console and file output both go through `tracing`; the file copy lives at
/// `$XDG_CACHE_HOME/automate/<command>.log` (default
/// `~/.cache/automate/<command>.log`) once
/// [`init_subscriber`](super::subscriber::init_subscriber) has run.
#[derive(Debug)]
pub struct Logger {
    operations: Mutex<Vec<OperationEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// Stores the log file path for display in the run summary; this
    /// constructor does not write to the file.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            operations: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Return a clone of all recorded operation entries.
    #[must_use]
    pub fn entries(&self) -> Vec<OperationEntry> {
        self.operations.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "automate::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: "automate::dry_run", "{msg}");
    }

    /// Record an operation result for the summary.
    pub fn record(&self, name: &str, status: OperationStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.operations.lock() {
            guard.push(OperationEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count the recorded operations with `status`.
    #[must_use]
    pub fn count(&self, status: OperationStatus) -> usize {
        self.operations.lock().map_or(0, |guard| {
            guard.iter().filter(|t| t.status == status).count()
        })
    }

    /// Print the summary of all recorded operations.
    #[allow(clippy::print_stdout)]
    pub fn print_summary(&self) {
        let operations = self.entries();
        if operations.is_empty() {
            return;
        }

        println!();
        self.stage("Summary");

        let mut unchanged = 0u32;
        let mut changed = 0u32;
        let mut dry_run = 0u32;
        let mut unavailable = 0u32;
        let mut failed = 0u32;

        for op in &operations {
            let (icon, color) = match op.status {
                OperationStatus::Unchanged => {
                    unchanged += 1;
                    ("·", "\x1b[2m")
                }
                OperationStatus::Changed => {
                    changed += 1;
                    ("✓", "\x1b[32m")
                }
                OperationStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                OperationStatus::Unavailable => {
                    unavailable += 1;
                    ("○", "\x1b[33m")
                }
                OperationStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = op
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", op.name));
        }

        println!();
        let total = unchanged + changed + dry_run + unavailable + failed;
        self.info(&format!(
            "{total} operations: \x1b[32m{changed} changed\x1b[0m, \x1b[2m{unchanged} unchanged\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[33m{unavailable} unavailable\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record(&self, name: &str, status: OperationStatus, message: Option<&str>) {
        self.record(name, status, message);
    }
}
