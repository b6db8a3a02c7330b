//! Core logging types: operation entries, status, and the [`Log`] trait.

/// Operation result for summary reporting.
#[derive(Debug, Clone)]
pub struct OperationEntry {
    /// Human-readable operation name (e.g. `package_manager.install git`).
    pub name: String,
    /// Final status of the operation.
    pub status: OperationStatus,
    /// Optional detail message (e.g., driver token or error description).
    pub message: Option<String>,
}

/// Status of a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Nothing needed to change, or a query answered.
    Unchanged,
    /// The system was changed.
    Changed,
    /// Ran in dry-run mode; the change was only reported.
    DryRun,
    /// No available driver could serve the operation.
    Unavailable,
    /// The operation failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) is the production implementation;
/// drivers only ever see `&dyn Log` through the execution context.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record an operation result for the summary.
    fn record(&self, name: &str, status: OperationStatus, message: Option<&str>);
}
