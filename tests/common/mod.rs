// Shared helpers for integration tests.
//
// Provides an in-memory log, a recording executor and a context builder so
// each integration test can exercise managers without touching the host.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use automate_cli::exec::{ExecResult, Executor};
use automate_cli::logging::{Log, OperationStatus};
use automate_cli::platform::{Family, Os, Platform};
use automate_cli::plugin::ExecutionContext;

/// A [`Log`] that keeps dry-run messages and drops everything else.
#[derive(Debug, Default)]
pub struct QuietLog {
    dry_run: Mutex<Vec<String>>,
}

impl QuietLog {
    /// Dry-run messages logged so far.
    pub fn dry_run_messages(&self) -> Vec<String> {
        self.dry_run.lock().expect("log mutex").clone()
    }
}

impl Log for QuietLog {
    fn stage(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn debug(&self, _: &str) {}
    fn warn(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn dry_run(&self, msg: &str) {
        self.dry_run.lock().expect("log mutex").push(msg.to_string());
    }
    fn record(&self, _: &str, _: OperationStatus, _: Option<&str>) {}
}

/// An [`Executor`] that succeeds with empty output and remembers every
/// command line.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<String>>,
}

impl RecordingExecutor {
    /// Command lines run so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("executor mutex").clone()
    }

    fn ok(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        let mut line = vec![program];
        line.extend_from_slice(args);
        self.calls.lock().expect("executor mutex").push(line.join(" "));
        Ok(ExecResult {
            stdout: String::new(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        })
    }
}

impl Executor for RecordingExecutor {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.ok(program, args)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.ok(program, args)
    }
}

/// Services shared by one test: the log, the executor and the context
/// built from them.
pub struct TestSession {
    pub log: Arc<QuietLog>,
    pub executor: Arc<RecordingExecutor>,
    pub ctx: Arc<ExecutionContext>,
}

impl TestSession {
    /// A context on plain Linux, starting in dry-run when `dry_run` is set.
    pub fn new(dry_run: bool) -> Self {
        Self::on(Platform::new(Os::Linux, Family::Other), dry_run)
    }

    /// A context on `platform`, starting in dry-run when `dry_run` is set.
    pub fn on(platform: Platform, dry_run: bool) -> Self {
        let log = Arc::new(QuietLog::default());
        let executor = Arc::new(RecordingExecutor::default());
        let ctx = Arc::new(
            ExecutionContext::with_services(
                Arc::clone(&log) as Arc<dyn Log>,
                Arc::clone(&executor) as Arc<dyn Executor>,
                Arc::new(platform),
            )
            .dry_run(dry_run),
        );
        Self { log, executor, ctx }
    }
}
