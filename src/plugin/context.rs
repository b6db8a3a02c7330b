//! Shared execution context: apply vs dry-run mode plus ambient services.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use super::driver::Outcome;
use crate::exec::{Executor, SystemExecutor};
use crate::logging::Log;
use crate::platform::Platform;

/// Session-wide execution context handed to every manager and driver.
///
/// Drivers hold an `Arc` to the same instance, so flipping the mode with
/// [`set_dry_run`](Self::set_dry_run) is observed by all of them on their
/// next operation.  Nothing enforces the mode: every mutating driver
/// operation is expected to consult [`is_apply`](Self::is_apply) (or use
/// [`converge`](Self::converge)) before touching the system.
pub struct ExecutionContext {
    apply: AtomicBool,
    /// Logger for output and operation recording.
    pub log: Arc<dyn Log>,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Detected platform information.
    pub platform: Arc<Platform>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("apply", &self.is_apply())
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("platform", &self.platform)
            .finish()
    }
}

impl ExecutionContext {
    /// Create a context in apply mode for the detected platform, running
    /// real system commands.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self::with_services(
            log,
            Arc::new(SystemExecutor),
            Arc::new(Platform::detect()),
        )
    }

    /// Create a context in apply mode with explicit services.
    #[must_use]
    pub fn with_services(
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
        platform: Arc<Platform>,
    ) -> Self {
        Self {
            apply: AtomicBool::new(true),
            log,
            executor,
            platform,
        }
    }

    /// Set the initial mode; `true` starts in dry-run.
    #[must_use]
    pub fn dry_run(self, dry_run: bool) -> Self {
        self.set_dry_run(dry_run);
        self
    }

    /// Returns `true` when mutating operations should proceed.
    #[must_use]
    pub fn is_apply(&self) -> bool {
        self.apply.load(Ordering::SeqCst)
    }

    /// Returns `true` when mutating operations should only be reported.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        !self.is_apply()
    }

    /// Run `f` only in apply mode.
    pub fn when_apply<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.is_apply().then(f)
    }

    /// Run `f` only in dry-run mode.
    pub fn when_dry_run<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        self.is_dry_run().then(f)
    }

    /// Switch between apply (`true`) and dry-run (`false`).
    pub fn set_apply(&self, apply: bool) {
        self.apply.store(apply, Ordering::SeqCst);
    }

    /// Switch between dry-run (`true`) and apply (`false`).
    pub fn set_dry_run(&self, dry_run: bool) {
        self.set_apply(!dry_run);
    }

    /// Apply the three-way change contract for one mutating operation.
    ///
    /// - `needs_change == false`: no side effects, [`Outcome::Unchanged`].
    /// - apply mode: run `apply`, then [`Outcome::Changed`] with `details`.
    /// - dry-run mode: log, skip `apply`, [`Outcome::WouldChange`] with `details`.
    ///
    /// # Errors
    ///
    /// Returns any error produced by `apply`.
    pub fn converge(
        &self,
        needs_change: bool,
        details: Vec<String>,
        apply: impl FnOnce() -> Result<()>,
    ) -> Result<Outcome> {
        if !needs_change {
            return Ok(Outcome::Unchanged);
        }
        if self.is_dry_run() {
            for detail in &details {
                self.log.dry_run(&format!("would {detail}"));
            }
            return Ok(Outcome::WouldChange { details });
        }
        apply()?;
        for detail in &details {
            self.log.debug(detail);
        }
        Ok(Outcome::Changed { details })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::plugin::test_helpers::test_context;
    use std::cell::Cell;

    #[test]
    fn defaults_to_apply() {
        let ctx = test_context();
        assert!(ctx.is_apply());
        assert!(!ctx.is_dry_run());
    }

    #[test]
    fn dry_run_builder_sets_mode() {
        let ctx = test_context().dry_run(true);
        assert!(ctx.is_dry_run());
    }

    #[test]
    fn flip_is_observed_through_shared_reference() {
        let ctx = Arc::new(test_context());
        let held = Arc::clone(&ctx);
        ctx.set_dry_run(true);
        assert!(held.is_dry_run());
        ctx.set_apply(true);
        assert!(held.is_apply());
    }

    #[test]
    fn lazy_blocks_run_only_when_predicate_holds() {
        let ctx = test_context();
        let ran = Cell::new(0);
        assert_eq!(ctx.when_apply(|| ran.set(ran.get() + 1)), Some(()));
        assert_eq!(ctx.when_dry_run(|| ran.set(ran.get() + 10)), None);
        assert_eq!(ran.get(), 1);

        ctx.set_dry_run(true);
        assert_eq!(ctx.when_dry_run(|| 7), Some(7));
        assert_eq!(ctx.when_apply(|| 7), None);
    }

    #[test]
    fn converge_unchanged_skips_apply() {
        let ctx = test_context();
        let ran = Cell::new(false);
        let outcome = ctx
            .converge(false, vec!["x".to_string()], || {
                ran.set(true);
                Ok(())
            })
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(!ran.get());
    }

    #[test]
    fn converge_dry_run_reports_without_side_effects() {
        let ctx = test_context().dry_run(true);
        let ran = Cell::new(false);
        let outcome = ctx
            .converge(true, vec!["create /tmp/x".to_string()], || {
                ran.set(true);
                Ok(())
            })
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::WouldChange {
                details: vec!["create /tmp/x".to_string()]
            }
        );
        assert!(!ran.get());
    }

    #[test]
    fn converge_apply_runs_and_reports_change() {
        let ctx = test_context();
        let ran = Cell::new(false);
        let outcome = ctx
            .converge(true, vec!["create /tmp/x".to_string()], || {
                ran.set(true);
                Ok(())
            })
            .unwrap();
        assert!(matches!(outcome, Outcome::Changed { .. }));
        assert!(ran.get());
    }

    #[test]
    fn converge_propagates_apply_error() {
        let ctx = test_context();
        let err = ctx
            .converge(true, vec![], || Err(anyhow::anyhow!("disk full")))
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn debug_includes_mode() {
        let ctx = test_context();
        let debug = format!("{ctx:?}");
        assert!(debug.contains("ExecutionContext"));
        assert!(debug.contains("apply: true"));
    }
}
