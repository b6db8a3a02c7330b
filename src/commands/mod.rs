//! Top-level subcommand orchestration.
pub mod drivers;
pub mod file;
pub mod package;
pub mod service;
pub mod version;

use anyhow::Result;
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::config::EngineConfig;
use crate::error::DispatchError;
use crate::logging::{Log, Logger, OperationStatus};
use crate::plugin::{ExecutionContext, Manager, Outcome, Registry, registry};

/// Shared state produced by the common command setup sequence.
///
/// Loads configuration, decides the initial mode and builds the execution
/// context every manager of the command shares.
#[derive(Debug)]
pub struct Session {
    /// Logger recording operation outcomes.
    pub log: Arc<Logger>,
    /// Context shared by every manager and driver of this command.
    pub ctx: Arc<ExecutionContext>,
    /// Loaded configuration.
    pub config: EngineConfig,
    /// Registry managers are built from.
    pub registry: &'static Registry,
}

impl Session {
    /// Load configuration and build the execution context.
    ///
    /// The context starts in dry-run when either `--dry-run` or the
    /// configuration asks for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the built-in drivers failed to register, or if
    /// the configuration file cannot be read or is invalid.
    pub fn init(global: &GlobalOpts, log: Arc<Logger>) -> Result<Self> {
        let registry = registry::seeded()
            .map_err(|e| anyhow::anyhow!("failed to register built-in drivers: {e}"))?;

        log.stage("Loading configuration");
        let config = EngineConfig::load(global.config.as_deref())?;
        if let Some(path) = &config.source {
            log.debug(&format!("config: {}", path.display()));
        }

        let dry_run = global.dry_run || config.dry_run;
        let sink = Arc::clone(&log) as Arc<dyn Log>;
        let ctx = Arc::new(ExecutionContext::new(sink).dry_run(dry_run));
        log.debug(&format!("platform: {}", ctx.platform));
        if dry_run {
            log.info("dry-run: no changes will be made");
        }

        Ok(Self {
            log,
            ctx,
            config,
            registry,
        })
    }

    /// Apply the configured sticky default for `manager`'s role, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownDriverToken`] if the configured token
    /// names no driver of the role.
    pub fn apply_default(&self, manager: &mut Manager) -> Result<(), DispatchError> {
        if let Some(token) = self.config.default_for(manager.role().as_str()) {
            manager.set_default(token.as_str())?;
        }
        Ok(())
    }

    /// Record the result of one dispatch under `name` and return its status.
    ///
    /// Resolution failures caused by the environment count as unavailable;
    /// every other error counts as a failure.
    pub fn record(&self, name: &str, result: Result<Outcome, DispatchError>) -> OperationStatus {
        let (status, message) = match result {
            Ok(Outcome::Unchanged) => (OperationStatus::Unchanged, None),
            Ok(Outcome::Value(value)) => {
                self.log.info(&format!("{name}: {value}"));
                (OperationStatus::Unchanged, Some(value.to_string()))
            }
            Ok(Outcome::Changed { details }) => (OperationStatus::Changed, Some(details.join(", "))),
            Ok(Outcome::WouldChange { details }) => {
                (OperationStatus::DryRun, Some(details.join(", ")))
            }
            Ok(Outcome::Failed { reason }) => {
                self.log.error(&format!("{name}: {reason}"));
                (OperationStatus::Failed, Some(reason))
            }
            Err(
                e @ (DispatchError::NoSuitableDriver { .. }
                | DispatchError::MissingDependencies { .. }),
            ) => {
                self.log.warn(&format!("{name}: {e}"));
                (OperationStatus::Unavailable, Some(e.to_string()))
            }
            Err(e) => {
                self.log.error(&format!("{name}: {e}"));
                (OperationStatus::Failed, Some(e.to_string()))
            }
        };
        self.log.record(name, status, message.as_deref());
        status
    }

    /// Print the summary and bail if any operation failed or found no
    /// available driver.
    ///
    /// # Errors
    ///
    /// Returns an error naming the number of unsuccessful operations.
    pub fn finish(&self) -> Result<()> {
        self.log.print_summary();
        let failed = self.log.count(OperationStatus::Failed);
        let unavailable = self.log.count(OperationStatus::Unavailable);
        if failed + unavailable > 0 {
            anyhow::bail!("{failed} operation(s) failed, {unavailable} unavailable");
        }
        Ok(())
    }
}
