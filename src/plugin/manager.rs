//! Managers own one role's drivers and resolve operations to them.
use std::sync::Arc;

use super::context::ExecutionContext;
use super::driver::{Args, Driver, Outcome, Role};
use super::registry::Registry;
use super::token::Token;
use crate::error::DispatchError;

/// Per-call dispatch options.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Invoke exactly this driver, bypassing suitability.
    pub with: Option<Token>,
    /// Honor the manager's sticky default driver (default `true`).
    pub use_default: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            with: None,
            use_default: true,
        }
    }
}

impl DispatchOptions {
    /// Options selecting an explicit driver.
    #[must_use]
    pub fn with(token: impl Into<Token>) -> Self {
        Self {
            with: Some(token.into()),
            use_default: true,
        }
    }

    /// Options ignoring the sticky default (automatic selection unless
    /// `with` is set).
    #[must_use]
    pub fn without_default() -> Self {
        Self {
            with: None,
            use_default: false,
        }
    }
}

/// How a driver was chosen for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Explicit,
    Default,
    Scored(i32),
}

/// Owner of one role's drivers and the dispatch entry point for that role.
///
/// Drivers are kept in registration order; that order breaks ties between
/// equal suitability scores (first registered wins).
#[derive(Debug)]
pub struct Manager {
    role: Token,
    drivers: Vec<Box<dyn Driver>>,
    default: Option<Token>,
    ctx: Arc<ExecutionContext>,
}

impl Manager {
    /// Create an empty manager for `role`.
    #[must_use]
    pub fn new(role: Token, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            role,
            drivers: Vec::new(),
            default: None,
            ctx,
        }
    }

    /// Create a manager for role `R` with every concrete driver `registry`
    /// holds for it.
    #[must_use]
    pub fn for_role<R: Role>(registry: &Registry, ctx: &Arc<ExecutionContext>) -> Self {
        let role = R::token();
        let drivers = registry.instantiate(role.as_str(), ctx);
        Self {
            role,
            drivers,
            default: None,
            ctx: Arc::clone(ctx),
        }
    }

    /// Add a driver instance.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateToken`] if a driver with the same
    /// token is already present.
    pub fn add_driver(&mut self, driver: Box<dyn Driver>) -> Result<(), DispatchError> {
        let token = driver.token();
        if self.drivers.iter().any(|d| d.token() == token) {
            return Err(DispatchError::DuplicateToken {
                collection: self.role.to_string(),
                token,
            });
        }
        self.drivers.push(driver);
        Ok(())
    }

    /// This manager's role token.
    #[must_use]
    pub const fn role(&self) -> &Token {
        &self.role
    }

    /// The shared execution context.
    #[must_use]
    pub const fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// All drivers, in registration order.
    pub fn drivers(&self) -> impl Iterator<Item = &dyn Driver> {
        self.drivers.iter().map(|d| -> &dyn Driver { d.as_ref() })
    }

    /// Look up a driver by token.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownDriverToken`] if no driver has `token`.
    pub fn driver(&self, token: &str) -> Result<&dyn Driver, DispatchError> {
        self.drivers
            .iter()
            .find(|d| d.token() == token)
            .map(|d| -> &dyn Driver { d.as_ref() })
            .ok_or_else(|| DispatchError::UnknownDriverToken {
                role: self.role.clone(),
                token: token.to_string(),
            })
    }

    /// Set the sticky default driver used by every dispatch that does not
    /// name one explicitly.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownDriverToken`] if no driver has `token`.
    pub fn set_default(&mut self, token: &str) -> Result<(), DispatchError> {
        let token = self.driver(token)?.token();
        self.ctx
            .log
            .debug(&format!("{}: default driver set to {token}", self.role));
        self.default = Some(token);
        Ok(())
    }

    /// Clear the sticky default, returning to automatic selection.
    pub fn clear_default(&mut self) {
        self.default = None;
    }

    /// The sticky default driver token, if set.
    #[must_use]
    pub const fn default_driver(&self) -> Option<&Token> {
        self.default.as_ref()
    }

    /// Suitability of every driver that implements `operation`.
    #[must_use]
    pub fn scores_for(&self, operation: &str, args: &Args) -> Vec<(Token, i32)> {
        self.drivers
            .iter()
            .filter(|d| d.implements(operation))
            .map(|d| (d.token(), d.suitability(operation, args)))
            .collect()
    }

    /// Choose the highest-scoring driver for `operation`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::NoSuitableDriver`] if no driver implements
    /// the operation or the best score is below 1.
    pub fn select_driver(&self, operation: &str, args: &Args) -> Result<&dyn Driver, DispatchError> {
        self.select_scored(operation, args).map(|(d, _)| d)
    }

    fn select_scored(&self, operation: &str, args: &Args) -> Result<(&dyn Driver, i32), DispatchError> {
        let mut best: Option<(&dyn Driver, i32)> = None;
        for driver in self.drivers.iter().filter(|d| d.implements(operation)) {
            let score = driver.suitability(operation, args);
            tracing::debug!(role = %self.role, operation, driver = %driver.token(), score, "scored");
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((driver.as_ref(), score));
            }
        }
        match best {
            Some((driver, score)) if score >= 1 => Ok((driver, score)),
            _ => Err(DispatchError::NoSuitableDriver {
                role: self.role.clone(),
                operation: operation.to_string(),
            }),
        }
    }

    fn resolve(
        &self,
        operation: &str,
        args: &Args,
        options: &DispatchOptions,
    ) -> Result<(&dyn Driver, Choice), DispatchError> {
        if let Some(token) = &options.with {
            return Ok((self.driver(token.as_str())?, Choice::Explicit));
        }
        if options.use_default
            && let Some(token) = &self.default
        {
            return Ok((self.driver(token.as_str())?, Choice::Default));
        }
        let (driver, score) = self.select_scored(operation, args)?;
        Ok((driver, Choice::Scored(score)))
    }

    /// Resolve `operation` to a driver and invoke it.
    ///
    /// Resolution order, first match wins with no fallback between tiers:
    /// `options.with`, then the sticky default (when `options.use_default`),
    /// then automatic selection.  Explicit and default choices bypass
    /// suitability entirely.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownDriverToken`] for an unknown explicit token
    /// - [`DispatchError::NoSuitableDriver`] if automatic selection fails
    /// - [`DispatchError::NoSuchOperation`] if the chosen driver lacks `operation`
    /// - [`DispatchError::MissingDependencies`] if the chosen driver is unavailable
    /// - [`DispatchError::Failed`] if the driver's operation fails
    pub fn dispatch(
        &self,
        operation: &str,
        args: &Args,
        options: &DispatchOptions,
    ) -> Result<Outcome, DispatchError> {
        let (driver, choice) = self.resolve(operation, args, options)?;
        let token = driver.token();
        self.ctx.log.debug(&format!(
            "{}.{operation} -> {token} ({})",
            self.role,
            match choice {
                Choice::Explicit => "explicit".to_string(),
                Choice::Default => "default".to_string(),
                Choice::Scored(score) => format!("suitability {score}"),
            }
        ));

        if !driver.implements(operation) {
            return Err(DispatchError::no_such_operation(token, operation));
        }
        let availability = driver.availability();
        if !availability.available {
            return Err(DispatchError::MissingDependencies {
                driver: token,
                missing: availability.missing,
            });
        }

        driver.call(operation, args).map_err(|e| {
            match e.downcast::<DispatchError>() {
                Ok(dispatch_error) => dispatch_error,
                Err(source) => DispatchError::Failed {
                    driver: token,
                    operation: operation.to_string(),
                    source,
                },
            }
        })
    }

    /// Like [`dispatch`](Self::dispatch), but a missing suitable driver
    /// yields `Ok(None)` instead of an error.  Used to probe optional
    /// capabilities.
    ///
    /// # Errors
    ///
    /// Every error of [`dispatch`](Self::dispatch) except
    /// [`DispatchError::NoSuitableDriver`].
    pub fn dispatch_safely(
        &self,
        operation: &str,
        args: &Args,
        options: &DispatchOptions,
    ) -> Result<Option<Outcome>, DispatchError> {
        match self.dispatch(operation, args, options) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(DispatchError::NoSuitableDriver { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
