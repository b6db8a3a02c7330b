//! Typed errors for the plugin core.
//!
//! The dispatch engine reports every caller, configuration and environment
//! mistake through [`DispatchError`].  Drivers use [`anyhow`] internally; the
//! manager wraps their failures into [`DispatchError::Failed`] so callers see
//! a single error type, and command handlers at the CLI boundary convert to
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! DispatchError
//! ├── UnknownDriverToken      explicit `with` / default names no driver
//! ├── NoSuitableDriver        automatic scoring found no winner
//! ├── MissingDependencies     chosen driver is unavailable
//! ├── InvalidCapabilitySpec   unknown requirement kind in a declaration
//! ├── NoSuchOperation         driver does not implement the operation
//! ├── DuplicateToken          two types derive the same token
//! └── Failed                  the driver's own operation failed
//! ```

use thiserror::Error;

use crate::plugin::capability::Missing;
use crate::plugin::token::Token;

/// Errors surfaced by registration, capability declaration and dispatch.
///
/// None of these are retried by the core.  `UnknownDriverToken` and
/// `NoSuitableDriver` are caller mistakes; `MissingDependencies` will not
/// resolve within the process because availability is cached per type.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// An explicit or default driver token is not present in the manager.
    #[error("unknown driver '{token}' for {role}")]
    UnknownDriverToken {
        /// Role token of the manager that was asked.
        role: Token,
        /// The token that did not match any driver.
        token: String,
    },

    /// Automatic selection found no driver implementing the operation, or
    /// the best score was below 1.
    #[error("no suitable driver for {role}.{operation}")]
    NoSuitableDriver {
        /// Role token of the manager that was asked.
        role: Token,
        /// The operation that could not be placed.
        operation: String,
    },

    /// The chosen driver's declared requirements are not satisfied.
    #[error("driver '{driver}' is missing dependencies: {missing}")]
    MissingDependencies {
        /// Token of the unavailable driver.
        driver: Token,
        /// The first failing requirement, keyed by requirement kind.
        missing: Missing,
    },

    /// A capability declaration used a requirement kind that does not exist.
    #[error("invalid capability spec: unrecognized requirement kind '{kind}'")]
    InvalidCapabilitySpec {
        /// The unrecognized kind as written.
        kind: String,
    },

    /// The driver was asked to perform an operation it does not implement.
    #[error("driver '{driver}' does not implement '{operation}'")]
    NoSuchOperation {
        /// Token of the driver that was invoked.
        driver: Token,
        /// The missing operation.
        operation: String,
    },

    /// Two different types derive the same token within one collection.
    #[error("duplicate token '{token}' in {collection}")]
    DuplicateToken {
        /// Collection the conflict occurred in (a role token or `roles`).
        collection: String,
        /// The conflicting token.
        token: Token,
    },

    /// The driver's own operation failed.
    #[error("{driver}.{operation} failed: {source:#}")]
    Failed {
        /// Token of the driver that failed.
        driver: Token,
        /// The operation that failed.
        operation: String,
        /// Underlying error reported by the driver.
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    /// Build a [`DispatchError::NoSuchOperation`] for `driver` and `operation`.
    ///
    /// Drivers return this from the fallback arm of [`Driver::call`](crate::plugin::Driver::call).
    #[must_use]
    pub fn no_such_operation(driver: Token, operation: &str) -> Self {
        Self::NoSuchOperation {
            driver,
            operation: operation.to_string(),
        }
    }

    /// Returns `true` for errors caused by the caller or configuration
    /// rather than the environment or the driver itself.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownDriverToken { .. }
                | Self::NoSuitableDriver { .. }
                | Self::InvalidCapabilitySpec { .. }
                | Self::DuplicateToken { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::plugin::capability::RequirementKind;

    #[test]
    fn unknown_driver_token_display() {
        let e = DispatchError::UnknownDriverToken {
            role: Token::new("package_manager"),
            token: "yum".to_string(),
        };
        assert_eq!(e.to_string(), "unknown driver 'yum' for package_manager");
    }

    #[test]
    fn no_suitable_driver_display() {
        let e = DispatchError::NoSuitableDriver {
            role: Token::new("service_manager"),
            operation: "enable".to_string(),
        };
        assert_eq!(e.to_string(), "no suitable driver for service_manager.enable");
    }

    #[test]
    fn missing_dependencies_display_lists_items() {
        let mut missing = Missing::default();
        missing.push(RequirementKind::Programs, "toolx");
        let e = DispatchError::MissingDependencies {
            driver: Token::new("toolx_driver"),
            missing,
        };
        let s = e.to_string();
        assert!(s.contains("toolx_driver"));
        assert!(s.contains("programs: toolx"), "got: {s}");
    }

    #[test]
    fn invalid_capability_spec_display() {
        let e = DispatchError::InvalidCapabilitySpec {
            kind: "sockets".to_string(),
        };
        assert!(e.to_string().contains("'sockets'"));
    }

    #[test]
    fn failed_has_source() {
        use std::error::Error as _;
        let e = DispatchError::Failed {
            driver: Token::new("apt"),
            operation: "install".to_string(),
            source: anyhow::anyhow!("apt-get exited with code 100"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("apt.install failed"));
    }

    #[test]
    fn caller_errors_are_classified() {
        let unknown = DispatchError::UnknownDriverToken {
            role: Token::new("r"),
            token: "x".to_string(),
        };
        let missing = DispatchError::MissingDependencies {
            driver: Token::new("d"),
            missing: Missing::default(),
        };
        assert!(unknown.is_caller_error());
        assert!(!missing.is_caller_error());
    }

    #[test]
    fn dispatch_error_converts_to_anyhow() {
        let e = DispatchError::no_such_operation(Token::new("sysv"), "enable");
        let any: anyhow::Error = e.into();
        assert!(any.downcast_ref::<DispatchError>().is_some());
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn dispatch_error_is_send_sync() {
        assert_send_sync::<DispatchError>();
    }
}
