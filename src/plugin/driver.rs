//! The driver contract: availability, suitability and operation calls.
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use super::capability::{self, Availability, Requirements};
use super::context::ExecutionContext;
use super::token::Token;

/// Marker for a manager role (the abstract capability domain drivers
/// implement, e.g. packages or services).
pub trait Role: 'static {
    /// The role's token, derived from the type name by default.
    fn token() -> Token {
        Token::of::<Self>()
    }
}

/// Arguments for one operation call: a JSON object with typed accessors.
///
/// # Examples
///
/// ```
/// use automate_cli::plugin::Args;
///
/// let args = Args::new().with("packages", vec!["git", "vim"]).with("force", true);
/// assert_eq!(args.strings("packages").unwrap(), ["git", "vim"]);
/// assert!(args.flag("force"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Args(Map<String, Value>);

impl Args {
    /// Empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Build from a JSON value; anything other than an object yields an
    /// empty argument set.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Raw access to one argument.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A required string argument.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is absent or not a string.
    pub fn str(&self, key: &str) -> Result<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .with_context(|| format!("missing string argument '{key}'"))
    }

    /// A required list of strings; a single string is accepted as a list
    /// of one.
    ///
    /// # Errors
    ///
    /// Returns an error if `key` is absent or holds anything but strings.
    pub fn strings(&self, key: &str) -> Result<Vec<String>> {
        match self.0.get(key) {
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(String::from)
                        .with_context(|| format!("argument '{key}' must contain only strings"))
                })
                .collect(),
            _ => anyhow::bail!("missing list argument '{key}'"),
        }
    }

    /// An optional integer argument.
    #[must_use]
    pub fn int(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// An optional boolean flag (absent means `false`).
    #[must_use]
    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Tagged result of a driver operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    /// No change was needed; nothing was touched.
    Unchanged,
    /// The system was changed.
    Changed {
        /// What changed.
        details: Vec<String>,
    },
    /// Dry-run: the system would have been changed.
    WouldChange {
        /// What would change.
        details: Vec<String>,
    },
    /// The operation ran but reported a non-fatal failure.
    Failed {
        /// Why the operation failed.
        reason: String,
    },
    /// A query result (e.g. whether a package is installed).
    Value(Value),
}

impl Outcome {
    /// Build a [`Outcome::Value`].
    #[must_use]
    pub fn value(v: impl Into<Value>) -> Self {
        Self::Value(v.into())
    }

    /// Returns `true` for `Changed` and `WouldChange`.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        matches!(self, Self::Changed { .. } | Self::WouldChange { .. })
    }

    /// The boolean carried by a [`Outcome::Value`], if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Value(v) => v.as_bool(),
            _ => None,
        }
    }

    /// The change details, if this is a change.
    #[must_use]
    pub fn details(&self) -> &[String] {
        match self {
            Self::Changed { details } | Self::WouldChange { details } => details,
            _ => &[],
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::Changed { details } => write!(f, "changed: {}", details.join(", ")),
            Self::WouldChange { details } => write!(f, "would change: {}", details.join(", ")),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

/// One platform- or technology-specific implementation of a role.
///
/// The `'static` bound gives each driver struct a stable [`TypeId`], which
/// keys the availability cache (see [`Driver::type_key`]).
pub trait Driver: Send + Sync + fmt::Debug + 'static {
    /// Canonical token, derived from the concrete type's name.
    fn token(&self) -> Token {
        Token::of::<Self>()
    }

    /// The concrete `TypeId` of this driver, used as the availability cache key.
    fn type_key(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    /// External requirements of this driver type.
    ///
    /// The default declares nothing, which makes the driver unavailable.
    /// Return [`Requirements::Nothing`] for drivers that need nothing.
    fn requirements(&self) -> Requirements {
        Requirements::Undeclared
    }

    /// Cached availability record for this driver type.
    fn availability(&self) -> Availability {
        capability::global().get_or_evaluate(self.type_key(), || self.requirements())
    }

    /// Whether every declared requirement is satisfied.
    fn available(&self) -> bool {
        self.availability().available
    }

    /// Names of the operations this driver implements.
    fn operations(&self) -> &'static [&'static str];

    /// Whether this driver implements `operation` at all.
    fn implements(&self, operation: &str) -> bool {
        self.operations().iter().any(|op| *op == operation)
    }

    /// Self-reported fitness for `operation` with `args`.  Values below 1
    /// opt out of automatic selection.  The default is 1 when available and
    /// 0 otherwise.
    fn suitability(&self, _operation: &str, _args: &Args) -> i32 {
        i32::from(self.available())
    }

    /// Perform `operation`.
    ///
    /// Mutating operations must follow the execution context's mode (see
    /// [`ExecutionContext::converge`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails, its arguments are invalid, or
    /// the driver does not implement it.
    fn call(&self, operation: &str, args: &Args) -> Result<Outcome>;
}

/// A driver type that can be registered and instantiated.
pub trait DriverType: Driver + Sized {
    /// The role this driver implements.
    type Role: Role;

    /// Construct an instance bound to the shared context.
    fn build(ctx: Arc<ExecutionContext>) -> Self;
}
