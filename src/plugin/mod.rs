//! Driver-selection core: roles, drivers, availability and dispatch.
//!
//! A *role* (e.g. package management) is served by several *drivers* (apt,
//! pacman, ...).  Each driver declares what it needs from the host
//! ([`Requirements`]), which operations it implements, and how suitable it
//! is for a given call.  A [`Manager`] owns one role's drivers and resolves
//! every operation to exactly one of them: an explicit choice, then a sticky
//! default, then the highest suitability score.
//!
//! ```ignore
//! let ctx = Arc::new(ExecutionContext::new(log));
//! let packages = Manager::for_role::<PackageManager>(registry::global(), &ctx);
//! packages.dispatch("install", &Args::new().with("packages", vec!["git"]), &DispatchOptions::default())?;
//! ```
pub mod capability;
pub mod context;
pub mod driver;
pub mod manager;
pub mod registry;
pub mod token;

pub use capability::{Availability, CapabilitySpec, Missing, RequirementKind, Requirements};
pub use context::ExecutionContext;
pub use driver::{Args, Driver, DriverType, Outcome, Role};
pub use manager::{DispatchOptions, Manager};
pub use registry::{Registry, TypeKind};
pub use token::Token;
