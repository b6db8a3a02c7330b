//! Built-in roles and drivers.
//!
//! Registration order is the tie-break order for equal suitability scores,
//! so the native tool of each platform family is listed first.
pub mod file;
pub mod package;
pub mod service;

pub use file::{FileManager, Native};
pub use package::{Apt, PackageManager, Pacman, Paru, Winget};
pub use service::{ServiceManager, Systemd, Sysv};

use crate::error::DispatchError;
use crate::plugin::{Registry, TypeKind};

/// Register every built-in role and driver with `registry`.
///
/// # Errors
///
/// Returns [`DispatchError::DuplicateToken`] if `registry` already holds a
/// different type under one of the built-in tokens.
pub fn register_builtins(registry: &Registry) -> Result<(), DispatchError> {
    registry.register_role::<PackageManager>(TypeKind::Concrete)?;
    registry.register_driver::<Apt>(TypeKind::Concrete)?;
    registry.register_driver::<Pacman>(TypeKind::Concrete)?;
    registry.register_driver::<Paru>(TypeKind::Concrete)?;
    registry.register_driver::<Winget>(TypeKind::Concrete)?;

    registry.register_role::<ServiceManager>(TypeKind::Concrete)?;
    registry.register_driver::<Systemd>(TypeKind::Concrete)?;
    registry.register_driver::<Sysv>(TypeKind::Concrete)?;

    registry.register_role::<FileManager>(TypeKind::Concrete)?;
    registry.register_driver::<Native>(TypeKind::Concrete)?;
    Ok(())
}
