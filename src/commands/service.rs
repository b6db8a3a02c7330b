//! Command: query or change a system service.
use anyhow::Result;

use crate::cli::ServiceOpts;
use crate::commands::Session;
use crate::managers::ServiceManager;

/// Run one service operation.
///
/// # Errors
///
/// Returns an error if the configured default driver is unknown, or if the
/// operation failed or found no available driver.
pub fn run(session: &Session, opts: &ServiceOpts) -> Result<()> {
    let mut services = ServiceManager::new(session.registry, &session.ctx);
    session.apply_default(services.manager_mut())?;

    let operation = opts.action.operation();
    let scope = if opts.user { " (user)" } else { "" };
    session
        .log
        .stage(&format!("{operation} {}{scope}", opts.name));
    let result = services.call(operation, &opts.name, opts.user, &opts.select.options());
    let name = format!("{}.{operation} {}", services.manager().role(), opts.name);
    session.record(&name, result);
    session.finish()
}
