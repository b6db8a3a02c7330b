//! Command: query, install or remove packages.
use anyhow::Result;

use crate::cli::{PackageAction, PackageOpts};
use crate::commands::Session;
use crate::managers::PackageManager;

/// Run one package operation over every name given.
///
/// # Errors
///
/// Returns an error if the configured default driver is unknown, or if the
/// operation failed or found no available driver.
pub fn run(session: &Session, opts: &PackageOpts) -> Result<()> {
    let mut packages = PackageManager::new(session.registry, &session.ctx);
    session.apply_default(packages.manager_mut())?;

    let options = opts.select.options();
    session.log.stage(&format!(
        "{} {} package(s)",
        opts.action.operation(),
        opts.names.len()
    ));
    let result = match opts.action {
        PackageAction::Installed => packages.installed(&opts.names, &options),
        PackageAction::Install => packages.install(&opts.names, &options),
        PackageAction::Uninstall => packages.uninstall(&opts.names, &options),
    };
    let name = format!(
        "{}.{} {}",
        packages.manager().role(),
        opts.action.operation(),
        opts.names.join(" ")
    );
    session.record(&name, result);
    session.finish()
}
