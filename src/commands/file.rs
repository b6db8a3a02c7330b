//! Command: create, link or remove files.
use anyhow::Result;

use crate::cli::{FileAction, FileOpts};
use crate::commands::Session;
use crate::managers::FileManager;

/// Run one file operation.
///
/// # Errors
///
/// Returns an error if the configured default driver is unknown, or if the
/// operation failed or found no available driver.
pub fn run(session: &Session, opts: &FileOpts) -> Result<()> {
    let mut files = FileManager::new(session.registry, &session.ctx);
    session.apply_default(files.manager_mut())?;

    let options = opts.select.options();
    let (label, result) = match &opts.action {
        FileAction::Exists { path } => (
            format!("exists {}", path.display()),
            files.exists(path, &options),
        ),
        FileAction::Write { path, content } => (
            format!("write {}", path.display()),
            files.write(path, content, &options),
        ),
        FileAction::Mkdir { path } => (
            format!("mkdir {}", path.display()),
            files.mkdir(path, &options),
        ),
        FileAction::Symlink { source, target } => (
            format!("symlink {} -> {}", target.display(), source.display()),
            files.symlink(source, target, &options),
        ),
        FileAction::Remove { path } => (
            format!("remove {}", path.display()),
            files.remove(path, &options),
        ),
    };
    session.record(&format!("{}.{label}", files.manager().role()), result);
    session.finish()
}
