//! File management role and the native filesystem driver.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::DispatchError;
use crate::plugin::{
    Args, DispatchOptions, Driver, DriverType, ExecutionContext, Manager, Outcome, Registry,
    Requirements, Role,
};

/// Creates, links and removes files and directories.
#[derive(Debug)]
pub struct FileManager {
    manager: Manager,
}

impl Role for FileManager {}

impl FileManager {
    /// Build the role with every registered file driver.
    #[must_use]
    pub fn new(registry: &Registry, ctx: &Arc<ExecutionContext>) -> Self {
        Self {
            manager: Manager::for_role::<Self>(registry, ctx),
        }
    }

    /// The underlying dispatcher.
    #[must_use]
    pub const fn manager(&self) -> &Manager {
        &self.manager
    }

    /// Mutable access to the dispatcher (for sticky defaults).
    pub const fn manager_mut(&mut self) -> &mut Manager {
        &mut self.manager
    }

    /// Whether anything (including a broken symlink) exists at `path`.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn exists(&self, path: &Path, options: &DispatchOptions) -> Result<Outcome, DispatchError> {
        self.manager.dispatch("exists", &path_args(path), options)
    }

    /// Make `path` a regular file holding exactly `content`.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn write(
        &self,
        path: &Path,
        content: &str,
        options: &DispatchOptions,
    ) -> Result<Outcome, DispatchError> {
        self.manager
            .dispatch("write", &path_args(path).with("content", content), options)
    }

    /// Make `path` a directory, creating parents.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn mkdir(&self, path: &Path, options: &DispatchOptions) -> Result<Outcome, DispatchError> {
        self.manager.dispatch("mkdir", &path_args(path), options)
    }

    /// Make `target` a symlink pointing at `source`.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn symlink(
        &self,
        source: &Path,
        target: &Path,
        options: &DispatchOptions,
    ) -> Result<Outcome, DispatchError> {
        let args = Args::new()
            .with("source", source.to_string_lossy().as_ref())
            .with("target", target.to_string_lossy().as_ref());
        self.manager.dispatch("symlink", &args, options)
    }

    /// Remove the file, symlink or empty directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn remove(&self, path: &Path, options: &DispatchOptions) -> Result<Outcome, DispatchError> {
        self.manager.dispatch("remove", &path_args(path), options)
    }
}

fn path_args(path: &Path) -> Args {
    Args::new().with("path", path.to_string_lossy().as_ref())
}

/// Direct `std::fs` access on the local host.
#[derive(Debug)]
pub struct Native {
    ctx: Arc<ExecutionContext>,
}

impl Native {
    fn write(&self, path: &Path, content: &str) -> Result<Outcome> {
        let meta = path.symlink_metadata().ok();
        if meta.as_ref().is_some_and(std::fs::Metadata::is_dir) {
            return Ok(Outcome::Failed {
                reason: format!("{} is a directory", path.display()),
            });
        }
        let current = match meta {
            Some(m) if m.is_file() => Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?,
            ),
            _ => None,
        };
        let verb = if current.is_some() { "update" } else { "create" };
        self.ctx.converge(
            current.as_deref() != Some(content),
            vec![format!("{verb} {}", path.display())],
            || {
                ensure_parent_dir(path)?;
                remove_existing(path)?;
                std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
            },
        )
    }

    fn mkdir(&self, path: &Path) -> Result<Outcome> {
        if path.is_file() {
            return Ok(Outcome::Failed {
                reason: format!("{} is a file", path.display()),
            });
        }
        self.ctx.converge(
            !path.is_dir(),
            vec![format!("create directory {}", path.display())],
            || {
                std::fs::create_dir_all(path)
                    .with_context(|| format!("creating directory {}", path.display()))
            },
        )
    }

    fn symlink(&self, source: &Path, target: &Path) -> Result<Outcome> {
        // A real directory at the target is never replaced
        if target
            .symlink_metadata()
            .is_ok_and(|m| m.is_dir() && !m.is_symlink())
        {
            return Ok(Outcome::Failed {
                reason: format!("target is a real directory: {}", target.display()),
            });
        }
        let correct = std::fs::read_link(target).is_ok_and(|existing| paths_equal(&existing, source));
        self.ctx.converge(
            !correct,
            vec![format!("link {} -> {}", target.display(), source.display())],
            || {
                ensure_parent_dir(target)?;
                remove_existing(target)?;
                create_symlink(source, target)
            },
        )
    }

    fn remove(&self, path: &Path) -> Result<Outcome> {
        let Ok(meta) = path.symlink_metadata() else {
            return Ok(Outcome::Unchanged);
        };
        if meta.is_dir()
            && std::fs::read_dir(path)
                .with_context(|| format!("reading directory {}", path.display()))?
                .next()
                .is_some()
        {
            return Ok(Outcome::Failed {
                reason: format!("{} is not empty", path.display()),
            });
        }
        self.ctx
            .converge(true, vec![format!("remove {}", path.display())], || {
                if meta.is_dir() {
                    std::fs::remove_dir(path)
                        .with_context(|| format!("removing directory {}", path.display()))
                } else {
                    remove_existing(path)
                }
            })
    }
}

impl Driver for Native {
    fn requirements(&self) -> Requirements {
        Requirements::Nothing
    }

    fn operations(&self) -> &'static [&'static str] {
        &["exists", "write", "mkdir", "symlink", "remove"]
    }

    fn call(&self, operation: &str, args: &Args) -> Result<Outcome> {
        let path = || args.str("path").map(PathBuf::from);
        match operation {
            "exists" => Ok(Outcome::value(path()?.symlink_metadata().is_ok())),
            "write" => self.write(&path()?, args.str("content")?),
            "mkdir" => self.mkdir(&path()?),
            "symlink" => self.symlink(
                Path::new(args.str("source")?),
                Path::new(args.str("target")?),
            ),
            "remove" => self.remove(&path()?),
            _ => Err(DispatchError::no_such_operation(self.token(), operation).into()),
        }
    }
}

impl DriverType for Native {
    type Role = FileManager;

    fn build(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

/// Create parent directories of `path` as needed.
fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Remove an existing file or symlink at `path`, including broken symlinks.
/// Does nothing if `path` does not exist.
fn remove_existing(path: &Path) -> Result<()> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    let result = if is_dir_like(&meta) {
        std::fs::remove_dir(path)
    } else {
        std::fs::remove_file(path)
    };
    result.with_context(|| format!("remove existing: {}", path.display()))
}

/// Check if metadata represents a directory-like entry.
/// On Windows, `symlink_metadata().is_dir()` returns `false` for directory symlinks,
/// so we check the raw `FILE_ATTRIBUTE_DIRECTORY` bit instead.
fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0 // FILE_ATTRIBUTE_DIRECTORY
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}

/// Compare two paths for equality, ignoring Windows verbatim prefixes.
fn paths_equal(a: &Path, b: &Path) -> bool {
    dunce::simplified(a) == dunce::simplified(b)
}

/// Create a symlink at `link` pointing to `target`.
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);

    #[cfg(windows)]
    let result = if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    };

    result.with_context(|| {
        format!(
            "creating symlink {} -> {}",
            link.display(),
            target.display()
        )
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::plugin::test_helpers::test_context;

    fn native() -> Native {
        Native::build(Arc::new(test_context()))
    }

    fn dry_native() -> Native {
        Native::build(Arc::new(test_context().dry_run(true)))
    }

    fn path_str(p: &Path) -> String {
        p.to_string_lossy().into_owned()
    }

    #[test]
    fn native_needs_nothing() {
        assert!(native().available());
        assert_eq!(native().suitability("write", &Args::new()), 1);
    }

    #[test]
    fn write_creates_then_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("a.txt");
        let args = Args::new()
            .with("path", path_str(&file))
            .with("content", "hello\n");
        let first = native().call("write", &args).unwrap();
        assert!(matches!(first, Outcome::Changed { .. }));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "hello\n");
        assert_eq!(native().call("write", &args).unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn write_updates_different_content() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "old").unwrap();
        let args = Args::new()
            .with("path", path_str(&file))
            .with("content", "new");
        let outcome = native().call("write", &args).unwrap();
        assert_eq!(outcome.details(), [format!("update {}", file.display())]);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "new");
    }

    #[test]
    fn write_in_dry_run_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        let args = Args::new()
            .with("path", path_str(&file))
            .with("content", "x");
        let outcome = dry_native().call("write", &args).unwrap();
        assert!(matches!(outcome, Outcome::WouldChange { .. }));
        assert!(!file.exists());
    }

    #[test]
    fn write_onto_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::new()
            .with("path", path_str(dir.path()))
            .with("content", "x");
        assert!(matches!(
            native().call("write", &args).unwrap(),
            Outcome::Failed { .. }
        ));
    }

    #[test]
    fn mkdir_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("a").join("b");
        let args = Args::new().with("path", path_str(&sub));
        assert_eq!(
            native().call("exists", &args).unwrap().as_bool(),
            Some(false)
        );
        assert!(native().call("mkdir", &args).unwrap().is_change());
        assert!(sub.is_dir());
        assert_eq!(native().call("mkdir", &args).unwrap(), Outcome::Unchanged);
        assert_eq!(native().call("exists", &args).unwrap().as_bool(), Some(true));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_created_then_correct() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let target = dir.path().join("links").join("target.txt");
        std::fs::write(&source, "content").unwrap();
        let args = Args::new()
            .with("source", path_str(&source))
            .with("target", path_str(&target));
        assert!(native().call("symlink", &args).unwrap().is_change());
        assert_eq!(std::fs::read_link(&target).unwrap(), source);
        assert_eq!(native().call("symlink", &args).unwrap(), Outcome::Unchanged);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_replaces_wrong_link_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let other = dir.path().join("other.txt");
        let target = dir.path().join("target.txt");
        std::fs::write(&source, "a").unwrap();
        std::fs::write(&other, "b").unwrap();
        std::os::unix::fs::symlink(&other, &target).unwrap();
        let args = Args::new()
            .with("source", path_str(&source))
            .with("target", path_str(&target));
        assert!(native().call("symlink", &args).unwrap().is_change());
        assert_eq!(std::fs::read_link(&target).unwrap(), source);

        std::fs::remove_file(&target).unwrap();
        std::fs::write(&target, "regular").unwrap();
        assert!(native().call("symlink", &args).unwrap().is_change());
        assert_eq!(std::fs::read_link(&target).unwrap(), source);
    }

    #[test]
    fn symlink_never_replaces_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source");
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let args = Args::new()
            .with("source", path_str(&source))
            .with("target", path_str(&target));
        assert!(matches!(
            native().call("symlink", &args).unwrap(),
            Outcome::Failed { .. }
        ));
        assert!(target.is_dir());
    }

    #[test]
    fn remove_file_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();
        let args = Args::new().with("path", path_str(&file));
        assert!(native().call("remove", &args).unwrap().is_change());
        assert!(!file.exists());
        assert_eq!(native().call("remove", &args).unwrap(), Outcome::Unchanged);
    }

    #[test]
    fn remove_refuses_non_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();
        let args = Args::new().with("path", path_str(dir.path()));
        for driver in [native(), dry_native()] {
            assert!(matches!(
                driver.call("remove", &args).unwrap(),
                Outcome::Failed { .. }
            ));
        }
        assert!(dir.path().join("keep.txt").exists());
    }

    #[test]
    fn remove_empty_directory_in_both_modes() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::create_dir(&empty).unwrap();
        let args = Args::new().with("path", path_str(&empty));
        assert!(matches!(
            dry_native().call("remove", &args).unwrap(),
            Outcome::WouldChange { .. }
        ));
        assert!(empty.is_dir());
        assert!(native().call("remove", &args).unwrap().is_change());
        assert!(!empty.exists());
    }

    #[test]
    fn paths_equal_ignores_verbatim_prefix() {
        assert!(paths_equal(Path::new("/a/b"), Path::new("/a/b")));
        assert!(!paths_equal(Path::new("/a/b"), Path::new("/a/c")));
        #[cfg(windows)]
        assert!(paths_equal(
            Path::new(r"\\?\C:\automate\x"),
            Path::new(r"C:\automate\x")
        ));
    }
}
