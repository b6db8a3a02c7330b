//! Capability descriptors and the per-type availability cache.
//!
//! A driver declares the external resources it needs (files, directories,
//! programs, shared libraries and arbitrary predicates) once, through
//! [`Driver::requirements`](super::Driver::requirements).  The first time any
//! instance of that driver type is asked whether it is available, the
//! requirements are evaluated in a fixed order and the result is cached on
//! the *type* for the rest of the process.
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, LazyLock, OnceLock, RwLock};

use serde::Serialize;

use crate::error::DispatchError;

/// The kinds of requirement a capability descriptor can name.
///
/// The declaration order of the variants is the evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementKind {
    /// Paths that must exist.
    Files,
    /// Paths that must exist and be directories.
    Directories,
    /// Executable names resolvable on `PATH`.
    Programs,
    /// Shared libraries that must resolve in the library search path.
    Libraries,
    /// Named zero-argument predicates, evaluated last.
    Callbacks,
}

impl RequirementKind {
    /// All kinds in evaluation order.
    pub const ORDER: [Self; 5] = [
        Self::Files,
        Self::Directories,
        Self::Programs,
        Self::Libraries,
        Self::Callbacks,
    ];

    /// The kind's name as written in declarations.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Directories => "directories",
            Self::Programs => "programs",
            Self::Libraries => "libraries",
            Self::Callbacks => "callbacks",
        }
    }
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementKind {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ORDER
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DispatchError::InvalidCapabilitySpec {
                kind: s.to_string(),
            })
    }
}

/// A named predicate requirement.
#[derive(Clone)]
pub struct Callback {
    name: String,
    check: Arc<dyn Fn() -> bool + Send + Sync>,
}

impl Callback {
    /// Create a callback requirement; `name` is what gets reported when the
    /// predicate returns `false`.
    pub fn new(name: impl Into<String>, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Name reported in the missing-items map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback")
            .field("name", &self.name)
            .field("check", &"<fn>")
            .finish()
    }
}

/// The declared set of external requirements for a driver type.
///
/// # Examples
///
/// ```
/// use automate_cli::plugin::CapabilitySpec;
///
/// let spec = CapabilitySpec::new()
///     .programs(["apt-get", "dpkg-query"])
///     .directories(["/var/lib/dpkg"]);
/// assert_eq!(spec.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CapabilitySpec {
    files: Vec<PathBuf>,
    directories: Vec<PathBuf>,
    programs: Vec<String>,
    libraries: Vec<String>,
    callbacks: Vec<Callback>,
}

impl CapabilitySpec {
    /// An empty declaration (equivalent to "no requirements").
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require files to exist.
    #[must_use]
    pub fn files<I, P>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.files.extend(items.into_iter().map(Into::into));
        self
    }

    /// Require directories to exist.
    #[must_use]
    pub fn directories<I, P>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.directories.extend(items.into_iter().map(Into::into));
        self
    }

    /// Require programs to be resolvable on `PATH`.
    #[must_use]
    pub fn programs<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.programs.extend(items.into_iter().map(Into::into));
        self
    }

    /// Require shared libraries to resolve.
    #[must_use]
    pub fn libraries<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.libraries.extend(items.into_iter().map(Into::into));
        self
    }

    /// Require a named predicate to hold.
    #[must_use]
    pub fn callback(
        mut self,
        name: impl Into<String>,
        check: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.push(Callback::new(name, check));
        self
    }

    /// Build a declaration from `(kind, items)` pairs, as found in
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidCapabilitySpec`] if a kind is not one
    /// of `files`, `directories`, `programs` or `libraries`.  Callbacks are
    /// code and cannot be declared from data.
    pub fn from_table<I, K>(table: I) -> Result<Self, DispatchError>
    where
        I: IntoIterator<Item = (K, Vec<String>)>,
        K: AsRef<str>,
    {
        let mut spec = Self::new();
        for (kind, items) in table {
            spec = match kind.as_ref().parse::<RequirementKind>()? {
                RequirementKind::Files => spec.files(items),
                RequirementKind::Directories => spec.directories(items),
                RequirementKind::Programs => spec.programs(items),
                RequirementKind::Libraries => spec.libraries(items),
                RequirementKind::Callbacks => {
                    return Err(DispatchError::InvalidCapabilitySpec {
                        kind: kind.as_ref().to_string(),
                    });
                }
            };
        }
        Ok(spec)
    }

    /// Total number of declared items across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
            + self.directories.len()
            + self.programs.len()
            + self.libraries.len()
            + self.callbacks.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate the declaration, stopping at the first failing item.
    #[must_use]
    pub fn evaluate(&self) -> Availability {
        for kind in RequirementKind::ORDER {
            if let Some(item) = self.first_failure(kind) {
                tracing::debug!(%kind, %item, "requirement not satisfied");
                let mut missing = Missing::default();
                missing.push(kind, item);
                return Availability {
                    available: false,
                    missing,
                };
            }
        }
        Availability::satisfied()
    }

    fn first_failure(&self, kind: RequirementKind) -> Option<String> {
        match kind {
            RequirementKind::Files => self
                .files
                .iter()
                .find(|p| !p.exists())
                .map(|p| p.display().to_string()),
            RequirementKind::Directories => self
                .directories
                .iter()
                .find(|p| !p.is_dir())
                .map(|p| p.display().to_string()),
            RequirementKind::Programs => self
                .programs
                .iter()
                .find(|p| which::which(p.as_str()).is_err())
                .cloned(),
            RequirementKind::Libraries => self
                .libraries
                .iter()
                .find(|l| !library_resolves(l))
                .cloned(),
            RequirementKind::Callbacks => self
                .callbacks
                .iter()
                .find(|c| !(c.check)())
                .map(|c| c.name.clone()),
        }
    }
}

/// A driver type's capability declaration.
#[derive(Debug, Clone, Default)]
pub enum Requirements {
    /// Nothing was declared; the driver is treated as unavailable.
    #[default]
    Undeclared,
    /// The driver explicitly needs nothing and is always available.
    Nothing,
    /// The driver needs everything the [`CapabilitySpec`] lists.
    Declared(CapabilitySpec),
}

impl Requirements {
    /// Evaluate the requirements without caching.
    #[must_use]
    pub fn evaluate(&self) -> Availability {
        match self {
            Self::Undeclared => Availability {
                available: false,
                missing: Missing::default(),
            },
            Self::Nothing => Availability::satisfied(),
            Self::Declared(spec) => spec.evaluate(),
        }
    }
}

impl From<CapabilitySpec> for Requirements {
    fn from(spec: CapabilitySpec) -> Self {
        Self::Declared(spec)
    }
}

/// Missing requirement items keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Missing(BTreeMap<RequirementKind, Vec<String>>);

impl Missing {
    /// Record a missing item under `kind`.
    pub fn push(&mut self, kind: RequirementKind, item: impl Into<String>) {
        self.0.entry(kind).or_default().push(item.into());
    }

    /// Missing items of one kind.
    #[must_use]
    pub fn get(&self, kind: RequirementKind) -> &[String] {
        self.0.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns `true` if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(kind, items)` in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (RequirementKind, &[String])> {
        self.0.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("no requirements declared");
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(kind, items)| format!("{kind}: {}", items.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// The cached result of evaluating a driver type's requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// Whether every requirement was satisfied.
    pub available: bool,
    /// The first failing item, if any.
    pub missing: Missing,
}

impl Availability {
    /// An available record with nothing missing.
    #[must_use]
    pub fn satisfied() -> Self {
        Self {
            available: true,
            missing: Missing::default(),
        }
    }
}

/// Compute-once availability records keyed by driver type.
///
/// Concurrent first queries for the same type race only on inserting the
/// empty cell; the evaluation itself runs once inside [`OnceLock`].
#[derive(Debug, Default)]
pub struct AvailabilityCache {
    records: RwLock<HashMap<TypeId, Arc<OnceLock<Availability>>>>,
}

impl AvailabilityCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the record for `key`, evaluating `requirements` only if this is
    /// the first query for that type.
    pub fn get_or_evaluate(
        &self,
        key: TypeId,
        requirements: impl FnOnce() -> Requirements,
    ) -> Availability {
        let cell = self.cell(key);
        cell.get_or_init(|| requirements().evaluate()).clone()
    }

    /// Returns `true` if a record for `key` has already been computed.
    #[must_use]
    pub fn is_cached(&self, key: TypeId) -> bool {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
            .is_some_and(|c| c.get().is_some())
    }

    fn cell(&self, key: TypeId) -> Arc<OnceLock<Availability>> {
        if let Some(cell) = self
            .records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(cell);
        }
        let mut guard = self
            .records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(guard.entry(key).or_default())
    }
}

static GLOBAL_CACHE: LazyLock<AvailabilityCache> = LazyLock::new(AvailabilityCache::new);

/// The process-wide availability cache used by [`Driver::availability`](super::Driver::availability).
#[must_use]
pub fn global() -> &'static AvailabilityCache {
    &GLOBAL_CACHE
}

/// Returns `true` if a shared library named `name` can be found.
///
/// `name` may be a path, a bare library name (`ssl`), or a file name
/// (`libssl.so.3`).  Bare names match `lib<name>.so*` on Linux,
/// `lib<name>.dylib` on macOS and `<name>.dll` on Windows.
fn library_resolves(name: &str) -> bool {
    let as_path = Path::new(name);
    if as_path.components().count() > 1 {
        return as_path.exists();
    }
    library_search_dirs().iter().any(|dir| {
        std::fs::read_dir(dir).is_ok_and(|entries| {
            entries
                .filter_map(Result::ok)
                .any(|e| library_file_matches(&e.file_name().to_string_lossy(), name))
        })
    })
}

fn library_file_matches(file: &str, name: &str) -> bool {
    if file == name {
        return true;
    }
    if cfg!(target_os = "windows") {
        file.eq_ignore_ascii_case(&format!("{name}.dll"))
    } else if cfg!(target_os = "macos") {
        file == format!("lib{name}.dylib")
    } else {
        let stem = format!("lib{name}.so");
        file == stem || file.starts_with(&format!("{stem}."))
    }
}

fn library_search_dirs() -> Vec<PathBuf> {
    let var = if cfg!(target_os = "windows") {
        "PATH"
    } else if cfg!(target_os = "macos") {
        "DYLD_LIBRARY_PATH"
    } else {
        "LD_LIBRARY_PATH"
    };
    let mut dirs: Vec<PathBuf> = std::env::var_os(var)
        .map(|v| std::env::split_paths(&v).collect())
        .unwrap_or_default();
    if !cfg!(target_os = "windows") {
        dirs.extend(
            [
                "/lib",
                "/lib64",
                "/usr/lib",
                "/usr/lib64",
                "/usr/local/lib",
                "/lib/x86_64-linux-gnu",
                "/usr/lib/x86_64-linux-gnu",
                "/lib/aarch64-linux-gnu",
                "/usr/lib/aarch64-linux-gnu",
                "/opt/homebrew/lib",
            ]
            .into_iter()
            .map(PathBuf::from),
        );
    }
    dirs
}
