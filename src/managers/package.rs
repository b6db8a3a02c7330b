//! Package management role and its drivers.
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;

use crate::error::DispatchError;
use crate::plugin::{
    Args, CapabilitySpec, DispatchOptions, Driver, DriverType, ExecutionContext, Manager, Outcome,
    Registry, Requirements, Role,
};

const OPERATIONS: &[&str] = &["installed", "install", "uninstall"];

/// Installs, removes and queries system packages.
///
/// Operations take a `packages` argument (one name or a list).  `installed`
/// answers with an object mapping each name to a boolean; `install` and
/// `uninstall` only act on the packages that need it.
#[derive(Debug)]
pub struct PackageManager {
    manager: Manager,
}

impl Role for PackageManager {}

impl PackageManager {
    /// Build the role with every registered package driver.
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

    /// Which of `names` are installed.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn installed(
        &self,
        names: &[String],
        options: &DispatchOptions,
    ) -> Result<Outcome, DispatchError> {
        self.manager
            .dispatch("installed", &Args::new().with("packages", names), options)
    }

    /// Install every package in `names` that is missing.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn install(
        &self,
        names: &[String],
        options: &DispatchOptions,
    ) -> Result<Outcome, DispatchError> {
        self.manager
            .dispatch("install", &Args::new().with("packages", names), options)
    }

    /// Remove every package in `names` that is installed.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn uninstall(
        &self,
        names: &[String],
        options: &DispatchOptions,
    ) -> Result<Outcome, DispatchError> {
        self.manager
            .dispatch("uninstall", &Args::new().with("packages", names), options)
    }
}

/// Tool-specific half of a package driver; the shared half is [`run`].
trait PackageTool: Driver {
    fn ctx(&self) -> &ExecutionContext;

    /// The subset of `names` currently installed.
    fn query_installed(&self, names: &[String]) -> Result<HashSet<String>>;

    fn install_packages(&self, names: &[String]) -> Result<()>;

    fn uninstall_packages(&self, names: &[String]) -> Result<()>;
}

/// Shared operation handling for every package driver.
fn run<T: PackageTool>(tool: &T, operation: &str, args: &Args) -> Result<Outcome> {
    let token = tool.token();
    if !tool.implements(operation) {
        return Err(DispatchError::no_such_operation(token, operation).into());
    }
    let names = args.strings("packages")?;
    let installed = tool.query_installed(&names)?;
    match operation {
        "installed" => {
            let map: serde_json::Map<String, Value> = names
                .iter()
                .map(|n| (n.clone(), Value::Bool(installed.contains(n))))
                .collect();
            Ok(Outcome::Value(Value::Object(map)))
        }
        "install" => {
            let missing: Vec<String> = names
                .into_iter()
                .filter(|n| !installed.contains(n))
                .collect();
            let details = missing
                .iter()
                .map(|n| format!("install {n} ({token})"))
                .collect();
            tool.ctx()
                .converge(!missing.is_empty(), details, || tool.install_packages(&missing))
        }
        "uninstall" => {
            let present: Vec<String> = names
                .into_iter()
                .filter(|n| installed.contains(n))
                .collect();
            let details = present
                .iter()
                .map(|n| format!("uninstall {n} ({token})"))
                .collect();
            tool.ctx().converge(!present.is_empty(), details, || {
                tool.uninstall_packages(&present)
            })
        }
        _ => Err(DispatchError::no_such_operation(token, operation).into()),
    }
}

/// Suitability for a driver that is the host's native tool when `native`.
fn platform_score(available: bool, native: bool) -> i32 {
    match (available, native) {
        (false, _) => 0,
        (true, true) => 10,
        (true, false) => 1,
    }
}

/// Package names from `pacman -Q`-style output ("name version" per line).
fn parse_name_version_lines(stdout: &str) -> HashSet<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(String::from)
        .collect()
}

fn with_names<'a>(prefix: &[&'a str], names: &'a [String]) -> Vec<&'a str> {
    let mut args = prefix.to_vec();
    args.extend(names.iter().map(String::as_str));
    args
}

/// Debian family: `apt-get` and `dpkg-query`.
#[derive(Debug)]
pub struct Apt {
    ctx: Arc<ExecutionContext>,
}

impl Driver for Apt {
    fn requirements(&self) -> Requirements {
        CapabilitySpec::new()
            .programs(["apt-get", "dpkg-query"])
            .into()
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn suitability(&self, _: &str, _: &Args) -> i32 {
        platform_score(self.available(), self.ctx.platform.is_debian())
    }

    fn call(&self, operation: &str, args: &Args) -> Result<Outcome> {
        run(self, operation, args)
    }
}

impl PackageTool for Apt {
    fn ctx(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn query_installed(&self, names: &[String]) -> Result<HashSet<String>> {
        // Unknown names make dpkg-query exit non-zero but still list the rest.
        let args = with_names(&["-W", "--showformat=${Package}\t${Status}\n"], names);
        let result = self.ctx.executor.run_unchecked("dpkg-query", &args)?;
        Ok(result
            .stdout
            .lines()
            .filter_map(|line| line.split_once('\t'))
            .filter(|(_, status)| status.split_whitespace().next_back() == Some("installed"))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    fn install_packages(&self, names: &[String]) -> Result<()> {
        let args = with_names(&["apt-get", "install", "-y"], names);
        self.ctx.executor.run("sudo", &args)?;
        Ok(())
    }

    fn uninstall_packages(&self, names: &[String]) -> Result<()> {
        let args = with_names(&["apt-get", "remove", "-y"], names);
        self.ctx.executor.run("sudo", &args)?;
        Ok(())
    }
}

impl DriverType for Apt {
    type Role = PackageManager;

    fn build(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

/// Official Arch Linux packages (pacman).
#[derive(Debug)]
pub struct Pacman {
    ctx: Arc<ExecutionContext>,
}

impl Driver for Pacman {
    fn requirements(&self) -> Requirements {
        CapabilitySpec::new().programs(["pacman"]).into()
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn suitability(&self, _: &str, _: &Args) -> i32 {
        platform_score(self.available(), self.ctx.platform.is_arch())
    }

    fn call(&self, operation: &str, args: &Args) -> Result<Outcome> {
        run(self, operation, args)
    }
}

impl PackageTool for Pacman {
    fn ctx(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn query_installed(&self, _names: &[String]) -> Result<HashSet<String>> {
        // `pacman -Q` lists all explicitly & dependency-installed packages,
        // one per line: "name version"
        let result = self.ctx.executor.run_unchecked("pacman", &["-Q"])?;
        if result.success {
            Ok(parse_name_version_lines(&result.stdout))
        } else {
            Ok(HashSet::new())
        }
    }

    fn install_packages(&self, names: &[String]) -> Result<()> {
        let args = with_names(&["pacman", "-S", "--needed", "--noconfirm"], names);
        self.ctx.executor.run("sudo", &args)?;
        Ok(())
    }

    fn uninstall_packages(&self, names: &[String]) -> Result<()> {
        let args = with_names(&["pacman", "-Rns", "--noconfirm"], names);
        self.ctx.executor.run("sudo", &args)?;
        Ok(())
    }
}

impl DriverType for Pacman {
    type Role = PackageManager;

    fn build(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

/// AUR packages (paru).
///
/// Never chosen automatically: AUR builds run arbitrary PKGBUILDs, so paru
/// is only used when named with `--with paru` or configured as the default.
#[derive(Debug)]
pub struct Paru {
    ctx: Arc<ExecutionContext>,
}

impl Driver for Paru {
    fn requirements(&self) -> Requirements {
        CapabilitySpec::new().programs(["paru"]).into()
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn suitability(&self, _: &str, _: &Args) -> i32 {
        0
    }

    fn call(&self, operation: &str, args: &Args) -> Result<Outcome> {
        run(self, operation, args)
    }
}

impl PackageTool for Paru {
    fn ctx(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn query_installed(&self, _names: &[String]) -> Result<HashSet<String>> {
        let result = self.ctx.executor.run_unchecked("paru", &["-Q"])?;
        if result.success {
            Ok(parse_name_version_lines(&result.stdout))
        } else {
            Ok(HashSet::new())
        }
    }

    fn install_packages(&self, names: &[String]) -> Result<()> {
        let args = with_names(&["-S", "--needed", "--noconfirm"], names);
        self.ctx.executor.run("paru", &args)?;
        Ok(())
    }

    fn uninstall_packages(&self, names: &[String]) -> Result<()> {
        let args = with_names(&["-Rns", "--noconfirm"], names);
        self.ctx.executor.run("paru", &args)?;
        Ok(())
    }
}

impl DriverType for Paru {
    type Role = PackageManager;

    fn build(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

/// Windows packages (winget).
#[derive(Debug)]
pub struct Winget {
    ctx: Arc<ExecutionContext>,
}

impl Winget {
    /// Run one winget subcommand for `id`, folding both output streams into
    /// the error on failure.
    fn run_for(&self, verb: &str, id: &str, extra: &[&str]) -> Result<()> {
        let mut args = vec![verb, "--id", id, "--exact"];
        args.extend_from_slice(extra);
        let result = self.ctx.executor.run_unchecked("winget", &args)?;
        if result.success {
            return Ok(());
        }
        // winget writes most diagnostics to stdout, not stderr.
        let detail = if result.stderr.trim().is_empty() {
            result.stdout.trim().to_string()
        } else {
            format!("{}\n{}", result.stdout.trim(), result.stderr.trim())
        };
        anyhow::bail!("winget {verb} failed for '{id}': {detail}")
    }
}

impl Driver for Winget {
    fn requirements(&self) -> Requirements {
        CapabilitySpec::new().programs(["winget"]).into()
    }

    fn operations(&self) -> &'static [&'static str] {
        OPERATIONS
    }

    fn suitability(&self, _: &str, _: &Args) -> i32 {
        platform_score(self.available(), self.ctx.platform.is_windows())
    }

    fn call(&self, operation: &str, args: &Args) -> Result<Outcome> {
        run(self, operation, args)
    }
}

impl PackageTool for Winget {
    fn ctx(&self) -> &ExecutionContext {
        &self.ctx
    }

    fn query_installed(&self, names: &[String]) -> Result<HashSet<String>> {
        // `winget list` prints a table; IDs are reverse-domain names
        // (e.g. `Git.Git`), so exact token matches are unambiguous.
        let result = self.ctx.executor.run_unchecked(
            "winget",
            &[
                "list",
                "--accept-source-agreements",
                "--disable-interactivity",
            ],
        )?;
        if !result.success {
            return Ok(HashSet::new());
        }
        let tokens: HashSet<&str> = result.stdout.split_whitespace().collect();
        Ok(names
            .iter()
            .filter(|n| tokens.contains(n.as_str()))
            .cloned()
            .collect())
    }

    fn install_packages(&self, names: &[String]) -> Result<()> {
        // winget has no multi-package install
        for id in names {
            self.run_for(
                "install",
                id,
                &[
                    "--source",
                    "winget",
                    "--accept-source-agreements",
                    "--accept-package-agreements",
                ],
            )?;
        }
        Ok(())
    }

    fn uninstall_packages(&self, names: &[String]) -> Result<()> {
        for id in names {
            self.run_for("uninstall", id, &["--disable-interactivity"])?;
        }
        Ok(())
    }
}

impl DriverType for Winget {
    type Role = PackageManager;

    fn build(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}
