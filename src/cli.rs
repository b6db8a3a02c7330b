//! Command-line interface definition.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::plugin::{DispatchOptions, Token};

/// Top-level CLI entry point for the automation engine.
#[derive(Parser, Debug)]
#[command(
    name = "automate",
    about = "Cross-platform automation with self-selecting platform drivers",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared across all subcommands.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Configuration file (default: $XDG_CONFIG_HOME/automate/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List roles and drivers with their availability
    Drivers(DriversOpts),
    /// Query, install or remove packages
    Package(PackageOpts),
    /// Query or change system services
    Service(ServiceOpts),
    /// Create, link or remove files
    File(FileOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Short name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Drivers(_) => "drivers",
            Self::Package(_) => "package",
            Self::Service(_) => "service",
            Self::File(_) => "file",
            Self::Version => "version",
        }
    }
}

/// Driver selection flags shared by every operation.
#[derive(Parser, Debug, Clone, Default)]
pub struct SelectOpts {
    /// Use exactly this driver (e.g. `paru`)
    #[arg(long = "with", value_name = "TOKEN", global = true)]
    pub with: Option<String>,

    /// Ignore the configured default driver
    #[arg(long, global = true)]
    pub no_default: bool,
}

impl SelectOpts {
    /// Dispatch options for these flags.
    #[must_use]
    pub fn options(&self) -> DispatchOptions {
        DispatchOptions {
            with: self.with.as_deref().map(Token::from),
            use_default: !self.no_default,
        }
    }
}

/// Options for the `drivers` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct DriversOpts {
    /// Only show this role (e.g. `package_manager`)
    pub role: Option<String>,
}

/// Options for the `package` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct PackageOpts {
    /// What to do with the packages.
    #[arg(value_enum)]
    pub action: PackageAction,

    /// Package names (or winget IDs)
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Driver selection.
    #[command(flatten)]
    pub select: SelectOpts,
}

/// Package operations.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    /// Report which packages are installed
    Installed,
    /// Install missing packages
    Install,
    /// Remove installed packages
    Uninstall,
}

impl PackageAction {
    /// Operation identifier passed to dispatch.
    #[must_use]
    pub const fn operation(self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::Install => "install",
            Self::Uninstall => "uninstall",
        }
    }
}

/// Options for the `service` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct ServiceOpts {
    /// What to do with the service.
    #[arg(value_enum)]
    pub action: ServiceAction,

    /// Service or unit name
    pub name: String,

    /// Target the user's service manager instead of the system one
    #[arg(long)]
    pub user: bool,

    /// Driver selection.
    #[command(flatten)]
    pub select: SelectOpts,
}

/// Service operations.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    /// Report whether the service starts at boot
    Enabled,
    /// Start the service at boot
    Enable,
    /// Do not start the service at boot
    Disable,
    /// Report whether the service is running
    Running,
    /// Start the service now
    Start,
    /// Stop the service now
    Stop,
}

impl ServiceAction {
    /// Operation identifier passed to dispatch.
    #[must_use]
    pub const fn operation(self) -> &'static str {
        match self {
            Self::Enabled => "enabled",
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::Running => "running",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Options for the `file` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct FileOpts {
    /// File operation.
    #[command(subcommand)]
    pub action: FileAction,

    /// Driver selection.
    #[command(flatten)]
    pub select: SelectOpts,
}

/// File operations.
#[derive(Subcommand, Debug, Clone)]
pub enum FileAction {
    /// Report whether a path exists
    Exists {
        /// Path to check
        path: PathBuf,
    },
    /// Write a file with exact content
    Write {
        /// File to write
        path: PathBuf,
        /// Content to write
        #[arg(long)]
        content: String,
    },
    /// Create a directory and its parents
    Mkdir {
        /// Directory to create
        path: PathBuf,
    },
    /// Point TARGET at SOURCE with a symlink
    Symlink {
        /// What the link points to
        source: PathBuf,
        /// Where the link is created
        target: PathBuf,
    },
    /// Remove a file, symlink or empty directory
    Remove {
        /// Path to remove
        path: PathBuf,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreachable)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_dry_run_short() {
        let cli = Cli::parse_from(["automate", "-d", "drivers"]);
        assert!(cli.global.dry_run);
        assert!(matches!(cli.command, Command::Drivers(_)));
    }

    #[test]
    fn parse_config_override() {
        let cli = Cli::parse_from(["automate", "--config", "/tmp/a.toml", "version"]);
        assert_eq!(cli.global.config, Some(PathBuf::from("/tmp/a.toml")));
    }

    #[test]
    fn parse_drivers_role() {
        let cli = Cli::parse_from(["automate", "drivers", "package_manager"]);
        assert!(
            matches!(&cli.command, Command::Drivers(o) if o.role.as_deref() == Some("package_manager"))
        );
    }

    #[test]
    fn parse_package_install_with_driver() {
        let cli = Cli::parse_from(["automate", "package", "install", "git", "vim", "--with", "paru"]);
        let Command::Package(opts) = cli.command else {
            unreachable!("expected package command");
        };
        assert_eq!(opts.action, PackageAction::Install);
        assert_eq!(opts.names, ["git", "vim"]);
        let options = opts.select.options();
        assert_eq!(options.with, Some(Token::new("paru")));
        assert!(options.use_default);
    }

    #[test]
    fn package_requires_names() {
        assert!(Cli::try_parse_from(["automate", "package", "install"]).is_err());
    }

    #[test]
    fn parse_service_user_stop() {
        let cli = Cli::parse_from(["automate", "service", "stop", "dunst.service", "--user"]);
        let Command::Service(opts) = cli.command else {
            unreachable!("expected service command");
        };
        assert_eq!(opts.action.operation(), "stop");
        assert!(opts.user);
    }

    #[test]
    fn parse_file_symlink() {
        let cli = Cli::parse_from(["automate", "file", "symlink", "/src", "/dst", "--no-default"]);
        let Command::File(opts) = cli.command else {
            unreachable!("expected file command");
        };
        assert!(matches!(opts.action, FileAction::Symlink { .. }));
        assert!(!opts.select.options().use_default);
    }

    #[test]
    fn parse_file_write_content() {
        let cli = Cli::parse_from(["automate", "file", "write", "/tmp/x", "--content", "hi"]);
        let Command::File(opts) = cli.command else {
            unreachable!("expected file command");
        };
        assert!(matches!(opts.action, FileAction::Write { ref content, .. } if content == "hi"));
    }

    #[test]
    fn command_names() {
        assert_eq!(Cli::parse_from(["automate", "version"]).command.name(), "version");
        assert_eq!(
            Cli::parse_from(["automate", "file", "exists", "/"]).command.name(),
            "file"
        );
    }
}
