//! Engine configuration: start-up mode, default drivers and extra
//! requirement tables.
//!
//! ```toml
//! dry_run = true
//!
//! [defaults]
//! package_manager = "paru"
//!
//! [requirements.apt]
//! files = ["/etc/apt/sources.list"]
//! ```
pub mod toml_loader;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::plugin::{CapabilitySpec, Token};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    defaults: BTreeMap<String, String>,
    #[serde(default)]
    requirements: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

/// Validated engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Start the execution context in dry-run mode.
    pub dry_run: bool,
    /// Sticky default driver per role (role token to driver token).
    pub defaults: BTreeMap<Token, Token>,
    /// Extra requirements checked per driver token.
    pub requirements: BTreeMap<Token, CapabilitySpec>,
    /// File the configuration was read from, if it existed.
    pub source: Option<PathBuf>,
}

impl EngineConfig {
    /// The default configuration path: `$XDG_CONFIG_HOME/automate/config.toml`
    /// (or `~/.config/automate/config.toml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME")
                    .or_else(|| std::env::var_os("USERPROFILE"))
                    .map(|home| PathBuf::from(home).join(".config"))
            })?;
        Some(base.join("automate").join("config.toml"))
    }

    /// Load from `path`, or from [`default_path`](Self::default_path) when
    /// `None`.  A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, contains
    /// unknown keys, or declares an unknown requirement kind.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            return Ok(Self::default());
        };
        let raw: RawConfig = toml_loader::load_config(&path)?;
        let mut config =
            Self::from_raw(raw).with_context(|| format!("invalid config: {}", path.display()))?;
        if path.exists() {
            config.source = Some(path);
        }
        Ok(config)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).context("Failed to parse TOML config")?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let requirements = raw
            .requirements
            .into_iter()
            .map(|(driver, table)| {
                let spec = CapabilitySpec::from_table(table)
                    .with_context(|| format!("requirements for driver '{driver}'"))?;
                Ok((Token::new(driver), spec))
            })
            .collect::<Result<_>>()?;
        Ok(Self {
            dry_run: raw.dry_run,
            defaults: raw
                .defaults
                .into_iter()
                .map(|(role, driver)| (Token::new(role), Token::new(driver)))
                .collect(),
            requirements,
            source: None,
        })
    }

    /// The configured default driver for `role`.
    #[must_use]
    pub fn default_for(&self, role: &str) -> Option<&Token> {
        self.defaults.get(role)
    }

    /// Extra requirements configured for `driver`.
    #[must_use]
    pub fn requirements_for(&self, driver: &str) -> Option<&CapabilitySpec> {
        self.requirements.get(driver)
    }
}
