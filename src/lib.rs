//! Cross-platform automation engine with self-selecting drivers.
//!
//! Each capability (package management, services, files) is a *role* served
//! by interchangeable platform *drivers*.  Drivers declare what they need
//! from the host and how suitable they are for a call; a manager resolves
//! every operation to one driver, either the one asked for, a sticky
//! default, or the best-scoring available driver.
//!
//! The public API is organised into four layers:
//!
//! - **[`plugin`]**: registry, capability checks, execution context and dispatch
//! - **[`managers`]**: the built-in roles and their drivers
//! - **[`config`]**: TOML engine configuration (defaults, dry-run, requirements)
//! - **[`commands`]**: top-level subcommand orchestration for the CLI host
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod managers;
pub mod platform;
pub mod plugin;
