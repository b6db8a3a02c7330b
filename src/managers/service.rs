//! Service management role and its drivers.
use std::sync::Arc;

use anyhow::Result;

use crate::error::DispatchError;
use crate::plugin::{
    Args, CapabilitySpec, DispatchOptions, Driver, DriverType, ExecutionContext, Manager, Outcome,
    Registry, Requirements, Role,
};

/// Enables, disables, starts and stops system services.
///
/// Operations take a `service` argument; `user = true` targets the calling
/// user's service manager where the driver supports one.
#[derive(Debug)]
pub struct ServiceManager {
    manager: Manager,
}

impl Role for ServiceManager {}

impl ServiceManager {
    /// Build the role with every registered service driver.
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

    /// Invoke `operation` (one of `enabled`, `enable`, `disable`, `running`,
    /// `start`, `stop`) on `service`, in the user's manager when `user` is set.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn call(
        &self,
        operation: &str,
        service: &str,
        user: bool,
        options: &DispatchOptions,
    ) -> Result<Outcome, DispatchError> {
        let args = Args::new().with("service", service).with("user", user);
        self.manager.dispatch(operation, &args, options)
    }

    /// Whether `service` starts at boot.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn enabled(&self, service: &str, options: &DispatchOptions) -> Result<Outcome, DispatchError> {
        self.call("enabled", service, false, options)
    }

    /// Whether `service` is currently running.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn running(&self, service: &str, options: &DispatchOptions) -> Result<Outcome, DispatchError> {
        self.call("running", service, false, options)
    }

    /// Start `service` unless it is running.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn start(&self, service: &str, options: &DispatchOptions) -> Result<Outcome, DispatchError> {
        self.call("start", service, false, options)
    }

    /// Stop `service` if it is running.
    ///
    /// # Errors
    ///
    /// Returns any [`DispatchError`] from resolution or the driver.
    pub fn stop(&self, service: &str, options: &DispatchOptions) -> Result<Outcome, DispatchError> {
        self.call("stop", service, false, options)
    }
}

/// Query a yes/no state through a command whose exit status is the answer.
fn probe(ctx: &ExecutionContext, program: &str, args: &[&str]) -> Result<bool> {
    Ok(ctx.executor.run_unchecked(program, args)?.success)
}

/// Run a state-changing command, reporting a non-zero exit as a failed
/// outcome rather than an error.
fn change(
    ctx: &ExecutionContext,
    needs_change: bool,
    detail: String,
    program: &str,
    args: &[&str],
) -> Result<Outcome> {
    let mut failure = None;
    let outcome = ctx.converge(needs_change, vec![detail], || {
        let result = ctx.executor.run_unchecked(program, args)?;
        if !result.success {
            failure = Some(result.stderr.trim().to_string());
        }
        Ok(())
    })?;
    Ok(match failure {
        Some(reason) => Outcome::Failed { reason },
        None => outcome,
    })
}

/// systemd via `systemctl`.
#[derive(Debug)]
pub struct Systemd {
    ctx: Arc<ExecutionContext>,
}

impl Systemd {
    /// `systemctl` invocation: system units go through sudo for changes,
    /// user units never do.
    fn command<'a>(user: bool, mutating: bool, tail: &[&'a str]) -> (&'static str, Vec<&'a str>) {
        let mut args = Vec::new();
        let program = if mutating && !user {
            args.push("systemctl");
            "sudo"
        } else {
            "systemctl"
        };
        if user {
            args.push("--user");
        }
        args.extend_from_slice(tail);
        (program, args)
    }

    fn query(&self, user: bool, verb: &str, service: &str) -> Result<bool> {
        let (program, args) = Self::command(user, false, &[verb, "--quiet", service]);
        probe(&self.ctx, program, &args)
    }

    fn act(&self, user: bool, needs_change: bool, verb: &str, service: &str) -> Result<Outcome> {
        let (program, args) = Self::command(user, true, &[verb, service]);
        change(
            &self.ctx,
            needs_change,
            format!("{verb} {service} (systemd)"),
            program,
            &args,
        )
    }
}

impl Driver for Systemd {
    fn requirements(&self) -> Requirements {
        CapabilitySpec::new()
            .programs(["systemctl"])
            .directories(["/run/systemd/system"])
            .into()
    }

    fn operations(&self) -> &'static [&'static str] {
        &["enabled", "enable", "disable", "running", "start", "stop"]
    }

    fn suitability(&self, _: &str, _: &Args) -> i32 {
        if self.available() { 10 } else { 0 }
    }

    fn call(&self, operation: &str, args: &Args) -> Result<Outcome> {
        let service = args.str("service")?;
        let user = args.flag("user");
        match operation {
            "enabled" => Ok(Outcome::value(self.query(user, "is-enabled", service)?)),
            "running" => Ok(Outcome::value(self.query(user, "is-active", service)?)),
            "enable" => {
                let enabled = self.query(user, "is-enabled", service)?;
                self.act(user, !enabled, "enable", service)
            }
            "disable" => {
                let enabled = self.query(user, "is-enabled", service)?;
                self.act(user, enabled, "disable", service)
            }
            "start" => {
                let running = self.query(user, "is-active", service)?;
                self.act(user, !running, "start", service)
            }
            "stop" => {
                let running = self.query(user, "is-active", service)?;
                self.act(user, running, "stop", service)
            }
            _ => Err(DispatchError::no_such_operation(self.token(), operation).into()),
        }
    }
}

impl DriverType for Systemd {
    type Role = ServiceManager;

    fn build(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}

/// SysV init scripts via `service`.  Has no notion of boot-time enablement.
#[derive(Debug)]
pub struct Sysv {
    ctx: Arc<ExecutionContext>,
}

impl Driver for Sysv {
    fn requirements(&self) -> Requirements {
        CapabilitySpec::new()
            .programs(["service"])
            .directories(["/etc/init.d"])
            .into()
    }

    fn operations(&self) -> &'static [&'static str] {
        &["running", "start", "stop"]
    }

    fn call(&self, operation: &str, args: &Args) -> Result<Outcome> {
        let service = args.str("service")?;
        let running = || probe(&self.ctx, "service", &[service, "status"]);
        match operation {
            "running" => Ok(Outcome::value(running()?)),
            "start" => change(
                &self.ctx,
                !running()?,
                format!("start {service} (sysv)"),
                "sudo",
                &["service", service, "start"],
            ),
            "stop" => change(
                &self.ctx,
                running()?,
                format!("stop {service} (sysv)"),
                "sudo",
                &["service", service, "stop"],
            ),
            _ => Err(DispatchError::no_such_operation(self.token(), operation).into()),
        }
    }
}

impl DriverType for Sysv {
    type Role = ServiceManager;

    fn build(ctx: Arc<ExecutionContext>) -> Self {
        Self { ctx }
    }
}
