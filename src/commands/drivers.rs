//! Command: list roles and their drivers.
use anyhow::Result;

use crate::cli::DriversOpts;
use crate::commands::Session;
use crate::plugin::{CapabilitySpec, Driver};

/// One line describing `driver`: availability, operations, missing
/// requirements and whether it is the configured default.
fn describe(driver: &dyn Driver, is_default: bool, extra: Option<&CapabilitySpec>) -> String {
    let availability = driver.availability();
    let (icon, color) = if availability.available {
        ("✓", "\x1b[32m")
    } else {
        ("○", "\x1b[33m")
    };
    let mut line = format!("{color}{icon}\x1b[0m {}", driver.token());
    if is_default {
        line.push_str(" (default)");
    }
    line.push_str(&format!(": {}", driver.operations().join(", ")));
    if !availability.available {
        line.push_str(&format!(" [missing {}]", availability.missing));
    }
    if let Some(extra) = extra {
        let check = extra.evaluate();
        if !check.available {
            line.push_str(&format!(" [config requirements missing {}]", check.missing));
        }
    }
    line
}

/// Print every registered role (or only `opts.role`) with its drivers.
///
/// # Errors
///
/// Returns an error if `opts.role` names no registered role.
pub fn run(session: &Session, opts: &DriversOpts) -> Result<()> {
    let roles = session.registry.role_tokens();
    if let Some(role) = &opts.role
        && !roles.iter().any(|r| r.as_str() == role)
    {
        let known: Vec<&str> = roles.iter().map(|r| r.as_str()).collect();
        anyhow::bail!("unknown role '{role}' (known: {})", known.join(", "));
    }

    for role in roles
        .iter()
        .filter(|r| opts.role.as_deref().is_none_or(|wanted| r.as_str() == wanted))
    {
        session.log.stage(role.as_str());
        let default = session.config.default_for(role.as_str());
        for driver in session.registry.instantiate(role.as_str(), &session.ctx) {
            let token = driver.token();
            let is_default = default == Some(&token);
            let extra = session.config.requirements_for(token.as_str());
            session
                .log
                .info(&describe(driver.as_ref(), is_default, extra));
        }
        if let Some(token) = default
            && !session.registry.driver_tokens(role.as_str()).contains(token)
        {
            session
                .log
                .warn(&format!("configured default '{token}' is not a {role} driver"));
        }
    }
    Ok(())
}
