//! Command: print version information.

/// The engine version, as stamped by the build script.
#[must_use]
pub fn version() -> &'static str {
    option_env!("AUTOMATE_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the engine version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("automate {}", version());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
