//! Host platform detection.
use std::fmt;
use std::path::Path;

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// Linux.
    Linux,
    /// macOS.
    MacOs,
    /// Windows.
    Windows,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linux => write!(f, "linux"),
            Self::MacOs => write!(f, "macos"),
            Self::Windows => write!(f, "windows"),
        }
    }
}

/// Linux distribution family, used to weight package-manager drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// Arch Linux and derivatives.
    Arch,
    /// Debian, Ubuntu and derivatives.
    Debian,
    /// Anything else, including non-Linux hosts.
    Other,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arch => write!(f, "arch"),
            Self::Debian => write!(f, "debian"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// Distribution family.
    pub family: Family,
}

impl Platform {
    /// Detect the current platform.
    #[must_use]
    pub fn detect() -> Self {
        let os = Self::detect_os();
        let family = if os == Os::Linux {
            Self::detect_family(Path::new("/etc"))
        } else {
            Family::Other
        };
        Self { os, family }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub const fn new(os: Os, family: Family) -> Self {
        Self { os, family }
    }

    /// Returns `true` on Linux.
    #[must_use]
    pub fn is_linux(&self) -> bool {
        self.os == Os::Linux
    }

    /// Returns `true` on Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Returns `true` on Arch-family Linux.
    #[must_use]
    pub fn is_arch(&self) -> bool {
        self.family == Family::Arch
    }

    /// Returns `true` on Debian-family Linux.
    #[must_use]
    pub fn is_debian(&self) -> bool {
        self.family == Family::Debian
    }

    fn detect_os() -> Os {
        if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else {
            // Default to Linux for other Unix-like systems
            Os::Linux
        }
    }

    /// Identify the distribution family from release marker files under `etc`.
    fn detect_family(etc: &Path) -> Family {
        if etc.join("arch-release").exists() {
            Family::Arch
        } else if etc.join("debian_version").exists() {
            Family::Debian
        } else {
            Family::Other
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.os {
            Os::Linux => write!(f, "{} ({})", self.os, self.family),
            _ => write!(f, "{}", self.os),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn detect_matches_compile_target() {
        let p = Platform::detect();
        #[cfg(target_os = "windows")]
        assert!(p.is_windows());
        #[cfg(target_os = "linux")]
        assert!(p.is_linux());
        if !p.is_linux() {
            assert_eq!(p.family, Family::Other);
        }
    }

    #[test]
    fn family_from_marker_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Platform::detect_family(dir.path()), Family::Other);

        std::fs::write(dir.path().join("debian_version"), "12.5\n").unwrap();
        assert_eq!(Platform::detect_family(dir.path()), Family::Debian);

        std::fs::write(dir.path().join("arch-release"), "").unwrap();
        assert_eq!(Platform::detect_family(dir.path()), Family::Arch);
    }

    #[test]
    fn predicates() {
        let p = Platform::new(Os::Linux, Family::Arch);
        assert!(p.is_linux());
        assert!(p.is_arch());
        assert!(!p.is_debian());
        assert!(!p.is_windows());
    }

    #[test]
    fn display() {
        assert_eq!(
            Platform::new(Os::Linux, Family::Debian).to_string(),
            "linux (debian)"
        );
        assert_eq!(Platform::new(Os::Windows, Family::Other).to_string(), "windows");
    }
}
