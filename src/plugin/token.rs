//! Canonical short identifiers for roles and drivers.
use std::borrow::Borrow;
use std::fmt;

use serde::Serialize;

/// A canonical short identifier for a manager role or a driver.
///
/// Tokens are derived from a type's name (see [`Token::of`]) and are unique
/// within their registry collection.
///
/// # Examples
///
/// ```
/// use automate_cli::plugin::Token;
///
/// assert_eq!(Token::from_type_name("crate::managers::PackageManager").as_str(), "package_manager");
/// assert_eq!(Token::from_type_name("APT").as_str(), "apt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Wrap an already-canonical token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Derive the token for type `T` from its Rust type name.
    #[must_use]
    pub fn of<T: ?Sized>() -> Self {
        Self::from_type_name(std::any::type_name::<T>())
    }

    /// Derive a token from a (possibly path-qualified, possibly generic)
    /// type name: keep the last path segment, drop generic parameters and
    /// convert to `snake_case`.
    #[must_use]
    pub fn from_type_name(name: &str) -> Self {
        let base = name.split('<').next().unwrap_or(name);
        let last = base.rsplit("::").next().unwrap_or(base);
        Self(snake_case(last))
    }

    /// Borrow the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Convert `CamelCase`/`ACRONYMCase` to `snake_case`.
///
/// An underscore is inserted before an uppercase letter that follows a
/// lowercase letter or digit, and before the last capital of an acronym
/// that is followed by a lowercase letter (`HTTPServer` → `http_server`).
fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && i > 0 {
            let prev = chars.get(i - 1).copied().unwrap_or('_');
            let next = chars.get(i + 1).copied();
            let after_lower = prev.is_lowercase() || prev.is_ascii_digit();
            let acronym_end = prev.is_uppercase() && next.is_some_and(char::is_lowercase);
            if (after_lower || acronym_end) && !out.ends_with('_') {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PackageManager;
    #[allow(clippy::upper_case_acronyms)]
    struct APT;
    struct Wrapper<T>(T);

    #[test]
    fn camel_case_becomes_snake_case() {
        assert_eq!(Token::from_type_name("PackageManager"), "package_manager");
        assert_eq!(Token::from_type_name("Systemd"), "systemd");
    }

    #[test]
    fn acronyms_collapse() {
        assert_eq!(Token::from_type_name("APT"), "apt");
        assert_eq!(Token::from_type_name("HTTPServer"), "http_server");
        assert_eq!(Token::from_type_name("SysVInit"), "sys_v_init");
    }

    #[test]
    fn digits_are_kept() {
        assert_eq!(Token::from_type_name("Ipv4Address"), "ipv4_address");
    }

    #[test]
    fn path_and_generics_are_stripped() {
        assert_eq!(
            Token::from_type_name("automate_cli::managers::package::Pacman"),
            "pacman"
        );
        assert_eq!(Token::from_type_name("a::Wrapper<b::Inner>"), "wrapper");
    }

    #[test]
    fn of_uses_type_name() {
        assert_eq!(Token::of::<PackageManager>(), "package_manager");
        assert_eq!(Token::of::<APT>(), "apt");
        assert_eq!(Token::of::<Wrapper<APT>>(), "wrapper");
    }

    #[test]
    fn display_and_borrow() {
        let t = Token::new("paru");
        assert_eq!(t.to_string(), "paru");
        let s: &str = t.borrow();
        assert_eq!(s, "paru");
    }
}
