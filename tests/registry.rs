#![allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
//! Integration tests for the built-in registry.

mod common;

use automate_cli::managers::{FileManager, PackageManager, ServiceManager};
use automate_cli::plugin::{Args, Role, Token, registry};

use common::TestSession;

/// Snapshot of every built-in role with its drivers in registration order.
///
/// Registration order is the tie-break for equal suitability scores, so any
/// reordering must be deliberate.
#[test]
fn builtin_driver_tokens() {
    let registry = registry::global();
    let lines: Vec<String> = registry
        .role_tokens()
        .iter()
        .map(|role| {
            let drivers: Vec<String> = registry
                .driver_tokens(role.as_str())
                .iter()
                .map(ToString::to_string)
                .collect();
            format!("{role}: {}", drivers.join(", "))
        })
        .collect();
    insta::assert_snapshot!("builtin_driver_tokens", lines.join("\n"));
}

#[test]
fn role_tokens_are_snake_case_type_names() {
    assert_eq!(PackageManager::token(), Token::new("package_manager"));
    assert_eq!(ServiceManager::token(), Token::new("service_manager"));
    assert_eq!(FileManager::token(), Token::new("file_manager"));
}

#[test]
fn native_file_driver_is_always_available() {
    let session = TestSession::new(false);
    let files = FileManager::new(registry::global(), &session.ctx);
    let native = files.manager().driver("native").unwrap();
    assert!(native.available());
    assert!(native.availability().missing.is_empty());
}

#[test]
fn paru_is_never_chosen_automatically() {
    let session = TestSession::new(false);
    let packages = PackageManager::new(registry::global(), &session.ctx);
    let names = vec!["git".to_string()];
    let args = Args::new().with("packages", names);
    let scores = packages.manager().scores_for("install", &args);
    let paru = scores
        .iter()
        .find(|(token, _)| token.as_str() == "paru")
        .map(|(_, score)| *score);
    assert_eq!(paru, Some(0));
}

#[test]
fn sysv_is_not_offered_for_enablement() {
    let session = TestSession::new(false);
    let services = ServiceManager::new(registry::global(), &session.ctx);
    let args = Args::new().with("service", "cron");
    let tokens: Vec<Token> = services
        .manager()
        .scores_for("enable", &args)
        .into_iter()
        .map(|(token, _)| token)
        .collect();
    assert_eq!(tokens, [Token::new("systemd")]);
}
