// crates/fleetmux-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Tests
// Description: End-to-end config loading from real TOML files.
// Purpose: Verify resolution, parsing, and fail-closed validation.
// Dependencies: fleetmux-config, tempfile
// ============================================================================

//! ## Overview
//! These tests write TOML files into a temporary directory and load them
//! through [`FleetmuxConfig::load`], covering the happy path and the
//! fail-closed rejections.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only panic-based assertions."
)]

use std::fs;
use std::path::PathBuf;

use fleetmux_config::AuthMode;
use fleetmux_config::ConfigError;
use fleetmux_config::FleetmuxConfig;
use tempfile::TempDir;

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("fleetmux.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn minimal_config_loads_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[server.auth]
local_user = "console"

[fleet]
base_root = "/srv/fleet"
admin = "root"
"#,
    );

    let config = FleetmuxConfig::load(Some(&path)).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:8077");
    assert_eq!(config.server.auth.mode, AuthMode::LocalOnly);
    assert_eq!(config.fleet.admin, "root");
    assert_eq!(config.fleet.base_root_path(), PathBuf::from("/srv/fleet"));
}

#[test]
fn session_token_config_loads() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[server]
bind = "0.0.0.0:8077"

[server.auth]
mode = "session_token"

[server.auth.tokens]
"tok-alice" = "alice"
"tok-bob" = "bob"

[fleet]
base_root = "/srv/fleet"
admin = "root"
"#,
    );

    let config = FleetmuxConfig::load(Some(&path)).unwrap();
    assert_eq!(config.server.auth.mode, AuthMode::SessionToken);
    assert_eq!(config.server.auth.tokens.get("tok-alice").map(String::as_str), Some("alice"));
}

#[test]
fn missing_fleet_section_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[server]\nbind = \"127.0.0.1:8077\"\n");

    assert!(matches!(FleetmuxConfig::load(Some(&path)), Err(ConfigError::Parse(_))));
}

#[test]
fn exposed_bind_without_tokens_fails_closed() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[server]
bind = "0.0.0.0:8077"

[server.auth]
local_user = "console"

[fleet]
base_root = "/srv/fleet"
admin = "root"
"#,
    );

    assert!(matches!(FleetmuxConfig::load(Some(&path)), Err(ConfigError::Invalid(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(FleetmuxConfig::load(Some(&path)), Err(ConfigError::Io(_))));
}
