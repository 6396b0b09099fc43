//! Integration tests for configuration loading and graceful degradation
//!
//! Covers:
//! - Missing TOML files do not cause termination
//! - Malformed TOML files are reported as configuration errors
//! - Process environment drives the publishing integrations
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate GH_TOKEN / STATIC_* / GDRIVE_* are marked with
//! #[serial] so they run sequentially, not in parallel.

use serial_test::serial;
use std::env;
use std::io::Write;
use trend_common::config::{
    load_toml_config, ServerOverrides, ServiceConfig, TomlConfig, ENV_GDRIVE_FOLDER_ID,
    ENV_GDRIVE_SA_JSON_B64, ENV_GH_TOKEN, ENV_STATIC_BRANCH, ENV_STATIC_DATED_SUBFOLDERS,
    ENV_STATIC_PATH, ENV_STATIC_REPO, ENV_STATIC_SITE_BASE,
};
use trend_common::Error;

const PUBLISH_VARS: &[&str] = &[
    ENV_GH_TOKEN,
    ENV_STATIC_REPO,
    ENV_STATIC_BRANCH,
    ENV_STATIC_PATH,
    ENV_STATIC_SITE_BASE,
    ENV_STATIC_DATED_SUBFOLDERS,
    ENV_GDRIVE_SA_JSON_B64,
    ENV_GDRIVE_FOLDER_ID,
];

fn clear_publish_env() {
    for var in PUBLISH_VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_missing_explicit_config_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let config = load_toml_config(Some(&missing)).expect("missing file must not error");
    assert!(config.server.port.is_none());
    assert!(config.github.repo.is_none());
}

#[test]
fn test_config_file_is_parsed() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[server]
port = 7000
exports_dir = "/srv/exports"

[github]
repo = "plant/viewers"
dated_subfolders = false

[gdrive]
folder_id = "abc"
"#
    )
    .unwrap();

    let config = load_toml_config(Some(file.path())).unwrap();
    assert_eq!(config.server.port, Some(7000));
    assert_eq!(
        config.server.exports_dir.as_deref(),
        Some(std::path::Path::new("/srv/exports"))
    );
    assert_eq!(config.github.repo.as_deref(), Some("plant/viewers"));
    assert_eq!(config.github.dated_subfolders, Some(false));
    assert_eq!(config.gdrive.folder_id.as_deref(), Some("abc"));
}

#[test]
fn test_malformed_config_file_is_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server\nport = ").unwrap();

    let err = load_toml_config(Some(file.path())).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
#[serial]
fn test_from_env_without_publish_vars() {
    clear_publish_env();

    let config = ServiceConfig::from_env(ServerOverrides::default(), &TomlConfig::default());
    assert!(config.github.is_none());
    assert!(config.drive.is_none());
}

#[test]
#[serial]
fn test_from_env_enables_github() {
    clear_publish_env();
    env::set_var(ENV_GH_TOKEN, "token");
    env::set_var(ENV_STATIC_REPO, "plant/viewers");
    env::set_var(ENV_STATIC_PATH, "trends");
    env::set_var(ENV_STATIC_DATED_SUBFOLDERS, "no");

    let config = ServiceConfig::from_env(ServerOverrides::default(), &TomlConfig::default());
    let github = config.github.expect("github should be enabled");
    assert_eq!(github.repo, "plant/viewers");
    assert_eq!(github.branch, "main");
    assert_eq!(github.path, "trends");
    assert!(!github.dated_subfolders);

    clear_publish_env();
}

#[test]
#[serial]
fn test_from_env_toml_repo_with_env_token() {
    clear_publish_env();
    env::set_var(ENV_GH_TOKEN, "token");

    let toml: TomlConfig = toml::from_str("[github]\nrepo = \"from/toml\"\n").unwrap();
    let config = ServiceConfig::from_env(ServerOverrides::default(), &toml);
    assert_eq!(config.github.unwrap().repo, "from/toml");

    clear_publish_env();
}
