//! Unit tests for configuration resolution and graceful degradation
//!
//! Tests cover:
//! - Missing TOML files do not cause termination
//! - Priority order: CLI argument, environment, config file, defaults
//! - Bridge URL override chain
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate RTWIZ_CONFIG or RTWIZ_BRIDGE_URL are marked with
//! #[serial] so they run sequentially.

use rtwiz_common::config::{
    FailurePolicy, TomlConfig, BRIDGE_URL_ENV_VAR, CONFIG_ENV_VAR,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Should create temp file");
    file.write_all(content.as_bytes()).expect("Should write config");
    file
}

#[test]
#[serial]
fn test_missing_config_file_uses_defaults() {
    env::remove_var(BRIDGE_URL_ENV_VAR);
    let path = std::path::PathBuf::from(format!(
        "/tmp/rtwiz-missing-{}/config.toml",
        std::process::id()
    ));

    let config = TomlConfig::resolve(Some(path.as_path()), None).expect("Missing file is not an error");
    assert_eq!(config, TomlConfig::default());
}

#[test]
#[serial]
fn test_env_var_selects_config_file() {
    env::remove_var(BRIDGE_URL_ENV_VAR);
    let file = write_config(
        r#"
        [bridge]
        url = "http://10.0.0.5/api.php"
        timeout_secs = 12

        [schema]
        accessory_column = "ACC_CODE"
        "#,
    );
    env::set_var(CONFIG_ENV_VAR, file.path());

    let config = TomlConfig::resolve(None, None).expect("Should load config");
    assert_eq!(config.bridge.url, "http://10.0.0.5/api.php");
    assert_eq!(config.bridge.timeout_secs, 12);
    assert_eq!(config.schema.accessory_column, "ACC_CODE");
    assert_eq!(config.schema.field_table, "FIELD");

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_cli_path_takes_precedence_over_env() {
    env::remove_var(BRIDGE_URL_ENV_VAR);
    let env_file = write_config("[sync]\nfailure_policy = \"fail_fast\"\n");
    let cli_file = write_config("[sync]\nfailure_policy = \"skip_groups_on_error\"\n");
    env::set_var(CONFIG_ENV_VAR, env_file.path());

    let config = TomlConfig::resolve(Some(cli_file.path()), None).expect("Should load config");
    assert_eq!(config.sync.failure_policy, FailurePolicy::SkipGroupsOnError);

    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
#[serial]
fn test_bridge_url_override_chain() {
    let file = write_config("[bridge]\nurl = \"http://from-file/api.php\"\n");

    env::set_var(BRIDGE_URL_ENV_VAR, "http://from-env/api.php");
    let from_env = TomlConfig::resolve(Some(file.path()), None).unwrap();
    assert_eq!(from_env.bridge.url, "http://from-env/api.php");

    let from_cli =
        TomlConfig::resolve(Some(file.path()), Some("http://from-cli/api.php")).unwrap();
    assert_eq!(from_cli.bridge.url, "http://from-cli/api.php");

    env::remove_var(BRIDGE_URL_ENV_VAR);
    let from_file = TomlConfig::resolve(Some(file.path()), None).unwrap();
    assert_eq!(from_file.bridge.url, "http://from-file/api.php");
}

#[test]
#[serial]
fn test_invalid_override_is_rejected() {
    env::remove_var(BRIDGE_URL_ENV_VAR);
    let file = write_config("");
    let result = TomlConfig::resolve(Some(file.path()), Some("not a url"));
    assert!(result.is_err());
}

#[test]
fn test_unparsable_file_is_config_error() {
    let file = write_config("[bridge\nurl = ");
    let result = TomlConfig::load(file.path());
    assert!(matches!(result, Err(rtwiz_common::Error::Config(_))));
}
