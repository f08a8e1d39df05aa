//! Configuration loading and config file resolution
//!
//! Bootstrap configuration lives in a small TOML file. Every section has
//! built-in defaults so a missing or partial file never stops startup.
//!
//! # Resolution priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`RTWIZ_CONFIG`, `RTWIZ_BRIDGE_URL`)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)

use crate::sql::validate_identifier;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "RTWIZ_CONFIG";

/// Environment variable overriding the bridge URL
pub const BRIDGE_URL_ENV_VAR: &str = "RTWIZ_BRIDGE_URL";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TomlConfig {
    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote database bridge endpoint
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_url")]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BridgeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Table and column names in the legacy store
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SchemaConfig {
    #[serde(default = "default_field_table")]
    pub field_table: String,

    #[serde(default = "default_group_table")]
    pub group_table: String,

    /// Column holding the accessory descriptor code
    #[serde(default = "default_accessory_column")]
    pub accessory_column: String,

    /// Column holding the field position ordinal
    #[serde(default = "default_position_column")]
    pub position_column: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            field_table: default_field_table(),
            group_table: default_group_table(),
            accessory_column: default_accessory_column(),
            position_column: default_position_column(),
        }
    }
}

/// What to do when a per-record normalize or insert fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Report the failure and keep going, groups are still persisted
    #[default]
    BestEffort,
    /// Finish normalizing, then skip group persistence if anything failed
    SkipGroupsOnError,
    /// Stop the run at the first failure
    FailFast,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::BestEffort => "best_effort",
            FailurePolicy::SkipGroupsOnError => "skip_groups_on_error",
            FailurePolicy::FailFast => "fail_fast",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(FailurePolicy::BestEffort),
            "skip_groups_on_error" => Ok(FailurePolicy::SkipGroupsOnError),
            "fail_fast" => Ok(FailurePolicy::FailFast),
            other => Err(Error::Config(format!("unknown failure policy '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SyncConfig {
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

/// HTTP listener for `serve`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_bridge_url() -> String {
    "http://127.0.0.1/api.php".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_field_table() -> String {
    "FIELD".to_string()
}

fn default_group_table() -> String {
    "SMSGROUP".to_string()
}

fn default_accessory_column() -> String {
    "ACCESSORY".to_string()
}

fn default_position_column() -> String {
    "POSITION_ID".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5790
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse configuration text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| {
            Error::Config(format!("Invalid config file {}: {}", path.display(), e))
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve and load configuration following the priority order above
    pub fn resolve(cli_path: Option<&Path>, cli_bridge_url: Option<&str>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path, CONFIG_ENV_VAR) {
            Some(path) => Self::load(&path)?,
            None => {
                info!("No config file found, using compiled defaults");
                Self::default()
            }
        };

        // Bridge URL has its own override chain
        if let Some(url) = cli_bridge_url {
            config.bridge.url = url.to_string();
        } else if let Ok(url) = std::env::var(BRIDGE_URL_ENV_VAR) {
            config.bridge.url = url;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bridge.url.trim().is_empty() {
            return Err(Error::Config("bridge.url must not be empty".to_string()));
        }
        if !self.bridge.url.starts_with("http://") && !self.bridge.url.starts_with("https://") {
            return Err(Error::Config(format!(
                "bridge.url must be an http(s) URL, got '{}'",
                self.bridge.url
            )));
        }
        if self.bridge.timeout_secs == 0 {
            return Err(Error::Config("bridge.timeout_secs must be positive".to_string()));
        }

        for name in [
            &self.schema.field_table,
            &self.schema.group_table,
            &self.schema.accessory_column,
            &self.schema.position_column,
        ] {
            validate_identifier(name).map_err(|e| Error::Config(e.to_string()))?;
        }

        Ok(())
    }
}

/// Pick the config file path: CLI argument, then environment, then the
/// first platform default that exists
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config locations
    default_config_locations().into_iter().find(|p| p.exists())
}

/// Platform config file candidates, most specific first
pub fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Some(dir) = dirs::config_dir() {
        locations.push(dir.join("rtwiz").join("config.toml"));
    }
    if cfg!(target_os = "linux") {
        locations.push(PathBuf::from("/etc/rtwiz/config.toml"));
    }

    locations
}
