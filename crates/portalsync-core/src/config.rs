//! Connection configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/portalsync/config.toml)
//! 3. Environment variables (PORTALSYNC_* prefix)
//!
//! Environment variables take precedence over config file values. The
//! per-workspace portal binding lives in the `.portal` sidecar instead (see
//! [`crate::sidecar`]).

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::FileLayout;
use crate::tracker::{IgnoreList, DEFAULT_IGNORED_EXTENSIONS};

/// Environment variable prefix
const ENV_PREFIX: &str = "PORTALSYNC";

/// Placeholder shown instead of secrets
const REDACTED: &str = "********";

/// Keys accepted by [`Config::set`]
pub const KEYS: &[&str] = &[
    "instance_name",
    "crm_region",
    "tenant_id",
    "client_id",
    "client_secret",
    "access_token",
    "use_folders_for_files",
    "periodic_refresh",
    "refresh_interval_secs",
    "request_timeout_ms",
    "ignored_extensions",
];

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Dataverse instance name, e.g. `contoso`
    #[serde(default)]
    pub instance_name: Option<String>,

    /// CRM region, e.g. `crm4`
    #[serde(default)]
    pub crm_region: Option<String>,

    /// Azure AD tenant id
    #[serde(default)]
    pub tenant_id: Option<String>,

    /// App registration (client) id
    #[serde(default)]
    pub client_id: Option<String>,

    /// App registration secret; usually supplied via PORTALSYNC_CLIENT_SECRET
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Static bearer token, used instead of client credentials when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Mirror the page tree under `Files/`
    #[serde(default)]
    pub use_folders_for_files: bool,

    /// Run silent incremental refreshes while watching
    #[serde(default)]
    pub periodic_refresh: bool,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// File extensions never tracked
    #[serde(default = "default_ignored_extensions")]
    pub ignored_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instance_name: None,
            crm_region: None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            use_folders_for_files: false,
            periodic_refresh: false,
            refresh_interval_secs: default_refresh_interval_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            ignored_extensions: default_ignored_extensions(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (PORTALSYNC_INSTANCE_NAME, PORTALSYNC_CLIENT_SECRET, ...)
    /// 2. Config file (~/.config/portalsync/config.toml or PORTALSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        override_string(&mut self.instance_name, "INSTANCE_NAME");
        override_string(&mut self.crm_region, "CRM_REGION");
        override_string(&mut self.tenant_id, "TENANT_ID");
        override_string(&mut self.client_id, "CLIENT_ID");
        override_string(&mut self.client_secret, "CLIENT_SECRET");
        override_string(&mut self.access_token, "ACCESS_TOKEN");

        if let Some(val) = env_var("USE_FOLDERS_FOR_FILES") {
            self.use_folders_for_files = parse_flag(&val);
        }
        if let Some(val) = env_var("PERIODIC_REFRESH") {
            self.periodic_refresh = parse_flag(&val);
        }
        if let Some(secs) = env_var("REFRESH_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.refresh_interval_secs = secs;
        }
        if let Some(ms) = env_var("REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.request_timeout_ms = ms;
        }
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with PORTALSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Some(path) = env_var("CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("portalsync")
            .join("config.toml")
    }

    /// Set one value by key, parsing it for the field's type
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = || {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        match key {
            "instance_name" => self.instance_name = optional(),
            "crm_region" => self.crm_region = optional(),
            "tenant_id" => self.tenant_id = optional(),
            "client_id" => self.client_id = optional(),
            "client_secret" => self.client_secret = optional(),
            "access_token" => self.access_token = optional(),
            "use_folders_for_files" => self.use_folders_for_files = parse_bool(key, value)?,
            "periodic_refresh" => self.periodic_refresh = parse_bool(key, value)?,
            "refresh_interval_secs" => {
                self.refresh_interval_secs = value
                    .parse()
                    .with_context(|| format!("{} must be a number of seconds", key))?
            }
            "request_timeout_ms" => {
                self.request_timeout_ms = value
                    .parse()
                    .with_context(|| format!("{} must be a number of milliseconds", key))?
            }
            "ignored_extensions" => {
                self.ignored_extensions = value
                    .split(',')
                    .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            }
            other => bail!("Unknown config key '{}'. Known keys: {}", other, KEYS.join(", ")),
        }
        Ok(())
    }

    /// Check if enough is set to reach the remote service
    pub fn is_configured(&self) -> bool {
        let has_token = self.access_token.as_deref().is_some_and(|t| !t.is_empty());
        let has_credentials = [&self.tenant_id, &self.client_id, &self.client_secret]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()));

        self.instance_url().is_some() && (has_token || has_credentials)
    }

    /// Host of the Dataverse environment, `<instance>.<region>.dynamics.com`
    pub fn instance_url(&self) -> Option<String> {
        match (self.instance_name.as_deref(), self.crm_region.as_deref()) {
            (Some(instance), Some(region)) if !instance.is_empty() && !region.is_empty() => {
                Some(format!("{}.{}.dynamics.com", instance, region))
            }
            _ => None,
        }
    }

    /// File layout selected by `use_folders_for_files`
    pub fn layout(&self) -> FileLayout {
        FileLayout::from_use_folders(self.use_folders_for_files)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::new(&self.ignored_extensions)
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        Self {
            client_secret: mask(&self.client_secret),
            access_token: mask(&self.access_token),
            ..self.clone()
        }
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("{}_{}", ENV_PREFIX, suffix)).ok()
}

/// Apply an optional string override; an empty value clears the field
fn override_string(field: &mut Option<String>, suffix: &str) {
    if let Some(val) = env_var(suffix) {
        *field = if val.is_empty() { None } else { Some(val) };
    }
}

fn parse_flag(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => bail!("{} must be true or false, got '{}'", key, value),
    }
}

fn default_refresh_interval_secs() -> u64 {
    120
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_ignored_extensions() -> Vec<String> {
    DEFAULT_IGNORED_EXTENSIONS
        .iter()
        .map(|e| e.to_string())
        .collect()
}
