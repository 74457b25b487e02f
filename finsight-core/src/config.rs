//! Configuration system for Finsight.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/finsight/config.toml` and/or `.finsight/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::grounding::GroundednessThresholds;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinsightConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub groundedness: GroundednessThresholds,
}

/// Backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the analysis backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Timeout for ordinary requests (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Timeout for `POST /analysis/{id}` (seconds).
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,
    /// Timeout for document uploads (seconds).
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
    /// Session token forwarded as the `auth_token` cookie.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            analysis_timeout_secs: default_analysis_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            auth_token: None,
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_analysis_timeout() -> u64 {
    180
}

fn default_upload_timeout() -> u64 {
    120
}

/// Job status polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between status checks (milliseconds).
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Consecutive non-404 failures before an error is surfaced.
    #[serde(default = "default_max_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_consecutive_failures: default_max_failures(),
        }
    }
}

fn default_interval_ms() -> u64 {
    2000
}

fn default_max_failures() -> u32 {
    5
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl FinsightConfig {
    /// Check the loaded configuration for values the runtime cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.api.base_url).map_err(|e| ConfigError::Invalid {
            message: format!("api.base_url '{}' is not a valid URL: {e}", self.api.base_url),
        })?;
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                message: "polling.interval_ms must be positive".into(),
            });
        }
        if self.polling.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid {
                message: "polling.max_consecutive_failures must be positive".into(),
            });
        }
        let bad = self.groundedness.non_finite();
        if !bad.is_empty() {
            return Err(ConfigError::Invalid {
                message: format!("groundedness thresholds must be finite: {}", bad.join(", ")),
            });
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
    }
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `FINSIGHT_`)
/// 3. Workspace-local config (`.finsight/config.toml`)
/// 4. User config (`~/.config/finsight/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&FinsightConfig>,
) -> Result<FinsightConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FinsightConfig::default()));

    if let Some(config_dir) = directories::ProjectDirs::from("dev", "finsight", "finsight") {
        let user_config = config_dir.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".finsight").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // FINSIGHT_API__BASE_URL, FINSIGHT_POLLING__INTERVAL_MS, ...
    figment = figment.merge(Env::prefixed("FINSIGHT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}
