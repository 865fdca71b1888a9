//! Layered configuration.
//!
//! Settings come from three layers, later ones winning:
//! 1. compiled defaults ([`Settings::default()`])
//! 2. `~/.taskers/settings.json`, merged key by key over the defaults
//! 3. `TASKERS_*` environment variables
//!
//! Command-line flags are applied on top by the binary, which then calls
//! [`Settings::validate`] once on the final result.

pub mod errors;
pub mod loader;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, merge_json, settings_dir, settings_path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub ui: UiSettings,
    pub logging: LoggingSettings,
}

/// Where the persistence service lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// How long an outcome notification stays on screen.
    pub notification_ms: u64,
    /// Redraw interval of the terminal UI.
    pub tick_ms: u64,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            notification_ms: 3_000,
            tick_ms: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub file: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: settings_dir().join("taskers.log"),
        }
    }
}

/// Accepts absolute `http` and `https` URLs.
pub(crate) fn check_base_url(raw: &str) -> std::result::Result<(), String> {
    let url = url::Url::parse(raw).map_err(|e| format!("{raw:?} is not a URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{raw:?} must be http or https, got {other}")),
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        check_base_url(&self.api.base_url).map_err(|reason| SettingsError::Invalid {
            key: "api.base_url",
            reason,
        })?;
        if self.api.timeout_ms == 0 {
            return Err(SettingsError::Invalid {
                key: "api.timeout_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.ui.tick_ms == 0 {
            return Err(SettingsError::Invalid {
                key: "ui.tick_ms",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    pub fn notification_display(&self) -> Duration {
        Duration::from_millis(self.ui.notification_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.ui.tick_ms)
    }
}
