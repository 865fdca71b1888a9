//! Reading the settings file and the `TASKERS_*` environment.
//!
//! Nothing here rejects a bad final value: flags still have to be applied
//! on top, so validation is left to the caller.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use super::errors::{Result, SettingsError};
use super::{check_base_url, Settings};

pub fn settings_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".taskers")
}

/// `~/.taskers/settings.json`
pub fn settings_path() -> PathBuf {
    settings_dir().join("settings.json")
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

/// A missing file yields the defaults; one that cannot be read or parsed is
/// an error.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let mut merged = serde_json::to_value(Settings::default()).map_err(|e| SettingsError::Invalid {
        key: "logging.file",
        reason: e.to_string(),
    })?;

    if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let file: Value = serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        merge_json(&mut merged, file);
    } else {
        debug!(?path, "settings file not found, using defaults");
    }

    let mut settings: Settings = serde_json::from_value(merged).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Writes `overlay` into `base`. Objects are merged per key, `null` leaves
/// the existing value alone, anything else replaces it.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(fields), Value::Object(overrides)) => {
            for (key, value) in overrides {
                if value.is_null() {
                    continue;
                }
                match fields.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        let _ = fields.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Applies `TASKERS_*` overrides read through `lookup`. Empty, unparsable
/// or out-of-range values are logged and ignored.
pub fn apply_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let read_string = |name: &str| {
        let raw = lookup(name)?;
        if raw.trim().is_empty() {
            warn!(key = name, "empty env var, ignoring");
            return None;
        }
        Some(raw)
    };
    let read_u64 = |name: &str, min: u64, max: u64| {
        let raw = lookup(name)?;
        let parsed = parse_u64_range(&raw, min, max);
        if parsed.is_none() {
            warn!(key = name, value = %raw, "invalid numeric env var, ignoring");
        }
        parsed
    };

    if let Some(v) = read_string("TASKERS_API_URL") {
        match check_base_url(&v) {
            Ok(()) => settings.api.base_url = v,
            Err(reason) => warn!(key = "TASKERS_API_URL", %reason, "invalid URL env var, ignoring"),
        }
    }
    if let Some(v) = read_u64("TASKERS_API_TIMEOUT_MS", 100, 600_000) {
        settings.api.timeout_ms = v;
    }
    if let Some(v) = read_u64("TASKERS_NOTIFICATION_MS", 500, 60_000) {
        settings.ui.notification_ms = v;
    }
    if let Some(v) = read_string("TASKERS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_string("TASKERS_LOG_FILE") {
        settings.logging.file = PathBuf::from(v);
    }
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}
