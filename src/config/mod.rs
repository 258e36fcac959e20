use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::theme::EffectiveMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

pub(crate) const APP_DIR: &str = "colormode";
const APP_CONFIG_FILE: &str = "config.json";

pub const DEFAULT_STORAGE_KEY: &str = "theme";
pub const DEFAULT_LEGACY_KEYS: &[&str] = &["docusaurus-theme"];
const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Settings from `config.json`; every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    storage_key: Option<String>,
    #[serde(default)]
    legacy_keys: Option<Vec<String>>,
    #[serde(default)]
    default_mode: Option<EffectiveMode>,
    #[serde(default)]
    disable_switch: Option<bool>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorModeConfig {
    /// Canonical key holding the persisted preference.
    pub storage_key: String,
    /// Keys written by earlier versions; read once for migration, then removed.
    pub legacy_keys: Vec<String>,
    /// Used for `System` when the OS cannot report a preference.
    pub default_mode: EffectiveMode,
    pub disable_switch: bool,
    pub poll_interval: Duration,
}

impl Default for ColorModeConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            legacy_keys: DEFAULT_LEGACY_KEYS.iter().map(|k| (*k).to_string()).collect(),
            default_mode: EffectiveMode::Light,
            disable_switch: false,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl ColorModeConfig {
    fn from_raw(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let storage_key = raw
            .storage_key
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .unwrap_or(defaults.storage_key);
        let legacy_keys = raw
            .legacy_keys
            .map(|keys| {
                keys.into_iter()
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty() && *key != storage_key)
                    .collect()
            })
            .unwrap_or(defaults.legacy_keys);
        let poll_interval = raw
            .poll_interval_ms
            .map(|ms| Duration::from_millis(ms.max(MIN_POLL_INTERVAL_MS)))
            .unwrap_or(defaults.poll_interval);

        Self {
            storage_key,
            legacy_keys,
            default_mode: raw.default_mode.unwrap_or(defaults.default_mode),
            disable_switch: raw.disable_switch.unwrap_or(defaults.disable_switch),
            poll_interval,
        }
    }
}

pub fn load_config() -> ColorModeConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> ColorModeConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return ColorModeConfig::default(),
    };
    if !path.exists() {
        return ColorModeConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
            Ok(raw) => ColorModeConfig::from_raw(raw),
            Err(err) => {
                tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
                ColorModeConfig::default()
            }
        },
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            ColorModeConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
