use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LiftlogError, Result};
use crate::integrity::ValidationOptions;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "LIFTLOG_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftlogConfig {
    pub store: StoreSection,
    #[serde(default)]
    pub validation: ValidationSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationSection {
    #[serde(default)]
    pub strict_exercise_count: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

fn default_filter() -> String {
    "liftlog_core=info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

impl LiftlogConfig {
    pub fn new(store_path: PathBuf) -> Self {
        Self {
            store: StoreSection {
                path: store_path.to_string_lossy().to_string(),
            },
            validation: ValidationSection::default(),
            logging: LoggingSection::default(),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.store.path)
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            strict_exercise_count: self.validation.strict_exercise_count,
        }
    }
}

/// Read the config at the default path, or build one pointing at the
/// default store if no config file exists yet.
pub fn load_or_default() -> Result<LiftlogConfig> {
    let path = default_config_path()?;
    if path.exists() {
        read_config(&path)
    } else {
        Ok(LiftlogConfig::new(default_store_path()?))
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    config_path_from(|name| std::env::var(name).ok())
}

pub fn default_store_path() -> Result<PathBuf> {
    Ok(xdg_data_dir()?.join("liftlog.store"))
}

pub fn read_config(path: &Path) -> Result<LiftlogConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        LiftlogError::Config(format!("Failed to read config {}: {}", path.display(), e))
    })?;
    toml::from_str(&contents).map_err(|e| {
        LiftlogError::Config(format!("Failed to parse config {}: {}", path.display(), e))
    })
}

pub fn write_config(path: &Path, config: &LiftlogConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            LiftlogError::Config(format!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| LiftlogError::Config(format!("TOML error: {}", e)))?;
    crate::fs::write_atomic(path, contents.as_bytes()).map_err(|e| {
        LiftlogError::Config(format!("Failed to write config {}: {}", path.display(), e))
    })
}

pub fn xdg_data_dir() -> Result<PathBuf> {
    xdg_dir_from(
        |name| std::env::var(name).ok(),
        "XDG_DATA_HOME",
        &[".local", "share"],
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn config_path_from(env: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    if let Some(value) = non_empty(env(CONFIG_ENV)) {
        return Ok(PathBuf::from(value));
    }
    Ok(xdg_dir_from(env, "XDG_CONFIG_HOME", &[".config"])?.join("config.toml"))
}

fn xdg_dir_from(
    env: impl Fn(&str) -> Option<String>,
    xdg_var: &str,
    home_fallback: &[&str],
) -> Result<PathBuf> {
    if let Some(value) = non_empty(env(xdg_var)) {
        return Ok(PathBuf::from(value).join("liftlog"));
    }
    let home = non_empty(env("HOME")).ok_or_else(|| {
        LiftlogError::Config("HOME is not set; cannot resolve default paths".to_string())
    })?;
    let mut dir = PathBuf::from(home);
    dir.extend(home_fallback);
    Ok(dir.join("liftlog"))
}
