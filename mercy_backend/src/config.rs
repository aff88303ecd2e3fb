use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::format::BarStyle;

pub const CONFIG_FILE_NAME: &str = "mercy_config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    // Storage
    #[serde(default = "default_data_file")]
    pub data_file: String,
    #[serde(default = "default_backup_folder")]
    pub backup_folder: String,
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    // Bounds for a single /open, inclusive
    #[serde(default = "default_min_amount")]
    pub min_amount: u64,
    #[serde(default = "default_max_amount")]
    pub max_amount: u64,

    // Closed set of counter keys accepted by update
    #[serde(default = "default_valid_categories")]
    pub valid_categories: Vec<String>,

    // Progress bar rendering
    #[serde(default = "default_progress_bar_length")]
    pub progress_bar_length: usize,
    #[serde(default = "default_progress_filled_char")]
    pub progress_filled_char: String,
    #[serde(default = "default_progress_empty_char")]
    pub progress_empty_char: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Rate limiting (enforced by the chat host, not the core)
    #[serde(default = "default_commands_per_minute")]
    pub commands_per_minute: u32,
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

fn default_data_file() -> String {
    "user_data.json".to_string()
}

fn default_backup_folder() -> String {
    "backups".to_string()
}

fn default_max_backups() -> usize {
    10
}

fn default_min_amount() -> u64 {
    1
}

fn default_max_amount() -> u64 {
    500
}

fn default_valid_categories() -> Vec<String> {
    [
        "ancient",
        "void",
        "sacred",
        "primal",
        "primal_legendary",
        "primal_mythical",
        "remnant",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_progress_bar_length() -> usize {
    10
}

fn default_progress_filled_char() -> String {
    "▰".to_string()
}

fn default_progress_empty_char() -> String {
    "▱".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_commands_per_minute() -> u32 {
    10
}

fn default_cooldown_seconds() -> u64 {
    3
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            backup_folder: default_backup_folder(),
            max_backups: default_max_backups(),
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            valid_categories: default_valid_categories(),
            progress_bar_length: default_progress_bar_length(),
            progress_filled_char: default_progress_filled_char(),
            progress_empty_char: default_progress_empty_char(),
            log_level: default_log_level(),
            commands_per_minute: default_commands_per_minute(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

/// Where a loaded config came from. Reported once logging is up.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    File(PathBuf),
    /// The file existed but could not be parsed; env + defaults were used instead.
    Invalid { path: PathBuf, error: String },
    Env,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "loaded config from {:?}", path),
            ConfigSource::Invalid { path, error } => write!(
                f,
                "failed to parse {:?} ({}), using defaults + env vars",
                path, error
            ),
            ConfigSource::Env => write!(f, "no config file found, using defaults + env vars"),
        }
    }
}

impl TrackerConfig {
    /// Get the directory containing the executable
    fn get_base_dir() -> PathBuf {
        match std::env::current_exe() {
            Ok(exe_path) => exe_path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
            Err(_) => PathBuf::from("."),
        }
    }

    /// `MERCY_CONFIG` if set, otherwise mercy_config.toml next to the executable
    pub fn config_path() -> PathBuf {
        match env::var("MERCY_CONFIG") {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path.trim()),
            _ => Self::get_base_dir().join(CONFIG_FILE_NAME),
        }
    }

    /// Load config without logging, since binaries call this before the
    /// tracing subscriber exists. The returned source is logged afterwards.
    pub fn load() -> (Self, ConfigSource) {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> (Self, ConfigSource) {
        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => (config, ConfigSource::File(path.to_path_buf())),
                Err(e) => (
                    Self::from_env(),
                    ConfigSource::Invalid {
                        path: path.to_path_buf(),
                        error: format!("{:#}", e),
                    },
                ),
            },
            Err(_) => (Self::from_env(), ConfigSource::Env),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str::<TrackerConfig>(contents).context("Failed to parse tracker config")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Defaults overridden by `MERCY_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = env::var("MERCY_DATA_FILE") {
            if !path.trim().is_empty() {
                config.data_file = path;
            }
        }

        if let Ok(path) = env::var("MERCY_BACKUP_FOLDER") {
            if !path.trim().is_empty() {
                config.backup_folder = path;
            }
        }

        if let Ok(count) = env::var("MERCY_MAX_BACKUPS") {
            if let Ok(count) = count.trim().parse() {
                config.max_backups = count;
            }
        }

        if let Ok(amount) = env::var("MERCY_MIN_AMOUNT") {
            if let Ok(amount) = amount.trim().parse() {
                config.min_amount = amount;
            }
        }

        if let Ok(amount) = env::var("MERCY_MAX_AMOUNT") {
            if let Ok(amount) = amount.trim().parse() {
                config.max_amount = amount;
            }
        }

        if let Ok(level) = env::var("MERCY_LOG_LEVEL") {
            if !level.trim().is_empty() {
                config.log_level = level.trim().to_string();
            }
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_amount == 0 {
            bail!("min_amount must be at least 1");
        }
        if self.min_amount > self.max_amount {
            bail!(
                "min_amount ({}) is greater than max_amount ({})",
                self.min_amount,
                self.max_amount
            );
        }
        if self.progress_bar_length == 0 {
            bail!("progress_bar_length must be at least 1");
        }
        if self.max_backups == 0 {
            bail!("max_backups must be at least 1");
        }
        if self.valid_categories.is_empty() {
            bail!("valid_categories must not be empty");
        }
        if self.commands_per_minute == 0 {
            bail!("commands_per_minute must be at least 1");
        }
        Ok(())
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_file)
    }

    pub fn backup_dir(&self) -> PathBuf {
        PathBuf::from(&self.backup_folder)
    }

    pub fn bar_style(&self) -> BarStyle {
        BarStyle {
            length: self.progress_bar_length,
            filled: self.progress_filled_char.clone(),
            empty: self.progress_empty_char.clone(),
        }
    }

    pub fn is_valid_category(&self, category: &str) -> bool {
        self.valid_categories.iter().any(|c| c == category)
    }
}
