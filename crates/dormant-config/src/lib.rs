//! Configuration management for Dormant
//!
//! Named sleep profiles and the platform selection, stored as TOML. Values
//! can be overridden from the environment with `DORMANT__` prefixed
//! variables, e.g. `DORMANT__PLATFORM=wifi`.

mod profile;

pub use profile::{GpioWakeup, SleepProfile};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Unknown sleep profile: {0}")]
    UnknownProfile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Layered configuration error: {0}")]
    Layered(#[from] config::ConfigError),
}

/// Standard configuration paths
pub const CONFIG_DIR: &str = "/etc/dormant";
pub const USER_CONFIG_DIR: &str = "/var/lib/dormant";
pub const CONFIG_FILE: &str = "sleep.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "DORMANT";

fn default_platform() -> String {
    "cellular".to_string()
}

/// Main Dormant configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DormantConfig {
    /// Built-in platform profile id
    #[serde(default = "default_platform")]
    pub platform: String,

    /// Profile used when none is named explicitly
    #[serde(default)]
    pub default_profile: Option<String>,

    #[serde(default)]
    pub profiles: BTreeMap<String, SleepProfile>,
}

impl Default for DormantConfig {
    fn default() -> Self {
        Self {
            platform: default_platform(),
            default_profile: None,
            profiles: BTreeMap::new(),
        }
    }
}

impl DormantConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.normalized()
    }

    /// Load configuration from default locations, with environment
    /// overrides on top
    pub fn load_default() -> Result<Self, ConfigError> {
        let dirs = [Path::new(USER_CONFIG_DIR), Path::new(CONFIG_DIR)];
        match find_config(&dirs) {
            Some(path) => Self::load_layered(&path),
            None => {
                tracing::warn!("No configuration file found, using defaults");
                Self::layered(None, None)
            }
        }
    }

    /// Load `path` (if present) with environment overrides on top
    pub fn load_layered(path: &Path) -> Result<Self, ConfigError> {
        Self::layered(Some(path), None)
    }

    fn layered(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .source(env),
            )
            .build()?;
        let config: Self = config.try_deserialize::<Self>()?.normalized()?;
        tracing::debug!(
            "Loaded {} sleep profile(s) for platform {}",
            config.profiles.len(),
            config.platform
        );
        Ok(config)
    }

    /// Profile names are case-insensitive. Layered loading lowercases table
    /// keys, so every source is brought to lowercase names.
    fn normalized(mut self) -> Result<Self, ConfigError> {
        let mut profiles = BTreeMap::new();
        for (name, profile) in std::mem::take(&mut self.profiles) {
            let key = name.to_lowercase();
            if profiles.insert(key, profile).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "sleep profile {} is defined more than once",
                    name
                )));
            }
        }
        self.profiles = profiles;
        self.default_profile = self.default_profile.map(|name| name.to_lowercase());
        Ok(self)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Look up a profile by name, falling back to the default profile
    pub fn profile(&self, name: Option<&str>) -> Result<&SleepProfile, ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .ok_or_else(|| ConfigError::Invalid("no sleep profile selected".to_string()))?;
        self.profiles
            .get(&name.to_lowercase())
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))
    }
}

/// First `sleep.toml` found in `dirs`
fn find_config(dirs: &[&Path]) -> Option<PathBuf> {
    dirs.iter()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|path| path.exists())
}
