//! Configuration loading and validation for lvsctl

use common::logging::Format;
use lvs::Service;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid service {service}: {source}")]
    InvalidService {
        service: String,
        source: common::Error,
    },

    #[error("Service {0} is configured more than once")]
    DuplicateService(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ipvsadm: IpvsadmSettings,

    #[serde(default)]
    pub logging: LoggingSettings,

    #[serde(default)]
    pub services: Vec<Service>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.ipvsadm.validate()?;
        Ok(())
    }
}

/// Settings for the external administration tool
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IpvsadmSettings {
    #[validate(length(min = 1), custom = "validate_binary_path")]
    pub path: String,
}

/// Logging settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: Option<String>,
    pub format: Option<Format>,
}

impl Default for IpvsadmSettings {
    fn default() -> Self {
        Self {
            path: lvs::IPVSADM.to_string(),
        }
    }
}

// Custom validators

fn validate_binary_path(path: &str) -> Result<(), ValidationError> {
    let trimmed = path.trim();
    if trimmed.is_empty() || trimmed != path {
        return Err(ValidationError::new("binary_path_invalid"));
    }

    // Bare names are looked up in PATH, anything else must be anchored
    if trimmed.contains('/') && !trimmed.starts_with('/') && !trimmed.starts_with("./") {
        return Err(ValidationError::new("binary_path_invalid_format"));
    }

    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from `path`, or from the default search paths
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::FileNotFound(path.to_path_buf()));
            }
            return Self::load_from_file(path);
        }

        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        config.validate_services()?;
        Ok(config)
    }

    /// Check every service against ipvsadm's rules and reject duplicates
    pub fn validate_services(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for service in &self.services {
            let key = format!("{} {}", service.protocol.flag(), service.address());
            service
                .validate()
                .map_err(|source| ConfigError::InvalidService {
                    service: key.clone(),
                    source,
                })?;
            if !seen.insert(key.clone()) {
                return Err(ConfigError::DuplicateService(key));
            }
        }
        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/lvs/lvsctl.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./lvsctl.yaml"));

        paths.into_iter().find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/lvs/lvsctl.yaml"))
    }
}
