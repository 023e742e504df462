//! Service configuration
//!
//! Defaults, then an optional TOML file, then `MHD_*` environment variables.

use crate::errors::{Result, ServiceError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG: &str = "MHD_CONFIG";
pub const ENV_BIND_ADDR: &str = "MHD_BIND_ADDR";
pub const ENV_MODEL_DIR: &str = "MHD_MODEL_DIR";
pub const ENV_FEATURE_INFO: &str = "MHD_FEATURE_INFO";
pub const ENV_LOG_LEVEL: &str = "MHD_LOG_LEVEL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    pub bind_addr: String,
    /// Directory holding `model.json`; an absent model means heuristic mode
    pub model_dir: PathBuf,
    pub feature_info_path: PathBuf,
    pub log_level: String,
    /// Half-width of the confidence band as a share of the point estimate
    pub band_fraction: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            model_dir: PathBuf::from("models"),
            feature_info_path: PathBuf::from("data/processed/feature_info.json"),
            log_level: "info".to_string(),
            band_fraction: 0.1,
        }
    }
}

impl ServiceConfig {
    /// Load from `path` (if any) and the process environment, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Override fields from environment variables read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            self.bind_addr = addr;
        }
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_FEATURE_INFO) {
            self.feature_info_path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if !(self.band_fraction > 0.0 && self.band_fraction < 1.0) {
            return Err(ServiceError::Config(format!(
                "band_fraction {} must lie in (0, 1)",
                self.band_fraction
            )));
        }
        if self.log_level.trim().is_empty() {
            return Err(ServiceError::Config("log_level must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| ServiceError::Config(format!("invalid bind_addr `{}`: {e}", self.bind_addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.band_fraction, 0.1);
        assert_eq!(config.socket_addr().unwrap().port(), 8000);
    }

    #[test]
    fn file_then_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "bind_addr = \"127.0.0.1:9000\"").unwrap();
        writeln!(file, "model_dir = \"/srv/models\"").unwrap();
        writeln!(file, "band_fraction = 0.15").unwrap();

        let mut config = ServiceConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.log_level, "info");

        let env: HashMap<&str, &str> = [(ENV_MODEL_DIR, "/opt/mhd"), (ENV_LOG_LEVEL, "")]
            .into_iter()
            .collect();
        config.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.model_dir, PathBuf::from("/opt/mhd"));
        // Empty values are ignored
        assert_eq!(config.log_level, "info");
        assert_eq!(config.band_fraction, 0.15);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_addr = ServiceConfig {
            bind_addr: "not-an-address".to_string(),
            ..ServiceConfig::default()
        };
        assert!(matches!(bad_addr.validate(), Err(ServiceError::Config(_))));

        let bad_band = ServiceConfig {
            band_fraction: 1.5,
            ..ServiceConfig::default()
        };
        assert!(bad_band.validate().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "reference_year = 2030").unwrap();
        assert!(matches!(
            ServiceConfig::from_file(file.path()),
            Err(ServiceError::ConfigParse(_))
        ));
    }
}
