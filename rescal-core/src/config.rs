//! Global rescal configuration.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{RescalError, RescalResult};

static DEFAULT_DATABASE_URL: &str = "sqlite://~/.local/share/rescal/rescal.db";
static DEFAULT_LISTEN: &str = "127.0.0.1:4096";

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_principal() -> String {
    std::env::var("USER").unwrap_or_else(|_| "nobody".to_string())
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Configuration at ~/.config/rescal/config.toml, overridable with
/// `RESCAL_*` environment variables.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RescalConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// User the stores act for
    #[serde(default = "default_principal")]
    pub principal: String,

    /// Address the AJAX server binds to
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Directory of HTML fragments served by the ChunkContent action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_dir: Option<PathBuf>,

    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for RescalConfig {
    fn default() -> Self {
        RescalConfig {
            database_url: default_database_url(),
            principal: default_principal(),
            listen: default_listen(),
            chunk_dir: None,
            log_filter: default_log_filter(),
        }
    }
}

impl RescalConfig {
    pub fn config_path() -> RescalResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| RescalError::Config("Could not determine config directory".into()))?
            .join("rescal");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the user's config, writing a commented default first if missing.
    pub fn load() -> RescalResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> RescalResult<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("RESCAL"))
            .build()
            .map_err(|e| RescalError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| RescalError::Config(e.to_string()))
    }

    /// Database URL with `~` in the file path expanded.
    pub fn database_url(&self) -> String {
        match self.database_url.strip_prefix("sqlite://") {
            Some(path) => format!("sqlite://{}", shellexpand::tilde(path)),
            None => self.database_url.clone(),
        }
    }

    pub fn chunk_dir(&self) -> Option<PathBuf> {
        self.chunk_dir
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).into_owned()))
    }

    /// Effective configuration as TOML.
    pub fn to_toml(&self) -> RescalResult<String> {
        toml::to_string_pretty(self).map_err(|e| RescalError::Config(e.to_string()))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> RescalResult<()> {
        let contents = format!(
            "\
# rescal configuration

# Where events and resources are stored:
# database_url = \"{}\"

# User the CLI and server act for (defaults to $USER):
# principal = \"alice\"

# Address of the AJAX server:
# listen = \"{}\"

# Directory of HTML fragments for the ChunkContent action:
# chunk_dir = \"~/.local/share/rescal/chunks\"

# Log filter when RUST_LOG is unset:
# log_filter = \"info\"
",
            DEFAULT_DATABASE_URL, DEFAULT_LISTEN
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RescalError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RescalError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_leaves_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rescal").join("config.toml");
        RescalConfig::create_default_config(&path).unwrap();

        let config = RescalConfig::load_from(&path).unwrap();
        assert_eq!(config.listen, DEFAULT_LISTEN);
        assert_eq!(config.log_filter, "info");
        assert!(config.chunk_dir.is_none());
        assert!(config.database_url().starts_with("sqlite://"));
        assert!(!config.database_url().contains('~'));
    }

    #[test]
    fn test_file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "database_url = \"sqlite::memory:\"\nprincipal = \"alice\"\nchunk_dir = \"/srv/chunks\"\n",
        )
        .unwrap();

        let config = RescalConfig::load_from(&path).unwrap();
        assert_eq!(config.database_url(), "sqlite::memory:");
        assert_eq!(config.principal, "alice");
        assert_eq!(config.chunk_dir(), Some(PathBuf::from("/srv/chunks")));
        assert!(config.to_toml().unwrap().contains("principal = \"alice\""));
    }
}
