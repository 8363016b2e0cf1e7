//! Gateway configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

/// Suffix that marks an address as an internal alias.
pub const DEFAULT_ALIAS_DOMAIN: &str = ".learningu.org";

/// Domain the platform sends mail from.
pub const DEFAULT_SENDER_DOMAIN: &str = "learningu.org";

const APP_DIR: &str = "mailgate";

/// Settings for the mail gateway and migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Suffix identifying internal alias addresses.
    pub alias_domain: String,
    /// Domain of the platform's own outgoing mail; senders at this domain
    /// are looked up by username instead of by email.
    pub sender_domain: String,
    /// SQLite database file. Defaults to `<data_dir>/mailgate/mailgate.db`.
    pub database_path: Option<PathBuf>,
    /// Directory for migration rollback state. Defaults to `<data_dir>/mailgate`.
    pub state_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            alias_domain: DEFAULT_ALIAS_DOMAIN.to_string(),
            sender_domain: DEFAULT_SENDER_DOMAIN.to_string(),
            database_path: None,
            state_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Default location of the config file: `<config_dir>/mailgate/config.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails validation.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that both domains are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a domain is blank.
    pub fn validate(&self) -> Result<()> {
        if self.alias_domain.trim().is_empty() {
            return Err(Error::Config("alias_domain must not be empty".to_string()));
        }
        if self.sender_domain.trim().is_empty() {
            return Err(Error::Config("sender_domain must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolved database path.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| data_dir().join("mailgate.db"))
    }

    /// Resolved directory for migration state files.
    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(data_dir)
    }
}

fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
