//! Rollback state persisted between a removal and its reversal.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Program links captured before a module's rows are deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackState {
    /// Programs that had the module enabled, sorted.
    #[serde(default)]
    pub program_ids: Vec<i64>,
}

impl RollbackState {
    /// Write the state as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RollbackState`] if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self)?;
        tokio::fs::write(path, json)
            .await
            .map_err(|source| Error::RollbackState {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Read the state back. A missing or unreadable file means nothing to
    /// restore.
    pub async fn load(path: &Path) -> Self {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No rollback state at {}", path.display());
                return Self::default();
            }
            Err(e) => {
                warn!("Ignoring unreadable rollback state {}: {e}", path.display());
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring malformed rollback state {}: {e}", path.display());
            Self::default()
        })
    }

    /// Delete the state file, ignoring failures.
    pub async fn remove(path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await
            && e.kind() != ErrorKind::NotFound
        {
            debug!("Could not remove rollback state {}: {e}", path.display());
        }
    }
}
