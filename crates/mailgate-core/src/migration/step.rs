//! Module removal steps.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::state::RollbackState;
use crate::Result;
use crate::modules::{
    ADMIN_MORPH_HANDLER, ADMIN_MORPH_MIGRATION, ModuleProperties, ModuleRepository,
    admin_morph_properties,
};

/// State file the `AdminMorph` removal writes into the state directory.
pub const ADMIN_MORPH_STATE_FILE: &str = ".adminmorph_state.json";

/// Follow-up migration that repeats the `AdminMorph` cleanup.
pub const ADMIN_MORPH_CLEANUP_MIGRATION: &str = "0048_remove_adminmorph";

/// What undoing a removal does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reversal {
    /// Re-create the module row and re-link saved programs.
    Restore,
    /// Nothing. Forward saves no state either.
    Noop,
}

/// Deletes every module row for one handler, keeping enough state on disk
/// to put the program links back.
#[derive(Debug, Clone)]
pub struct RemoveModule {
    /// Migration name recorded in the ledger.
    pub name: String,
    /// Handler whose rows are removed.
    pub handler: String,
    /// Properties used when the reversal re-creates the row.
    pub defaults: ModuleProperties,
    /// Where the rollback state is written.
    pub state_path: PathBuf,
    /// Reverse behavior.
    pub reversal: Reversal,
}

impl RemoveModule {
    /// Remove the handler's rows.
    ///
    /// Programs linked to any of the rows are saved to the state file
    /// first. When nothing is linked, a non-empty state file from an
    /// earlier run is left alone. Returns the program ids found now.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written while programs
    /// are linked (nothing is deleted then), or if a database query fails.
    pub async fn forward(&self, modules: &ModuleRepository) -> Result<Vec<i64>> {
        if self.reversal == Reversal::Noop {
            let deleted = modules.delete_by_handler(&self.handler).await?;
            info!("{}: removed {deleted} `{}` row(s)", self.name, self.handler);
            return Ok(Vec::new());
        }

        let program_ids = modules.programs_with_module(&self.handler).await?;

        // A rerun after the rows are gone finds no links; the earlier state
        // is the only record of them.
        let existing = if program_ids.is_empty() {
            RollbackState::load(&self.state_path).await
        } else {
            RollbackState::default()
        };

        if existing.program_ids.is_empty() {
            let state = RollbackState {
                program_ids: program_ids.clone(),
            };
            if let Err(e) = state.save(&self.state_path).await {
                if !program_ids.is_empty() {
                    return Err(e);
                }
                warn!("{}: no rollback state saved: {e}", self.name);
            }
        } else {
            warn!(
                "{}: keeping saved state for {} program(s) at {}",
                self.name,
                existing.program_ids.len(),
                self.state_path.display()
            );
        }

        let deleted = modules.delete_by_handler(&self.handler).await?;
        info!(
            "{}: removed {deleted} `{}` row(s), {} program link(s) saved",
            self.name,
            self.handler,
            program_ids.len()
        );

        Ok(program_ids)
    }

    /// Undo [`forward`](Self::forward).
    ///
    /// Re-creates the module row if missing and re-links the saved programs
    /// that still exist. The state file is consumed. Returns the re-linked
    /// program ids.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn reverse(&self, modules: &ModuleRepository) -> Result<Vec<i64>> {
        if self.reversal == Reversal::Noop {
            return Ok(Vec::new());
        }

        let (module, _) = modules.get_or_create(&self.handler, &self.defaults).await?;

        let state = RollbackState::load(&self.state_path).await;
        let program_ids = modules.existing_program_ids(&state.program_ids).await?;
        for program_id in &program_ids {
            modules.link(*program_id, module.id).await?;
        }

        RollbackState::remove(&self.state_path).await;
        info!(
            "{}: restored `{}` on {} program(s)",
            self.name,
            self.handler,
            program_ids.len()
        );

        Ok(program_ids)
    }
}

/// The `AdminMorph` removal, saving state under `state_dir`.
#[must_use]
pub fn admin_morph_removal(state_dir: &Path) -> RemoveModule {
    RemoveModule {
        name: ADMIN_MORPH_MIGRATION.to_string(),
        handler: ADMIN_MORPH_HANDLER.to_string(),
        defaults: admin_morph_properties(),
        state_path: state_dir.join(ADMIN_MORPH_STATE_FILE),
        reversal: Reversal::Restore,
    }
}

/// Second `AdminMorph` cleanup. Reversing it does nothing.
#[must_use]
pub fn admin_morph_cleanup(state_dir: &Path) -> RemoveModule {
    RemoveModule {
        name: ADMIN_MORPH_CLEANUP_MIGRATION.to_string(),
        reversal: Reversal::Noop,
        ..admin_morph_removal(state_dir)
    }
}
