//! Module removal migrations with file-backed rollback state.
//!
//! Removing a module deletes its rows and every program link to them. The
//! linked program ids are written to a JSON file first so a later reversal,
//! possibly in another process, can put the links back. If that file cannot
//! be written while links exist, the removal aborts before deleting anything.

mod ledger;
mod state;
mod step;

pub use ledger::{MigrationLedger, StepOutcome};
pub use state::RollbackState;
pub use step::{
    ADMIN_MORPH_CLEANUP_MIGRATION, ADMIN_MORPH_STATE_FILE, RemoveModule, Reversal,
    admin_morph_cleanup, admin_morph_removal,
};
