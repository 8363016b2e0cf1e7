//! Applied-migration bookkeeping.

use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use super::step::RemoveModule;
use crate::Result;
use crate::modules::ModuleRepository;

/// Outcome of running one step through the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran. Carries the program ids it saved or restored.
    Ran(Vec<i64>),
    /// The ledger already had the step in the requested state.
    Skipped,
}

/// Records which migrations have been applied.
pub struct MigrationLedger {
    pool: SqlitePool,
}

impl MigrationLedger {
    /// Create a new ledger with the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let ledger = Self { pool };
        ledger.initialize().await?;
        Ok(ledger)
    }

    /// Create an in-memory ledger for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let ledger = Self { pool };
        ledger.initialize().await?;
        Ok(ledger)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS applied_migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Names of every applied migration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn applied(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT name FROM applied_migrations")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("name")).collect())
    }

    /// Check whether a migration has been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn is_applied(&self, name: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM applied_migrations WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.is_some())
    }

    /// Run `step` forward unless it is already applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails. The step is not recorded then.
    pub async fn apply(
        &self,
        step: &RemoveModule,
        modules: &ModuleRepository,
    ) -> Result<StepOutcome> {
        if self.is_applied(&step.name).await? {
            info!("{} already applied", step.name);
            return Ok(StepOutcome::Skipped);
        }

        let program_ids = step.forward(modules).await?;

        sqlx::query("INSERT INTO applied_migrations (name, applied_at) VALUES (?, ?)")
            .bind(&step.name)
            .bind(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
            .execute(&self.pool)
            .await?;

        Ok(StepOutcome::Ran(program_ids))
    }

    /// Run `step` in reverse if it is applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the step fails. The step stays recorded then.
    pub async fn rollback(
        &self,
        step: &RemoveModule,
        modules: &ModuleRepository,
    ) -> Result<StepOutcome> {
        if !self.is_applied(&step.name).await? {
            info!("{} not applied, nothing to roll back", step.name);
            return Ok(StepOutcome::Skipped);
        }

        let program_ids = step.reverse(modules).await?;

        sqlx::query("DELETE FROM applied_migrations WHERE name = ?")
            .bind(&step.name)
            .execute(&self.pool)
            .await?;

        Ok(StepOutcome::Ran(program_ids))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::migration::step::admin_morph_removal;
    use crate::modules::{ADMIN_MORPH_HANDLER, ADMIN_MORPH_MIGRATION, admin_morph_properties};

    #[tokio::test]
    async fn test_apply_once() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = MigrationLedger::in_memory().await.unwrap();
        let modules = ModuleRepository::in_memory().await.unwrap();
        let step = admin_morph_removal(dir.path());

        let module = modules
            .insert_module(ADMIN_MORPH_HANDLER, &admin_morph_properties())
            .await
            .unwrap();
        let program = modules.create_program("Splash").await.unwrap();
        modules.link(program.id, module.id).await.unwrap();

        assert_eq!(
            ledger.apply(&step, &modules).await.unwrap(),
            StepOutcome::Ran(vec![program.id])
        );
        assert!(ledger.is_applied(ADMIN_MORPH_MIGRATION).await.unwrap());
        assert!(ledger.applied().await.unwrap().contains(ADMIN_MORPH_MIGRATION));

        // a second apply must not overwrite the saved state
        assert_eq!(
            ledger.apply(&step, &modules).await.unwrap(),
            StepOutcome::Skipped
        );

        assert_eq!(
            ledger.rollback(&step, &modules).await.unwrap(),
            StepOutcome::Ran(vec![program.id])
        );
        assert!(!ledger.is_applied(ADMIN_MORPH_MIGRATION).await.unwrap());
    }

    #[tokio::test]
    async fn test_rollback_when_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = MigrationLedger::in_memory().await.unwrap();
        let modules = ModuleRepository::in_memory().await.unwrap();
        let step = admin_morph_removal(dir.path());

        assert_eq!(
            ledger.rollback(&step, &modules).await.unwrap(),
            StepOutcome::Skipped
        );
        assert!(modules.find_by_handler(ADMIN_MORPH_HANDLER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_apply_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = MigrationLedger::in_memory().await.unwrap();
        let modules = ModuleRepository::in_memory().await.unwrap();
        let step = admin_morph_removal(&dir.path().join("missing"));

        let module = modules
            .insert_module(ADMIN_MORPH_HANDLER, &admin_morph_properties())
            .await
            .unwrap();
        let program = modules.create_program("Splash").await.unwrap();
        modules.link(program.id, module.id).await.unwrap();

        assert!(ledger.apply(&step, &modules).await.is_err());
        assert!(!ledger.is_applied(ADMIN_MORPH_MIGRATION).await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_after_unrecorded_forward_keeps_links() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = MigrationLedger::in_memory().await.unwrap();
        let modules = ModuleRepository::in_memory().await.unwrap();
        let step = admin_morph_removal(dir.path());

        let module = modules
            .insert_module(ADMIN_MORPH_HANDLER, &admin_morph_properties())
            .await
            .unwrap();
        let program = modules.create_program("Splash").await.unwrap();
        modules.link(program.id, module.id).await.unwrap();

        // rows deleted and state saved, but never recorded as applied
        step.forward(&modules).await.unwrap();

        assert_eq!(
            ledger.apply(&step, &modules).await.unwrap(),
            StepOutcome::Ran(Vec::new())
        );
        assert_eq!(
            ledger.rollback(&step, &modules).await.unwrap(),
            StepOutcome::Ran(vec![program.id])
        );
    }
}
