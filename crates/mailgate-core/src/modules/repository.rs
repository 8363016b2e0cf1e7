//! Module storage repository.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use super::model::{ModuleProperties, Program, ProgramModule};
use crate::Result;

const MODULE_COLUMNS: &str =
    "SELECT id, handler, link_title, admin_title, module_type, seq, choosable FROM program_modules";

/// Repository for program modules, programs, and the links between them.
pub struct ModuleRepository {
    pool: SqlitePool,
}

impl ModuleRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
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

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        // handler is not unique: older deployments may hold duplicates
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS program_modules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                handler TEXT NOT NULL,
                link_title TEXT NOT NULL,
                admin_title TEXT NOT NULL,
                module_type TEXT NOT NULL,
                seq INTEGER NOT NULL,
                choosable INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS programs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS program_module_links (
                program_id INTEGER NOT NULL REFERENCES programs(id) ON DELETE CASCADE,
                module_id INTEGER NOT NULL REFERENCES program_modules(id) ON DELETE CASCADE,
                UNIQUE(program_id, module_id)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_program_modules_handler ON program_modules(handler)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a module row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert_module(
        &self,
        handler: &str,
        properties: &ModuleProperties,
    ) -> Result<ProgramModule> {
        let id = sqlx::query(
            r"
            INSERT INTO program_modules
                (handler, link_title, admin_title, module_type, seq, choosable)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(handler)
        .bind(&properties.link_title)
        .bind(&properties.admin_title)
        .bind(&properties.module_type)
        .bind(properties.seq)
        .bind(properties.choosable)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(ProgramModule {
            id,
            handler: handler.to_string(),
            properties: properties.clone(),
        })
    }

    /// Fetch the oldest module row for `handler`, inserting one with
    /// `defaults` if none exists.
    ///
    /// Returns the module and whether it was created.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_or_create(
        &self,
        handler: &str,
        defaults: &ModuleProperties,
    ) -> Result<(ProgramModule, bool)> {
        if let Some(existing) = self.find_by_handler(handler).await?.into_iter().next() {
            return Ok((existing, false));
        }

        Ok((self.insert_module(handler, defaults).await?, true))
    }

    /// Every module row for `handler`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_handler(&self, handler: &str) -> Result<Vec<ProgramModule>> {
        let rows = sqlx::query(&format!("{MODULE_COLUMNS} WHERE handler = ? ORDER BY id"))
            .bind(handler)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_module).collect())
    }

    /// Delete every module row for `handler` together with its program links.
    ///
    /// Returns the number of module rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails. Nothing is removed in
    /// that case.
    pub async fn delete_by_handler(&self, handler: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            DELETE FROM program_module_links
            WHERE module_id IN (SELECT id FROM program_modules WHERE handler = ?)
            ",
        )
        .bind(handler)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM program_modules WHERE handler = ?")
            .bind(handler)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    /// Create a program.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn create_program(&self, name: &str) -> Result<Program> {
        let id = sqlx::query("INSERT INTO programs (name) VALUES (?)")
            .bind(name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Program {
            id,
            name: name.to_string(),
        })
    }

    /// Enable a module on a program. Linking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn link(&self, program_id: i64, module_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO program_module_links (program_id, module_id) VALUES (?, ?)",
        )
        .bind(program_id)
        .bind(module_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Ids of programs linked to any module row for `handler`, sorted and
    /// without duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn programs_with_module(&self, handler: &str) -> Result<Vec<i64>> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT l.program_id
            FROM program_module_links l
            JOIN program_modules m ON m.id = l.module_id
            WHERE m.handler = ?
            ORDER BY l.program_id
            ",
        )
        .bind(handler)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("program_id")).collect())
    }

    /// Modules enabled on a program.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn modules_for_program(&self, program_id: i64) -> Result<Vec<ProgramModule>> {
        let rows = sqlx::query(&format!(
            "{MODULE_COLUMNS} WHERE id IN \
             (SELECT module_id FROM program_module_links WHERE program_id = ?) ORDER BY seq, id"
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_module).collect())
    }

    /// The subset of `ids` that still name a program, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn existing_program_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM programs WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|row| row.get("id")).collect())
    }
}

fn row_to_module(row: &SqliteRow) -> ProgramModule {
    ProgramModule {
        id: row.get("id"),
        handler: row.get("handler"),
        properties: ModuleProperties {
            link_title: row.get("link_title"),
            admin_title: row.get("admin_title"),
            module_type: row.get("module_type"),
            seq: row.get("seq"),
            choosable: row.get("choosable"),
        },
    }
}
