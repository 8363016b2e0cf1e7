//! Redirect storage repository.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};

use super::model::RedirectRecord;
use crate::Result;

/// Repository for redirect records.
pub struct RedirectRepository {
    pool: SqlitePool,
}

impl RedirectRepository {
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
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS plain_redirects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                original TEXT NOT NULL,
                original_key TEXT NOT NULL,
                destination TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_plain_redirects_original_key
            ON plain_redirects(original_key)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store a redirect.
    ///
    /// The lookup key is folded here rather than in SQL, where `LOWER()`
    /// only folds ASCII.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn create(&self, original: &str, destination: Option<&str>) -> Result<RedirectRecord> {
        let id = sqlx::query(
            "INSERT INTO plain_redirects (original, original_key, destination) VALUES (?, ?, ?)",
        )
        .bind(original)
        .bind(fold_key(original))
        .bind(destination)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(RedirectRecord {
            id,
            original: original.to_string(),
            destination: destination.map(ToString::to_string),
        })
    }

    /// Find resolvable redirects whose key matches any of `keys`.
    ///
    /// Keys are compared case-insensitively. Records with a null or empty
    /// destination are excluded. Results are in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_originals(&self, keys: &[String]) -> Result<Vec<RedirectRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, original, destination FROM plain_redirects WHERE original_key IN (",
        );
        let mut separated = query.separated(", ");
        for key in keys {
            separated.push_bind(fold_key(key));
        }
        separated.push_unseparated(
            ") AND destination IS NOT NULL AND destination != '' ORDER BY id",
        );

        let rows = query.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_redirect).collect())
    }

    /// List every redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<RedirectRecord>> {
        let rows = sqlx::query("SELECT id, original, destination FROM plain_redirects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_redirect).collect())
    }

    /// Delete a redirect.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM plain_redirects WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Case-fold a lookup key the same way on write and on read.
fn fold_key(value: &str) -> String {
    value.to_lowercase()
}

fn row_to_redirect(row: &SqliteRow) -> RedirectRecord {
    RedirectRecord {
        id: row.get("id"),
        original: row.get("original"),
        destination: row.get("destination"),
    }
}
