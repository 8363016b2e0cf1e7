//! User account storage repository.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::warn;

use super::model::{Role, UserAccount};
use crate::Result;

const USER_COLUMNS: &str = "SELECT id, username, email, date_joined FROM users";

/// Repository for user accounts and group memberships.
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
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
        // date_joined is fixed-width RFC 3339 UTC, so text order is time order.
        // The *_key columns hold Rust-folded values; SQLite only folds ASCII.
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                username_key TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                email_key TEXT NOT NULL,
                date_joined TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS user_roles (
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role TEXT NOT NULL,
                UNIQUE(user_id, role)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_email_key ON users(email_key)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the username is taken (case-insensitively) or the
    /// database query fails.
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        date_joined: DateTime<Utc>,
    ) -> Result<UserAccount> {
        let id = sqlx::query(
            r"
            INSERT INTO users (username, username_key, email, email_key, date_joined)
            VALUES (?, ?, ?, ?, ?)
            ",
        )
        .bind(username)
        .bind(fold_key(username))
        .bind(email)
        .bind(fold_key(email))
        .bind(format_timestamp(date_joined))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(UserAccount {
            id,
            username: username.to_string(),
            email: email.to_string(),
            roles: Vec::new(),
            date_joined,
        })
    }

    /// Add a group membership. Adding an existing membership is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn add_role(&self, user_id: i64, role: &Role) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Find accounts whose username matches any of `usernames`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<UserAccount>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(USER_COLUMNS);
        query.push(" WHERE username_key IN (");
        let mut separated = query.separated(", ");
        for username in usernames {
            separated.push_bind(fold_key(username));
        }
        separated.push_unseparated(") ORDER BY id");

        let rows = query.build().fetch_all(&self.pool).await?;
        self.hydrate(&rows).await
    }

    /// Find accounts with this exact username ignoring case, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_username(&self, username: &str) -> Result<Vec<UserAccount>> {
        let rows = sqlx::query(&format!(
            "{USER_COLUMNS} WHERE username_key = ? ORDER BY date_joined, id"
        ))
        .bind(fold_key(username))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(&rows).await
    }

    /// Find accounts with this email ignoring case, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Vec<UserAccount>> {
        let rows = sqlx::query(&format!(
            "{USER_COLUMNS} WHERE email_key = ? ORDER BY date_joined, id"
        ))
        .bind(fold_key(email))
        .fetch_all(&self.pool)
        .await?;

        self.hydrate(&rows).await
    }

    /// Group memberships of one account, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn roles(&self, user_id: i64) -> Result<Vec<Role>> {
        let rows = sqlx::query("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| Role::parse(row.get::<&str, _>("role")))
            .collect())
    }

    /// Turn user rows into accounts with their roles loaded.
    async fn hydrate(&self, rows: &[SqliteRow]) -> Result<Vec<UserAccount>> {
        let mut users = Vec::with_capacity(rows.len());

        for row in rows {
            let id: i64 = row.get("id");
            let date_joined_str: String = row.get("date_joined");
            let Ok(date_joined) = DateTime::parse_from_rfc3339(&date_joined_str) else {
                warn!("Skipping user {id} with unreadable date_joined `{date_joined_str}`");
                continue;
            };

            users.push(UserAccount {
                id,
                username: row.get("username"),
                email: row.get("email"),
                roles: self.roles(id).await?,
                date_joined: date_joined.with_timezone(&Utc),
            });
        }

        Ok(users)
    }
}

fn fold_key(value: &str) -> String {
    value.to_lowercase()
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
