//! Async database access for schoolbook (sqlx `Any` driver).
//!
//! Production runs against MySQL (URL assembled from `DB_*` environment
//! variables); tests and local development run against SQLite. One shared
//! pool serves all requests.
//!
//! Usage:
//! let db = Db::connect("sqlite://schoolbook.db?mode=rwc").await?;
//! db.execute("CREATE TABLE ...").await?;
//! db.fetch_all_with("SELECT ... WHERE city = ?", &["Rajkot"]).await?

use log::{debug, error, info, warn};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
pub use sqlx::FromRow;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::AnyPool;
use std::fmt;

const MAX_POOL_CONNECTIONS: u32 = 5;

/// Name of the meta table tracking applied schema migrations.
const MIGRATIONS_TABLE: &str = "__schoolbook_migrations";

static DRIVERS: Lazy<()> = Lazy::new(sqlx::any::install_default_drivers);

/// Which engine the pool is connected to. The schema DDL is the only place
/// where the two dialects diverge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    MySql,
}

impl Backend {
    fn from_url(url: &str) -> Self {
        if url.trim_start().starts_with("sqlite") {
            Backend::Sqlite
        } else {
            Backend::MySql
        }
    }

    /// The auto-incrementing primary key column definition.
    pub fn auto_increment_pk(self) -> &'static str {
        match self {
            Backend::Sqlite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            Backend::MySql => "BIGINT AUTO_INCREMENT PRIMARY KEY",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Sqlite => write!(f, "sqlite"),
            Backend::MySql => write!(f, "mysql"),
        }
    }
}

/// An async database pool wrapper.
#[derive(Clone)]
pub struct Db {
    pool: AnyPool,
    backend: Backend,
}

impl Db {
    /// Connect a shared pool to the database at the given URL.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        Lazy::force(&DRIVERS);
        let backend = Backend::from_url(url);
        info!("Connecting to {} database", backend);
        let mut options = AnyPoolOptions::new().max_connections(MAX_POOL_CONNECTIONS);
        if backend == Backend::Sqlite && url.contains(":memory:") {
            // An in-memory SQLite database exists per connection; a pool of
            // more than one would hand out empty databases.
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(url).await?;
        info!("Connected to {} database", backend);
        Ok(Db { pool, backend })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Execute a statement with no bind parameters. Returns affected rows.
    pub async fn execute(&self, sql: &str) -> Result<u64, sqlx::Error> {
        self.execute_with(sql, &[]).await
    }

    /// Execute a statement (DDL, INSERT, UPDATE) with positional `?` bind
    /// parameters. Returns the number of affected rows.
    pub async fn execute_with(&self, sql: &str, params: &[&str]) -> Result<u64, sqlx::Error> {
        debug!("Executing SQL: {}", sql);
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(*param);
        }
        match query.execute(&self.pool).await {
            Ok(done) => {
                debug!("SQL executed, {} rows affected", done.rows_affected());
                Ok(done.rows_affected())
            }
            Err(e) => {
                error!("SQL execution failed: {}", e);
                Err(e)
            }
        }
    }

    /// Fetch all rows and map to a type implementing `FromRow`.
    pub async fn fetch_all<T>(&self, sql: &str) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, AnyRow> + Send + Unpin,
    {
        self.fetch_all_with(sql, &[]).await
    }

    /// Fetch all rows for a SELECT with positional `?` bind parameters.
    pub async fn fetch_all_with<T>(&self, sql: &str, params: &[&str]) -> Result<Vec<T>, sqlx::Error>
    where
        T: for<'r> FromRow<'r, AnyRow> + Send + Unpin,
    {
        debug!("Fetching rows with SQL: {}", sql);
        let mut query = sqlx::query_as::<_, T>(sql);
        for param in params {
            query = query.bind(*param);
        }
        match query.fetch_all(&self.pool).await {
            Ok(rows) => {
                debug!("Fetched {} rows", rows.len());
                Ok(rows)
            }
            Err(e) => {
                error!("Row fetch failed: {}", e);
                Err(e)
            }
        }
    }
}

#[async_trait::async_trait]
pub trait Model: Send + Sync {
    fn table_name() -> &'static str;
    fn create_table_sql(backend: Backend) -> String;

    /// Idempotently create the backing table if it does not exist yet.
    async fn ensure_table(db: &Db) -> Result<(), sqlx::Error> {
        db.execute(&Self::create_table_sql(db.backend())).await?;
        Ok(())
    }

    /// Startup migration: create the table on first run and record the
    /// applied schema (hashed) in the meta table. A schema that later
    /// drifts from the recorded hash is reported but not altered.
    async fn migrate(db: &Db) -> Result<(), sqlx::Error> {
        let table_name = Self::table_name();
        let create_sql = Self::create_table_sql(db.backend());
        let schema_hash = hash(&create_sql);

        db.execute(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id {},
                table_name VARCHAR(255),
                schema_sql TEXT,
                hash VARCHAR(64),
                applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            MIGRATIONS_TABLE,
            db.backend().auto_increment_pk(),
        ))
        .await?;

        let applied: Vec<(String,)> = db
            .fetch_all_with(
                &format!("SELECT hash FROM {} WHERE table_name = ?", MIGRATIONS_TABLE),
                &[table_name],
            )
            .await?;

        match applied.first() {
            None => {
                db.execute(&create_sql).await?;
                db.execute_with(
                    &format!(
                        "INSERT INTO {} (table_name, schema_sql, hash) VALUES (?, ?, ?)",
                        MIGRATIONS_TABLE
                    ),
                    &[table_name, &create_sql, &schema_hash],
                )
                .await?;
                info!("Migrated `{}` (table created, initial schema applied).", table_name);
            }
            Some((recorded,)) if *recorded != schema_hash => {
                warn!(
                    "Schema for `{}` differs from the applied migration; \
                     apply the change manually and update {}.",
                    table_name, MIGRATIONS_TABLE
                );
            }
            Some(_) => {
                info!("No schema changes detected for `{}`.", table_name);
            }
        }
        Ok(())
    }
}

// Helper function to hash a SQL string
fn hash(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}
