use crate::db::schema;
use crate::error::StorageError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

pub type SqlitePool = Pool<Sqlite>;

/// Owner of the single database handle for one database file.
///
/// The pool is capped at one connection: SQLite is a single-writer file and
/// every reader and writer in the process goes through this handle.
pub struct SchemaManager {
    db_path: PathBuf,
    pool: RwLock<Option<SqlitePool>>,
}

impl SchemaManager {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            pool: RwLock::new(None),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open (or create) the database file and make sure every table exists.
    pub async fn open(&self) -> Result<SqlitePool, StorageError> {
        let pool = self.connect().await?;
        Self::create_tables(&pool)
            .await
            .map_err(|e| StorageError::open(&self.db_path, e))?;
        Ok(pool)
    }

    /// The live handle, if `open`/`connect` has succeeded and `close` has not
    /// been called since.
    pub fn handle(&self) -> Option<SqlitePool> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create the data directory, open the file and probe it with a query.
    ///
    /// Reuses the current handle when one is already open.
    pub async fn connect(&self) -> Result<SqlitePool, StorageError> {
        if let Some(pool) = self.handle() {
            debug!(path = %self.db_path.display(), "reusing open database handle");
            return Ok(pool);
        }

        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::open(&self.db_path, e))?;
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await
            .map_err(|e| StorageError::open(&self.db_path, e))?;

        // A corrupt or foreign file only fails once it is actually read.
        if let Err(e) = sqlx::query("SELECT COUNT(*) FROM sqlite_master")
            .execute(&pool)
            .await
        {
            pool.close().await;
            return Err(StorageError::open(&self.db_path, e));
        }

        let raced = {
            let mut slot = self.pool.write().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(existing) => Some(existing.clone()),
                None => {
                    *slot = Some(pool.clone());
                    None
                }
            }
        };
        if let Some(existing) = raced {
            warn!(path = %self.db_path.display(), "concurrent open detected; keeping first handle");
            pool.close().await;
            return Ok(existing);
        }

        info!(path = %self.db_path.display(), "database handle opened");
        Ok(pool)
    }

    /// Execute the bundled DDL. Existing tables and their rows are untouched.
    pub async fn create_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        for stmt in schema::create_statements() {
            sqlx::query(&stmt).execute(pool).await?;
        }
        Ok(())
    }

    /// Names of the application tables currently present, sorted.
    pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Release the handle. Closing twice is a no-op.
    pub async fn close(&self) {
        let taken = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = taken {
            pool.close().await;
            info!(path = %self.db_path.display(), "database handle closed");
        }
    }
}
