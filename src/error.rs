use sqlx::Error as SqlxError;
use std::path::PathBuf;
use thiserror::Error as ThisError;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, ThisError)]
pub enum StorageError {
    #[error("Failed to open storage at {}: {source}", path.display())]
    StorageOpen {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Invalid filter: {0}")]
    InvalidFilter(&'static str),

    #[error("Invalid update: {0}")]
    InvalidUpdate(String),

    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Insert into {table} failed: {source}")]
    Insert {
        table: String,
        #[source]
        source: SqlxError,
    },

    #[error("Update of {table} failed: {source}")]
    Update {
        table: String,
        #[source]
        source: SqlxError,
    },

    #[error("Delete from {table} failed: {source}")]
    Delete {
        table: String,
        #[source]
        source: SqlxError,
    },

    #[error("Query on {table} failed: {source}")]
    Query {
        table: String,
        #[source]
        source: SqlxError,
    },

    #[error("Schema incomplete; missing tables: {}", missing.join(", "))]
    SchemaIncomplete { missing: Vec<String> },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),
}

impl StorageError {
    pub(crate) fn open(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        StorageError::StorageOpen {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Whether a caller-side retry has a chance of succeeding.
    ///
    /// Programming errors at the call site (bad filters, bad identifiers) and
    /// constraint violations are permanent; filesystem and engine availability
    /// problems are treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::StorageOpen { .. } | StorageError::SchemaIncomplete { .. } => true,
            StorageError::Database(e) | StorageError::Query { source: e, .. } => {
                is_transient_sqlx(e)
            }
            StorageError::InvalidFilter(_)
            | StorageError::InvalidUpdate(_)
            | StorageError::InvalidIdentifier(_)
            | StorageError::Json(_)
            | StorageError::Insert { .. }
            | StorageError::Update { .. }
            | StorageError::Delete { .. } => false,
        }
    }
}

fn is_transient_sqlx(e: &SqlxError) -> bool {
    match e {
        SqlxError::Io(_) | SqlxError::PoolTimedOut | SqlxError::PoolClosed => true,
        // primary result codes SQLITE_BUSY (5) and SQLITE_LOCKED (6)
        SqlxError::Database(db) => matches!(
            db.code()
                .and_then(|c| c.parse::<i32>().ok())
                .map(|c| c & 0xff),
            Some(5) | Some(6)
        ),
        _ => false,
    }
}
