//! Database module: embedded SQLite storage behind a document-style interface.
//!
//! Layout:
//! - `schema.rs`: SQL DDL for the portfolio tables
//! - `sqlite.rs`: owner of the single database handle
//! - `document.rs`: document-collection adapter over the tables
//! - `status.rs`: initialization/connection status
//! - `init.rs`: the initialization sequence tying the above together
//! - `models.rs`: typed rows and conversions to documents

pub mod document;
pub mod init;
pub mod models;
pub mod schema;
pub mod sqlite;
pub mod status;

pub use document::{Collection, Cursor, Db, Document};
pub use init::{Storage, VerificationReport};
pub use sqlite::{SchemaManager, SqlitePool};
pub use status::{InitPhase, StatusRegistry, StorageStatus};

use crate::config::CONFIG;
use crate::error::StorageError;
use std::sync::LazyLock;

static STORAGE: LazyLock<Storage> = LazyLock::new(|| Storage::from_config(&CONFIG));

/// The process-wide storage instance.
pub fn storage() -> &'static Storage {
    &STORAGE
}

pub async fn initialize_storage() -> Result<bool, StorageError> {
    STORAGE.initialize().await
}

pub fn is_storage_initialized() -> bool {
    STORAGE.status().is_initialized()
}

pub fn get_storage_error() -> Option<String> {
    STORAGE.status().error()
}

pub fn is_database_installed() -> bool {
    STORAGE.status().is_installed()
}

pub fn is_using_external_database() -> bool {
    STORAGE.status().is_using_external_store()
}

pub fn get_db() -> Option<Db> {
    STORAGE.db()
}

pub async fn close_db() {
    STORAGE.close().await;
}
