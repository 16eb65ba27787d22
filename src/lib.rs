pub mod config;
pub mod db;
pub mod error;
pub mod service;

pub use db::{
    Collection, Db, Document, Storage, close_db, get_db, get_storage_error, initialize_storage,
    is_database_installed, is_storage_initialized, is_using_external_database,
};
pub use error::StorageError;
