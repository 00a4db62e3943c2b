//! Persistence error types.

use stowage_types::CodecError;
use thiserror::Error;

/// Persistence operation errors.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Field type cannot be mapped onto a storage type
    #[error("Unsupported type '{declared}' for field '{field}' of record '{record}'")]
    UnsupportedFieldType {
        record: String,
        field: String,
        declared: String,
    },

    /// Record registration is inconsistent
    #[error("Invalid schema for record '{record}': {reason}")]
    InvalidSchema { record: String, reason: String },

    /// Insert or update failed in the underlying store
    #[error("Write to '{table}' failed: {reason}")]
    StorageWrite { table: String, reason: String },

    /// Update matched no stored record
    #[error("Record with key {key} not found in '{table}'")]
    RecordNotFound { table: String, key: String },

    /// Update requires a primary key the record type does not declare
    #[error("Table '{table}' has no primary key")]
    MissingPrimaryKey { table: String },

    /// Table or collection has not been created
    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    /// Filter refers to a field the record type does not have
    #[error("Field '{field}' not found in table '{table}'")]
    UnknownField { table: String, field: String },

    /// Stored layout differs from the record type's schema
    #[error("Stored schema of '{table}' does not match: {reason}")]
    SchemaMismatch { table: String, reason: String },

    /// Base folder is unusable
    #[error("Invalid base path '{path}': {reason}")]
    InvalidBasePath { path: String, reason: String },

    /// Database or table name cannot be used as a file name
    #[error("Invalid name '{0}'")]
    InvalidName(String),

    /// Data corruption detected
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(String),

    /// Relational engine error outside of writes
    #[error("SQLite error: {0}")]
    Sqlite(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Value conversion error
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Lock poisoned (RwLock poisoned)
    #[error("Lock poisoned")]
    LockPoisoned,
}
