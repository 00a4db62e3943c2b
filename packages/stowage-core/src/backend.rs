//! Storage backend contract.

use std::fmt;

use stowage_types::{FieldValues, Filter};

use crate::error::StoreError;
use crate::schema::Schema;

/// Storage engine behind a [`crate::Database`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Relational engine, one database file holding every table
    Sqlite,
    /// One flat record file per collection
    FlatFile,
}

impl BackendKind {
    /// Returns the file extension used by this backend, including the dot.
    pub fn file_extension(&self) -> &'static str {
        match self {
            BackendKind::Sqlite => ".sqlite3",
            BackendKind::FlatFile => ".fdb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Sqlite => f.write_str("sqlite"),
            BackendKind::FlatFile => f.write_str("flat-file"),
        }
    }
}

/// Row visitor used for in-memory predicates.
///
/// Returns `Ok(true)` for the row that should be returned.
pub type RowVisitor<'a> = dyn FnMut(&FieldValues) -> Result<bool, StoreError> + 'a;

/// How a backend should select the row returned by `find_first`.
pub enum RowQuery<'a> {
    /// Filter the backend may evaluate natively
    Filter(&'a Filter),
    /// Visit rows in stored order until the visitor accepts one
    Scan(&'a mut RowVisitor<'a>),
}

/// Persistence operations every backend provides.
///
/// All methods are synchronous and blocking. Implementations receive a
/// schema that has already been derived and validated.
pub trait Backend: Send {
    /// Returns which engine this is.
    fn kind(&self) -> BackendKind;

    /// Creates the stored table for `schema` if it does not exist.
    fn create_table(&self, schema: &Schema) -> Result<(), StoreError>;

    /// Inserts one record.
    ///
    /// # Returns
    /// The id the store assigned if the schema has an auto-increment field.
    fn insert(&self, schema: &Schema, values: &FieldValues) -> Result<Option<i64>, StoreError>;

    /// Overwrites stored records with the same key.
    ///
    /// # Returns
    /// Number of records updated.
    fn update(&self, schema: &Schema, values: &FieldValues) -> Result<usize, StoreError>;

    /// Returns the first stored record selected by `query`.
    fn find_first(
        &self,
        schema: &Schema,
        query: RowQuery<'_>,
    ) -> Result<Option<FieldValues>, StoreError>;
}
