//! Typed persistence facade over a storage backend.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stowage_types::{FieldValues, Record};
use tracing::debug;

use crate::backend::{Backend, BackendKind, RowQuery};
use crate::codec;
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::flatfile::FlatFileBackend;
use crate::predicate::{validate_filter, Predicate};
use crate::schema::Schema;
use crate::sqlite::SqliteBackend;

/// A named database on one backend.
///
/// Derives and caches the schema of every record type it sees and converts
/// records to and from their field-value form around the backend calls.
pub struct Database {
    name: String,
    backend: Box<dyn Backend>,
    schemas: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl Database {
    /// Opens or creates a database.
    ///
    /// # Arguments
    /// * `kind` - Backend to use
    /// * `name` - Database name; the relational backend stores all tables in
    ///   `<data_dir>/<name>.sqlite3`
    /// * `config` - Store configuration
    ///
    /// # Returns
    /// `Result<Database, StoreError>`; `InvalidBasePath` if the data folder
    /// is unusable.
    pub fn create(kind: BackendKind, name: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        config.prepare()?;

        let backend: Box<dyn Backend> = match kind {
            BackendKind::Sqlite => {
                let path = config.file_path(name, kind.file_extension())?;
                Box::new(SqliteBackend::open(
                    &path,
                    config.sqlite_journal_mode.as_deref(),
                )?)
            }
            BackendKind::FlatFile => Box::new(FlatFileBackend::create(name, config)?),
        };

        Ok(Self::with_backend(name, backend))
    }

    /// Wraps an existing backend.
    pub fn with_backend(name: &str, backend: Box<dyn Backend>) -> Self {
        Self {
            name: name.to_string(),
            backend,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the backend kind.
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Returns the cached schema of `R`, deriving it on first use.
    ///
    /// Schemas are cached per Rust type. A type whose layout disagrees with
    /// the stored table of the same `NAME` is rejected by the backend.
    pub fn schema<R: Record>(&self) -> Result<Arc<Schema>, StoreError> {
        let key = TypeId::of::<R>();
        {
            let schemas = self.schemas.read().map_err(|_| StoreError::LockPoisoned)?;
            if let Some(schema) = schemas.get(&key) {
                return Ok(Arc::clone(schema));
            }
        }

        let schema = Arc::new(Schema::derive::<R>()?);
        let mut schemas = self.schemas.write().map_err(|_| StoreError::LockPoisoned)?;
        Ok(Arc::clone(schemas.entry(key).or_insert(schema)))
    }

    /// Creates the table or collection for `R` if it does not exist.
    pub fn create_table<R: Record>(&self) -> Result<(), StoreError> {
        let schema = self.schema::<R>()?;
        self.backend.create_table(&schema)?;
        debug!("Table '{}' ready in database '{}'", R::NAME, self.name);
        Ok(())
    }

    /// Inserts a record.
    ///
    /// # Returns
    /// The id the store assigned if `R` has an auto-increment `Id`.
    pub fn insert<R: Record>(&self, record: &R) -> Result<Option<i64>, StoreError> {
        let schema = self.schema::<R>()?;
        self.backend.insert(&schema, &codec::encode(record))
    }

    /// Overwrites the stored record with the same `Id`.
    ///
    /// # Returns
    /// Number of records updated. The relational backend fails with
    /// `RecordNotFound` when nothing matches; the flat-file backend returns
    /// `0`.
    pub fn update<R: Record>(&self, record: &R) -> Result<usize, StoreError> {
        let schema = self.schema::<R>()?;
        self.backend.update(&schema, &codec::encode(record))
    }

    /// Returns the first stored record accepted by `predicate`.
    ///
    /// Accepts a [`stowage_types::Filter`] or a [`Predicate::test`] closure.
    pub fn find<'p, R: Record>(
        &self,
        predicate: impl Into<Predicate<'p, R>>,
    ) -> Result<Option<R>, StoreError> {
        let schema = self.schema::<R>()?;
        let predicate = predicate.into();

        let found = match &predicate {
            Predicate::Filter(filter) => {
                validate_filter(filter, &schema)?;
                self.backend
                    .find_first(&schema, RowQuery::Filter(filter))?
            }
            Predicate::Test(_) => {
                let mut visit = |values: &FieldValues| -> Result<bool, StoreError> {
                    let record = codec::decode::<R>(values)?;
                    Ok(predicate.accepts(&record))
                };
                self.backend
                    .find_first(&schema, RowQuery::Scan(&mut visit))?
            }
        };

        found.map(|values| codec::decode(&values)).transpose()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("kind", &self.backend.kind())
            .finish()
    }
}
