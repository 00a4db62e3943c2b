//! Flat-file backend: one record file per collection.

mod engine;

pub use engine::{FlatFileEngine, FlatFileSession, OpenMode, FORMAT_NAME, FORMAT_VERSION};

use std::path::PathBuf;

use stowage_types::FieldValues;
use tracing::{debug, info};

use crate::backend::{Backend, BackendKind, RowQuery};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::predicate::first_match;
use crate::schema::Schema;

/// Backend storing each record type in `<data_dir>/<TypeName>.fdb`.
///
/// Every operation opens the collection, works on it and closes it again;
/// no file handle outlives a call.
#[derive(Debug)]
pub struct FlatFileBackend {
    name: String,
    config: StoreConfig,
    engine: FlatFileEngine,
}

impl FlatFileBackend {
    /// Creates the backend handle. No file is touched.
    pub fn create(name: &str, config: &StoreConfig) -> Result<Self, StoreError> {
        // names the database; collections are named after their record type
        config.file_path(name, BackendKind::FlatFile.file_extension())?;

        info!(
            "Opened flat-file database '{}' in {:?}",
            name, config.data_dir
        );
        Ok(Self {
            name: name.to_string(),
            config: config.clone(),
            engine: FlatFileEngine::new(config.flat_file_sync),
        })
    }

    /// Returns the database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the collection file path for a schema.
    pub fn collection_path(&self, schema: &Schema) -> Result<PathBuf, StoreError> {
        self.config
            .file_path(schema.name(), BackendKind::FlatFile.file_extension())
    }
}

impl Backend for FlatFileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::FlatFile
    }

    fn create_table(&self, schema: &Schema) -> Result<(), StoreError> {
        let path = self.collection_path(schema)?;
        self.engine.create_collection(&path, schema)
    }

    fn insert(&self, schema: &Schema, values: &FieldValues) -> Result<Option<i64>, StoreError> {
        let path = self.collection_path(schema)?;
        let mut session = self.engine.open(&path, schema, OpenMode::ReadWrite)?;
        let assigned = session.add_record(values)?;
        session.close()?;

        debug!("Inserted into '{}' (id {:?})", schema.name(), assigned);
        Ok(assigned)
    }

    fn update(&self, schema: &Schema, values: &FieldValues) -> Result<usize, StoreError> {
        let path = self.collection_path(schema)?;
        let mut session = self.engine.open(&path, schema, OpenMode::ReadWrite)?;
        let updated = session.update_records(values)?;
        session.close()?;

        debug!("Updated {} record(s) in '{}'", updated, schema.name());
        Ok(updated)
    }

    fn find_first(
        &self,
        schema: &Schema,
        query: RowQuery<'_>,
    ) -> Result<Option<FieldValues>, StoreError> {
        let path = self.collection_path(schema)?;
        let session = self.engine.open(&path, schema, OpenMode::ReadOnly)?;
        if session.record_count() == 0 {
            session.close()?;
            return Ok(None);
        }

        let records = session.select_all_records();
        let found = match query {
            RowQuery::Filter(filter) => first_match(records, |record| filter.matches(*record)),
            RowQuery::Scan(visit) => {
                let mut failure = None;
                let found = first_match(records, |record| match visit(*record) {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        failure = Some(e);
                        true
                    }
                });
                if let Some(e) = failure {
                    return Err(e);
                }
                found
            }
        }
        .cloned();

        session.close()?;
        Ok(found)
    }
}
