//! Flat record file engine.
//!
//! A collection file starts with a one-line JSON header describing the
//! layout, followed by one JSON array per record in field order. The header
//! carries a CRC-32 of the record lines and the record count, both verified
//! on open.

use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use stowage_types::{FieldValues, StorageType, Value, KEY_FIELD};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::io_utils::{classify_io_error, write_atomic};
use crate::schema::{FieldDescriptor, Schema};

/// Format tag written in every header.
pub const FORMAT_NAME: &str = "stowage-flatfile";
/// Current file format version.
pub const FORMAT_VERSION: u32 = 1;

/// Header line of a collection file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileHeader {
    format: String,
    version: u32,
    collection: String,
    fields: Vec<FieldDescriptor>,
    next_auto_increment: i64,
    record_count: usize,
    checksum: u32,
}

impl FileHeader {
    fn new(schema: &Schema) -> Self {
        Self {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION,
            collection: schema.name().to_string(),
            fields: schema.fields().to_vec(),
            next_auto_increment: 1,
            record_count: 0,
            checksum: checksum(b""),
        }
    }
}

/// Access requested when opening a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Creates and opens collection files.
#[derive(Debug, Clone)]
pub struct FlatFileEngine {
    sync: bool,
}

impl FlatFileEngine {
    /// Creates an engine.
    ///
    /// # Arguments
    /// * `sync` - fsync files on every commit
    pub fn new(sync: bool) -> Self {
        Self { sync }
    }

    /// Creates an empty collection file for `schema`.
    ///
    /// An existing file with the same layout is left intact.
    ///
    /// # Returns
    /// `Result<(), StoreError>`; `SchemaMismatch` if an existing file has a
    /// different layout.
    pub fn create_collection(&self, path: &Path, schema: &Schema) -> Result<(), StoreError> {
        if path.exists() {
            let session = self.open(path, schema, OpenMode::ReadOnly)?;
            session.close()?;
            debug!("Collection '{}' already exists at {:?}", schema.name(), path);
            return Ok(());
        }

        let header = FileHeader::new(schema);
        let contents = render(&header, schema.fields(), &[])?;
        write_atomic(path, &contents, self.sync)
            .map_err(|e| classify_io_error(e, "Failed to create collection file"))?;

        debug!("Created collection '{}' at {:?}", schema.name(), path);
        Ok(())
    }

    /// Opens a collection file and loads its records.
    ///
    /// # Returns
    /// `Result<FlatFileSession, StoreError>`; `TableNotFound` if the file
    /// does not exist, `DataCorruption` if it fails verification.
    pub fn open(
        &self,
        path: &Path,
        schema: &Schema,
        mode: OpenMode,
    ) -> Result<FlatFileSession, StoreError> {
        if !path.exists() {
            return Err(StoreError::TableNotFound {
                table: schema.name().to_string(),
            });
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(mode == OpenMode::ReadWrite)
            .open(path)
            .map_err(|e| classify_io_error(e, "Failed to open collection file"))?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| classify_io_error(e, "Failed to read collection file"))?;

        let (header_line, body) = contents.split_once('\n').ok_or_else(|| {
            StoreError::DataCorruption(format!("Missing header in {}", path.display()))
        })?;
        let header: FileHeader = serde_json::from_str(header_line).map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse header: {}", e))
        })?;

        if header.format != FORMAT_NAME || header.version != FORMAT_VERSION {
            return Err(StoreError::DataCorruption(format!(
                "Unsupported format '{}' version {} in {}",
                header.format,
                header.version,
                path.display()
            )));
        }
        if header.collection != schema.name() {
            return Err(StoreError::SchemaMismatch {
                table: schema.name().to_string(),
                reason: format!("file holds collection '{}'", header.collection),
            });
        }
        if let Some(reason) = schema.diff(&header.fields) {
            return Err(StoreError::SchemaMismatch {
                table: schema.name().to_string(),
                reason,
            });
        }

        let actual = checksum(body.as_bytes());
        if actual != header.checksum {
            return Err(StoreError::DataCorruption(format!(
                "Checksum mismatch for collection '{}': expected {:08x}, got {:08x}",
                schema.name(),
                header.checksum,
                actual
            )));
        }

        let records = body
            .lines()
            .map(|line| parse_record(schema.fields(), line))
            .collect::<Result<Vec<_>, _>>()?;
        if records.len() != header.record_count {
            return Err(StoreError::DataCorruption(format!(
                "Collection '{}' holds {} records, header says {}",
                schema.name(),
                records.len(),
                header.record_count
            )));
        }

        Ok(FlatFileSession {
            file: Some(file),
            path: path.to_path_buf(),
            header,
            records,
            mode,
            sync: self.sync,
            dirty: false,
        })
    }
}

/// An open collection.
///
/// Holds the file handle and the loaded records. Changes are written back
/// by [`FlatFileSession::close`]; a session dropped without closing
/// discards them.
#[derive(Debug)]
pub struct FlatFileSession {
    file: Option<File>,
    path: PathBuf,
    header: FileHeader,
    records: Vec<FieldValues>,
    mode: OpenMode,
    sync: bool,
    dirty: bool,
}

impl FlatFileSession {
    /// Returns the stored field layout.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.header.fields
    }

    /// Returns the number of records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Returns every record in insertion order.
    pub fn select_all_records(&self) -> &[FieldValues] {
        &self.records
    }

    fn collection(&self) -> &str {
        &self.header.collection
    }

    fn write_error(&self, reason: impl Into<String>) -> StoreError {
        StoreError::StorageWrite {
            table: self.collection().to_string(),
            reason: reason.into(),
        }
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        match self.mode {
            OpenMode::ReadWrite => Ok(()),
            OpenMode::ReadOnly => Err(self.write_error("collection opened read-only")),
        }
    }

    /// Appends a record.
    ///
    /// The auto-increment field, if any, is assigned from the collection's
    /// sequence and any supplied value for it is ignored.
    ///
    /// # Returns
    /// The assigned id if the layout has an auto-increment field.
    pub fn add_record(&mut self, values: &FieldValues) -> Result<Option<i64>, StoreError> {
        self.ensure_writable()?;

        let mut assigned = None;
        let mut record = FieldValues::with_capacity(self.header.fields.len());
        for field in &self.header.fields {
            let value = if field.auto_increment {
                let id = self.header.next_auto_increment;
                let value = Value::from_integer(field.storage_type, i128::from(id))
                    .ok_or_else(|| self.write_error(format!("sequence exhausted at {}", id)))?;
                assigned = Some(id);
                value
            } else {
                self.normalize(field, values.get(&field.name))?
            };
            record.insert(field.name.as_str(), value);
        }

        if let Some(key) = self.header.fields.iter().find(|f| f.primary_key && !f.auto_increment) {
            let candidate = record.get(&key.name);
            let duplicate = self
                .records
                .iter()
                .any(|existing| same_value(existing.get(&key.name), candidate));
            if duplicate {
                return Err(self.write_error(format!(
                    "duplicate primary key {}",
                    candidate.unwrap_or(&Value::Null)
                )));
            }
        }

        if let Some(id) = assigned {
            self.header.next_auto_increment = id + 1;
        }
        self.records.push(record);
        self.dirty = true;
        Ok(assigned)
    }

    /// Overwrites every record whose `Id` equals the `Id` in `values`.
    ///
    /// # Returns
    /// Number of records updated; `0` if the layout has no `Id` field or no
    /// record matches.
    pub fn update_records(&mut self, values: &FieldValues) -> Result<usize, StoreError> {
        self.ensure_writable()?;

        if !self.header.fields.iter().any(|f| f.name == KEY_FIELD) {
            return Ok(0);
        }
        let key = values.get(KEY_FIELD);

        let mut replacement = FieldValues::with_capacity(self.header.fields.len());
        for field in &self.header.fields {
            if field.name != KEY_FIELD {
                replacement.insert(field.name.as_str(), self.normalize(field, values.get(&field.name))?);
            }
        }

        let mut updated = 0;
        for record in self
            .records
            .iter_mut()
            .filter(|record| same_value(record.get(KEY_FIELD), key))
        {
            for (name, value) in replacement.iter() {
                record.insert(name, value.clone());
            }
            updated += 1;
        }

        if updated > 0 {
            self.dirty = true;
        }
        Ok(updated)
    }

    /// Checks a value against a field and brings integers to the field's
    /// width.
    fn normalize(&self, field: &FieldDescriptor, value: Option<&Value>) -> Result<Value, StoreError> {
        let value = value.cloned().unwrap_or(Value::Null);
        match value.storage_type() {
            None if field.nullable => Ok(Value::Null),
            None => Err(self.write_error(format!("field '{}' cannot be null", field.name))),
            Some(ty) if ty == field.storage_type => Ok(value),
            Some(ty) if ty.is_integer() && field.storage_type.is_integer() => value
                .as_i128()
                .and_then(|raw| Value::from_integer(field.storage_type, raw))
                .ok_or_else(|| {
                    self.write_error(format!("{} out of range for field '{}'", value, field.name))
                }),
            Some(ty) => Err(self.write_error(format!(
                "field '{}' expects {}, got {}",
                field.name, field.storage_type, ty
            ))),
        }
    }

    /// Writes pending changes and releases the file.
    pub fn close(mut self) -> Result<(), StoreError> {
        self.file.take();
        if self.dirty {
            let contents = render(&self.header, &self.header.fields, &self.records)?;
            write_atomic(&self.path, &contents, self.sync)
                .map_err(|e| classify_io_error(e, "Failed to write collection file"))?;
            debug!(
                "Committed {} records to {:?}",
                self.records.len(),
                self.path
            );
            self.dirty = false;
        }
        Ok(())
    }
}

impl Drop for FlatFileSession {
    fn drop(&mut self) {
        if self.dirty {
            warn!(
                "Discarding uncommitted changes to collection '{}' at {:?}",
                self.header.collection, self.path
            );
        }
    }
}

fn checksum(body: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(body);
    hasher.finalize()
}

/// Key comparison; null never equals anything.
fn same_value(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.compare(b) == Some(std::cmp::Ordering::Equal),
        _ => false,
    }
}

/// Serializes a header and records into file contents.
fn render(
    header: &FileHeader,
    fields: &[FieldDescriptor],
    records: &[FieldValues],
) -> Result<Vec<u8>, StoreError> {
    let mut body = String::new();
    for record in records {
        let row: Vec<serde_json::Value> = fields
            .iter()
            .map(|field| to_json(record.get(&field.name).unwrap_or(&Value::Null)))
            .collect();
        let line = serde_json::to_string(&row)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?;
        body.push_str(&line);
        body.push('\n');
    }

    let header = FileHeader {
        record_count: records.len(),
        checksum: checksum(body.as_bytes()),
        ..header.clone()
    };
    let mut contents = serde_json::to_string(&header)
        .map_err(|e| StoreError::SerializationError(e.to_string()))?;
    contents.push('\n');
    contents.push_str(&body);
    Ok(contents.into_bytes())
}

fn float_to_json(v: f64) -> serde_json::Value {
    match serde_json::Number::from_f64(v) {
        Some(number) => serde_json::Value::Number(number),
        None if v.is_nan() => serde_json::Value::String("NaN".to_string()),
        None if v > 0.0 => serde_json::Value::String("inf".to_string()),
        None => serde_json::Value::String("-inf".to_string()),
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Null => Json::Null,
        Value::Byte(v) => Json::from(*v),
        Value::Int32(v) => Json::from(*v),
        Value::UInt32(v) => Json::from(*v),
        Value::Int64(v) => Json::from(*v),
        Value::UInt64(v) => Json::from(*v),
        Value::Float(v) => float_to_json(f64::from(*v)),
        Value::Double(v) => float_to_json(*v),
        Value::Bool(v) => Json::Bool(*v),
        Value::String(v) => Json::String(v.clone()),
    }
}

fn parse_record(fields: &[FieldDescriptor], line: &str) -> Result<FieldValues, StoreError> {
    let row: Vec<serde_json::Value> = serde_json::from_str(line)
        .map_err(|e| StoreError::DataCorruption(format!("Malformed record line: {}", e)))?;
    if row.len() != fields.len() {
        return Err(StoreError::DataCorruption(format!(
            "Record has {} values, layout has {} fields",
            row.len(),
            fields.len()
        )));
    }

    let mut record = FieldValues::with_capacity(fields.len());
    for (field, json) in fields.iter().zip(row) {
        record.insert(field.name.as_str(), from_json(field, json)?);
    }
    Ok(record)
}

fn from_json(field: &FieldDescriptor, json: serde_json::Value) -> Result<Value, StoreError> {
    use serde_json::Value as Json;

    let corrupt = |json: &Json| {
        StoreError::DataCorruption(format!(
            "Value {} is not a valid {} for field '{}'",
            json, field.storage_type, field.name
        ))
    };

    let value = match (&json, field.storage_type) {
        (Json::Null, _) => Some(Value::Null),
        (Json::Number(n), ty) if ty.is_integer() => {
            let raw = n
                .as_i64()
                .map(i128::from)
                .or_else(|| n.as_u64().map(i128::from));
            raw.and_then(|raw| Value::from_integer(ty, raw))
        }
        (Json::Number(n), StorageType::Float) => n.as_f64().map(|v| Value::Float(v as f32)),
        (Json::Number(n), StorageType::Double) => n.as_f64().map(Value::Double),
        (Json::String(s), StorageType::Float) => parse_special_float(s).map(|v| Value::Float(v as f32)),
        (Json::String(s), StorageType::Double) => parse_special_float(s).map(Value::Double),
        (Json::Bool(b), StorageType::Bool) => Some(Value::Bool(*b)),
        (Json::String(s), StorageType::String) => Some(Value::String(s.clone())),
        _ => None,
    };
    value.ok_or_else(|| corrupt(&json))
}

fn parse_special_float(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}
