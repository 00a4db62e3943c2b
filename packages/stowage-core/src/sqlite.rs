//! Relational backend on SQLite.
//!
//! One database file holds every table. The connection is opened when the
//! backend is created and kept until it is dropped. Declarative filters are
//! translated into a `WHERE` clause with bound parameters; closure
//! predicates scan rows in insertion order.

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row, ToSql};
use stowage_types::{CompareOp, FieldValues, Filter, StorageType, Value};
use tracing::{debug, info};

use crate::backend::{Backend, BackendKind, RowQuery};
use crate::error::StoreError;
use crate::schema::{FieldDescriptor, Schema};

/// SQLite-backed storage.
pub struct SqliteBackend {
    conn: Connection,
    path: PathBuf,
}

impl SqliteBackend {
    /// Opens or creates the database file at `path`.
    ///
    /// # Arguments
    /// * `path` - Database file
    /// * `journal_mode` - Journal mode to apply, if any (e.g. `WAL`)
    pub fn open(path: &Path, journal_mode: Option<&str>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Sqlite(format!("Failed to open '{}': {}", path.display(), e))
        })?;

        if let Some(mode) = journal_mode {
            let applied: String = conn
                .pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))
                .map_err(|e| StoreError::Sqlite(format!("Failed to set journal mode: {}", e)))?;
            debug!("SQLite journal mode for {:?}: {}", path, applied);
        }

        info!("Opened SQLite database at {:?}", path);
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the column layout of a stored table.
    fn stored_columns(&self, table: &str) -> Result<Vec<StoredColumn>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;
        let rows = stmt
            .query_map([table], |row| {
                Ok(StoredColumn {
                    name: row.get(0)?,
                    declared: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    primary_key: row.get::<_, i64>(3)? != 0,
                    auto_increment: false,
                })
            })
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;
        let mut columns = rows
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;

        // AUTOINCREMENT only shows up in the stored table definition
        let definition: Option<String> = self
            .conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;
        if definition.is_some_and(|sql| sql.to_ascii_uppercase().contains("AUTOINCREMENT")) {
            for column in columns.iter_mut().filter(|c| c.primary_key) {
                column.auto_increment = true;
            }
        }
        Ok(columns)
    }

    fn check_columns(&self, schema: &Schema) -> Result<(), StoreError> {
        let stored = self.stored_columns(schema.name())?;
        let mismatch = |reason: String| StoreError::SchemaMismatch {
            table: schema.name().to_string(),
            reason,
        };

        if stored.len() != schema.fields().len() {
            return Err(mismatch(format!(
                "table has {} columns, record type has {} fields",
                stored.len(),
                schema.fields().len()
            )));
        }
        for (field, column) in schema.fields().iter().zip(&stored) {
            let expected = StoredColumn::expected(field);
            if !expected.same_layout(column) {
                return Err(mismatch(format!(
                    "expected column {}, found {}",
                    expected, column
                )));
            }
        }
        Ok(())
    }

    fn select_sql(schema: &Schema, condition: &str) -> String {
        let columns: Vec<String> = schema.fields().iter().map(|f| quote_ident(&f.name)).collect();
        format!(
            "SELECT {} FROM {} WHERE {} ORDER BY rowid",
            columns.join(", "),
            quote_ident(schema.name()),
            condition
        )
    }
}

impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn create_table(&self, schema: &Schema) -> Result<(), StoreError> {
        let columns: Vec<String> = schema.fields().iter().map(column_definition).collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(schema.name()),
            columns.join(", ")
        );
        self.conn
            .execute(&sql, [])
            .map_err(|e| StoreError::StorageWrite {
                table: schema.name().to_string(),
                reason: e.to_string(),
            })?;

        self.check_columns(schema)?;
        debug!("Created table '{}' in {:?}", schema.name(), self.path);
        Ok(())
    }

    fn insert(&self, schema: &Schema, values: &FieldValues) -> Result<Option<i64>, StoreError> {
        let columns: Vec<&FieldDescriptor> =
            schema.fields().iter().filter(|f| !f.auto_increment).collect();
        let table = quote_ident(schema.name());

        let sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let names: Vec<String> = columns.iter().map(|f| quote_ident(&f.name)).collect();
            let placeholders: Vec<String> =
                (1..=columns.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                names.join(", "),
                placeholders.join(", ")
            )
        };

        let params: Vec<SqlValue<'_>> = columns
            .iter()
            .map(|f| SqlValue(values.get(&f.name).unwrap_or(&Value::Null)))
            .collect();

        self.conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(|e| write_error(schema.name(), e))?;

        let assigned = schema
            .auto_increment_field()
            .map(|_| self.conn.last_insert_rowid());
        debug!("Inserted into '{}' (id {:?})", schema.name(), assigned);
        Ok(assigned)
    }

    fn update(&self, schema: &Schema, values: &FieldValues) -> Result<usize, StoreError> {
        let key = schema
            .primary_key()
            .ok_or_else(|| StoreError::MissingPrimaryKey {
                table: schema.name().to_string(),
            })?;
        let key_value = values.get(&key.name).unwrap_or(&Value::Null);

        let mut assigned: Vec<&FieldDescriptor> =
            schema.fields().iter().filter(|f| !f.primary_key).collect();
        if assigned.is_empty() {
            assigned.push(key);
        }

        let set_list: Vec<String> = assigned
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{} = ?{}", quote_ident(&f.name), i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            quote_ident(schema.name()),
            set_list.join(", "),
            quote_ident(&key.name),
            assigned.len() + 1
        );

        let mut params: Vec<SqlValue<'_>> = assigned
            .iter()
            .map(|f| SqlValue(values.get(&f.name).unwrap_or(&Value::Null)))
            .collect();
        params.push(SqlValue(key_value));

        let changed = self
            .conn
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(|e| write_error(schema.name(), e))?;

        if changed == 0 {
            return Err(StoreError::RecordNotFound {
                table: schema.name().to_string(),
                key: key_value.to_string(),
            });
        }
        debug!("Updated {} row(s) in '{}'", changed, schema.name());
        Ok(changed)
    }

    fn find_first(
        &self,
        schema: &Schema,
        query: RowQuery<'_>,
    ) -> Result<Option<FieldValues>, StoreError> {
        match query {
            RowQuery::Filter(filter) => {
                let mut params = Vec::new();
                let condition = filter_sql(filter, &mut params);
                let sql = format!("{} LIMIT 1", Self::select_sql(schema, &condition));

                let mut stmt = self
                    .conn
                    .prepare(&sql)
                    .map_err(|e| query_error(schema.name(), e))?;
                let params: Vec<SqlValue<'_>> = params.into_iter().map(SqlValue).collect();
                let mut rows = stmt
                    .query(params_from_iter(params.iter()))
                    .map_err(|e| query_error(schema.name(), e))?;

                match rows.next().map_err(|e| query_error(schema.name(), e))? {
                    Some(row) => Ok(Some(read_row(schema, row)?)),
                    None => Ok(None),
                }
            }
            RowQuery::Scan(visit) => {
                let sql = Self::select_sql(schema, "1");
                let mut stmt = self
                    .conn
                    .prepare(&sql)
                    .map_err(|e| query_error(schema.name(), e))?;
                let mut rows = stmt.query([]).map_err(|e| query_error(schema.name(), e))?;

                while let Some(row) = rows.next().map_err(|e| query_error(schema.name(), e))? {
                    let values = read_row(schema, row)?;
                    if visit(&values)? {
                        return Ok(Some(values));
                    }
                }
                Ok(None)
            }
        }
    }
}

/// Column layout as reported by SQLite.
#[derive(Debug, Clone, PartialEq)]
struct StoredColumn {
    name: String,
    declared: String,
    not_null: bool,
    primary_key: bool,
    auto_increment: bool,
}

impl StoredColumn {
    /// Layout `column_definition` produces for a field.
    fn expected(field: &FieldDescriptor) -> Self {
        Self {
            name: field.name.clone(),
            declared: column_type(field.storage_type).to_string(),
            not_null: !field.nullable && !field.auto_increment,
            primary_key: field.primary_key,
            auto_increment: field.auto_increment,
        }
    }

    fn same_layout(&self, other: &StoredColumn) -> bool {
        self.name == other.name
            && self.declared.eq_ignore_ascii_case(&other.declared)
            && self.not_null == other.not_null
            && self.primary_key == other.primary_key
            && self.auto_increment == other.auto_increment
    }
}

impl fmt::Display for StoredColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {}", self.name, self.declared)?;
        if self.primary_key {
            write!(f, " PRIMARY KEY")?;
        }
        if self.auto_increment {
            write!(f, " AUTOINCREMENT")?;
        }
        if self.not_null {
            write!(f, " NOT NULL")?;
        }
        Ok(())
    }
}

/// Binds a primitive value as a statement parameter.
struct SqlValue<'a>(&'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Sql;

        let output = match self.0 {
            Value::Null => ToSqlOutput::Owned(Sql::Null),
            Value::Byte(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Int32(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::UInt32(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::Int64(v) => ToSqlOutput::Owned(Sql::Integer(*v)),
            Value::UInt64(v) => {
                let v = i64::try_from(*v)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                ToSqlOutput::Owned(Sql::Integer(v))
            }
            Value::Float(v) => ToSqlOutput::Owned(Sql::Real(f64::from(*v))),
            Value::Double(v) => ToSqlOutput::Owned(Sql::Real(*v)),
            Value::Bool(v) => ToSqlOutput::Owned(Sql::Integer(i64::from(*v))),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        };
        Ok(output)
    }
}

/// Quotes an identifier for use in SQL text.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Column type for a storage type.
fn column_type(storage_type: StorageType) -> &'static str {
    match storage_type {
        StorageType::Byte
        | StorageType::Int32
        | StorageType::UInt32
        | StorageType::Int64
        | StorageType::UInt64
        | StorageType::Bool => "INTEGER",
        StorageType::Float | StorageType::Double => "REAL",
        StorageType::String => "TEXT",
    }
}

fn column_definition(field: &FieldDescriptor) -> String {
    let mut column = format!(
        "{} {}",
        quote_ident(&field.name),
        column_type(field.storage_type)
    );
    if field.auto_increment {
        column.push_str(" PRIMARY KEY AUTOINCREMENT");
    } else if field.primary_key {
        column.push_str(" PRIMARY KEY NOT NULL");
    } else if !field.nullable {
        column.push_str(" NOT NULL");
    }
    column
}

/// Translates a filter into a SQL condition, collecting bound values.
fn filter_sql<'f>(filter: &'f Filter, params: &mut Vec<&'f Value>) -> String {
    match filter {
        Filter::All => "1".to_string(),
        Filter::Compare { field, op, value } => match value {
            Value::Null => match op {
                CompareOp::Eq => format!("{} IS NULL", quote_ident(field)),
                CompareOp::Ne => format!("{} IS NOT NULL", quote_ident(field)),
                _ => "NULL".to_string(),
            },
            _ => {
                params.push(value);
                format!("{} {} ?{}", quote_ident(field), op.as_sql(), params.len())
            }
        },
        Filter::And(parts) if parts.is_empty() => "1".to_string(),
        Filter::Or(parts) if parts.is_empty() => "0".to_string(),
        Filter::And(parts) => join_filters(parts, " AND ", params),
        Filter::Or(parts) => join_filters(parts, " OR ", params),
        Filter::Not(inner) => format!("NOT ({})", filter_sql(inner, params)),
    }
}

fn join_filters<'f>(parts: &'f [Filter], separator: &str, params: &mut Vec<&'f Value>) -> String {
    let clauses: Vec<String> = parts.iter().map(|part| filter_sql(part, params)).collect();
    format!("({})", clauses.join(separator))
}

fn read_row(schema: &Schema, row: &Row<'_>) -> Result<FieldValues, StoreError> {
    let mut values = FieldValues::with_capacity(schema.fields().len());
    for (index, field) in schema.fields().iter().enumerate() {
        let raw = row
            .get_ref(index)
            .map_err(|e| StoreError::Sqlite(e.to_string()))?;
        values.insert(field.name.as_str(), read_value(schema.name(), field, raw)?);
    }
    Ok(values)
}

/// Converts a stored column value back into the field's storage type.
fn read_value(table: &str, field: &FieldDescriptor, raw: ValueRef<'_>) -> Result<Value, StoreError> {
    let corrupt = |what: String| {
        StoreError::DataCorruption(format!("{}.{}: {}", table, field.name, what))
    };

    match raw {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => match field.storage_type {
            StorageType::Bool => Ok(Value::Bool(i != 0)),
            StorageType::Float => Ok(Value::Float(i as f32)),
            StorageType::Double => Ok(Value::Double(i as f64)),
            StorageType::String => Ok(Value::String(i.to_string())),
            ty => Value::from_integer(ty, i128::from(i))
                .ok_or_else(|| corrupt(format!("{} does not fit {}", i, ty))),
        },
        ValueRef::Real(f) => match field.storage_type {
            StorageType::Float => Ok(Value::Float(f as f32)),
            _ => Ok(Value::Double(f)),
        },
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::String(s.to_string()))
            .map_err(|e| corrupt(e.to_string())),
        ValueRef::Blob(_) => Err(corrupt("unexpected blob".to_string())),
    }
}

fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table"))
}

fn write_error(table: &str, err: rusqlite::Error) -> StoreError {
    if is_missing_table(&err) {
        StoreError::TableNotFound {
            table: table.to_string(),
        }
    } else {
        StoreError::StorageWrite {
            table: table.to_string(),
            reason: err.to_string(),
        }
    }
}

fn query_error(table: &str, err: rusqlite::Error) -> StoreError {
    if is_missing_table(&err) {
        StoreError::TableNotFound {
            table: table.to_string(),
        }
    } else {
        StoreError::Sqlite(err.to_string())
    }
}
