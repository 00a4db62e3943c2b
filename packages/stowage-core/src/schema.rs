//! Schema derivation from registered record fields.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use stowage_types::{DeclaredType, Record, StorageType, KEY_FIELD};
use tracing::warn;

use crate::error::StoreError;

/// Storage description of one field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Primitive type the field is stored as
    pub storage_type: StorageType,
    /// Field may hold null
    #[serde(default)]
    pub nullable: bool,
    /// Field is the primary key
    #[serde(default)]
    pub primary_key: bool,
    /// Field is assigned by the store on insert
    #[serde(default)]
    pub auto_increment: bool,
}

impl FieldDescriptor {
    /// Creates a plain, non-nullable field without key roles.
    pub fn new(name: impl Into<String>, storage_type: StorageType) -> Self {
        Self {
            name: name.into(),
            storage_type,
            nullable: false,
            primary_key: false,
            auto_increment: false,
        }
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({}", self.name, self.storage_type)?;
        if self.primary_key {
            write!(f, ", primary key")?;
        }
        if self.auto_increment {
            write!(f, ", auto-increment")?;
        }
        if self.nullable {
            write!(f, ", nullable")?;
        }
        write!(f, ")")
    }
}

/// Maps a declared field type onto its storage type.
///
/// Enumerations and small integers widen to `Int32`, booleans stay booleans,
/// UUIDs are stored as strings, and everything else must match a storage
/// type by name.
pub fn storage_type_for(declared: DeclaredType) -> Option<StorageType> {
    match declared {
        DeclaredType::Enum | DeclaredType::I8 | DeclaredType::I16 | DeclaredType::U16 => {
            Some(StorageType::Int32)
        }
        DeclaredType::Bool => Some(StorageType::Bool),
        DeclaredType::Uuid => Some(StorageType::String),
        other => other.type_name().parse().ok(),
    }
}

/// Ordered field layout of one record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Derives the schema of a record type from its field registrations.
    ///
    /// # Returns
    /// `Result<Schema, StoreError>`; `UnsupportedFieldType` if any field
    /// cannot be stored. No field is ever dropped.
    pub fn derive<R: Record>() -> Result<Self, StoreError> {
        let defs = R::fields();
        let mut fields = Vec::with_capacity(defs.len());

        for def in &defs {
            let storage_type = storage_type_for(def.declared()).ok_or_else(|| {
                StoreError::UnsupportedFieldType {
                    record: R::NAME.to_string(),
                    field: def.name().to_string(),
                    declared: def.declared().to_string(),
                }
            })?;

            let is_key = def.name() == KEY_FIELD;
            if !is_key && (def.is_primary_key() || def.is_auto_increment()) {
                warn!(
                    "Ignoring key role on field '{}' of '{}': only '{}' can be a key",
                    def.name(),
                    R::NAME,
                    KEY_FIELD
                );
            }

            let auto_increment = is_key && def.is_auto_increment();
            fields.push(FieldDescriptor {
                name: def.name().to_string(),
                storage_type,
                nullable: def.is_nullable(),
                primary_key: is_key && (def.is_primary_key() || auto_increment),
                auto_increment,
            });
        }

        Self::from_fields(R::NAME, fields)
    }

    /// Builds a schema from explicit field descriptors.
    ///
    /// # Arguments
    /// * `name` - Table or collection name
    /// * `fields` - Field descriptors in storage order
    ///
    /// # Returns
    /// `Result<Schema, StoreError>`; `InvalidSchema` if the layout breaks a
    /// key or naming rule.
    pub fn from_fields(
        name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self, StoreError> {
        let name = name.into();
        let invalid = |reason: String| StoreError::InvalidSchema {
            record: name.clone(),
            reason,
        };

        if fields.is_empty() {
            return Err(invalid("no fields registered".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &fields {
            if field.name.is_empty() {
                return Err(invalid("empty field name".to_string()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(invalid(format!("duplicate field '{}'", field.name)));
            }
            if (field.primary_key || field.auto_increment) && field.name != KEY_FIELD {
                return Err(invalid(format!(
                    "field '{}' cannot carry a key role",
                    field.name
                )));
            }
            if field.auto_increment && !field.primary_key {
                return Err(invalid(format!(
                    "auto-increment field '{}' must be the primary key",
                    field.name
                )));
            }
            if field.auto_increment && !field.storage_type.is_integer() {
                return Err(invalid(format!(
                    "auto-increment field '{}' must be an integer, not {}",
                    field.name, field.storage_type
                )));
            }
            if field.primary_key && field.nullable {
                return Err(invalid(format!(
                    "primary key '{}' cannot be nullable",
                    field.name
                )));
            }
        }

        Ok(Self { name, fields })
    }

    /// Returns the table or collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field descriptors in storage order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Returns the descriptor of a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns the primary-key field, if any.
    pub fn primary_key(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.primary_key)
    }

    /// Returns the auto-increment field, if any.
    pub fn auto_increment_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.auto_increment)
    }

    /// Returns the conventional `Id` field whether or not it is a key.
    pub fn key_field(&self) -> Option<&FieldDescriptor> {
        self.field(KEY_FIELD)
    }

    /// Describes the first difference between this schema and a stored
    /// field layout, or `None` if they agree.
    pub fn diff(&self, stored: &[FieldDescriptor]) -> Option<String> {
        if stored.len() != self.fields.len() {
            return Some(format!(
                "stored layout has {} fields, record type has {}",
                stored.len(),
                self.fields.len()
            ));
        }
        self.fields
            .iter()
            .zip(stored)
            .find(|(expected, actual)| expected != actual)
            .map(|(expected, actual)| format!("field {} is stored as {}", expected, actual))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_types::{enum_field, CodecError, FieldDef, FieldValue, Uuid, Value};

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    enum Class {
        #[default]
        Warrior,
        Mage,
    }

    enum_field!(Class { Warrior = 0, Mage = 1 });

    #[derive(Debug, Default)]
    struct Hero {
        id: i32,
        name: String,
        level: i16,
        rank: u16,
        class: Class,
        guild: Uuid,
        health: f32,
        gold: u64,
        tag: Option<String>,
        flags: u8,
    }

    impl Record for Hero {
        const NAME: &'static str = "Hero";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::new("Id", |h: &Hero| &h.id, |h| &mut h.id)
                    .primary_key()
                    .auto_increment(),
                FieldDef::new("Name", |h: &Hero| &h.name, |h| &mut h.name).primary_key(),
                FieldDef::new("Level", |h: &Hero| &h.level, |h| &mut h.level),
                FieldDef::new("Rank", |h: &Hero| &h.rank, |h| &mut h.rank),
                FieldDef::new("Class", |h: &Hero| &h.class, |h| &mut h.class),
                FieldDef::new("Guild", |h: &Hero| &h.guild, |h| &mut h.guild),
                FieldDef::new("Health", |h: &Hero| &h.health, |h| &mut h.health),
                FieldDef::new("Gold", |h: &Hero| &h.gold, |h| &mut h.gold),
                FieldDef::new("Tag", |h: &Hero| &h.tag, |h| &mut h.tag),
                FieldDef::new("Flags", |h: &Hero| &h.flags, |h| &mut h.flags),
            ]
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Blob(Vec<u8>);

    impl FieldValue for Blob {
        const DECLARED: DeclaredType = DeclaredType::Named("Blob");

        fn to_value(&self) -> Value {
            Value::Null
        }

        fn from_value(_value: Value) -> Result<Self, CodecError> {
            Ok(Blob::default())
        }
    }

    #[derive(Debug, Default)]
    struct Attachment {
        id: i64,
        data: Blob,
    }

    impl Record for Attachment {
        const NAME: &'static str = "Attachment";

        fn fields() -> Vec<FieldDef<Self>> {
            vec![
                FieldDef::new("Id", |a: &Attachment| &a.id, |a| &mut a.id).primary_key(),
                FieldDef::new("Data", |a: &Attachment| &a.data, |a| &mut a.data),
            ]
        }
    }

    #[test]
    fn test_derive_storage_types() {
        let schema = Schema::derive::<Hero>().unwrap();
        assert_eq!(schema.name(), "Hero");

        let types: Vec<(&str, StorageType)> = schema
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.storage_type))
            .collect();
        assert_eq!(
            types,
            vec![
                ("Id", StorageType::Int32),
                ("Name", StorageType::String),
                ("Level", StorageType::Int32),
                ("Rank", StorageType::Int32),
                ("Class", StorageType::Int32),
                ("Guild", StorageType::String),
                ("Health", StorageType::Float),
                ("Gold", StorageType::UInt64),
                ("Tag", StorageType::String),
                ("Flags", StorageType::Byte),
            ]
        );
        assert!(schema.field("Tag").unwrap().nullable);
        assert!(!schema.field("Name").unwrap().nullable);
    }

    #[test]
    fn test_key_roles_only_on_id() {
        let schema = Schema::derive::<Hero>().unwrap();
        let id = schema.primary_key().unwrap();
        assert_eq!(id.name, "Id");
        assert!(id.auto_increment);
        assert_eq!(schema.auto_increment_field().unwrap().name, "Id");

        let name = schema.field("Name").unwrap();
        assert!(!name.primary_key);
        assert!(!name.auto_increment);
    }

    #[test]
    fn test_unsupported_field_type() {
        let err = Schema::derive::<Attachment>().unwrap_err();
        match err {
            StoreError::UnsupportedFieldType {
                record,
                field,
                declared,
            } => {
                assert_eq!(record, "Attachment");
                assert_eq!(field, "Data");
                assert_eq!(declared, "Blob");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_storage_type_name_match() {
        assert_eq!(
            storage_type_for(DeclaredType::Named("Double")),
            Some(StorageType::Double)
        );
        assert_eq!(storage_type_for(DeclaredType::I8), Some(StorageType::Int32));
        assert_eq!(storage_type_for(DeclaredType::U32), Some(StorageType::UInt32));
        assert_eq!(storage_type_for(DeclaredType::Named("Decimal")), None);
    }

    #[test]
    fn test_from_fields_rejects_bad_layouts() {
        let duplicate = vec![
            FieldDescriptor::new("Id", StorageType::Int32),
            FieldDescriptor::new("Id", StorageType::Int64),
        ];
        assert!(matches!(
            Schema::from_fields("T", duplicate),
            Err(StoreError::InvalidSchema { .. })
        ));

        let mut text_key = FieldDescriptor::new("Id", StorageType::String);
        text_key.primary_key = true;
        text_key.auto_increment = true;
        assert!(matches!(
            Schema::from_fields("T", vec![text_key]),
            Err(StoreError::InvalidSchema { .. })
        ));

        let mut other_key = FieldDescriptor::new("Code", StorageType::Int32);
        other_key.primary_key = true;
        assert!(matches!(
            Schema::from_fields("T", vec![other_key]),
            Err(StoreError::InvalidSchema { .. })
        ));

        assert!(matches!(
            Schema::from_fields("T", Vec::new()),
            Err(StoreError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn test_diff() {
        let schema = Schema::derive::<Hero>().unwrap();
        assert_eq!(schema.diff(schema.fields()), None);

        let mut changed = schema.fields().to_vec();
        changed[2].storage_type = StorageType::Int64;
        assert!(schema.diff(&changed).unwrap().contains("Level"));
        assert!(schema.diff(&changed[..3]).is_some());
    }

    #[test]
    fn test_diff_reports_key_and_null_flags() {
        let schema = Schema::derive::<Hero>().unwrap();

        let mut changed = schema.fields().to_vec();
        changed[0].auto_increment = false;
        assert_eq!(
            schema.diff(&changed).unwrap(),
            "field 'Id' (Int32, primary key, auto-increment) is stored as 'Id' (Int32, primary key)"
        );

        let mut changed = schema.fields().to_vec();
        changed[8].nullable = false;
        assert_eq!(
            schema.diff(&changed).unwrap(),
            "field 'Tag' (String, nullable) is stored as 'Tag' (String)"
        );
    }
}
