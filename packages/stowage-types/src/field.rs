//! Field registration: value conversion and accessor pairs.

use std::fmt;

use uuid::Uuid;

use crate::error::CodecError;
use crate::types::{DeclaredType, Value};

/// A Rust type that can be stored in a record field.
///
/// `to_value` must produce the variant matching the storage type the schema
/// deriver assigns to `DECLARED`. `from_value` accepts any value that converts
/// losslessly, since relational engines widen integers on the way back.
pub trait FieldValue: Sized {
    /// Declared type inspected by the schema deriver.
    const DECLARED: DeclaredType;
    /// Whether the field may hold `Value::Null`.
    const NULLABLE: bool = false;

    /// Reads the current value.
    fn to_value(&self) -> Value;

    /// Builds a field value from a primitive value.
    fn from_value(value: Value) -> Result<Self, CodecError>;
}

fn describe(value: &Value) -> String {
    match value.storage_type() {
        Some(ty) => ty.to_string(),
        None => "Null".to_string(),
    }
}

fn integer_of(value: &Value, expected: &'static str) -> Result<i128, CodecError> {
    match value {
        Value::Null => Err(CodecError::UnexpectedNull { expected }),
        Value::Bool(b) => Ok(i128::from(*b)),
        other => other.as_i128().ok_or_else(|| CodecError::TypeMismatch {
            expected,
            got: describe(other),
        }),
    }
}

macro_rules! integer_field {
    ($ty:ty, $declared:ident, $variant:ident, $wide:ty) => {
        impl FieldValue for $ty {
            const DECLARED: DeclaredType = DeclaredType::$declared;

            fn to_value(&self) -> Value {
                Value::$variant(<$wide>::from(*self))
            }

            fn from_value(value: Value) -> Result<Self, CodecError> {
                let raw = integer_of(&value, stringify!($ty))?;
                <$ty>::try_from(raw).map_err(|_| CodecError::OutOfRange {
                    value: raw.to_string(),
                    target: stringify!($ty),
                })
            }
        }
    };
}

integer_field!(i8, I8, Int32, i32);
integer_field!(u8, U8, Byte, u8);
integer_field!(i16, I16, Int32, i32);
integer_field!(u16, U16, Int32, i32);
integer_field!(i32, I32, Int32, i32);
integer_field!(u32, U32, UInt32, u32);
integer_field!(i64, I64, Int64, i64);
integer_field!(u64, U64, UInt64, u64);

impl FieldValue for f32 {
    const DECLARED: DeclaredType = DeclaredType::F32;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Double(v) => Ok(v as f32),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "f32" }),
            other => other
                .as_i128()
                .map(|v| v as f32)
                .ok_or_else(|| CodecError::TypeMismatch {
                    expected: "f32",
                    got: describe(&other),
                }),
        }
    }
}

impl FieldValue for f64 {
    const DECLARED: DeclaredType = DeclaredType::F64;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Err(CodecError::UnexpectedNull { expected: "f64" }),
            other => other.as_f64().ok_or_else(|| CodecError::TypeMismatch {
                expected: "f64",
                got: describe(&other),
            }),
        }
    }
}

impl FieldValue for bool {
    const DECLARED: DeclaredType = DeclaredType::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "bool" }),
            other => match other.as_i128() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                Some(raw) => Err(CodecError::OutOfRange {
                    value: raw.to_string(),
                    target: "bool",
                }),
                None => Err(CodecError::TypeMismatch {
                    expected: "bool",
                    got: describe(&other),
                }),
            },
        }
    }
}

impl FieldValue for String {
    const DECLARED: DeclaredType = DeclaredType::String;

    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::String(s) => Ok(s),
            Value::Null => Err(CodecError::UnexpectedNull { expected: "String" }),
            other => Err(CodecError::TypeMismatch {
                expected: "String",
                got: describe(&other),
            }),
        }
    }
}

impl FieldValue for Uuid {
    const DECLARED: DeclaredType = DeclaredType::Uuid;

    fn to_value(&self) -> Value {
        Value::String(self.hyphenated().to_string())
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        let text = String::from_value(value).map_err(|err| match err {
            CodecError::UnexpectedNull { .. } => CodecError::UnexpectedNull { expected: "Uuid" },
            _ => err,
        })?;
        Uuid::parse_str(&text).map_err(|e| CodecError::InvalidUuid {
            value: text.clone(),
            reason: e.to_string(),
        })
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const DECLARED: DeclaredType = T::DECLARED;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, CodecError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Implements [`FieldValue`] for a field-less enum stored by discriminant.
///
/// ```
/// use stowage_types::{enum_field, FieldValue, Value};
///
/// #[derive(Debug, Clone, Copy, PartialEq, Default)]
/// enum Rank {
///     #[default]
///     Novice,
///     Expert,
/// }
///
/// enum_field!(Rank { Novice = 0, Expert = 5 });
///
/// assert_eq!(Rank::Expert.to_value(), Value::Int32(5));
/// assert_eq!(Rank::from_value(Value::Int64(0)), Ok(Rank::Novice));
/// ```
#[macro_export]
macro_rules! enum_field {
    ($ty:ty { $($variant:ident = $disc:expr),+ $(,)? }) => {
        impl $crate::FieldValue for $ty {
            const DECLARED: $crate::DeclaredType = $crate::DeclaredType::Enum;

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Int32(match self {
                    $(Self::$variant => $disc,)+
                })
            }

            fn from_value(value: $crate::Value) -> Result<Self, $crate::CodecError> {
                let raw = <i32 as $crate::FieldValue>::from_value(value)?;
                $(
                    if raw == $disc {
                        return Ok(Self::$variant);
                    }
                )+
                Err($crate::CodecError::InvalidDiscriminant {
                    value: raw,
                    target: stringify!($ty),
                })
            }
        }
    };
}

type ReadFn<R> = Box<dyn Fn(&R) -> Value + Send + Sync>;
type WriteFn<R> = Box<dyn Fn(&mut R, Value) -> Result<(), CodecError> + Send + Sync>;

/// Registration of one field of a record type.
///
/// Pairs the field's storage name with an accessor pair and the key-role
/// parameters the record type asks for. Key roles are only honoured on the
/// field named [`crate::KEY_FIELD`].
pub struct FieldDef<R> {
    name: &'static str,
    declared: DeclaredType,
    nullable: bool,
    primary_key: bool,
    auto_increment: bool,
    read: ReadFn<R>,
    write: WriteFn<R>,
}

impl<R: 'static> FieldDef<R> {
    /// Registers a field from a getter and a mutable getter.
    ///
    /// # Arguments
    /// * `name` - Field name used in storage
    /// * `get` - Returns a reference to the field
    /// * `get_mut` - Returns a mutable reference to the field
    pub fn new<V>(name: &'static str, get: fn(&R) -> &V, get_mut: fn(&mut R) -> &mut V) -> Self
    where
        V: FieldValue + 'static,
    {
        Self {
            name,
            declared: V::DECLARED,
            nullable: V::NULLABLE,
            primary_key: false,
            auto_increment: false,
            read: Box::new(move |record| get(record).to_value()),
            write: Box::new(move |record, value| {
                *get_mut(record) = V::from_value(value)?;
                Ok(())
            }),
        }
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Marks the field as auto-incrementing.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }
}

impl<R> FieldDef<R> {
    /// Returns the field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared type of the field.
    pub fn declared(&self) -> DeclaredType {
        self.declared
    }

    /// Returns `true` if the field may hold null.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Returns `true` if the record type asked for the primary-key role.
    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    /// Returns `true` if the record type asked for auto-increment.
    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// Reads the field's current value from a record.
    pub fn read(&self, record: &R) -> Value {
        (self.read)(record)
    }

    /// Assigns a value to the field of a record.
    pub fn write(&self, record: &mut R, value: Value) -> Result<(), CodecError> {
        (self.write)(record, value).map_err(|e| e.in_field(self.name))
    }
}

impl<R> fmt::Debug for FieldDef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("nullable", &self.nullable)
            .field("primary_key", &self.primary_key)
            .field("auto_increment", &self.auto_increment)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Sample {
        count: u16,
        label: Option<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    enum Mood {
        #[default]
        Calm,
        Angry,
    }

    enum_field!(Mood { Calm = 1, Angry = 2 });

    #[test]
    fn test_integer_widening_and_narrowing() {
        assert_eq!(7i16.to_value(), Value::Int32(7));
        assert_eq!(7u16.to_value(), Value::Int32(7));
        assert_eq!(7u8.to_value(), Value::Byte(7));
        assert_eq!(i16::from_value(Value::Int64(-3)), Ok(-3));
        assert!(matches!(
            u8::from_value(Value::Int64(256)),
            Err(CodecError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_null_semantics() {
        assert_eq!(Option::<String>::None.to_value(), Value::Null);
        assert_eq!(Option::<String>::from_value(Value::Null), Ok(None));
        assert!(matches!(
            String::from_value(Value::Null),
            Err(CodecError::UnexpectedNull { .. })
        ));
        assert_eq!(String::new().to_value(), Value::String(String::new()));
    }

    #[test]
    fn test_bool_from_integer() {
        assert_eq!(bool::from_value(Value::Int64(1)), Ok(true));
        assert_eq!(bool::from_value(Value::Int64(0)), Ok(false));
        assert!(bool::from_value(Value::Int64(2)).is_err());
    }

    #[test]
    fn test_uuid_as_string() {
        let id = Uuid::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
        let value = id.to_value();
        assert_eq!(
            value,
            Value::String("12345678-9abc-def0-1234-56789abcdef0".to_string())
        );
        assert_eq!(Uuid::from_value(value), Ok(id));
        assert!(matches!(
            Uuid::from_value(Value::String("nope".into())),
            Err(CodecError::InvalidUuid { .. })
        ));
    }

    #[test]
    fn test_enum_field() {
        assert_eq!(Mood::DECLARED, DeclaredType::Enum);
        assert_eq!(Mood::Angry.to_value(), Value::Int32(2));
        assert_eq!(Mood::from_value(Value::Int32(1)), Ok(Mood::Calm));
        assert!(matches!(
            Mood::from_value(Value::Int32(9)),
            Err(CodecError::InvalidDiscriminant { value: 9, .. })
        ));
    }

    #[test]
    fn test_field_def_accessors() {
        let count = FieldDef::new("Count", |s: &Sample| &s.count, |s| &mut s.count);
        let label = FieldDef::new("Label", |s: &Sample| &s.label, |s| &mut s.label);
        assert_eq!(count.declared(), DeclaredType::U16);
        assert!(!count.is_nullable());
        assert!(label.is_nullable());

        let mut sample = Sample::default();
        count.write(&mut sample, Value::Int64(12)).unwrap();
        label.write(&mut sample, Value::String("x".into())).unwrap();
        assert_eq!(count.read(&sample), Value::Int32(12));
        assert_eq!(label.read(&sample), Value::String("x".into()));

        let err = count.write(&mut sample, Value::String("x".into())).unwrap_err();
        assert!(matches!(err, CodecError::Field { ref field, .. } if field == "Count"));
    }

    #[test]
    fn test_key_roles() {
        let id = FieldDef::new("Id", |s: &Sample| &s.count, |s| &mut s.count)
            .primary_key()
            .auto_increment();
        assert!(id.is_primary_key());
        assert!(id.is_auto_increment());
    }
}
