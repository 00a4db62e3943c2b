//! Storage types, declared field types and primitive values.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primitive storage types a field can be persisted as.
///
/// Both backends understand exactly this set. Every declared field type is
/// mapped onto one of these when a schema is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageType {
    /// 8-bit unsigned integer
    Byte,
    /// 32-bit signed integer
    Int32,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit signed integer
    Int64,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit floating point number
    Float,
    /// 64-bit floating point number
    Double,
    /// Boolean value
    Bool,
    /// UTF-8 string
    String,
}

impl StorageType {
    /// All storage types, in declaration order.
    pub const ALL: [StorageType; 9] = [
        StorageType::Byte,
        StorageType::Int32,
        StorageType::UInt32,
        StorageType::Int64,
        StorageType::UInt64,
        StorageType::Float,
        StorageType::Double,
        StorageType::Bool,
        StorageType::String,
    ];

    /// Returns the canonical name of this storage type.
    pub fn name(&self) -> &'static str {
        match self {
            StorageType::Byte => "Byte",
            StorageType::Int32 => "Int32",
            StorageType::UInt32 => "UInt32",
            StorageType::Int64 => "Int64",
            StorageType::UInt64 => "UInt64",
            StorageType::Float => "Float",
            StorageType::Double => "Double",
            StorageType::Bool => "Bool",
            StorageType::String => "String",
        }
    }

    /// Returns `true` if this type is an integer type.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            StorageType::Byte
                | StorageType::Int32
                | StorageType::UInt32
                | StorageType::Int64
                | StorageType::UInt64
        )
    }

    /// Returns `true` if this type is a floating point type.
    pub fn is_float(&self) -> bool {
        matches!(self, StorageType::Float | StorageType::Double)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a name does not match any [`StorageType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown storage type '{0}'")]
pub struct UnknownStorageType(pub String);

impl FromStr for StorageType {
    type Err = UnknownStorageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageType::ALL
            .into_iter()
            .find(|ty| ty.name() == s)
            .ok_or_else(|| UnknownStorageType(s.to_string()))
    }
}

/// The Rust-side type of a record field, as registered by the record type.
///
/// This is what the schema deriver inspects; it never looks at the field
/// values themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclaredType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
    String,
    /// Globally unique identifier (`uuid::Uuid`)
    Uuid,
    /// Field-less enumeration stored by discriminant
    Enum,
    /// Any other type, resolved by name against the storage types
    Named(&'static str),
}

impl DeclaredType {
    /// Returns the name used for name-based storage type resolution.
    pub fn type_name(&self) -> &'static str {
        match self {
            DeclaredType::I8 => "SByte",
            DeclaredType::U8 => "Byte",
            DeclaredType::I16 => "Int16",
            DeclaredType::U16 => "UInt16",
            DeclaredType::I32 => "Int32",
            DeclaredType::U32 => "UInt32",
            DeclaredType::I64 => "Int64",
            DeclaredType::U64 => "UInt64",
            DeclaredType::F32 => "Float",
            DeclaredType::F64 => "Double",
            DeclaredType::Bool => "Bool",
            DeclaredType::String => "String",
            DeclaredType::Uuid => "Guid",
            DeclaredType::Enum => "Enum",
            DeclaredType::Named(name) => name,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Primitive value of a single field.
///
/// Holds either `Null` or a value matching one [`StorageType`] variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value of a nullable field
    Null,
    Byte(u8),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
}

impl Value {
    /// Returns the storage type of this value, or `None` for `Null`.
    pub fn storage_type(&self) -> Option<StorageType> {
        match self {
            Value::Null => None,
            Value::Byte(_) => Some(StorageType::Byte),
            Value::Int32(_) => Some(StorageType::Int32),
            Value::UInt32(_) => Some(StorageType::UInt32),
            Value::Int64(_) => Some(StorageType::Int64),
            Value::UInt64(_) => Some(StorageType::UInt64),
            Value::Float(_) => Some(StorageType::Float),
            Value::Double(_) => Some(StorageType::Double),
            Value::Bool(_) => Some(StorageType::Bool),
            Value::String(_) => Some(StorageType::String),
        }
    }

    /// Returns `true` if this value is `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as a wide integer if it is an integer variant.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Byte(v) => Some(v.into()),
            Value::Int32(v) => Some(v.into()),
            Value::UInt32(v) => Some(v.into()),
            Value::Int64(v) => Some(v.into()),
            Value::UInt64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Returns the value as a double if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(v.into()),
            Value::Double(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// Builds an integer value of the given storage type.
    ///
    /// Returns `None` if `ty` is not an integer type or `raw` does not fit.
    pub fn from_integer(ty: StorageType, raw: i128) -> Option<Value> {
        match ty {
            StorageType::Byte => u8::try_from(raw).ok().map(Value::Byte),
            StorageType::Int32 => i32::try_from(raw).ok().map(Value::Int32),
            StorageType::UInt32 => u32::try_from(raw).ok().map(Value::UInt32),
            StorageType::Int64 => i64::try_from(raw).ok().map(Value::Int64),
            StorageType::UInt64 => u64::try_from(raw).ok().map(Value::UInt64),
            _ => None,
        }
    }

    /// Orders two values the way a relational engine would.
    ///
    /// Integers and floats compare numerically across widths, booleans
    /// compare as 0/1 and strings compare bytewise. Returns `None` when the
    /// values are not comparable, including any comparison involving `Null`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, _) | (_, Value::Null) => None,
            (Value::String(a), Value::String(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
            (Value::String(_), _) | (_, Value::String(_)) => None,
            (a, b) => match (a.numeric_integer(), b.numeric_integer()) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => a.numeric_float()?.partial_cmp(&b.numeric_float()?),
            },
        }
    }

    fn numeric_integer(&self) -> Option<i128> {
        match *self {
            Value::Bool(b) => Some(i128::from(b)),
            _ => self.as_i128(),
        }
    }

    fn numeric_float(&self) -> Option<f64> {
        match *self {
            Value::Bool(b) => Some(if b { 1.0 } else { 0.0 }),
            _ => self.as_f64(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
        }
    }
}
