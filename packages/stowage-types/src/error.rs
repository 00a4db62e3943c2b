//! Conversion errors between record fields and primitive values.

use thiserror::Error;

/// Error raised when a primitive value cannot be assigned to a field.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Value has a type the field cannot hold
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: String },

    /// Null value for a field that is not nullable
    #[error("Unexpected null for non-nullable {expected}")]
    UnexpectedNull { expected: &'static str },

    /// Numeric value does not fit the field type
    #[error("Value {value} out of range for {target}")]
    OutOfRange { value: String, target: &'static str },

    /// Integer does not name a variant of the enumeration
    #[error("Invalid discriminant {value} for enum {target}")]
    InvalidDiscriminant { value: i32, target: &'static str },

    /// String is not a valid UUID
    #[error("Invalid uuid '{value}': {reason}")]
    InvalidUuid { value: String, reason: String },

    /// Error converting a named field
    #[error("Field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<CodecError>,
    },
}

impl CodecError {
    /// Attaches the field name to this error.
    pub fn in_field(self, field: &str) -> Self {
        CodecError::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}
