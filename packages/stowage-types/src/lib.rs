//! Shared record model for the stowage persistence layer.
//!
//! This crate defines primitive values and storage types, the record and
//! field registration traits, the flat field-value form of a record and the
//! declarative filter used to select records.

pub mod error;
pub mod field;
pub mod filter;
pub mod record;
pub mod types;

pub use error::CodecError;
pub use field::{FieldDef, FieldValue};
pub use filter::{CompareOp, Filter};
pub use record::{FieldValues, Record, KEY_FIELD};
pub use types::{DeclaredType, StorageType, UnknownStorageType, Value};

pub use uuid::Uuid;
