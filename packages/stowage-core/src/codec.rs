//! Conversion between record instances and their flat field-value form.

use stowage_types::{FieldValues, Record};

use crate::error::StoreError;

/// Reads every registered field of `record`, in registration order.
pub fn encode<R: Record>(record: &R) -> FieldValues {
    let defs = R::fields();
    let mut values = FieldValues::with_capacity(defs.len());
    for def in &defs {
        values.insert(def.name(), def.read(record));
    }
    values
}

/// Builds a record from field values.
///
/// Starts from `R::default()` and assigns every registered field present in
/// `values`; absent fields keep their default. Values that are not
/// registered fields are ignored.
///
/// # Returns
/// `Result<R, StoreError>`; a `Codec` error names the offending field.
pub fn decode<R: Record>(values: &FieldValues) -> Result<R, StoreError> {
    let mut record = R::default();
    for def in R::fields() {
        if let Some(value) = values.get(def.name()) {
            def.write(&mut record, value.clone())?;
        }
    }
    Ok(record)
}
