//! Record types and their flat field-value form.

use crate::field::FieldDef;
use crate::types::Value;

/// Name of the field that may carry the primary-key and auto-increment roles.
pub const KEY_FIELD: &str = "Id";

/// A plain data type that can be persisted as a table or collection.
///
/// Implementations register every persisted field explicitly, in the order
/// the fields should be stored:
///
/// ```
/// use stowage_types::{FieldDef, Record};
///
/// #[derive(Debug, Default)]
/// struct Player {
///     id: i32,
///     name: String,
///     active: bool,
/// }
///
/// impl Record for Player {
///     const NAME: &'static str = "Player";
///
///     fn fields() -> Vec<FieldDef<Self>> {
///         vec![
///             FieldDef::new("Id", |p: &Player| &p.id, |p| &mut p.id)
///                 .primary_key()
///                 .auto_increment(),
///             FieldDef::new("Name", |p: &Player| &p.name, |p| &mut p.name),
///             FieldDef::new("Active", |p: &Player| &p.active, |p| &mut p.active),
///         ]
///     }
/// }
///
/// assert_eq!(Player::fields().len(), 3);
/// ```
pub trait Record: Default + 'static {
    /// Name of the stored table or collection.
    const NAME: &'static str;

    /// Field registrations in storage order.
    fn fields() -> Vec<FieldDef<Self>>;
}

/// Ordered mapping of field name to primitive value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    entries: Vec<(String, Value)>,
}

impl FieldValues {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty mapping with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Sets the value of a field, keeping the original position if the
    /// field is already present.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Returns the value of a field, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    /// Returns `true` if the field is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Returns the number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for FieldValues {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut values = FieldValues::new();
        for (name, value) in iter {
            values.insert(name, value);
        }
        values
    }
}

impl IntoIterator for FieldValues {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
