//! Record selection: declarative filters and typed closures.

use stowage_types::{Filter, Record};

use crate::error::StoreError;
use crate::schema::Schema;

/// Condition selecting records of type `R`.
///
/// A `Filter` can be pushed down to a backend's native query language; a
/// closure is always evaluated in memory against decoded records.
pub enum Predicate<'a, R> {
    /// Declarative field filter
    Filter(Filter),
    /// Arbitrary test over a decoded record
    Test(Box<dyn Fn(&R) -> bool + 'a>),
}

impl<'a, R: Record> Predicate<'a, R> {
    /// Wraps a declarative filter.
    pub fn filter(filter: Filter) -> Self {
        Predicate::Filter(filter)
    }

    /// Wraps a closure.
    pub fn test(test: impl Fn(&R) -> bool + 'a) -> Self {
        Predicate::Test(Box::new(test))
    }

    /// Returns `true` if the predicate accepts `record`.
    pub fn accepts(&self, record: &R) -> bool {
        match self {
            Predicate::Filter(filter) => filter.matches(&crate::codec::encode(record)),
            Predicate::Test(test) => test(record),
        }
    }
}

impl<R> From<Filter> for Predicate<'_, R> {
    fn from(filter: Filter) -> Self {
        Predicate::Filter(filter)
    }
}

impl<R> std::fmt::Debug for Predicate<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Filter(filter) => f.debug_tuple("Filter").field(filter).finish(),
            Predicate::Test(_) => f.write_str("Test(..)"),
        }
    }
}

/// Checks that every field a filter names exists in the schema.
///
/// # Returns
/// `Result<(), StoreError>`; `UnknownField` for the first unknown name.
pub fn validate_filter(filter: &Filter, schema: &Schema) -> Result<(), StoreError> {
    match filter
        .field_names()
        .into_iter()
        .find(|name| schema.field(name).is_none())
    {
        Some(name) => Err(StoreError::UnknownField {
            table: schema.name().to_string(),
            field: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Returns the first item, in sequence order, that satisfies `test`.
pub fn first_match<T, I, F>(items: I, mut test: F) -> Option<T>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> bool,
{
    items.into_iter().find(|item| test(item))
}
