//! Declarative boolean filters over record fields.

use std::cmp::Ordering;
use std::fmt;

use crate::field::FieldValue;
use crate::record::FieldValues;
use crate::types::Value;

/// Comparison operator of a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Returns the SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Returns `true` if `ordering` satisfies the operator.
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Boolean condition over a record's fields.
///
/// A relational backend translates filters into its native query language;
/// the flat-file backend evaluates them in memory with [`Filter::matches`].
/// Both follow SQL three-valued logic: a comparison involving null is
/// unknown, and only rows where the whole filter is true match.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every record
    All,
    /// Compares a field against a constant
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// All sub-filters hold
    And(Vec<Filter>),
    /// At least one sub-filter holds
    Or(Vec<Filter>),
    /// The sub-filter does not hold
    Not(Box<Filter>),
}

impl Filter {
    fn compare(field: impl Into<String>, op: CompareOp, value: impl FieldValue) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.to_value(),
        }
    }

    /// `field = value`; comparing with `None` tests for null.
    pub fn eq(field: impl Into<String>, value: impl FieldValue) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// `field <> value`; comparing with `None` tests for not null.
    pub fn ne(field: impl Into<String>, value: impl FieldValue) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl FieldValue) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl FieldValue) -> Self {
        Self::compare(field, CompareOp::Le, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl FieldValue) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl FieldValue) -> Self {
        Self::compare(field, CompareOp::Ge, value)
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Filter::Compare {
            field: field.into(),
            op: CompareOp::Eq,
            value: Value::Null,
        }
    }

    /// Conjunction of `self` and `other`.
    #[must_use]
    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Disjunction of `self` and `other`.
    #[must_use]
    pub fn or(self, other: Filter) -> Self {
        match self {
            Filter::Or(mut parts) => {
                parts.push(other);
                Filter::Or(parts)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    /// Negation of `self`.
    #[must_use]
    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Returns every field name the filter refers to.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_fields(&mut names);
        names
    }

    fn collect_fields<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Filter::All => {}
            Filter::Compare { field, .. } => names.push(field.as_str()),
            Filter::And(parts) | Filter::Or(parts) => {
                for part in parts {
                    part.collect_fields(names);
                }
            }
            Filter::Not(inner) => inner.collect_fields(names),
        }
    }

    /// Returns `true` if the filter holds for the given field values.
    ///
    /// Fields missing from `values` are treated as null.
    pub fn matches(&self, values: &FieldValues) -> bool {
        self.evaluate(values) == Some(true)
    }

    /// Evaluates the filter; `None` means unknown.
    fn evaluate(&self, values: &FieldValues) -> Option<bool> {
        match self {
            Filter::All => Some(true),
            Filter::Compare { field, op, value } => {
                let actual = values.get(field).unwrap_or(&Value::Null);
                match (value, op) {
                    (Value::Null, CompareOp::Eq) => Some(actual.is_null()),
                    (Value::Null, CompareOp::Ne) => Some(!actual.is_null()),
                    _ => actual.compare(value).map(|ordering| op.accepts(ordering)),
                }
            }
            Filter::And(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match part.evaluate(values) {
                        Some(false) => return Some(false),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Filter::Or(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match part.evaluate(values) {
                        Some(true) => return Some(true),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Filter::Not(inner) => inner.evaluate(values).map(|b| !b),
        }
    }
}
