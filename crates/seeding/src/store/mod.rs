//! Data access for seed units.
//!
//! The [`Store`] trait is the only thing the seeding core requires of a database:
//! point lookup, ordered first-match lookup, create, duplicate-skipping bulk create,
//! delete by predicate, and count. Records travel as JSON objects so the trait stays
//! object-safe; [`Table`] layers typed access on top for [`Entity`] types.
//!
//! Two backends are provided:
//! - [`PgStore`]: PostgreSQL through a sqlx pool
//! - [`MemoryStore`]: in-process tables with key and unique constraints, for tests

mod memory;
mod postgres;
mod table;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use table::{Entity, Table};

/// A single row, keyed by column name.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Duplicate key in {table}: {key}")]
    Duplicate { table: String, key: String },
    #[error("Row vanished from {table}: {key}")]
    Missing { table: String, key: String },
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),
    #[error("Unsupported value for column {column}: {value}")]
    UnsupportedValue { column: String, value: Value },
    #[error("Entity for {0} did not serialize to a record")]
    NotARecord(&'static str),
    #[error("Record decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Store is closed")]
    Closed,
}

/// Row predicate used by lookups, deletes and counts.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every row.
    All,
    /// Column equals value. `Null` matches missing or null columns.
    Eq(String, Value),
    /// Column equals any of the values. An empty list matches nothing.
    In(String, Vec<Value>),
    /// Column lies within the inclusive range.
    Between(String, Value, Value),
    /// Every filter matches.
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::Eq(column.to_string(), value.into())
    }

    pub fn one_of<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        )
    }

    pub fn between(column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::Between(column.to_string(), low.into(), high.into())
    }

    /// Combines two filters, flattening nested conjunctions.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Self::And(parts) => parts,
            Self::All => Vec::new(),
            single => vec![single],
        };
        match other {
            Self::And(more) => parts.extend(more),
            Self::All => {}
            single => parts.push(single),
        }
        Self::And(parts)
    }

    /// Evaluates the filter against a record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::Eq(column, value) => values_equal(column_value(record, column), value),
            Self::In(column, values) => {
                let actual = column_value(record, column);
                values.iter().any(|v| values_equal(actual, v))
            }
            Self::Between(column, low, high) => {
                let actual = column_value(record, column);
                matches!(
                    compare_values(actual, low),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(
                    compare_values(actual, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
            }
            Self::And(parts) => parts.iter().all(|part| part.matches(record)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Sort order for [`Store::find_first`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub direction: Direction,
}

impl Order {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            direction: Direction::Desc,
        }
    }
}

/// Storage primitives required by seed units.
///
/// Implementations are shared by reference across every unit of a run and are
/// never called concurrently by the orchestrator.
#[async_trait]
pub trait Store: Send + Sync {
    /// Looks up a single row by its key column.
    async fn find_by_key(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
    ) -> Result<Option<Record>, StoreError>;

    /// Returns the first row matching `filter`, in `order` when given.
    async fn find_first(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Option<Record>, StoreError>;

    /// Inserts one row and returns it as stored, including generated keys.
    ///
    /// A key or unique constraint violation is [`StoreError::Duplicate`].
    async fn create(&self, table: &str, record: Record) -> Result<Record, StoreError>;

    /// Inserts rows in one call and returns how many were inserted.
    ///
    /// With `skip_duplicates`, rows violating a key or unique constraint are
    /// silently dropped instead of failing the whole call.
    async fn create_many(
        &self,
        table: &str,
        records: Vec<Record>,
        skip_duplicates: bool,
    ) -> Result<u64, StoreError>;

    /// Overwrites the given columns of the row with key `key`.
    async fn update(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
        changes: Record,
    ) -> Result<u64, StoreError>;

    /// Deletes matching rows and returns how many were removed.
    async fn delete_many(&self, table: &str, filter: &Filter) -> Result<u64, StoreError>;

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Releases connections. Later calls may fail with [`StoreError::Closed`].
    async fn close(&self);
}

fn column_value<'r>(record: &'r Record, column: &str) -> &'r Value {
    record.get(column).unwrap_or(&Value::Null)
}

/// Equality with numeric coercion, so `1` and `1.0` compare equal.
pub(crate) fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Orders scalar JSON values of the same kind; mixed kinds are incomparable.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_filter_matches() {
        let row = record(json!({ "id": 7, "robot_id": 1, "name": "seed" }));

        assert!(Filter::All.matches(&row));
        assert!(Filter::eq("id", 7).matches(&row));
        assert!(Filter::eq("id", 7.0).matches(&row));
        assert!(!Filter::eq("id", 8).matches(&row));
        assert!(Filter::eq("missing", Value::Null).matches(&row));
        assert!(Filter::one_of("id", [1, 7, 9]).matches(&row));
        assert!(!Filter::one_of("id", Vec::<i64>::new()).matches(&row));
        assert!(Filter::between("id", 1, 10).matches(&row));
        assert!(Filter::between("id", 7, 7).matches(&row));
        assert!(!Filter::between("id", 8, 10).matches(&row));
        assert!(!Filter::between("name", 1, 10).matches(&row));
    }

    #[test]
    fn test_filter_and_flattens() {
        let filter = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .and(Filter::All)
            .and(Filter::eq("c", 3));

        match &filter {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected conjunction, got {other:?}"),
        }

        let row = record(json!({ "a": 1, "b": 2, "c": 3 }));
        assert!(filter.matches(&row));
        let row = record(json!({ "a": 1, "b": 2, "c": 4 }));
        assert!(!filter.matches(&row));
    }
}
