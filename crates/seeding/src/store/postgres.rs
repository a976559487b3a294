//! PostgreSQL store.
//!
//! Rows are read as `to_jsonb(t)` and written through `jsonb_populate_record[set]`,
//! so the database performs every column conversion (timestamps, integers) from the
//! JSON record. Table and column names are validated identifiers, never bound values.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::{Direction, Filter, Order, Record, Store, StoreError};

/// A [`Store`] over a sqlx PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a new pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the pool for advanced usage.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Accepts plain lowercase SQL identifiers only.
fn ident(name: &str) -> Result<&str, StoreError> {
    let valid = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn column_list(columns: &BTreeSet<&str>) -> Result<String, StoreError> {
    Ok(columns
        .iter()
        .map(|c| ident(c))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}

fn push_value(
    builder: &mut QueryBuilder<'_, Postgres>,
    column: &str,
    value: &Value,
) -> Result<(), StoreError> {
    match value {
        Value::Bool(b) => {
            builder.push_bind(*b);
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                builder.push_bind(i);
            } else if let Some(f) = n.as_f64() {
                builder.push_bind(f);
            } else {
                return Err(StoreError::UnsupportedValue {
                    column: column.to_string(),
                    value: value.clone(),
                });
            }
        }
        Value::String(s) => {
            builder.push_bind(s.clone());
        }
        Value::Null | Value::Array(_) | Value::Object(_) => {
            return Err(StoreError::UnsupportedValue {
                column: column.to_string(),
                value: value.clone(),
            });
        }
    }
    Ok(())
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &Filter) -> Result<(), StoreError> {
    match filter {
        Filter::All => {
            builder.push("TRUE");
        }
        Filter::Eq(column, Value::Null) => {
            builder.push(ident(column)?).push(" IS NULL");
        }
        Filter::Eq(column, value) => {
            builder.push(ident(column)?).push(" = ");
            push_value(builder, column, value)?;
        }
        Filter::In(_, values) if values.is_empty() => {
            builder.push("FALSE");
        }
        Filter::In(column, values) => {
            builder.push(ident(column)?).push(" IN (");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    builder.push(", ");
                }
                push_value(builder, column, value)?;
            }
            builder.push(")");
        }
        Filter::Between(column, low, high) => {
            builder.push("(").push(ident(column)?).push(" BETWEEN ");
            push_value(builder, column, low)?;
            builder.push(" AND ");
            push_value(builder, column, high)?;
            builder.push(")");
        }
        Filter::And(parts) if parts.is_empty() => {
            builder.push("TRUE");
        }
        Filter::And(parts) => {
            builder.push("(");
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                push_filter(builder, part)?;
            }
            builder.push(")");
        }
    }
    Ok(())
}

/// Maps unique violations to [`StoreError::Duplicate`].
fn insert_error(table: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        return StoreError::Duplicate {
            table: table.to_string(),
            key: db.constraint().unwrap_or("unique").to_string(),
        };
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    async fn find_by_key(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
    ) -> Result<Option<Record>, StoreError> {
        let filter = Filter::Eq(key_column.to_string(), key.clone());
        self.find_first(table, &filter, None).await
    }

    async fn find_first(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Option<Record>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT to_jsonb(t) FROM ");
        builder.push(ident(table)?).push(" AS t WHERE ");
        push_filter(&mut builder, filter)?;
        if let Some(order) = order {
            builder.push(" ORDER BY ").push(ident(&order.column)?);
            builder.push(match order.direction {
                Direction::Asc => " ASC",
                Direction::Desc => " DESC",
            });
        }
        builder.push(" LIMIT 1");

        let row = builder
            .build_query_scalar::<Json<Record>>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|Json(record)| record))
    }

    async fn create(&self, table: &str, record: Record) -> Result<Record, StoreError> {
        let table = ident(table)?;
        let columns = column_list(&record.keys().map(String::as_str).collect())?;

        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO ");
        builder
            .push(table)
            .push(" AS t (")
            .push(&columns)
            .push(") SELECT ")
            .push(&columns)
            .push(" FROM jsonb_populate_record(NULL::")
            .push(table)
            .push(", ")
            .push_bind(Json(record))
            .push(") RETURNING to_jsonb(t)");

        let Json(stored) = builder
            .build_query_scalar::<Json<Record>>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| insert_error(table, e))?;
        Ok(stored)
    }

    async fn create_many(
        &self,
        table: &str,
        records: Vec<Record>,
        skip_duplicates: bool,
    ) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let table = ident(table)?;
        // Columns absent from some records are inserted as NULL, not defaulted
        let columns = column_list(
            &records
                .iter()
                .flat_map(|r| r.keys().map(String::as_str))
                .collect(),
        )?;

        let mut builder = QueryBuilder::<Postgres>::new("INSERT INTO ");
        builder
            .push(table)
            .push(" (")
            .push(&columns)
            .push(") SELECT ")
            .push(&columns)
            .push(" FROM jsonb_populate_recordset(NULL::")
            .push(table)
            .push(", ")
            .push_bind(Json(&records))
            .push(")");
        if skip_duplicates {
            builder.push(" ON CONFLICT DO NOTHING");
        }

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(table, e))?;
        debug!(
            "Inserted {} of {} rows into {}",
            result.rows_affected(),
            records.len(),
            table
        );
        Ok(result.rows_affected())
    }

    async fn update(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
        changes: Record,
    ) -> Result<u64, StoreError> {
        if changes.is_empty() {
            return Ok(0);
        }
        let table = ident(table)?;
        let columns = column_list(&changes.keys().map(String::as_str).collect())?;

        let mut builder = QueryBuilder::<Postgres>::new("UPDATE ");
        builder
            .push(table)
            .push(" SET (")
            .push(&columns)
            .push(") = (SELECT ")
            .push(&columns)
            .push(" FROM jsonb_populate_record(NULL::")
            .push(table)
            .push(", ")
            .push_bind(Json(changes))
            .push(")) WHERE ");
        push_filter(&mut builder, &Filter::Eq(key_column.to_string(), key.clone()))?;

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(table, e))?;
        Ok(result.rows_affected())
    }

    async fn delete_many(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("DELETE FROM ");
        builder.push(ident(table)?).push(" WHERE ");
        push_filter(&mut builder, filter)?;

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
        builder.push(ident(table)?).push(" WHERE ");
        push_filter(&mut builder, filter)?;

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
