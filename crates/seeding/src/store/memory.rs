//! In-process store with key and unique constraints.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use super::{Direction, Filter, Order, Record, Store, StoreError, compare_values};

/// Key column of every memory table. Rows created without it get the next
/// auto-increment value.
const KEY_COLUMN: &str = "id";

/// A [`Store`] backed by in-memory tables.
///
/// Every table is keyed by `id`; extra unique constraints are declared with
/// [`MemoryStore::with_unique`]. As in SQL, rows with a null in a constrained
/// column never conflict on that constraint.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, MemoryTable>>,
    unique: HashMap<String, Vec<Vec<String>>>,
    closed: AtomicBool,
}

#[derive(Default)]
struct MemoryTable {
    rows: Vec<Record>,
    next_key: i64,
    /// One set of occupied key tuples per constraint, parallel to `constraints`.
    occupied: Vec<HashSet<String>>,
    constraints: Vec<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a unique constraint over `columns` of `table`.
    pub fn with_unique(mut self, table: &str, columns: &[&str]) -> Self {
        self.unique
            .entry(table.to_string())
            .or_default()
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::SeqCst)
    }

    /// Returns a copy of every row in `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryTable>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Runs `f` against the named table, creating it with its constraints on first use.
    fn with_table<T>(&self, table: &str, f: impl FnOnce(&mut MemoryTable) -> T) -> T {
        let mut tables = self.lock();
        let entry = tables.entry(table.to_string()).or_insert_with(|| {
            let mut constraints = vec![vec![KEY_COLUMN.to_string()]];
            constraints.extend(self.unique.get(table).cloned().unwrap_or_default());
            MemoryTable {
                rows: Vec::new(),
                next_key: 1,
                occupied: vec![HashSet::new(); constraints.len()],
                constraints,
            }
        });
        f(entry)
    }
}

impl MemoryTable {
    /// Inserts a row unless it violates a constraint; returns the stored row.
    fn insert(&mut self, table: &str, mut record: Record) -> Result<Record, StoreError> {
        match record.get(KEY_COLUMN).and_then(Value::as_i64) {
            Some(key) => self.next_key = self.next_key.max(key + 1),
            None => {
                record.insert(KEY_COLUMN.to_string(), Value::from(self.next_key));
                self.next_key += 1;
            }
        }

        let keys: Vec<Option<String>> = self
            .constraints
            .iter()
            .map(|columns| constraint_key(&record, columns))
            .collect();

        for (occupied, key) in self.occupied.iter().zip(&keys) {
            if let Some(key) = key
                && occupied.contains(key)
            {
                return Err(StoreError::Duplicate {
                    table: table.to_string(),
                    key: key.clone(),
                });
            }
        }

        for (occupied, key) in self.occupied.iter_mut().zip(keys) {
            if let Some(key) = key {
                occupied.insert(key);
            }
        }
        self.rows.push(record.clone());
        Ok(record)
    }

    /// Applies `changes` to every matching row, all or nothing.
    ///
    /// Fails with [`StoreError::Duplicate`] when an updated row would collide with
    /// another row on any constraint.
    fn update(&mut self, table: &str, filter: &Filter, changes: &Record) -> Result<u64, StoreError> {
        let mut rows = self.rows.clone();
        let mut updated = 0;
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            for (column, value) in changes {
                row.insert(column.clone(), value.clone());
            }
            updated += 1;
        }

        for columns in &self.constraints {
            let mut seen = HashSet::new();
            for key in rows.iter().filter_map(|row| constraint_key(row, columns)) {
                if !seen.insert(key.clone()) {
                    return Err(StoreError::Duplicate {
                        table: table.to_string(),
                        key,
                    });
                }
            }
        }

        self.rows = rows;
        self.reindex();
        Ok(updated)
    }

    fn reindex(&mut self) {
        for (occupied, columns) in self.occupied.iter_mut().zip(&self.constraints) {
            occupied.clear();
            occupied.extend(
                self.rows
                    .iter()
                    .filter_map(|record| constraint_key(record, columns)),
            );
        }
    }
}

/// Serialized tuple of constrained values, or `None` if any of them is null.
fn constraint_key(record: &Record, columns: &[String]) -> Option<String> {
    let values = columns
        .iter()
        .map(|column| match record.get(column) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        })
        .collect::<Option<Vec<_>>>()?;
    Some(Value::Array(values).to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_by_key(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
    ) -> Result<Option<Record>, StoreError> {
        self.check_open()?;
        let filter = Filter::Eq(key_column.to_string(), key.clone());
        Ok(self.with_table(table, |t| {
            t.rows.iter().find(|row| filter.matches(row)).cloned()
        }))
    }

    async fn find_first(
        &self,
        table: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> Result<Option<Record>, StoreError> {
        self.check_open()?;
        Ok(self.with_table(table, |t| {
            let matching = t.rows.iter().filter(|row| filter.matches(row));
            match order {
                None => matching.cloned().next(),
                Some(order) => {
                    let column_of = |row: &Record| row.get(&order.column).cloned().unwrap_or(Value::Null);
                    let best = matching.reduce(|best, row| {
                        let ordering = compare_values(&column_of(row), &column_of(best));
                        let better = match order.direction {
                            Direction::Asc => ordering == Some(std::cmp::Ordering::Less),
                            Direction::Desc => ordering == Some(std::cmp::Ordering::Greater),
                        };
                        if better { row } else { best }
                    });
                    best.cloned()
                }
            }
        }))
    }

    async fn create(&self, table: &str, record: Record) -> Result<Record, StoreError> {
        self.check_open()?;
        self.with_table(table, |t| t.insert(table, record))
    }

    async fn create_many(
        &self,
        table: &str,
        records: Vec<Record>,
        skip_duplicates: bool,
    ) -> Result<u64, StoreError> {
        self.check_open()?;
        self.with_table(table, |t| {
            let mut inserted = 0;
            for record in records {
                match t.insert(table, record) {
                    Ok(_) => inserted += 1,
                    Err(StoreError::Duplicate { .. }) if skip_duplicates => {}
                    Err(e) => return Err(e),
                }
            }
            Ok(inserted)
        })
    }

    async fn update(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
        changes: Record,
    ) -> Result<u64, StoreError> {
        self.check_open()?;
        let filter = Filter::Eq(key_column.to_string(), key.clone());
        self.with_table(table, |t| t.update(table, &filter, &changes))
    }

    async fn delete_many(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check_open()?;
        Ok(self.with_table(table, |t| {
            let before = t.rows.len();
            t.rows.retain(|row| !filter.matches(row));
            t.reindex();
            (before - t.rows.len()) as u64
        }))
    }

    async fn count(&self, table: &str, filter: &Filter) -> Result<u64, StoreError> {
        self.check_open()?;
        Ok(self.with_table(table, |t| {
            t.rows.iter().filter(|row| filter.matches(row)).count() as u64
        }))
    }

    async fn close(&self) {
        self.closed.store(true, AtomicOrdering::SeqCst);
    }
}
