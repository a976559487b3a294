//! Errors raised while seeding or cleaning.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Data a unit needs from outside its own rows is absent.
    #[error("Missing prerequisite: {0}")]
    Precondition(String),

    #[error("No data handle named {0:?}")]
    MissingHandle(String),

    #[error("Unit {unit:?} failed: {source}")]
    Unit {
        unit: String,
        #[source]
        source: Box<SeedError>,
    },

    /// Reverse-order cleanup stopped at `unit`; `remaining` were never cleaned.
    #[error(
        "Cleanup aborted at unit {unit:?}; not cleaned: [{}]: {source}",
        .remaining.join(", ")
    )]
    CleanAborted {
        unit: String,
        remaining: Vec<String>,
        #[source]
        source: Box<SeedError>,
    },

    #[error("Unit {unit:?} depends on {dependency:?}, which has not run before it")]
    Ordering { unit: String, dependency: String },

    #[error("Verification failed for {table}: expected {expected} rows, found {actual}")]
    Verification {
        table: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid batch configuration: {0}")]
    InvalidBatch(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SeedError {
    /// Wraps an error raised by the named unit.
    pub fn in_unit(unit: &str, source: SeedError) -> Self {
        Self::Unit {
            unit: unit.to_string(),
            source: Box::new(source),
        }
    }
}
