//! The seed unit contract.
//!
//! Implement [`Seed`] for each entity: its references are a typed struct, and the
//! units that need them take that struct in their constructor. [`SeedUnit`] is the
//! object-safe form the [`Orchestrator`] holds; every [`Seed`] is a [`SeedUnit`].
//!
//! [`Orchestrator`]: crate::orchestrator::Orchestrator

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::context::SeedContext;
use crate::error::SeedError;

/// Produces and removes the fixture rows of one entity type.
#[async_trait]
pub trait Seed: Send + Sync {
    /// Identifiers this unit hands to the units that depend on it.
    type Refs: Serialize + Send + Sync;

    /// Unique, stable unit name. Also the registry key for its references.
    fn name(&self) -> &str;

    /// Names of the units whose references this unit was constructed with.
    fn depends_on(&self) -> &[&'static str] {
        &[]
    }

    /// Identity summary for logs; no side effects.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    /// Creates the unit's rows, or finds and reuses them.
    ///
    /// Must be idempotent: seeding twice in the same scope returns the same
    /// references and creates no extra rows.
    async fn seed(&self, ctx: &SeedContext) -> Result<Self::Refs, SeedError>;

    /// Deletes exactly the rows this unit is responsible for.
    ///
    /// Without `refs`, falls back to the keys known at construction time.
    /// Deleting nothing is not an error.
    async fn clean(&self, ctx: &SeedContext, refs: Option<&Self::Refs>) -> Result<(), SeedError>;
}

/// Object-safe seed unit, with references erased to JSON.
#[async_trait]
pub trait SeedUnit: Send + Sync {
    fn name(&self) -> &str;

    fn depends_on(&self) -> &[&'static str];

    fn describe(&self) -> String;

    async fn seed(&self, ctx: &SeedContext) -> Result<Value, SeedError>;

    async fn clean(&self, ctx: &SeedContext) -> Result<(), SeedError>;
}

#[async_trait]
impl<S: Seed> SeedUnit for S {
    fn name(&self) -> &str {
        Seed::name(self)
    }

    fn depends_on(&self) -> &[&'static str] {
        Seed::depends_on(self)
    }

    fn describe(&self) -> String {
        Seed::describe(self)
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<Value, SeedError> {
        let refs = Seed::seed(self, ctx).await?;
        Ok(serde_json::to_value(&refs)?)
    }

    async fn clean(&self, ctx: &SeedContext) -> Result<(), SeedError> {
        Seed::clean(self, ctx, None).await
    }
}
