//! Seeding orchestration for development and test databases.
//!
//! Each entity type gets a seed unit that knows how to create its rows
//! idempotently and how to remove them again. Units hand typed references to the
//! units that depend on them, an [`Orchestrator`](orchestrator::Orchestrator) runs
//! them in the declared order and cleans them in reverse, and a
//! [`BatchGenerator`](batch::BatchGenerator) covers the high-volume cases.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use seeding::prelude::*;
//!
//! let store = PgStore::connect(&database_url, 5).await?;
//! let ctx = SeedContext::new("ci", Arc::new(store));
//!
//! let mut orchestrator = Orchestrator::default();
//! let status = orchestrator.run_unit(&ctx, StatusSeed::new()).await?;
//! orchestrator.run_unit(&ctx, RobotSeed::new(status)).await?;
//!
//! println!("{}", ctx.registry().snapshot_pretty()?);
//! ctx.destroy().await;
//! ```

pub mod batch;
pub mod context;
pub mod error;
pub mod log;
pub mod orchestrator;
pub mod registry;
pub mod store;
pub mod unit;

pub use error::SeedError;

pub mod prelude {
    //! Convenient re-exports for writing seed units.

    pub use crate::batch::{
        BatchConfig, BatchGenerator, BatchPlan, BatchReport, TimeWindow, VerifyPolicy, round_robin,
    };
    pub use crate::context::{PRIMARY_HANDLE, ScopedFuture, SeedContext};
    pub use crate::error::SeedError;
    pub use crate::log::{LogSink, MemorySink, TracingSink};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::registry::Registry;
    pub use crate::store::{
        Direction, Entity, Filter, MemoryStore, Order, PgStore, Record, Store, StoreError, Table,
    };
    pub use crate::unit::{Seed, SeedUnit};
}
