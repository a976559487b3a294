//! Fixture data for the tinybots schema.
//!
//! This crate provides the seed units for robots, scripts, schedules, a million
//! synthetic script executions, and the micro-manager triggered-APIs event graph,
//! along with the wiring the `seed` binary uses to run or clean them.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_data::prelude::*;
//!
//! let config = SeedConfig::from_env()?;
//! let ctx = open_context(&config, "ci", false).await?;
//! seed_all(&ctx, &config.executions).await?;
//! println!("{}", ctx.registry().snapshot_pretty()?);
//! ctx.destroy().await;
//! ```

pub mod config;
pub mod models;
pub mod pipeline;
pub mod units;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::config::{ConfigError, SeedConfig};
    pub use crate::pipeline::{
        DASHBOARD_HANDLE, MICRO_MANAGER_SCOPE, Mode, Selection, clean_all, dry_run, execute,
        memory_store, open_context, planned, seed_all,
    };
    pub use crate::units::*;
    pub use seeding::prelude::*;
}
