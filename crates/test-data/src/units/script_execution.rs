//! The high-volume script execution unit.
//!
//! Rows are a pure function of their index: parents are assigned round-robin and
//! `planned` times are spread evenly over 2024. Together with the unique
//! `(schedule_id, planned)` constraint this makes reruns resume instead of
//! duplicating.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::Duration;
use time::macros::datetime;

use seeding::prelude::*;

use super::{ScriptReferenceRefs, ScriptVersionRefs, TaskScheduleRefs};
use crate::models::ScriptExecution;

/// Executions are created this long after they were planned.
const CREATION_DELAY: Duration = Duration::seconds(1);

/// The window `planned` timestamps are spread over.
pub fn execution_window() -> TimeWindow {
    TimeWindow::new(datetime!(2024-01-01 0:00 UTC), Duration::days(365))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptExecutionRefs {
    /// Rows generated, whether or not this run inserted them.
    pub total_seeded: u64,
}

#[derive(Debug)]
pub struct ScriptExecutionSeed {
    references: ScriptReferenceRefs,
    versions: ScriptVersionRefs,
    schedules: TaskScheduleRefs,
    config: BatchConfig,
}

impl ScriptExecutionSeed {
    pub fn new(
        references: ScriptReferenceRefs,
        versions: ScriptVersionRefs,
        schedules: TaskScheduleRefs,
    ) -> Self {
        Self {
            references,
            versions,
            schedules,
            config: BatchConfig::default(),
        }
    }

    /// Overrides the default volume (1,000,000 rows in batches of 10,000).
    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// The row generated for global index `index`.
    pub fn execution(&self, index: u64) -> Result<ScriptExecution, SeedError> {
        let pick = |ids: &[i64]| round_robin(ids, index).copied().unwrap_or_default();
        let planned = execution_window().at(index, self.config.target_count)?;
        let created_at = planned.checked_add(CREATION_DELAY).ok_or_else(|| {
            SeedError::InvalidBatch(format!("creation time of execution {index} is out of range"))
        })?;
        Ok(ScriptExecution {
            id: None,
            script_reference_id: pick(&self.references.script_reference_ids),
            script_version_id: pick(&self.versions.script_version_ids),
            schedule_id: pick(&self.schedules.schedule_ids),
            planned,
            created_at,
        })
    }

    fn schedule_filter(&self) -> Filter {
        Filter::one_of("schedule_id", self.schedules.schedule_ids.iter().copied())
    }
}

#[async_trait]
impl Seed for ScriptExecutionSeed {
    type Refs = ScriptExecutionRefs;

    fn name(&self) -> &str {
        "script_execution"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["script_reference", "script_version", "task_schedule"]
    }

    fn describe(&self) -> String {
        format!(
            "script_execution ({} rows in batches of {} over {} schedules)",
            self.config.target_count,
            self.config.batch_size,
            self.schedules.schedule_ids.len()
        )
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<ScriptExecutionRefs, SeedError> {
        for (unit, ids) in [
            ("script_reference", &self.references.script_reference_ids),
            ("script_version", &self.versions.script_version_ids),
            ("task_schedule", &self.schedules.schedule_ids),
        ] {
            if ids.is_empty() {
                return Err(SeedError::Precondition(format!(
                    "no {unit} ids to assign script executions to"
                )));
            }
        }

        let report = BatchGenerator::new(&self.config)?
            .run(ctx, &self.schedule_filter(), |index| self.execution(index))
            .await?;

        Ok(ScriptExecutionRefs {
            total_seeded: report.submitted,
        })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        _refs: Option<&ScriptExecutionRefs>,
    ) -> Result<(), SeedError> {
        ctx.log("Cleaning script_execution seed data...");
        let deleted = ctx
            .table::<ScriptExecution>()
            .delete_many(&self.schedule_filter())
            .await?;
        ctx.log(format!("Deleted {deleted} script_execution records"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing;

    fn small(count: u64) -> BatchConfig {
        BatchConfig {
            target_count: count,
            batch_size: 40,
            progress_every: 2,
            verify: VerifyPolicy::Strict,
        }
    }

    fn seed_with(config: BatchConfig) -> ScriptExecutionSeed {
        ScriptExecutionSeed::new(
            ScriptReferenceRefs::planned(),
            ScriptVersionRefs {
                script_version_ids: vec![11, 12, 13],
            },
            TaskScheduleRefs::planned(),
        )
        .with_config(config)
    }

    #[test]
    fn test_rows_are_deterministic() {
        let seed = seed_with(BatchConfig::default());

        let row = seed.execution(101).unwrap();
        assert_eq!(row.script_reference_id, 2);
        assert_eq!(row.script_version_id, 13);
        assert_eq!(row.schedule_id, 1_000_002);
        assert_eq!(row.planned, datetime!(2024-01-01 0:53:05.136 UTC));
        assert_eq!(row.created_at, datetime!(2024-01-01 0:53:06.136 UTC));
        assert_eq!(seed.execution(101).unwrap(), row);
    }

    #[tokio::test]
    async fn test_rerun_adds_nothing() {
        let (store, sink, ctx) = testing::context("");
        let seed = seed_with(small(250));

        let first = Seed::seed(&seed, &ctx).await.unwrap();
        let second = Seed::seed(&seed, &ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second, ScriptExecutionRefs { total_seeded: 250 });
        assert_eq!(store.rows("script_execution").len(), 250);
        assert!(sink.contains("Submitted 250 script_execution records (250 new)"));
        assert!(sink.contains("Submitted 250 script_execution records (0 new)"));
    }

    #[tokio::test]
    async fn test_clean_deletes_by_schedule_set() {
        let (store, _sink, ctx) = testing::context("");
        let seed = seed_with(small(120));
        Seed::seed(&seed, &ctx).await.unwrap();

        // A row outside the seeded schedules survives cleanup
        let mut foreign = seed.execution(0).unwrap();
        foreign.schedule_id = 42;
        ctx.table::<ScriptExecution>().create(&foreign).await.unwrap();

        // A different volume still cleans everything it could have seeded
        Seed::clean(&seed_with(small(10)), &ctx, None).await.unwrap();

        let rows = store.rows("script_execution");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["schedule_id"], 42);
    }

    #[tokio::test]
    async fn test_empty_parents_are_a_precondition_error() {
        let (_store, _sink, ctx) = testing::context("");
        let seed = ScriptExecutionSeed::new(
            ScriptReferenceRefs::planned(),
            ScriptVersionRefs {
                script_version_ids: Vec::new(),
            },
            TaskScheduleRefs::planned(),
        );

        let err = Seed::seed(&seed, &ctx).await.unwrap_err();
        assert!(matches!(err, SeedError::Precondition(msg) if msg.contains("script_version")));
    }
}
