use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use seeding::prelude::*;

use crate::models::TaskSchedule;

/// Schedule ids start high to stay clear of hand-made schedules.
const ID_BASE: i64 = 1_000_000;
const COUNT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskScheduleRefs {
    pub schedule_ids: Vec<i64>,
}

impl TaskScheduleRefs {
    /// Ids 1_000_001..=1_000_100.
    pub fn planned() -> Self {
        Self {
            schedule_ids: (ID_BASE + 1..=ID_BASE + COUNT).collect(),
        }
    }
}

/// A hundred daily 09:00 cron schedules, starting an hour apart.
#[derive(Debug, Default)]
pub struct TaskScheduleSeed;

impl TaskScheduleSeed {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Seed for TaskScheduleSeed {
    type Refs = TaskScheduleRefs;

    fn name(&self) -> &str {
        "task_schedule"
    }

    fn describe(&self) -> String {
        format!("task_schedule (ids {}..={})", ID_BASE + 1, ID_BASE + COUNT)
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<TaskScheduleRefs, SeedError> {
        let table = ctx.table::<TaskSchedule>();
        ctx.log(format!("Seeding {COUNT} task_schedule records..."));

        let now = OffsetDateTime::now_utc();
        let mut ids = Vec::with_capacity(COUNT as usize);
        for i in 1..=COUNT {
            let schedule = table
                .ensure(&TaskSchedule {
                    id: ID_BASE + i,
                    duration: 60,
                    recurrence_type: "CRON".to_string(),
                    minute: "0".to_string(),
                    hour: "9".to_string(),
                    day_of_month: "*".to_string(),
                    month: "*".to_string(),
                    day_of_week: "*".to_string(),
                    start_at: now + Duration::hours(i),
                    created_at: now,
                })
                .await?;
            ids.push(schedule.id);
        }

        ctx.log(format!("Seeded {COUNT} task_schedule records"));
        Ok(TaskScheduleRefs { schedule_ids: ids })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        _refs: Option<&TaskScheduleRefs>,
    ) -> Result<(), SeedError> {
        let deleted = ctx
            .table::<TaskSchedule>()
            .delete_many(&Filter::between("id", ID_BASE, ID_BASE + COUNT))
            .await?;
        ctx.log(format!("Cleaned {deleted} task_schedule records"));
        Ok(())
    }
}
