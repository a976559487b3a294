use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use seeding::prelude::*;

use super::RobotAccountRefs;
use crate::models::ScriptReference;

const FIRST_ID: i64 = 1;
const LAST_ID: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptReferenceRefs {
    pub script_reference_ids: Vec<i64>,
}

impl ScriptReferenceRefs {
    /// Ids 1..=10, the rows this unit always owns.
    pub fn planned() -> Self {
        Self {
            script_reference_ids: (FIRST_ID..=LAST_ID).collect(),
        }
    }
}

/// Ten script references owned by the fixture robot.
#[derive(Debug)]
pub struct ScriptReferenceSeed {
    robot: RobotAccountRefs,
}

impl ScriptReferenceSeed {
    pub fn new(robot: RobotAccountRefs) -> Self {
        Self { robot }
    }
}

#[async_trait]
impl Seed for ScriptReferenceSeed {
    type Refs = ScriptReferenceRefs;

    fn name(&self) -> &str {
        "script_reference"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["robot_account"]
    }

    fn describe(&self) -> String {
        format!(
            "script_reference (ids {FIRST_ID}..={LAST_ID}, robot={})",
            self.robot.robot_id
        )
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<ScriptReferenceRefs, SeedError> {
        let table = ctx.table::<ScriptReference>();
        let count = LAST_ID - FIRST_ID + 1;
        ctx.log(format!("Seeding {count} script_reference records..."));

        let now = OffsetDateTime::now_utc();
        let mut ids = Vec::with_capacity(count as usize);
        for id in FIRST_ID..=LAST_ID {
            let reference = table
                .ensure(&ScriptReference {
                    id,
                    robot_id: self.robot.robot_id,
                    created_at: now,
                })
                .await?;
            ids.push(reference.id);
        }

        ctx.log(format!("Seeded {} script_reference records", ids.len()));
        Ok(ScriptReferenceRefs {
            script_reference_ids: ids,
        })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        _refs: Option<&ScriptReferenceRefs>,
    ) -> Result<(), SeedError> {
        let deleted = ctx
            .table::<ScriptReference>()
            .delete_many(&Filter::between("id", FIRST_ID, LAST_ID))
            .await?;
        ctx.log(format!("Cleaned {deleted} script_reference records"));
        Ok(())
    }
}
