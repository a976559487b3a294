use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use seeding::prelude::*;

use super::{ROBOT_ID, RobotAccountStatusRefs, SEED_PASSWORD};
use crate::models::RobotAccount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotAccountRefs {
    pub robot_id: i64,
    /// Scoped name handed to downstream tooling; the stored username is fixed.
    pub username: String,
}

impl RobotAccountRefs {
    pub fn planned(scope: &str) -> Self {
        Self {
            robot_id: ROBOT_ID,
            username: format!("robot-{scope}"),
        }
    }
}

/// The fixture robot account. Always id 1, overwritten on every run.
#[derive(Debug)]
pub struct RobotAccountSeed {
    status: RobotAccountStatusRefs,
}

impl RobotAccountSeed {
    pub fn new(status: RobotAccountStatusRefs) -> Self {
        Self { status }
    }
}

#[async_trait]
impl Seed for RobotAccountSeed {
    type Refs = RobotAccountRefs;

    fn name(&self) -> &str {
        "robot_account"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["robot_account_status"]
    }

    fn describe(&self) -> String {
        format!(
            "robot_account (id={ROBOT_ID}, status={})",
            self.status.status_id
        )
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<RobotAccountRefs, SeedError> {
        let robot = ctx
            .table::<RobotAccount>()
            .upsert(&RobotAccount {
                id: ROBOT_ID,
                username: format!("username-{ROBOT_ID}"),
                password: SEED_PASSWORD.to_string(),
                role: "robot".to_string(),
                account_status_id: self.status.status_id,
            })
            .await?;
        Ok(RobotAccountRefs {
            robot_id: robot.id,
            username: format!("robot-{}", ctx.scope()),
        })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        refs: Option<&RobotAccountRefs>,
    ) -> Result<(), SeedError> {
        let id = refs.map_or(ROBOT_ID, |r| r.robot_id);
        ctx.table::<RobotAccount>()
            .delete_many(&Filter::eq("id", id))
            .await?;
        Ok(())
    }
}
