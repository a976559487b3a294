use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use seeding::prelude::*;

use crate::models::RobotAccountStatus;

const STATUS_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobotAccountStatusRefs {
    pub status_id: i64,
}

impl RobotAccountStatusRefs {
    /// The fixed status row, known without seeding.
    pub fn planned() -> Self {
        Self {
            status_id: STATUS_ID,
        }
    }
}

/// The `active` robot account status.
#[derive(Debug, Default)]
pub struct RobotAccountStatusSeed;

impl RobotAccountStatusSeed {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Seed for RobotAccountStatusSeed {
    type Refs = RobotAccountStatusRefs;

    fn name(&self) -> &str {
        "robot_account_status"
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<RobotAccountStatusRefs, SeedError> {
        let status = ctx
            .table::<RobotAccountStatus>()
            .ensure(&RobotAccountStatus {
                id: STATUS_ID,
                name: "active".to_string(),
            })
            .await?;
        Ok(RobotAccountStatusRefs {
            status_id: status.id,
        })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        refs: Option<&RobotAccountStatusRefs>,
    ) -> Result<(), SeedError> {
        let id = refs.map_or(STATUS_ID, |r| r.status_id);
        ctx.table::<RobotAccountStatus>()
            .delete_many(&Filter::eq("id", id))
            .await?;
        Ok(())
    }
}
