//! Fixtures for the micro-manager triggered-APIs flow.
//!
//! A complete fixed-id chain from an incoming event to an executed trigger of a
//! two-step script, owned by the fixture robot and a fixture user.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use seeding::prelude::*;

use super::{RobotAccountRefs, SEED_PASSWORD};
use crate::models::{
    ClientRelationRole, EventProvider, EventSchema, EventSubscription, EventTrigger,
    EventTriggerSetting, IncomingEvent, OutgoingEvent, ScriptCategory, ScriptExecution,
    ScriptReference, ScriptStep, ScriptVersion, StepType, UserAccount, UserRobot, UserRobotRole,
};

const USER_ID: i64 = 1;
const USER_EMAIL: &str = "seed-user@tinybots.local";
const OWNER_ROLE_ID: i64 = 1;
const OWNER_RELATION_ID: i64 = 4;
const DEFAULT_CATEGORY_ID: i64 = 1;

const SCRIPT_REFERENCE_ID: i64 = 9001;
const SCRIPT_VERSION_ID: i64 = 9001;
const SCRIPT_STEP_IDS: [i64; 2] = [9101, 9102];
const EVENT_SCHEMA_ID: i64 = 9201;
const TRIGGER_SETTING_ID: i64 = 9301;
const SUBSCRIPTION_ID: i64 = 9401;
const INCOMING_EVENT_ID: i64 = 9501;
const OUTGOING_EVENT_ID: i64 = 9601;
const TRIGGER_ID: i64 = 9701;

/// Event schema name; also the trigger name clients look for.
pub const TRIGGER_NAME: &str = "seed.micro-manager.trigger";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroManagerTriggeredApisRefs {
    pub robot_id: i64,
    pub user_id: i64,
    pub script_reference_id: i64,
    pub script_version_id: i64,
    pub script_step_ids: Vec<i64>,
    pub triggering_event_id: i64,
    pub trigger_name: String,
}

#[derive(Debug)]
pub struct MicroManagerTriggeredApisSeed {
    robot: RobotAccountRefs,
}

impl MicroManagerTriggeredApisSeed {
    pub fn new(robot: RobotAccountRefs) -> Self {
        Self { robot }
    }

    /// Queue and reference name, namespaced by the run scope.
    fn scoped_name(ctx: &SeedContext) -> String {
        format!("seed.micro-manager.{}", ctx.scope())
    }

    async fn seed_user(&self, ctx: &SeedContext, now: OffsetDateTime) -> Result<(), SeedError> {
        let robot_id = self.robot.robot_id;

        let user = ctx.table::<UserAccount>();
        let mut account = match user.find(USER_ID).await? {
            Some(existing) => existing,
            None => UserAccount {
                id: USER_ID,
                email: USER_EMAIL.to_string(),
                password: SEED_PASSWORD.to_string(),
                eula_accepted_at: Some(now),
            },
        };
        account.email = USER_EMAIL.to_string();
        user.upsert(&account).await?;

        ctx.table::<UserRobotRole>()
            .ensure(&UserRobotRole {
                id: OWNER_ROLE_ID,
                role: "owner".to_string(),
            })
            .await?;
        ctx.table::<ClientRelationRole>()
            .ensure(&ClientRelationRole {
                id: OWNER_RELATION_ID,
                name: "owner".to_string(),
            })
            .await?;

        let link = Filter::eq("user_id", USER_ID).and(Filter::eq("robot_id", robot_id));
        let user_robot = ctx.table::<UserRobot>();
        if user_robot.find_first(&link, None).await?.is_none() {
            user_robot
                .create(&UserRobot {
                    id: None,
                    user_id: USER_ID,
                    robot_id,
                    role_id: OWNER_ROLE_ID,
                    client_relation_role_id: OWNER_RELATION_ID,
                    created_at: now,
                })
                .await?;
        }
        Ok(())
    }

    async fn seed_script(
        &self,
        ctx: &SeedContext,
        step_type_id: i64,
        now: OffsetDateTime,
    ) -> Result<(), SeedError> {
        ctx.table::<ScriptReference>()
            .ensure(&ScriptReference {
                id: SCRIPT_REFERENCE_ID,
                robot_id: self.robot.robot_id,
                created_at: now,
            })
            .await?;

        let categories = ctx.table::<ScriptCategory>();
        let category = match categories.find_first(&Filter::All, Some(&Order::asc("id"))).await? {
            Some(category) => category,
            None => {
                categories
                    .create(&ScriptCategory {
                        id: DEFAULT_CATEGORY_ID,
                        name: "seed".to_string(),
                    })
                    .await?
            }
        };

        ctx.table::<ScriptVersion>()
            .ensure(&ScriptVersion {
                id: Some(SCRIPT_VERSION_ID),
                script_reference_id: SCRIPT_REFERENCE_ID,
                script_name: "Seed Triggered Script".to_string(),
                duration: 10,
                script_category_id: Some(category.id),
                created_at: now,
            })
            .await?;

        let steps = ctx.table::<ScriptStep>();
        for (i, id) in SCRIPT_STEP_IDS.into_iter().enumerate() {
            steps
                .ensure(&ScriptStep {
                    id,
                    step_type_id,
                    script_version_id: SCRIPT_VERSION_ID,
                    first: i == 0,
                    created_at: now,
                })
                .await?;
        }
        Ok(())
    }

    async fn seed_events(
        &self,
        ctx: &SeedContext,
        provider_id: i64,
        now: OffsetDateTime,
    ) -> Result<(), SeedError> {
        let robot_id = self.robot.robot_id;
        let scoped = Self::scoped_name(ctx);

        ctx.table::<EventSchema>()
            .ensure(&EventSchema {
                id: EVENT_SCHEMA_ID,
                name: TRIGGER_NAME.to_string(),
                description: "seed event schema for micro-manager triggered apis".to_string(),
                level: 1,
                is_active: true,
                has_trigger: true,
                created_at: now,
                updated_at: now,
            })
            .await?;

        ctx.table::<EventSubscription>()
            .ensure(&EventSubscription {
                id: SUBSCRIPTION_ID,
                robot_id,
                subscription_type: 1,
                queue: scoped.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        ctx.table::<IncomingEvent>()
            .ensure(&IncomingEvent {
                id: INCOMING_EVENT_ID,
                event_type_id: EVENT_SCHEMA_ID,
                level: 1,
                robot_id,
                provider_id,
                reference_id: scoped,
                created_at: now,
                updated_at: now,
            })
            .await?;

        ctx.table::<OutgoingEvent>()
            .ensure(&OutgoingEvent {
                id: OUTGOING_EVENT_ID,
                source_event_id: INCOMING_EVENT_ID,
                subscription_id: SUBSCRIPTION_ID,
                status: "seeded".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        ctx.table::<EventTriggerSetting>()
            .ensure(&EventTriggerSetting {
                id: TRIGGER_SETTING_ID,
                robot_id,
                event_type_id: EVENT_SCHEMA_ID,
                default_script_reference_id: SCRIPT_REFERENCE_ID,
                created_at: now,
                updated_at: now,
            })
            .await?;

        ctx.table::<EventTrigger>()
            .ensure(&EventTrigger {
                id: TRIGGER_ID,
                setting_id: TRIGGER_SETTING_ID,
                robot_id,
                status: "executed".to_string(),
                script_reference_id: SCRIPT_REFERENCE_ID,
                outgoing_event_id: OUTGOING_EVENT_ID,
                level: 1,
                executed_at: now,
                expected_executed_at: now,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Seed for MicroManagerTriggeredApisSeed {
    type Refs = MicroManagerTriggeredApisRefs;

    fn name(&self) -> &str {
        "micro_manager_triggered_apis"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["robot_account", "event_provider"]
    }

    fn describe(&self) -> String {
        format!(
            "micro_manager_triggered_apis (robotId={}, scriptReferenceId={SCRIPT_REFERENCE_ID}, triggeringEventId={TRIGGER_ID})",
            self.robot.robot_id
        )
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<MicroManagerTriggeredApisRefs, SeedError> {
        let by_id = Order::asc("id");
        let step_type = ctx
            .table::<StepType>()
            .find_first(&Filter::All, Some(&by_id))
            .await?
            .ok_or_else(|| {
                SeedError::Precondition(
                    "no step_type rows found; schema migrations likely not applied".to_string(),
                )
            })?;
        let provider = ctx
            .table::<EventProvider>()
            .find_first(&Filter::All, Some(&by_id))
            .await?
            .ok_or_else(|| {
                SeedError::Precondition(
                    "no event_provider rows found; run the base seeds first".to_string(),
                )
            })?;

        let now = OffsetDateTime::now_utc();
        self.seed_user(ctx, now).await?;
        self.seed_script(ctx, step_type.id, now).await?;
        self.seed_events(ctx, provider.id, now).await?;

        Ok(MicroManagerTriggeredApisRefs {
            robot_id: self.robot.robot_id,
            user_id: USER_ID,
            script_reference_id: SCRIPT_REFERENCE_ID,
            script_version_id: SCRIPT_VERSION_ID,
            script_step_ids: SCRIPT_STEP_IDS.to_vec(),
            triggering_event_id: TRIGGER_ID,
            trigger_name: TRIGGER_NAME.to_string(),
        })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        _refs: Option<&MicroManagerTriggeredApisRefs>,
    ) -> Result<(), SeedError> {
        ctx.table::<ScriptExecution>()
            .delete_many(&Filter::eq("script_reference_id", SCRIPT_REFERENCE_ID))
            .await?;
        ctx.table::<EventTrigger>()
            .delete_many(&Filter::eq("id", TRIGGER_ID))
            .await?;
        ctx.table::<EventTriggerSetting>()
            .delete_many(&Filter::eq("id", TRIGGER_SETTING_ID))
            .await?;
        ctx.table::<OutgoingEvent>()
            .delete_many(&Filter::eq("id", OUTGOING_EVENT_ID))
            .await?;
        ctx.table::<IncomingEvent>()
            .delete_many(&Filter::eq("id", INCOMING_EVENT_ID))
            .await?;
        ctx.table::<EventSubscription>()
            .delete_many(&Filter::eq("id", SUBSCRIPTION_ID))
            .await?;
        ctx.table::<EventSchema>()
            .delete_many(&Filter::eq("id", EVENT_SCHEMA_ID))
            .await?;
        ctx.table::<ScriptStep>()
            .delete_many(&Filter::one_of("id", SCRIPT_STEP_IDS))
            .await?;
        ctx.table::<ScriptVersion>()
            .delete_many(&Filter::eq("id", SCRIPT_VERSION_ID))
            .await?;
        ctx.table::<ScriptReference>()
            .delete_many(&Filter::eq("id", SCRIPT_REFERENCE_ID))
            .await?;
        ctx.table::<UserRobot>()
            .delete_many(
                &Filter::eq("user_id", USER_ID).and(Filter::eq("robot_id", self.robot.robot_id)),
            )
            .await?;
        ctx.table::<UserAccount>()
            .delete_many(&Filter::eq("id", USER_ID))
            .await?;
        ctx.log("Cleaned micro_manager_triggered_apis seed data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::testing;

    async fn insert_step_type(ctx: &SeedContext) {
        ctx.table::<StepType>()
            .create(&StepType {
                id: 1,
                name: "say".to_string(),
            })
            .await
            .unwrap();
    }

    async fn insert_provider(ctx: &SeedContext) {
        ctx.table::<EventProvider>()
            .create(&EventProvider {
                id: 1,
                name: "seed-provider".to_string(),
            })
            .await
            .unwrap();
    }

    const TABLES: [&str; 13] = [
        "user_account",
        "user_robot",
        "script_reference",
        "script_version",
        "script_step",
        "event_schema",
        "event_subscription",
        "incoming_event",
        "outgoing_event",
        "event_trigger_setting",
        "event_trigger",
        "user_robot_role",
        "client_relation_role",
    ];

    #[tokio::test]
    async fn test_seed_twice_creates_one_graph() {
        let (store, _sink, ctx) = testing::context("micro-manager-triggered");
        insert_step_type(&ctx).await;
        insert_provider(&ctx).await;
        let seed = MicroManagerTriggeredApisSeed::new(RobotAccountRefs::planned(ctx.scope()));

        let first = Seed::seed(&seed, &ctx).await.unwrap();
        let second = Seed::seed(&seed, &ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.script_step_ids, vec![9101, 9102]);
        assert_eq!(first.trigger_name, TRIGGER_NAME);
        for table in TABLES {
            let expected = if table == "script_step" { 2 } else { 1 };
            assert_eq!(store.rows(table).len(), expected, "{table}");
        }

        let incoming = &store.rows("incoming_event")[0];
        assert_eq!(
            incoming["reference_id"],
            "seed.micro-manager.micro-manager-triggered"
        );
    }

    #[tokio::test]
    async fn test_missing_step_type_is_fatal() {
        let (store, _sink, ctx) = testing::context("");
        insert_provider(&ctx).await;
        let seed = MicroManagerTriggeredApisSeed::new(RobotAccountRefs::planned(""));

        let err = Seed::seed(&seed, &ctx).await.unwrap_err();

        assert!(matches!(err, SeedError::Precondition(msg) if msg.contains("step_type")));
        assert!(store.rows("user_account").is_empty(), "nothing written");
    }

    #[tokio::test]
    async fn test_missing_provider_is_fatal() {
        let (_store, _sink, ctx) = testing::context("");
        insert_step_type(&ctx).await;
        let seed = MicroManagerTriggeredApisSeed::new(RobotAccountRefs::planned(""));

        let err = Seed::seed(&seed, &ctx).await.unwrap_err();

        assert!(matches!(err, SeedError::Precondition(msg) if msg.contains("event_provider")));
    }

    #[tokio::test]
    async fn test_clean_keeps_shared_lookups() {
        let (store, _sink, ctx) = testing::context("");
        insert_step_type(&ctx).await;
        insert_provider(&ctx).await;
        let seed = MicroManagerTriggeredApisSeed::new(RobotAccountRefs::planned(""));
        Seed::seed(&seed, &ctx).await.unwrap();

        Seed::clean(&seed, &ctx, None).await.unwrap();

        for table in &TABLES[..11] {
            assert!(store.rows(table).is_empty(), "{table}");
        }
        assert_eq!(store.rows("user_robot_role").len(), 1);
        assert_eq!(store.rows("script_category").len(), 1);
        assert_eq!(store.rows("step_type").len(), 1);
    }
}
