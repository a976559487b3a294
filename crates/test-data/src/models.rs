//! Row types of the tinybots fixture schema.
//!
//! Field names match the column names in `migrations/`. Keys generated by the
//! database are `Option`s and left out of the insert when `None`.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use seeding::store::Entity;

macro_rules! entity {
    ($ty:ty, $table:literal) => {
        impl Entity for $ty {
            const TABLE: &'static str = $table;
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotAccountStatus {
    pub id: i64,
    pub name: String,
}
entity!(RobotAccountStatus, "robot_account_status");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotAccount {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub account_status_id: i64,
}
entity!(RobotAccount, "robot_account");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventProvider {
    pub id: i64,
    pub name: String,
}
entity!(EventProvider, "event_provider");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptReference {
    pub id: i64,
    pub robot_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
entity!(ScriptReference, "script_reference");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptCategory {
    pub id: i64,
    pub name: String,
}
entity!(ScriptCategory, "script_category");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptVersion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub script_reference_id: i64,
    pub script_name: String,
    /// Seconds.
    pub duration: i64,
    #[serde(default)]
    pub script_category_id: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
entity!(ScriptVersion, "script_version");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSchedule {
    pub id: i64,
    /// Minutes.
    pub duration: i64,
    pub recurrence_type: String,
    pub minute: String,
    pub hour: String,
    pub day_of_month: String,
    pub month: String,
    pub day_of_week: String,
    #[serde(with = "time::serde::rfc3339")]
    pub start_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
entity!(TaskSchedule, "task_schedule");

/// One planned run of a script; the high-volume table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptExecution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub script_reference_id: i64,
    pub script_version_id: i64,
    pub schedule_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub planned: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
entity!(ScriptExecution, "script_execution");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepType {
    pub id: i64,
    pub name: String,
}
entity!(StepType, "step_type");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub id: i64,
    pub step_type_id: i64,
    pub script_version_id: i64,
    pub first: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
entity!(ScriptStep, "script_step");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub email: String,
    pub password: String,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub eula_accepted_at: Option<OffsetDateTime>,
}
entity!(UserAccount, "user_account");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRobotRole {
    pub id: i64,
    pub role: String,
}
entity!(UserRobotRole, "user_robot_role");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRelationRole {
    pub id: i64,
    pub name: String,
}
entity!(ClientRelationRole, "client_relation_role");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRobot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub user_id: i64,
    pub robot_id: i64,
    pub role_id: i64,
    pub client_relation_role_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
entity!(UserRobot, "user_robot");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSchema {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub level: i64,
    pub is_active: bool,
    pub has_trigger: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
entity!(EventSchema, "event_schema");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubscription {
    pub id: i64,
    pub robot_id: i64,
    pub subscription_type: i64,
    pub queue: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
entity!(EventSubscription, "event_subscription");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingEvent {
    pub id: i64,
    pub event_type_id: i64,
    pub level: i64,
    pub robot_id: i64,
    pub provider_id: i64,
    pub reference_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
entity!(IncomingEvent, "incoming_event");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingEvent {
    pub id: i64,
    pub source_event_id: i64,
    pub subscription_id: i64,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
entity!(OutgoingEvent, "outgoing_event");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTriggerSetting {
    pub id: i64,
    pub robot_id: i64,
    pub event_type_id: i64,
    pub default_script_reference_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
entity!(EventTriggerSetting, "event_trigger_setting");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrigger {
    pub id: i64,
    pub setting_id: i64,
    pub robot_id: i64,
    pub status: String,
    pub script_reference_id: i64,
    pub outgoing_event_id: i64,
    pub level: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub executed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expected_executed_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
entity!(EventTrigger, "event_trigger");
