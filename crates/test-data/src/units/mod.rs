//! Seed units for the tinybots fixture schema, in run order.

mod provider;
mod robot;
mod script_execution;
mod script_reference;
mod script_version;
mod status;
mod task_schedule;
mod triggered;

pub use provider::{EventProviderRefs, EventProviderSeed};
pub use robot::{RobotAccountRefs, RobotAccountSeed};
pub use script_execution::{ScriptExecutionRefs, ScriptExecutionSeed};
pub use script_reference::{ScriptReferenceRefs, ScriptReferenceSeed};
pub use script_version::{ScriptVersionRefs, ScriptVersionSeed};
pub use status::{RobotAccountStatusRefs, RobotAccountStatusSeed};
pub use task_schedule::{TaskScheduleRefs, TaskScheduleSeed};
pub use triggered::{MicroManagerTriggeredApisRefs, MicroManagerTriggeredApisSeed};

/// The single fixture robot every script and event fixture belongs to.
pub const ROBOT_ID: i64 = 1;

/// Pre-hashed password shared by the fixture robot and user accounts.
pub(crate) const SEED_PASSWORD: &str =
    "PBKDF2WithHmacSHA512:1024:18:NDdUxqBLUpif/OQI9KWTm0B4VkyRamu8:eus+wi62zGmjEh/QJiJF2Sfe";
