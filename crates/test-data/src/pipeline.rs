//! Unit wiring for the `seed` binary.
//!
//! Seeding is staged: each unit is constructed from the references the previous
//! units actually returned. Cleaning and dry runs cannot wait for references, so
//! they build the same units from the deterministic ids each unit always owns.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use seeding::prelude::*;

use crate::config::SeedConfig;
use crate::units::{
    EventProviderSeed, MicroManagerTriggeredApisSeed, RobotAccountRefs, RobotAccountSeed,
    RobotAccountStatusRefs, RobotAccountStatusSeed, ScriptExecutionSeed, ScriptReferenceRefs,
    ScriptReferenceSeed, ScriptVersionRefs, ScriptVersionSeed, TaskScheduleRefs, TaskScheduleSeed,
};

/// Scope that seeds the triggered-APIs graph instead of the script executions.
pub const MICRO_MANAGER_SCOPE: &str = "micro-manager-triggered";

/// Handle name of the optional dashboard database.
pub const DASHBOARD_HANDLE: &str = "dashboard";

/// What a run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Seed,
    Clean,
    DryRun,
}

/// Which units a planned sequence contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The units a seed run in this scope would execute.
    Scope,
    /// Every unit, whatever the scope.
    All,
}

/// An in-memory store with the same unique constraints as the SQL schema.
pub fn memory_store() -> MemoryStore {
    MemoryStore::new()
        .with_unique("robot_account", &["username"])
        .with_unique("script_execution", &["schedule_id", "planned"])
        .with_unique("user_robot", &["user_id", "robot_id"])
}

/// Opens the primary database, and the dashboard database when configured.
///
/// With `migrate`, applies the bundled schema migrations to the primary database
/// before anything else touches it.
pub async fn open_context(
    config: &SeedConfig,
    scope: &str,
    migrate: bool,
) -> Result<SeedContext, SeedError> {
    let primary = PgStore::connect(&config.database_url, config.max_connections).await?;
    info!("Connected to database");

    if migrate {
        if let Err(e) = sqlx::migrate!("./migrations").run(primary.pool()).await {
            primary.close().await;
            return Err(StoreError::from(e).into());
        }
        info!("Migrations applied");
    }
    let mut ctx = SeedContext::new(scope, Arc::new(primary));

    if let Some(url) = &config.dashboard_database_url {
        match PgStore::connect(url, config.max_connections).await {
            Ok(dashboard) => ctx = ctx.with_handle(DASHBOARD_HANDLE, Arc::new(dashboard)),
            Err(e) => {
                ctx.destroy().await;
                return Err(e.into());
            }
        }
    }
    Ok(ctx)
}

/// Every unit for `scope`, built from deterministic references.
pub fn planned(scope: &str, executions: &BatchConfig, selection: Selection) -> Orchestrator {
    let robot = RobotAccountRefs::planned(scope);
    let mut orchestrator = Orchestrator::default();
    orchestrator.push(RobotAccountStatusSeed::new());
    orchestrator.push(RobotAccountSeed::new(RobotAccountStatusRefs::planned()));
    orchestrator.push(EventProviderSeed::new());

    let triggered = scope == MICRO_MANAGER_SCOPE;
    if selection == Selection::All || !triggered {
        orchestrator.push(ScriptReferenceSeed::new(robot.clone()));
        orchestrator.push(ScriptVersionSeed::new(ScriptReferenceRefs::planned()));
        orchestrator.push(TaskScheduleSeed::new());
        // Version ids are generated, so none are known up front
        orchestrator.push(
            ScriptExecutionSeed::new(
                ScriptReferenceRefs::planned(),
                ScriptVersionRefs {
                    script_version_ids: Vec::new(),
                },
                TaskScheduleRefs::planned(),
            )
            .with_config(executions.clone()),
        );
    }
    if selection == Selection::All || triggered {
        orchestrator.push(MicroManagerTriggeredApisSeed::new(robot));
    }
    orchestrator
}

/// Seeds every unit for the context's scope, stage by stage.
///
/// Returns the orchestrator holding the units that ran, in run order.
pub async fn seed_all(ctx: &SeedContext, executions: &BatchConfig) -> Result<Orchestrator, SeedError> {
    let mut orchestrator = Orchestrator::default();

    let status = orchestrator.run_unit(ctx, RobotAccountStatusSeed::new()).await?;
    let robot = orchestrator.run_unit(ctx, RobotAccountSeed::new(status)).await?;
    orchestrator.run_unit(ctx, EventProviderSeed::new()).await?;

    if ctx.scope() == MICRO_MANAGER_SCOPE {
        orchestrator
            .run_unit(ctx, MicroManagerTriggeredApisSeed::new(robot))
            .await?;
        return Ok(orchestrator);
    }

    let references = orchestrator.run_unit(ctx, ScriptReferenceSeed::new(robot)).await?;
    let versions = orchestrator
        .run_unit(ctx, ScriptVersionSeed::new(references.clone()))
        .await?;
    let schedules = orchestrator.run_unit(ctx, TaskScheduleSeed::new()).await?;
    orchestrator
        .run_unit(
            ctx,
            ScriptExecutionSeed::new(references, versions, schedules)
                .with_config(executions.clone()),
        )
        .await?;

    Ok(orchestrator)
}

/// Removes every fixture row, most dependent units first.
pub async fn clean_all(ctx: &SeedContext, executions: &BatchConfig) -> Result<(), SeedError> {
    planned(ctx.scope(), executions, Selection::All)
        .clean(ctx)
        .await?;
    ctx.log("Clean complete");
    Ok(())
}

/// Describes the units a seed run in this scope would execute.
pub async fn dry_run(ctx: &SeedContext, executions: &BatchConfig) -> Result<(), SeedError> {
    planned(ctx.scope(), executions, Selection::Scope)
        .run(ctx, true)
        .await
}

/// Runs `mode`; a seed run returns the registry snapshot.
pub async fn execute(
    ctx: &SeedContext,
    mode: Mode,
    executions: &BatchConfig,
) -> Result<Option<Value>, SeedError> {
    match mode {
        Mode::Seed => {
            seed_all(ctx, executions).await?;
            Ok(Some(ctx.registry().snapshot()))
        }
        Mode::Clean => {
            clean_all(ctx, executions).await?;
            Ok(None)
        }
        Mode::DryRun => {
            dry_run(ctx, executions).await?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planned_selection() {
        let config = BatchConfig::default();

        let base = planned("", &config, Selection::Scope);
        assert_eq!(
            base.names(),
            vec![
                "robot_account_status",
                "robot_account",
                "event_provider",
                "script_reference",
                "script_version",
                "task_schedule",
                "script_execution",
            ]
        );

        let triggered = planned(MICRO_MANAGER_SCOPE, &config, Selection::Scope);
        assert_eq!(
            triggered.names(),
            vec![
                "robot_account_status",
                "robot_account",
                "event_provider",
                "micro_manager_triggered_apis",
            ]
        );

        let all = planned(MICRO_MANAGER_SCOPE, &config, Selection::All);
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn test_planned_order_is_valid() {
        let config = BatchConfig::default();
        for scope in ["", MICRO_MANAGER_SCOPE] {
            planned(scope, &config, Selection::All).validate().unwrap();
            planned(scope, &config, Selection::Scope).validate().unwrap();
        }
    }
}
