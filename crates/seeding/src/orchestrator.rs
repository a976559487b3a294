//! Ordered execution and reverse-order cleanup of seed units.
//!
//! Units run strictly one after another in the order the caller declares. The
//! orchestrator performs no topological sort: a unit's constructor already embeds
//! the references of the units it depends on, so the caller must have run those
//! first. [`Orchestrator::validate`] catches the declared-dependency mistakes it can
//! see; anything else surfaces as a store error or empty references at seed time.

use tracing::{error, info};

use crate::context::SeedContext;
use crate::error::SeedError;
use crate::unit::{Seed, SeedUnit};

/// A caller-ordered sequence of seed units.
#[derive(Default)]
pub struct Orchestrator {
    units: Vec<Box<dyn SeedUnit>>,
}

impl Orchestrator {
    pub fn new(units: Vec<Box<dyn SeedUnit>>) -> Self {
        Self { units }
    }

    /// Appends a unit to the end of the sequence.
    pub fn push(&mut self, unit: impl SeedUnit + 'static) {
        self.units.push(Box::new(unit));
    }

    /// Unit names in run order.
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Fails if a unit is declared before one of its declared dependencies.
    ///
    /// Dependencies that are not part of this sequence are assumed to be
    /// provided by an earlier run and are not checked.
    pub fn validate(&self) -> Result<(), SeedError> {
        for (position, unit) in self.units.iter().enumerate() {
            for dependency in unit.depends_on() {
                let later = self.units[position..]
                    .iter()
                    .any(|u| u.name() == *dependency);
                if later {
                    return Err(SeedError::Ordering {
                        unit: unit.name().to_string(),
                        dependency: dependency.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Seeds every unit in order, recording each unit's references in the registry.
    ///
    /// With `dry_run`, only describes each unit; nothing is seeded.
    pub async fn run(&self, ctx: &SeedContext, dry_run: bool) -> Result<(), SeedError> {
        self.validate()?;

        if dry_run {
            ctx.log(format!("Dry run: {} units", self.units.len()));
            for unit in &self.units {
                ctx.log(format!("[dry-run] {}", unit.describe()));
            }
            return Ok(());
        }

        info!("Seeding {} units", self.units.len());
        for unit in &self.units {
            ctx.log(format!("Seeding {}", unit.describe()));
            let refs = unit
                .seed(ctx)
                .await
                .map_err(|e| SeedError::in_unit(unit.name(), e))?;
            ctx.registry().record(unit.name(), refs);
        }
        Ok(())
    }

    /// Seeds one unit now and appends it to the sequence, returning its typed references.
    ///
    /// Used to build a run stage by stage when later units must be constructed from
    /// earlier units' references. Every declared dependency must already be in the
    /// context registry.
    pub async fn run_unit<S>(&mut self, ctx: &SeedContext, unit: S) -> Result<S::Refs, SeedError>
    where
        S: Seed + 'static,
    {
        let name = Seed::name(&unit).to_string();
        if let Some(missing) = Seed::depends_on(&unit)
            .iter()
            .find(|dependency| !ctx.registry().contains(dependency))
        {
            return Err(SeedError::Ordering {
                unit: name,
                dependency: missing.to_string(),
            });
        }

        ctx.log(format!("Seeding {}", Seed::describe(&unit)));
        let refs = Seed::seed(&unit, ctx)
            .await
            .map_err(|e| SeedError::in_unit(&name, e))?;
        ctx.registry().record(&name, serde_json::to_value(&refs)?);
        self.units.push(Box::new(unit));
        Ok(refs)
    }

    /// Cleans every unit in reverse order.
    ///
    /// Stops at the first failure; the units after it in reverse order are left
    /// uncleaned and named in the error.
    pub async fn clean(&self, ctx: &SeedContext) -> Result<(), SeedError> {
        info!("Cleaning {} units", self.units.len());
        for (position, unit) in self.units.iter().enumerate().rev() {
            ctx.log(format!("Cleaning {}", unit.name()));
            if let Err(e) = unit.clean(ctx).await {
                let remaining: Vec<String> = self.units[..position]
                    .iter()
                    .rev()
                    .map(|u| u.name().to_string())
                    .collect();
                error!(
                    "Cleanup of {} failed; {} units not cleaned",
                    unit.name(),
                    remaining.len()
                );
                return Err(SeedError::CleanAborted {
                    unit: unit.name().to_string(),
                    remaining,
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde::Serialize;

    use super::*;
    use crate::store::MemoryStore;

    type Calls = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, Clone, Serialize)]
    struct SpyRefs {
        id: i64,
    }

    /// Records every call; optionally fails on clean.
    struct Spy {
        name: &'static str,
        id: i64,
        depends_on: Vec<&'static str>,
        fail_clean: bool,
        calls: Calls,
    }

    impl Spy {
        fn new(name: &'static str, id: i64, calls: &Calls) -> Self {
            Self {
                name,
                id,
                depends_on: Vec::new(),
                fail_clean: false,
                calls: calls.clone(),
            }
        }

        fn after(mut self, dependency: &'static str) -> Self {
            self.depends_on.push(dependency);
            self
        }

        fn failing_clean(mut self) -> Self {
            self.fail_clean = true;
            self
        }

        fn note(&self, call: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{}", call, self.name));
        }
    }

    #[async_trait]
    impl Seed for Spy {
        type Refs = SpyRefs;

        fn name(&self) -> &str {
            self.name
        }

        fn depends_on(&self) -> &[&'static str] {
            &self.depends_on
        }

        fn describe(&self) -> String {
            self.note("describe");
            format!("{} (id={})", self.name, self.id)
        }

        async fn seed(&self, _ctx: &SeedContext) -> Result<SpyRefs, SeedError> {
            self.note("seed");
            Ok(SpyRefs { id: self.id })
        }

        async fn clean(&self, _ctx: &SeedContext, _refs: Option<&SpyRefs>) -> Result<(), SeedError> {
            self.note("clean");
            if self.fail_clean {
                return Err(SeedError::Precondition(format!("{} is locked", self.name)));
            }
            Ok(())
        }
    }

    fn context() -> SeedContext {
        SeedContext::new("test", Arc::new(MemoryStore::new()))
    }

    fn chain(calls: &Calls) -> Orchestrator {
        Orchestrator::new(vec![
            Box::new(Spy::new("a", 1, calls)),
            Box::new(Spy::new("b", 2, calls).after("a")),
            Box::new(Spy::new("c", 3, calls).after("b")),
        ])
    }

    fn recorded(calls: &Calls, prefix: &str) -> Vec<String> {
        calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .cloned()
            .collect()
    }

    #[tokio::test]
    async fn test_run_seeds_in_order_and_records() {
        let calls = Calls::default();
        let ctx = context();

        chain(&calls).run(&ctx, false).await.unwrap();

        assert_eq!(recorded(&calls, "seed"), vec!["seed:a", "seed:b", "seed:c"]);
        assert_eq!(ctx.registry().names(), vec!["a", "b", "c"]);
        assert_eq!(ctx.registry().get("b"), Some(serde_json::json!({ "id": 2 })));
    }

    #[tokio::test]
    async fn test_dry_run_never_seeds() {
        let calls = Calls::default();
        let ctx = context();

        chain(&calls).run(&ctx, true).await.unwrap();

        assert!(recorded(&calls, "seed").is_empty());
        assert_eq!(recorded(&calls, "describe").len(), 3);
        assert!(ctx.registry().is_empty());
    }

    #[tokio::test]
    async fn test_clean_runs_in_reverse() {
        let calls = Calls::default();
        let ctx = context();

        chain(&calls).clean(&ctx).await.unwrap();

        assert_eq!(
            recorded(&calls, "clean"),
            vec!["clean:c", "clean:b", "clean:a"]
        );
    }

    #[tokio::test]
    async fn test_clean_aborts_on_failure() {
        let calls = Calls::default();
        let ctx = context();
        let orchestrator = Orchestrator::new(vec![
            Box::new(Spy::new("a", 1, &calls)),
            Box::new(Spy::new("b", 2, &calls).failing_clean()),
            Box::new(Spy::new("c", 3, &calls)),
        ]);

        let err = orchestrator.clean(&ctx).await.unwrap_err();

        assert_eq!(recorded(&calls, "clean"), vec!["clean:c", "clean:b"]);
        match err {
            SeedError::CleanAborted {
                unit, remaining, ..
            } => {
                assert_eq!(unit, "b");
                assert_eq!(remaining, vec!["a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_validate_rejects_dependency_declared_later() {
        let calls = Calls::default();
        let ctx = context();
        let orchestrator = Orchestrator::new(vec![
            Box::new(Spy::new("b", 2, &calls).after("a")),
            Box::new(Spy::new("a", 1, &calls)),
        ]);

        let err = orchestrator.run(&ctx, false).await.unwrap_err();

        assert!(matches!(
            err,
            SeedError::Ordering { ref unit, ref dependency } if unit == "b" && dependency == "a"
        ));
        assert!(recorded(&calls, "seed").is_empty());
    }

    #[tokio::test]
    async fn test_run_unit_stages_and_cleans_in_reverse() {
        let calls = Calls::default();
        let ctx = context();
        let mut orchestrator = Orchestrator::default();

        let a = orchestrator
            .run_unit(&ctx, Spy::new("a", 10, &calls))
            .await
            .unwrap();
        let b = orchestrator
            .run_unit(&ctx, Spy::new("b", a.id + 1, &calls).after("a"))
            .await
            .unwrap();

        assert_eq!(b.id, 11);
        assert_eq!(orchestrator.names(), vec!["a", "b"]);

        orchestrator.clean(&ctx).await.unwrap();
        assert_eq!(recorded(&calls, "clean"), vec!["clean:b", "clean:a"]);
    }

    #[tokio::test]
    async fn test_run_unit_requires_recorded_dependency() {
        let calls = Calls::default();
        let ctx = context();
        let mut orchestrator = Orchestrator::default();

        let err = orchestrator
            .run_unit(&ctx, Spy::new("b", 2, &calls).after("a"))
            .await
            .unwrap_err();

        assert!(matches!(err, SeedError::Ordering { .. }));
        assert!(orchestrator.is_empty());
        assert!(recorded(&calls, "seed").is_empty());
    }
}
