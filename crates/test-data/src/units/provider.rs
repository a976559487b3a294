use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use seeding::prelude::*;

use crate::models::EventProvider;

const PROVIDER_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProviderRefs {
    pub provider_id: i64,
}

impl EventProviderRefs {
    pub fn planned() -> Self {
        Self {
            provider_id: PROVIDER_ID,
        }
    }
}

/// A single event provider for incoming fixture events.
#[derive(Debug, Default)]
pub struct EventProviderSeed;

impl EventProviderSeed {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Seed for EventProviderSeed {
    type Refs = EventProviderRefs;

    fn name(&self) -> &str {
        "event_provider"
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<EventProviderRefs, SeedError> {
        let provider = ctx
            .table::<EventProvider>()
            .ensure(&EventProvider {
                id: PROVIDER_ID,
                name: "seed-provider".to_string(),
            })
            .await?;
        Ok(EventProviderRefs {
            provider_id: provider.id,
        })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        refs: Option<&EventProviderRefs>,
    ) -> Result<(), SeedError> {
        let id = refs.map_or(PROVIDER_ID, |r| r.provider_id);
        ctx.table::<EventProvider>()
            .delete_many(&Filter::eq("id", id))
            .await?;
        Ok(())
    }
}
