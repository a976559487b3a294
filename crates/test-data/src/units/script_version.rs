use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use seeding::prelude::*;

use super::ScriptReferenceRefs;
use crate::models::ScriptVersion;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptVersionRefs {
    pub script_version_ids: Vec<i64>,
}

/// One version per script reference. Version ids are generated by the store.
#[derive(Debug)]
pub struct ScriptVersionSeed {
    references: ScriptReferenceRefs,
}

impl ScriptVersionSeed {
    pub fn new(references: ScriptReferenceRefs) -> Self {
        Self { references }
    }
}

#[async_trait]
impl Seed for ScriptVersionSeed {
    type Refs = ScriptVersionRefs;

    fn name(&self) -> &str {
        "script_version"
    }

    fn depends_on(&self) -> &[&'static str] {
        &["script_reference"]
    }

    fn describe(&self) -> String {
        format!(
            "script_version (one per {} script references)",
            self.references.script_reference_ids.len()
        )
    }

    async fn seed(&self, ctx: &SeedContext) -> Result<ScriptVersionRefs, SeedError> {
        let table = ctx.table::<ScriptVersion>();
        ctx.log("Seeding script_version records...");

        let now = OffsetDateTime::now_utc();
        let mut ids = Vec::with_capacity(self.references.script_reference_ids.len());
        for &reference_id in &self.references.script_reference_ids {
            let existing = table
                .find_first(
                    &Filter::eq("script_reference_id", reference_id),
                    Some(&Order::asc("id")),
                )
                .await?;

            let version = match existing {
                Some(version) => version,
                None => {
                    table
                        .create(&ScriptVersion {
                            id: None,
                            script_reference_id: reference_id,
                            script_name: format!("Seed Script {reference_id}"),
                            duration: 60,
                            script_category_id: None,
                            created_at: now,
                        })
                        .await?
                }
            };
            let id = version.id.ok_or_else(|| {
                SeedError::Precondition(format!(
                    "script_version for reference {reference_id} has no id"
                ))
            })?;
            ids.push(id);
        }

        ctx.log(format!("Seeded {} script_version records", ids.len()));
        Ok(ScriptVersionRefs {
            script_version_ids: ids,
        })
    }

    async fn clean(
        &self,
        ctx: &SeedContext,
        _refs: Option<&ScriptVersionRefs>,
    ) -> Result<(), SeedError> {
        let deleted = ctx
            .table::<ScriptVersion>()
            .delete_many(&Filter::one_of(
                "script_reference_id",
                self.references.script_reference_ids.iter().copied(),
            ))
            .await?;
        ctx.log(format!("Cleaned {deleted} script_version records"));
        Ok(())
    }
}
