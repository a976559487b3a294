//! Deterministic, batched generation for high-volume units.
//!
//! A [`BatchGenerator`] turns a global record index into a record, inserts the
//! records in fixed-size batches with duplicate skipping, reports progress, and
//! finally verifies the row count. Because every record is a pure function of its
//! index, a rerun after a partial failure regenerates the same rows and the store
//! skips the ones already present.

use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use crate::context::SeedContext;
use crate::error::SeedError;
use crate::store::{Entity, Filter};

/// How many batches of what size cover `target_count` records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub target_count: u64,
    pub batch_size: u64,
    pub total_batches: u64,
}

impl BatchPlan {
    pub fn new(target_count: u64, batch_size: u64) -> Result<Self, SeedError> {
        if batch_size == 0 {
            return Err(SeedError::InvalidBatch("batch size must be positive".to_string()));
        }
        Ok(Self {
            target_count,
            batch_size,
            total_batches: target_count.div_ceil(batch_size),
        })
    }

    /// Global indices covered by batch `n`. Only the last batch may be short.
    pub fn batch(&self, n: u64) -> Range<u64> {
        let start = (n * self.batch_size).min(self.target_count);
        let end = (start + self.batch_size).min(self.target_count);
        start..end
    }

    pub fn batches(&self) -> impl Iterator<Item = Range<u64>> + use<> {
        let plan = *self;
        (0..plan.total_batches).map(move |n| plan.batch(n))
    }
}

/// Picks `ids[index % len]`, spreading records evenly over every parent id.
pub fn round_robin<T>(ids: &[T], index: u64) -> Option<&T> {
    if ids.is_empty() {
        return None;
    }
    ids.get((index % ids.len() as u64) as usize)
}

/// A fixed period over which record timestamps are spread evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub base: OffsetDateTime,
    pub duration: Duration,
}

impl TimeWindow {
    pub fn new(base: OffsetDateTime, duration: Duration) -> Self {
        Self { base, duration }
    }

    /// Gap between consecutive records, truncated to whole milliseconds.
    pub fn interval(&self, target_count: u64) -> Duration {
        if target_count == 0 {
            return Duration::ZERO;
        }
        let millis = self.duration.whole_milliseconds() / i128::from(target_count);
        Duration::milliseconds(millis as i64)
    }

    /// Timestamp of record `index`: `base + index * interval`.
    ///
    /// Fails when the offset does not fit in an `i64` of milliseconds or the
    /// result leaves the representable date range.
    pub fn at(&self, index: u64, target_count: u64) -> Result<OffsetDateTime, SeedError> {
        let step = self.interval(target_count).whole_milliseconds();
        let out_of_range =
            || SeedError::InvalidBatch(format!("timestamp of record {index} is out of range"));
        let offset = step
            .checked_mul(i128::from(index))
            .and_then(|millis| i64::try_from(millis).ok())
            .ok_or_else(out_of_range)?;
        self.base
            .checked_add(Duration::milliseconds(offset))
            .ok_or_else(out_of_range)
    }
}

/// What to do when the post-run row count differs from the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyPolicy {
    /// Log the mismatch and carry on.
    #[default]
    Soft,
    /// Fail the unit.
    Strict,
}

impl FromStr for VerifyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "strict" => Ok(Self::Strict),
            other => Err(format!("unknown verify policy {other:?}")),
        }
    }
}

/// Volume settings for a batched unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of records to generate.
    pub target_count: u64,
    /// Records per bulk insert.
    pub batch_size: u64,
    /// Log progress after every this many batches (0 logs only the last).
    pub progress_every: u64,
    pub verify: VerifyPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            target_count: 1_000_000,
            batch_size: 10_000,
            progress_every: 10,
            verify: VerifyPolicy::Soft,
        }
    }
}

/// Outcome of a [`BatchGenerator::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Records generated and submitted.
    pub submitted: u64,
    /// Records the store actually inserted; lower on a resumed run.
    pub inserted: u64,
    pub batches: u64,
    /// Row count observed after the last batch.
    pub verified_count: u64,
}

/// Sequential batch inserter for one entity type.
#[derive(Debug, Clone)]
pub struct BatchGenerator {
    plan: BatchPlan,
    progress_every: u64,
    verify: VerifyPolicy,
}

impl BatchGenerator {
    pub fn new(config: &BatchConfig) -> Result<Self, SeedError> {
        Ok(Self {
            plan: BatchPlan::new(config.target_count, config.batch_size)?,
            progress_every: config.progress_every,
            verify: config.verify,
        })
    }

    pub fn plan(&self) -> &BatchPlan {
        &self.plan
    }

    fn reports_after(&self, batch: u64) -> bool {
        let done = batch + 1;
        done == self.plan.total_batches || (self.progress_every > 0 && done % self.progress_every == 0)
    }

    /// Generates and inserts every record, one batch at a time.
    ///
    /// `make` maps a global index to its record and must be deterministic. An
    /// error from `make` stops the run before that batch is inserted.
    /// `verify_filter` selects the rows this generator is responsible for when
    /// counting them afterwards.
    pub async fn run<E, F>(
        &self,
        ctx: &SeedContext,
        verify_filter: &Filter,
        mut make: F,
    ) -> Result<BatchReport, SeedError>
    where
        E: Entity,
        F: FnMut(u64) -> Result<E, SeedError> + Send,
    {
        let table = ctx.table::<E>();
        let target = self.plan.target_count;

        ctx.log(format!("Starting seed of {target} {} records...", E::TABLE));
        ctx.log(format!(
            "Processing {} batches of {} records each",
            self.plan.total_batches, self.plan.batch_size
        ));

        let mut submitted = 0;
        let mut inserted = 0;
        for (n, range) in self.plan.batches().enumerate() {
            let batch = range.map(&mut make).collect::<Result<Vec<E>, _>>()?;
            let added = table.create_many(&batch, true).await?;
            submitted += batch.len() as u64;
            inserted += added;
            debug!("Batch {} inserted {} of {} records", n + 1, added, batch.len());

            if self.reports_after(n as u64) {
                let progress = submitted as f64 / target as f64 * 100.0;
                ctx.log(format!("Progress: {submitted} / {target} ({progress:.1}%)"));
            }
        }

        ctx.log(format!(
            "Submitted {submitted} {} records ({inserted} new)",
            E::TABLE
        ));

        let verified_count = table.count(verify_filter).await?;
        ctx.log(format!(
            "Verification: {verified_count} matching rows in {}",
            E::TABLE
        ));
        if verified_count != target {
            match self.verify {
                VerifyPolicy::Soft => {
                    warn!(
                        "Row count mismatch in {}: expected {}, found {}",
                        E::TABLE,
                        target,
                        verified_count
                    );
                    ctx.log(format!(
                        "Count mismatch: expected {target}, found {verified_count}"
                    ));
                }
                VerifyPolicy::Strict => {
                    return Err(SeedError::Verification {
                        table: E::TABLE.to_string(),
                        expected: target,
                        actual: verified_count,
                    });
                }
            }
        }

        Ok(BatchReport {
            submitted,
            inserted,
            batches: self.plan.total_batches,
            verified_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use serde::{Deserialize, Serialize};
    use time::macros::datetime;

    use super::*;
    use crate::log::MemorySink;
    use crate::store::MemoryStore;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Sample {
        parent_id: i64,
        #[serde(with = "time::serde::rfc3339")]
        at: OffsetDateTime,
    }

    impl Entity for Sample {
        const TABLE: &'static str = "samples";
    }

    const PARENTS: [i64; 3] = [100, 200, 300];

    fn window() -> TimeWindow {
        TimeWindow::new(datetime!(2024-01-01 0:00 UTC), Duration::days(365))
    }

    fn sample(index: u64, target: u64) -> Result<Sample, SeedError> {
        Ok(Sample {
            parent_id: *round_robin(&PARENTS, index).unwrap(),
            at: window().at(index, target)?,
        })
    }

    fn setup() -> (Arc<MemoryStore>, Arc<MemorySink>, SeedContext) {
        let store = Arc::new(MemoryStore::new().with_unique("samples", &["parent_id", "at"]));
        let sink = Arc::new(MemorySink::new());
        let ctx = SeedContext::new("test", store.clone()).with_sink(sink.clone());
        (store, sink, ctx)
    }

    #[test]
    fn test_batch_coverage() {
        let plan = BatchPlan::new(25_000, 10_000).unwrap();
        assert_eq!(plan.total_batches, 3);

        let sizes: Vec<u64> = plan.batches().map(|r| r.end - r.start).collect();
        assert_eq!(sizes, vec![10_000, 10_000, 5_000]);

        let mut seen = BTreeSet::new();
        let mut total = 0;
        for range in plan.batches() {
            for index in range {
                seen.insert(index);
                total += 1;
            }
        }
        assert_eq!(total, 25_000, "no overlaps");
        assert_eq!(seen.len(), 25_000);
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&24_999));
    }

    #[test]
    fn test_plan_edges() {
        assert!(BatchPlan::new(10, 0).is_err());

        let empty = BatchPlan::new(0, 100).unwrap();
        assert_eq!(empty.total_batches, 0);
        assert_eq!(empty.batches().count(), 0);

        let exact = BatchPlan::new(20, 10).unwrap();
        assert_eq!(exact.total_batches, 2);
        assert_eq!(exact.batch(1), 10..20);
    }

    #[test]
    fn test_round_robin() {
        let ids = ["id0", "id1", "id2"];
        let assigned: Vec<&str> = (0..7).map(|i| *round_robin(&ids, i).unwrap()).collect();
        assert_eq!(assigned, vec!["id0", "id1", "id2", "id0", "id1", "id2", "id0"]);

        assert!(round_robin::<i64>(&[], 3).is_none());
    }

    #[test]
    fn test_timestamps_are_deterministic() {
        let window = window();
        assert_eq!(window.interval(1_000_000), Duration::milliseconds(31_536));

        let first: Vec<_> = (0..50).map(|i| window.at(i, 1_000_000).unwrap()).collect();
        let second: Vec<_> = (0..50).map(|i| self::window().at(i, 1_000_000).unwrap()).collect();
        assert_eq!(first, second);
        assert_eq!(first[0], datetime!(2024-01-01 0:00 UTC));
        assert_eq!(first[1], datetime!(2024-01-01 0:00:31.536 UTC));
        assert!(first.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_timestamps_out_of_range() {
        let window = window();
        let last = window.at(999_999, 1_000_000).unwrap();
        assert!(last < datetime!(2025-01-01 0:00 UTC));

        // Offsets past i64 milliseconds or the calendar are errors, not wraparound
        let err = window.at(u64::MAX, 1).unwrap_err();
        assert!(matches!(err, SeedError::InvalidBatch(_)));
        assert!(window.at(10_000, 1).is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_record_error() {
        let config = BatchConfig {
            target_count: 25,
            batch_size: 10,
            progress_every: 1,
            verify: VerifyPolicy::Soft,
        };
        let (store, _sink, ctx) = setup();

        let err = BatchGenerator::new(&config)
            .unwrap()
            .run(&ctx, &Filter::All, |i| {
                if i < 15 { sample(i, 25) } else { sample(u64::MAX, 1) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SeedError::InvalidBatch(_)));
        // The first batch landed; the failing one was never submitted
        assert_eq!(store.rows("samples").len(), 10);
    }

    #[test]
    fn test_verify_policy_parse() {
        assert_eq!("soft".parse::<VerifyPolicy>(), Ok(VerifyPolicy::Soft));
        assert_eq!("STRICT".parse::<VerifyPolicy>(), Ok(VerifyPolicy::Strict));
        assert!("loose".parse::<VerifyPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_run_inserts_and_reports_progress() {
        let config = BatchConfig {
            target_count: 25,
            batch_size: 10,
            progress_every: 2,
            verify: VerifyPolicy::Strict,
        };
        let (store, sink, ctx) = setup();
        let generator = BatchGenerator::new(&config).unwrap();

        let report = generator
            .run(&ctx, &Filter::All, |i| sample(i, 25))
            .await
            .unwrap();

        assert_eq!(
            report,
            BatchReport {
                submitted: 25,
                inserted: 25,
                batches: 3,
                verified_count: 25,
            }
        );
        let progress: Vec<String> = sink
            .lines()
            .into_iter()
            .filter(|l| l.starts_with("Progress"))
            .collect();
        assert_eq!(
            progress,
            vec!["Progress: 20 / 25 (80.0%)", "Progress: 25 / 25 (100.0%)"]
        );

        let parents: Vec<i64> = store
            .rows("samples")
            .iter()
            .take(4)
            .map(|r| r["parent_id"].as_i64().unwrap())
            .collect();
        assert_eq!(parents, vec![100, 200, 300, 100]);
    }

    #[tokio::test]
    async fn test_rerun_is_duplicate_safe() {
        let config = BatchConfig {
            target_count: 25,
            batch_size: 10,
            progress_every: 10,
            verify: VerifyPolicy::Strict,
        };
        let (store, _sink, ctx) = setup();
        let generator = BatchGenerator::new(&config).unwrap();

        generator.run(&ctx, &Filter::All, |i| sample(i, 25)).await.unwrap();
        let second = generator.run(&ctx, &Filter::All, |i| sample(i, 25)).await.unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.verified_count, 25);
        assert_eq!(store.rows("samples").len(), 25);
    }

    #[tokio::test]
    async fn test_resume_after_partial_run() {
        let config = BatchConfig {
            target_count: 25,
            batch_size: 10,
            progress_every: 10,
            verify: VerifyPolicy::Strict,
        };
        let (_store, _sink, ctx) = setup();

        // A prior run that died after its first batch
        let partial: Vec<Sample> = (0..10).map(|i| sample(i, 25).unwrap()).collect();
        ctx.table::<Sample>().create_many(&partial, true).await.unwrap();

        let report = BatchGenerator::new(&config)
            .unwrap()
            .run(&ctx, &Filter::All, |i| sample(i, 25))
            .await
            .unwrap();

        assert_eq!(report.submitted, 25);
        assert_eq!(report.inserted, 15);
        assert_eq!(report.verified_count, 25);
    }

    #[tokio::test]
    async fn test_count_mismatch_soft_and_strict() {
        let soft = BatchConfig {
            target_count: 5,
            batch_size: 5,
            progress_every: 1,
            verify: VerifyPolicy::Soft,
        };
        let (_store, sink, ctx) = setup();
        let stray = Sample {
            parent_id: 999,
            at: datetime!(2030-01-01 0:00 UTC),
        };
        ctx.table::<Sample>().create(&stray).await.unwrap();

        let report = BatchGenerator::new(&soft)
            .unwrap()
            .run(&ctx, &Filter::All, |i| sample(i, 5))
            .await
            .unwrap();
        assert_eq!(report.verified_count, 6);
        assert!(sink.contains("Count mismatch: expected 5, found 6"));

        let strict = BatchConfig {
            verify: VerifyPolicy::Strict,
            ..soft
        };
        let err = BatchGenerator::new(&strict)
            .unwrap()
            .run(&ctx, &Filter::All, |i| sample(i, 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SeedError::Verification {
                expected: 5,
                actual: 6,
                ..
            }
        ));

        // Counting only this generator's parents makes the stray row irrelevant
        let scoped = BatchGenerator::new(&strict)
            .unwrap()
            .run(&ctx, &Filter::one_of("parent_id", PARENTS), |i| sample(i, 5))
            .await
            .unwrap();
        assert_eq!(scoped.verified_count, 5);
    }
}
