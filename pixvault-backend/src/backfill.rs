//! Batch migration of existing assets to the normalized representation.
//!

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use pixvault_shared::error::VaultError;
use tracing::{debug, error, info, warn};

use crate::ingest::reprocess;
use crate::store::Store;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackfillOptions {
    /// Candidates handled per group
    pub batch_size: usize,
    /// Items in flight at once within a group
    pub concurrency: usize,
    /// Sleep between groups
    pub batch_pause: Duration,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub processed: usize,
    pub failed: usize,
    /// Candidates that were gone by the time they were loaded
    pub skipped: usize,
    pub duration: Duration,
}

impl BackfillSummary {
    pub fn total(&self) -> usize {
        self.processed + self.failed + self.skipped
    }

    /// Processed assets per second.
    pub fn throughput(&self) -> f64 {
        match self.duration.as_secs_f64() {
            secs if secs > 0.0 => self.processed as f64 / secs,
            _ => 0.0,
        }
    }
}

impl fmt::Display for BackfillSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed, {} failed, {} skipped in {:.1}s ({:.2} assets/s)",
            self.processed,
            self.failed,
            self.skipped,
            self.duration.as_secs_f64(),
            self.throughput()
        )
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ItemOutcome {
    Processed {
        thumbnail_size: usize,
        full_size: usize,
    },
    Skipped,
}

async fn backfill_one(store: &Store, id: i64) -> Result<ItemOutcome, VaultError> {
    let Some(raw) = store.load_source(id).await? else {
        return Ok(ItemOutcome::Skipped);
    };
    match reprocess(store, id, raw).await {
        Ok(image) => Ok(ItemOutcome::Processed {
            thumbnail_size: image.thumbnail.len(),
            full_size: image.full.len(),
        }),
        // deleted or removed since it was loaded
        Err(VaultError::NotFound(_)) => Ok(ItemOutcome::Skipped),
        Err(err) => Err(err),
    }
}

/// Brings every candidate row up to the normalized representation.
///
/// Only failing to select candidates aborts the run, per-asset failures are
/// logged and counted.
pub async fn run_backfill(
    store: &Store,
    options: BackfillOptions,
) -> Result<BackfillSummary, VaultError> {
    let start = Instant::now();

    let candidates = store
        .backfill_candidates()
        .await
        .inspect_err(|err| error!(error = %err, "Failed to select backfill candidates"))?;

    if candidates.is_empty() {
        info!("No assets need processing");
        return Ok(BackfillSummary {
            duration: start.elapsed(),
            ..Default::default()
        });
    }

    let mut summary = process_batches(&candidates, options, |id| backfill_one(store, id)).await;
    summary.duration = start.elapsed();
    info!(
        processed = summary.processed,
        failed = summary.failed,
        skipped = summary.skipped,
        duration_ms = summary.duration.as_millis() as u64,
        throughput = %format!("{:.2}/s", summary.throughput()),
        "Backfill finished"
    );
    Ok(summary)
}

/// Runs `process` over `ids` one group of `batch_size` at a time, at most
/// `concurrency` items in flight, pausing between groups.
async fn process_batches<F, Fut>(
    ids: &[i64],
    options: BackfillOptions,
    process: F,
) -> BackfillSummary
where
    F: Fn(i64) -> Fut,
    Fut: Future<Output = Result<ItemOutcome, VaultError>>,
{
    let batch_size = options.batch_size.max(1);
    let concurrency = options.concurrency.max(1);
    let total = ids.len();
    let batches = total.div_ceil(batch_size);
    info!(
        candidates = total,
        batches, batch_size, concurrency, "Starting backfill"
    );

    let mut summary = BackfillSummary::default();
    for (index, batch) in ids.chunks(batch_size).enumerate() {
        debug!(batch = index + 1, batches, size = batch.len(), "processing batch");

        let mut results = stream::iter(batch.iter().copied())
            .map(|id| process(id).map(move |res| (id, res)))
            .buffer_unordered(concurrency);

        while let Some((id, result)) = results.next().await {
            match result {
                Ok(ItemOutcome::Processed {
                    thumbnail_size,
                    full_size,
                }) => {
                    summary.processed += 1;
                    info!(
                        asset_id = id,
                        progress = %format!("{}/{total}", summary.total()),
                        thumbnail_size,
                        full_size,
                        "processed asset"
                    );
                }
                Ok(ItemOutcome::Skipped) => {
                    summary.skipped += 1;
                    warn!(asset_id = id, "asset disappeared before processing, skipping");
                }
                Err(err) => {
                    summary.failed += 1;
                    error!(
                        asset_id = id,
                        progress = %format!("{}/{total}", summary.total()),
                        error = %err,
                        "Failed to process asset"
                    );
                }
            }
        }

        info!(
            batch = index + 1,
            batches,
            processed = summary.processed,
            failed = summary.failed,
            "batch complete"
        );

        if index + 1 < batches && !options.batch_pause.is_zero() {
            tokio::time::sleep(options.batch_pause).await;
        }
    }
    summary
}
