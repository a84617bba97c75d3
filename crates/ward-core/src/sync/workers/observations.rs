//! Incremental sync of observations.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::WireObservation;
use crate::store::{Op, Resource};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::incremental::sync_one_page;

/// Observations are the highest-volume resource and are only ever fetched
/// incrementally. A voided record deletes by UUID; anything else upserts.
pub struct ObservationsSyncWorker;

#[async_trait]
impl SyncWorker for ObservationsSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        sync_one_page::<WireObservation, _>(
            ctx,
            Resource::Observations,
            "observations",
            stats,
            |wire| {
                if wire.voided {
                    Ok(vec![Op::DeleteObservation(wire.uuid)])
                } else {
                    Ok(vec![Op::UpsertObservation(wire.into_row()?)])
                }
            },
        )
        .await
    }

    /// Confirmed rows for anything submitted from this device have now
    /// arrived, so the temp copies are stale.
    fn finalize(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<()> {
        let purged = ctx.store.purge_unsubmitted_observations()?;
        if purged > 0 {
            tracing::debug!(purged, "Purged temporary observations");
            stats.deleted += purged as u64;
        }
        Ok(())
    }
}
