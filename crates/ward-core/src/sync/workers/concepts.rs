//! Full-refresh sync of concepts and their localized names.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Concept;
use crate::store::{Op, Resource};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::decode_records;

/// Concepts are replaced wholesale. They change rarely (chart revisions),
/// and observations reference them by UUID, so replacement is safe as long
/// as it happens in one transaction.
pub struct ConceptsSyncWorker;

#[async_trait]
impl SyncWorker for ConceptsSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        let fetched = ctx.server.fetch_all("concepts").await?;
        let concepts: Vec<Concept> = decode_records(fetched, Resource::Concepts, stats);

        let mut ops = vec![Op::DeleteAllConcepts];
        stats.inserted += concepts.len() as u64;
        ops.extend(concepts.into_iter().map(Op::UpsertConcept));
        ctx.store.apply(ops)?;
        Ok(true)
    }
}
