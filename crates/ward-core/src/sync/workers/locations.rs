//! Full-refresh sync of the location tree.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Location;
use crate::store::{Op, Resource};
use crate::sync::diff::{diff_snapshots, Delta};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::decode_records;

/// Locations have no incremental feed; every cycle fetches the whole tree
/// and reconciles it against the cache with a minimal op set.
pub struct LocationsSyncWorker;

#[async_trait]
impl SyncWorker for LocationsSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        let fetched = ctx.server.fetch_all("locations").await?;
        let server: Vec<Location> = decode_records(fetched, Resource::Locations, stats);
        let local = ctx.store.locations()?;

        let mut ops = Vec::new();
        for delta in diff_snapshots(local, server) {
            match delta {
                Delta::Insert(location) => {
                    stats.inserted += 1;
                    ops.push(Op::UpsertLocation(location));
                }
                Delta::Update(location) => {
                    stats.updated += 1;
                    ops.push(Op::UpsertLocation(location));
                }
                Delta::Delete(uuid) => {
                    stats.deleted += 1;
                    ops.push(Op::DeleteLocation(uuid));
                }
            }
        }
        ctx.store.apply(ops)?;
        Ok(true)
    }
}
