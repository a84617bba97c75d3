//! Full-refresh sync of clinical users.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::User;
use crate::store::{Op, Resource};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::decode_records;

/// Users are a tiny table; the whole set is replaced each cycle rather than
/// diffed. The delete and the reinserts commit as one batch, so readers
/// never see an empty users table.
pub struct UsersSyncWorker;

#[async_trait]
impl SyncWorker for UsersSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        let fetched = ctx.server.fetch_all("users").await?;
        let users: Vec<User> = decode_records(fetched, Resource::Users, stats);

        let mut ops = vec![Op::DeleteAllUsers];
        stats.inserted += users.len() as u64;
        ops.extend(users.into_iter().map(Op::UpsertUser));
        ctx.store.apply(ops)?;
        Ok(true)
    }
}
