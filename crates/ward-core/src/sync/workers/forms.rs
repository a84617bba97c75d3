//! Full-refresh sync of form metadata.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Form;
use crate::store::{Op, Resource};
use crate::sync::diff::{diff_snapshots, Delta};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::decode_records;

pub struct FormsSyncWorker;

#[async_trait]
impl SyncWorker for FormsSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        let fetched = ctx.server.fetch_all("forms").await?;
        let server: Vec<Form> = decode_records(fetched, Resource::Forms, stats);
        let local = ctx.store.forms()?;

        let mut ops = Vec::new();
        for delta in diff_snapshots(local, server) {
            match delta {
                Delta::Insert(form) => {
                    stats.inserted += 1;
                    ops.push(Op::UpsertForm(form));
                }
                Delta::Update(form) => {
                    stats.updated += 1;
                    ops.push(Op::UpsertForm(form));
                }
                Delta::Delete(uuid) => {
                    stats.deleted += 1;
                    ops.push(Op::DeleteForm(uuid));
                }
            }
        }
        ctx.store.apply(ops)?;
        Ok(true)
    }
}
