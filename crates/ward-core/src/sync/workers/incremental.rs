//! Shared page loop for resources with a server-side changes feed.
//!
//! Each call fetches one page since the persisted cursor, translates its
//! records to store ops, applies them atomically, and only then persists the
//! token the page came with. A crash between apply and persist re-fetches an
//! overlapping page next cycle; upsert-by-UUID makes the re-application
//! harmless.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::net::BEGINNING_OF_TIME_TOKEN;
use crate::store::{Op, Resource};
use crate::sync::{SyncContext, SyncStats};

/// Fetch and apply one incremental page. Returns `true` when the server
/// reports no more pages.
pub(super) async fn sync_one_page<T, F>(
    ctx: &SyncContext,
    resource: Resource,
    endpoint: &str,
    stats: &mut SyncStats,
    to_ops: F,
) -> Result<bool>
where
    T: DeserializeOwned,
    F: Fn(T) -> Result<Vec<Op>>,
{
    let token = ctx
        .store
        .sync_cursor(resource)?
        .unwrap_or_else(|| BEGINNING_OF_TIME_TOKEN.to_string());
    tracing::debug!(%resource, token, "Fetching incremental page");

    let page = ctx.server.fetch_incremental(endpoint, &token).await?;
    let mut ops = Vec::new();
    for value in page.results {
        let record: T = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(error) => {
                tracing::warn!(%resource, %error, "Dropping undecodable record");
                stats.dropped += 1;
                continue;
            }
        };
        match to_ops(record) {
            Ok(record_ops) => ops.extend(record_ops),
            Err(Error::Validation(reason)) => {
                tracing::warn!(%resource, reason, "Dropping invalid record");
                stats.dropped += 1;
            }
            Err(error) => return Err(error),
        }
    }

    for op in &ops {
        if op.is_delete() {
            stats.deleted += 1;
        } else {
            stats.inserted += 1;
        }
    }
    ctx.store.apply(ops)?;
    // The cursor must trail the committed data, never lead it.
    ctx.store.set_sync_cursor(resource, &page.sync_token)?;
    tracing::debug!(%resource, token = page.sync_token, more = page.more, "Applied page");
    Ok(!page.more)
}
