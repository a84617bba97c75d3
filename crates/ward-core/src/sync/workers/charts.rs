//! Full-refresh sync of chart structure.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::WireChart;
use crate::store::{Op, Resource};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::decode_records;

/// Charts arrive as an ordered forest and are flattened into sequenced rows.
/// The sequence number is assigned here, in server order, and is the sole
/// ordering the projection layer uses.
pub struct ChartsSyncWorker;

#[async_trait]
impl SyncWorker for ChartsSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        let fetched = ctx.server.fetch_all("charts").await?;
        let charts: Vec<WireChart> = decode_records(fetched, Resource::ChartItems, stats);

        let mut ops = vec![Op::DeleteAllChartItems];
        let mut seq = 0;
        for chart in charts {
            let items = chart.into_items(seq);
            seq += items.len() as i64;
            stats.inserted += items.len() as u64;
            ops.extend(items.into_iter().map(Op::InsertChartItem));
        }
        ctx.store.apply(ops)?;
        Ok(true)
    }
}
