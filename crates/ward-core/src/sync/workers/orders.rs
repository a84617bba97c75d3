//! Incremental sync of treatment orders.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Order;
use crate::store::{Op, Resource};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

use super::incremental::sync_one_page;

pub struct OrdersSyncWorker;

#[async_trait]
impl SyncWorker for OrdersSyncWorker {
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool> {
        sync_one_page::<Order, _>(ctx, Resource::Orders, "orders", stats, |order| {
            if order.voided {
                Ok(vec![Op::DeleteOrder(order.uuid)])
            } else {
                Ok(vec![Op::UpsertOrder(order)])
            }
        })
        .await
    }
}
