//! Synchronization engine: keeps the local cache consistent with the server.
//!
//! A cycle runs an ordered list of phases. Each phase drives one
//! [`SyncWorker`], which either loops an incremental changes feed or
//! reconciles a full snapshot against the cache via the diff engine.

pub mod diff;
mod orchestrator;
mod scheduler;
pub mod workers;

pub use orchestrator::{
    CancelFlag, CycleOutcome, CycleReport, CycleScope, Orchestrator, Phase, PhaseFilter,
    PhaseOutcome, PhaseResult,
};
pub use scheduler::SyncScheduler;

use std::ops::AddAssign;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::net::ChartServer;
use crate::store::CacheStore;

/// Counters accumulated per phase and rolled up per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    /// Records dropped for failing validation (missing UUID, timestamp, ...).
    pub dropped: u64,
}

impl SyncStats {
    pub const fn total_changes(&self) -> u64 {
        self.inserted + self.updated + self.deleted
    }
}

impl AddAssign for SyncStats {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.dropped += other.dropped;
    }
}

/// Everything a worker needs: the cache and the server connection.
#[derive(Clone)]
pub struct SyncContext {
    pub store: Arc<CacheStore>,
    pub server: Arc<dyn ChartServer>,
}

/// One sync phase implementation.
///
/// The orchestrator calls `initialize` once, then `sync` repeatedly until it
/// returns `Ok(true)` (or an iteration cap trips), then `finalize`. Workers
/// must be safe to re-run from scratch: a crashed cycle restarts them with
/// whatever cursor was last persisted.
#[async_trait]
pub trait SyncWorker: Send + Sync {
    fn initialize(&self, _ctx: &SyncContext) -> Result<()> {
        Ok(())
    }

    /// Perform one unit of work. Returns `true` when the phase is complete.
    async fn sync(&self, ctx: &SyncContext, stats: &mut SyncStats) -> Result<bool>;

    /// Post-completion hook, run after all data and cursors are durable.
    /// A crash before this point only costs a redundant re-run, never data.
    fn finalize(&self, _ctx: &SyncContext, _stats: &mut SyncStats) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_accumulate() {
        let mut total = SyncStats::default();
        total += SyncStats {
            inserted: 2,
            updated: 1,
            deleted: 0,
            dropped: 1,
        };
        total += SyncStats {
            inserted: 1,
            updated: 0,
            deleted: 3,
            dropped: 0,
        };
        assert_eq!(total.inserted, 3);
        assert_eq!(total.deleted, 3);
        assert_eq!(total.total_changes(), 7);
        assert_eq!(total.dropped, 1);
    }
}
