//! Background sync scheduling.
//!
//! One dedicated task runs cycles one at a time; cycles never overlap. The
//! trigger channel has capacity one, so a trigger arriving while a cycle is
//! running and one is already queued is coalesced (dropped) rather than
//! stacking up.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::orchestrator::{CancelFlag, CycleScope, Orchestrator};

pub struct SyncScheduler {
    trigger: mpsc::Sender<CycleScope>,
    cancel: CancelFlag,
    handle: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawn the background sync task. With a `period`, a full cycle also
    /// runs on that schedule (including once at startup); explicit triggers
    /// work either way.
    pub fn spawn(orchestrator: Orchestrator, period: Option<Duration>) -> Self {
        let (trigger, mut receiver) = mpsc::channel::<CycleScope>(1);
        let cancel = orchestrator.cancel_flag();
        let handle = tokio::spawn(async move {
            match period {
                Some(period) => {
                    let mut interval = tokio::time::interval(period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        let scope = tokio::select! {
                            received = receiver.recv() => match received {
                                Some(scope) => scope,
                                None => break,
                            },
                            _ = interval.tick() => CycleScope::default(),
                        };
                        orchestrator.run_cycle(&scope).await;
                    }
                }
                None => {
                    while let Some(scope) = receiver.recv().await {
                        orchestrator.run_cycle(&scope).await;
                    }
                }
            }
            tracing::debug!("Sync scheduler stopped");
        });
        Self {
            trigger,
            cancel,
            handle,
        }
    }

    /// Request a cycle. Returns `false` if a request is already pending, in
    /// which case this one was coalesced into it.
    pub fn request_sync(&self, scope: CycleScope) -> bool {
        self.trigger.try_send(scope).is_ok()
    }

    /// Ask the running cycle (if any) to stop at its next phase boundary.
    pub fn cancel_current(&self) {
        self.cancel.cancel();
    }

    /// Stop accepting triggers and wait for the in-flight cycle to finish.
    pub async fn shutdown(self) {
        drop(self.trigger);
        self.handle.await.ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::Result;
    use crate::net::{ChartServer, IncrementalPage};
    use crate::store::CacheStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Serves empty snapshots and empty final pages, counting fetches.
    struct QuietServer {
        fetches: AtomicU32,
    }

    #[async_trait]
    impl ChartServer for QuietServer {
        async fn fetch_incremental(&self, _resource: &str, token: &str) -> Result<IncrementalPage> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(IncrementalPage {
                results: vec![],
                sync_token: token.to_string(),
                more: false,
            })
        }

        async fn fetch_all(&self, _resource: &str) -> Result<Vec<serde_json::Value>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn triggered_cycle_runs_and_shutdown_drains() {
        let store = Arc::new(CacheStore::new(Database::open_in_memory().unwrap()));
        let server = Arc::new(QuietServer {
            fetches: AtomicU32::new(0),
        });
        let orchestrator = Orchestrator::new(store, server.clone());
        let scheduler = SyncScheduler::spawn(orchestrator, None);
        assert!(scheduler.request_sync(CycleScope::default()));
        scheduler.shutdown().await;
        // One fetch per phase: 5 full-refresh + 3 incremental.
        assert_eq!(server.fetches.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn cancel_while_idle_does_not_kill_the_next_cycle() {
        let store = Arc::new(CacheStore::new(Database::open_in_memory().unwrap()));
        let server = Arc::new(QuietServer {
            fetches: AtomicU32::new(0),
        });
        let scheduler = SyncScheduler::spawn(Orchestrator::new(store, server.clone()), None);
        scheduler.cancel_current();
        assert!(scheduler.request_sync(CycleScope::default()));
        scheduler.shutdown().await;
        // The stale cancellation is discarded; the cycle runs every phase.
        assert_eq!(server.fetches.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn pending_triggers_coalesce() {
        let store = Arc::new(CacheStore::new(Database::open_in_memory().unwrap()));
        let server = Arc::new(QuietServer {
            fetches: AtomicU32::new(0),
        });
        let scheduler = SyncScheduler::spawn(Orchestrator::new(store, server), None);
        // The channel holds one pending request; the rest are coalesced.
        let mut accepted = 0;
        for _ in 0..5 {
            if scheduler.request_sync(CycleScope::default()) {
                accepted += 1;
            }
        }
        assert!(accepted >= 1);
        scheduler.shutdown().await;
    }
}
