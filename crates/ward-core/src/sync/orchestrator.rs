//! Cycle orchestration: runs the phases of one sync cycle in order.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::error::{Error, Result};
use crate::net::ChartServer;
use crate::store::CacheStore;
use crate::sync::workers::{
    ChartsSyncWorker, ConceptsSyncWorker, FormsSyncWorker, LocationsSyncWorker,
    ObservationsSyncWorker, OrdersSyncWorker, PatientsSyncWorker, UsersSyncWorker,
};
use crate::sync::{SyncContext, SyncStats, SyncWorker};

/// Pages an incremental phase may fetch in one cycle before being treated
/// as a transport failure and retried next cycle.
const MAX_PHASE_STEPS: u32 = 1_000;

/// The phases of a sync cycle, in execution order.
///
/// The order is topological: resources that other resources reference run
/// first, so observations never arrive before the concepts and patients they
/// point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Users,
    Locations,
    Concepts,
    ChartItems,
    Patients,
    Observations,
    Orders,
    Forms,
}

impl Phase {
    pub const ALL: [Self; 8] = [
        Self::Users,
        Self::Locations,
        Self::Concepts,
        Self::ChartItems,
        Self::Patients,
        Self::Observations,
        Self::Orders,
        Self::Forms,
    ];

    /// Whether this phase uses the incremental changes feed (as opposed to a
    /// full snapshot refresh).
    pub const fn is_incremental(self) -> bool {
        matches!(self, Self::Patients | Self::Observations | Self::Orders)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Locations => "locations",
            Self::Concepts => "concepts",
            Self::ChartItems => "chart_items",
            Self::Patients => "patients",
            Self::Observations => "observations",
            Self::Orders => "orders",
            Self::Forms => "forms",
        }
    }

    fn worker(self) -> Box<dyn SyncWorker> {
        match self {
            Self::Users => Box::new(UsersSyncWorker),
            Self::Locations => Box::new(LocationsSyncWorker),
            Self::Concepts => Box::new(ConceptsSyncWorker),
            Self::ChartItems => Box::new(ChartsSyncWorker),
            Self::Patients => Box::new(PatientsSyncWorker),
            Self::Observations => Box::new(ObservationsSyncWorker),
            Self::Orders => Box::new(OrdersSyncWorker),
            Self::Forms => Box::new(FormsSyncWorker),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.name() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown sync phase: {s}")))
    }
}

/// Which phases a cycle should run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PhaseFilter {
    #[default]
    All,
    IncrementalOnly,
    FullRefreshOnly,
}

#[derive(Debug, Clone, Default)]
pub struct CycleScope {
    /// `None` means every phase.
    pub phases: Option<Vec<Phase>>,
    pub filter: PhaseFilter,
}

impl CycleScope {
    /// The phases this scope selects, in execution order.
    pub fn selected(&self) -> Vec<Phase> {
        Phase::ALL
            .into_iter()
            .filter(|phase| {
                self.phases
                    .as_ref()
                    .is_none_or(|chosen| chosen.contains(phase))
            })
            .filter(|phase| match self.filter {
                PhaseFilter::All => true,
                PhaseFilter::IncrementalOnly => phase.is_incremental(),
                PhaseFilter::FullRefreshOnly => !phase.is_incremental(),
            })
            .collect()
    }

    fn is_full_cycle(&self) -> bool {
        self.selected().len() == Phase::ALL.len()
    }
}

/// Cooperative cancellation, checked at phase boundaries only. An in-flight
/// fetch or apply always runs to completion so a cursor is never persisted
/// without its batch.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Completed,
    /// Recoverable failure; the rest of the cycle continued without it.
    Skipped { reason: String },
    /// Fatal failure; the cycle aborted here.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseResult {
    pub phase: Phase,
    pub outcome: PhaseOutcome,
    pub stats: SyncStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// At least one phase was skipped on a recoverable error.
    PartiallyFailed,
    Aborted,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Results for the phases that were attempted, in order.
    pub phases: Vec<PhaseResult>,
    pub stats: SyncStats,
}

/// Runs sync cycles. One instance per cache/server pair; the scheduler
/// guarantees at most one cycle executes at a time.
pub struct Orchestrator {
    ctx: SyncContext,
    cancel: CancelFlag,
}

impl Orchestrator {
    pub fn new(store: Arc<CacheStore>, server: Arc<dyn ChartServer>) -> Self {
        Self {
            ctx: SyncContext { store, server },
            cancel: CancelFlag::default(),
        }
    }

    /// A handle that cancels the running cycle at the next phase boundary.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run one cycle over the scoped phases.
    ///
    /// Recoverable phase errors (transport, malformed response) skip that
    /// phase and mark the cycle partially failed; fatal errors (storage)
    /// abort the remaining phases so nothing runs out of dependency order.
    pub async fn run_cycle(&self, scope: &CycleScope) -> CycleReport {
        let phases = scope.selected();
        let full_cycle = scope.is_full_cycle();
        // A cancellation requested while no cycle was running is stale and
        // must not kill this one before it starts.
        self.cancel.reset();
        let started = Instant::now();
        tracing::info!(phases = phases.len(), full_cycle, "Starting sync cycle");

        let mut report = CycleReport {
            outcome: CycleOutcome::Completed,
            phases: Vec::with_capacity(phases.len()),
            stats: SyncStats::default(),
        };

        if full_cycle {
            if let Err(error) = self
                .ctx
                .store
                .record_full_sync_start(Utc::now().timestamp_millis())
            {
                tracing::error!(%error, "Could not record sync start");
                report.outcome = CycleOutcome::Aborted;
                return report;
            }
        }

        for phase in phases {
            if self.cancel.is_cancelled() {
                tracing::info!(%phase, "Cycle cancelled before phase");
                report.outcome = CycleOutcome::Cancelled;
                break;
            }
            let phase_started = Instant::now();
            let mut stats = SyncStats::default();
            let outcome = match self.run_phase(phase, &mut stats).await {
                Ok(()) => {
                    tracing::info!(
                        %phase,
                        elapsed_ms = phase_started.elapsed().as_millis() as u64,
                        changes = stats.total_changes(),
                        "Phase completed"
                    );
                    PhaseOutcome::Completed
                }
                Err(error) if error.is_recoverable() => {
                    tracing::warn!(%phase, %error, "Phase failed; skipping");
                    report.outcome = CycleOutcome::PartiallyFailed;
                    PhaseOutcome::Skipped {
                        reason: error.to_string(),
                    }
                }
                Err(error) => {
                    tracing::error!(%phase, %error, "Phase failed; aborting cycle");
                    report.outcome = CycleOutcome::Aborted;
                    report.stats += stats;
                    report.phases.push(PhaseResult {
                        phase,
                        outcome: PhaseOutcome::Failed {
                            reason: error.to_string(),
                        },
                        stats,
                    });
                    break;
                }
            };
            report.stats += stats;
            report.phases.push(PhaseResult {
                phase,
                outcome,
                stats,
            });
        }

        if full_cycle && report.outcome == CycleOutcome::Completed {
            if let Err(error) = self
                .ctx
                .store
                .record_full_sync_end(Utc::now().timestamp_millis())
            {
                tracing::warn!(%error, "Could not record sync end");
            }
        }
        tracing::info!(
            outcome = ?report.outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            inserted = report.stats.inserted,
            updated = report.stats.updated,
            deleted = report.stats.deleted,
            dropped = report.stats.dropped,
            "Sync cycle finished"
        );
        report
    }

    async fn run_phase(&self, phase: Phase, stats: &mut SyncStats) -> Result<()> {
        let worker = phase.worker();
        worker.initialize(&self.ctx)?;
        let mut steps: u32 = 0;
        loop {
            if worker.sync(&self.ctx, stats).await? {
                break;
            }
            steps += 1;
            if steps >= MAX_PHASE_STEPS {
                return Err(Error::Transport(format!(
                    "phase {phase} still incomplete after {MAX_PHASE_STEPS} pages"
                )));
            }
        }
        worker.finalize(&self.ctx, stats)?;
        Ok(())
    }
}
