//! Asynchronous run management.
//!
//! [`RunManager`] accepts run requests, prepares them synchronously and
//! executes them on Tokio's blocking pool. Each run is tracked in a registry
//! keyed by its id and can be polled, awaited or cancelled.
//!
//! # Cancellation
//!
//! | Status at cancel time | Effect |
//! |-----------------------|--------|
//! | Pending / Resolving / Building | status becomes Cancelled immediately |
//! | Solving | token is set; the solver stops at its next check |
//! | terminal | rejected with `InvalidTransition` |
//!
//! A result that arrives after the run already reached a terminal status
//! is discarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::engine::{cancelled, RosterEngine, RunReport, RunRequest};
use crate::error::EngineError;
use crate::models::{RunDiagnostics, RunStatus};
use crate::solver::{BranchAndBoundSolver, CancellationToken, CpSolver};

/// Point-in-time view of a run.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    /// Run identifier.
    pub run_id: Uuid,
    /// Current status.
    pub status: RunStatus,
    /// Final report, once the run is terminal.
    pub report: Option<RunReport>,
}

/// Lightweight listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: Uuid,
    /// Current status.
    pub status: RunStatus,
}

#[derive(Debug)]
struct RunState {
    status: RunStatus,
    report: Option<RunReport>,
}

#[derive(Debug)]
struct RunHandle {
    run_id: Uuid,
    state: Mutex<RunState>,
    cancel: CancellationToken,
}

impl RunHandle {
    fn new(run_id: Uuid, status: RunStatus) -> Self {
        Self {
            run_id,
            state: Mutex::new(RunState {
                status,
                report: None,
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Moves to a later phase; ignored once the run is terminal.
    fn advance(&self, phase: RunStatus) {
        let mut state = self.state.lock();
        if state.status.can_transition_to(phase) {
            state.status = phase;
            debug!(run_id = %self.run_id, status = %phase, "run advanced");
        }
    }

    /// Records the final report unless a terminal status was already set.
    fn finish(&self, report: RunReport) {
        let mut state = self.state.lock();
        match state.status.transition(report.status) {
            Ok(status) => {
                state.status = status;
                state.report = Some(report);
            }
            Err(_) => {
                debug!(
                    run_id = %self.run_id,
                    status = %state.status,
                    late = %report.status,
                    "discarding late result"
                );
            }
        }
    }

    fn snapshot(&self) -> RunSnapshot {
        let state = self.state.lock();
        RunSnapshot {
            run_id: self.run_id,
            status: state.status,
            report: state.report.clone(),
        }
    }
}

/// Registry of asynchronous roster runs.
///
/// # Example
/// ```no_run
/// # async fn demo(request: u_roster::scheduler::RunRequest) -> Result<(), u_roster::EngineError> {
/// use std::time::Duration;
/// use u_roster::scheduler::RunManager;
///
/// let manager = RunManager::new();
/// let run_id = manager.submit(request)?;
/// let report = manager.wait(run_id, Duration::from_millis(50)).await?;
/// println!("{}: {}", run_id, report.status);
/// # Ok(())
/// # }
/// ```
pub struct RunManager<S: CpSolver + 'static = BranchAndBoundSolver> {
    engine: Arc<RosterEngine<S>>,
    runs: RwLock<HashMap<Uuid, Arc<RunHandle>>>,
}

impl RunManager<BranchAndBoundSolver> {
    /// Creates a manager over the default engine.
    pub fn new() -> Self {
        Self::with_engine(RosterEngine::new())
    }
}

impl Default for RunManager<BranchAndBoundSolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CpSolver + 'static> RunManager<S> {
    /// Creates a manager over a custom engine.
    pub fn with_engine(engine: RosterEngine<S>) -> Self {
        Self {
            engine: Arc::new(engine),
            runs: RwLock::new(HashMap::new()),
        }
    }

    /// Prepares a request and starts it in the background.
    ///
    /// Resolution, validation and pre-solve feasibility errors are returned
    /// here and no run is registered.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, request: RunRequest) -> Result<Uuid, EngineError> {
        let prepared = self.engine.prepare(&request)?;
        let run_id = prepared.run_id;
        let handle = Arc::new(RunHandle::new(run_id, RunStatus::Resolving));
        self.runs.write().insert(run_id, Arc::clone(&handle));
        info!(%run_id, "run submitted");

        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || {
            let report = engine.execute(prepared, &handle.cancel, |phase| handle.advance(phase));
            handle.finish(report);
        });

        Ok(run_id)
    }

    fn handle(&self, run_id: Uuid) -> Result<Arc<RunHandle>, EngineError> {
        self.runs
            .read()
            .get(&run_id)
            .cloned()
            .ok_or(EngineError::RunNotFound(run_id))
    }

    /// Current status of a run.
    pub fn status(&self, run_id: Uuid) -> Option<RunStatus> {
        self.handle(run_id).ok().map(|h| h.state.lock().status)
    }

    /// Status and, once terminal, the report of a run.
    pub fn snapshot(&self, run_id: Uuid) -> Option<RunSnapshot> {
        self.handle(run_id).ok().map(|h| h.snapshot())
    }

    /// Requests cancellation of a run.
    ///
    /// Returns the status right after the request: Cancelled when the run
    /// had not reached the solver yet, Solving while the solver winds down.
    pub fn cancel(&self, run_id: Uuid) -> Result<RunStatus, EngineError> {
        let handle = self.handle(run_id)?;
        let mut state = handle.state.lock();
        if state.status.is_terminal() {
            return Err(EngineError::InvalidTransition {
                from: state.status,
                to: RunStatus::Cancelled,
            });
        }

        handle.cancel.cancel();
        if state.status.cancels_immediately() {
            state.status = RunStatus::Cancelled;
            state.report = Some(cancelled(run_id, RunDiagnostics::default()));
        } else {
            info!(%run_id, "cancellation requested");
        }
        Ok(state.status)
    }

    /// Waits until a run is terminal and returns its report.
    pub async fn wait(&self, run_id: Uuid, poll: Duration) -> Result<RunReport, EngineError> {
        loop {
            let handle = self.handle(run_id)?;
            let report = handle.state.lock().report.clone();
            if let Some(report) = report {
                return Ok(report);
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Ids of runs that have not reached a terminal status.
    pub fn active_runs(&self) -> Vec<Uuid> {
        self.runs
            .read()
            .values()
            .filter(|h| !h.state.lock().status.is_terminal())
            .map(|h| h.run_id)
            .collect()
    }

    /// Every registered run with its status.
    pub fn list(&self) -> Vec<RunSummary> {
        self.runs
            .read()
            .values()
            .map(|h| RunSummary {
                run_id: h.run_id,
                status: h.state.lock().status,
            })
            .collect()
    }

    /// Drops a run from the registry, cancelling it first if still active.
    pub fn remove(&self, run_id: Uuid) -> Option<RunSnapshot> {
        let handle = self.runs.write().remove(&run_id)?;
        handle.cancel.cancel();
        Some(handle.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DateWindow, Person, RosterSnapshot};
    use crate::params::ParameterSet;
    use crate::solver::{BoolModel, CpSolution, SolverConfig, SolverStatus};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn request() -> RunRequest {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let roster = (0..4).fold(RosterSnapshot::new(), |r, i| {
            r.with_person(Person::standard(format!("P{i}")))
        });
        let params = ParameterSet::default()
            .with_min_required(2)
            .with_base_days_target(4)
            .with_consecutive_caps(4, 4)
            .with_min_block(2)
            .with_time_budget(Duration::from_secs(2))
            .with_seed(11);
        RunRequest::new(roster, DateWindow::from_start(start, 7).unwrap(), params)
    }

    /// Blocks until the run is cancelled.
    struct UntilCancelled;

    impl CpSolver for UntilCancelled {
        fn solve(
            &self,
            _model: &BoolModel,
            _config: &SolverConfig,
            cancel: &CancellationToken,
        ) -> CpSolution {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            CpSolution {
                status: SolverStatus::Cancelled,
                values: None,
                objective: None,
                best_bound: 0,
                nodes: 0,
                conflicts: 0,
                solutions_found: 0,
                conflicts_by_tag: BTreeMap::new(),
                elapsed: Duration::ZERO,
                seed: 0,
            }
        }
    }

    async fn wait_for(manager: &RunManager<UntilCancelled>, run_id: Uuid, status: RunStatus) {
        for _ in 0..400 {
            if manager.status(run_id) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("run never reached {status}");
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        crate::logging::init_test();
        let manager = RunManager::new();
        let run_id = manager.submit(request()).unwrap();
        let report = manager
            .wait(run_id, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(report.run_id, run_id);
        assert_eq!(report.status, RunStatus::Success, "{:?}", report.error);
        assert_eq!(manager.status(run_id), Some(RunStatus::Success));
        assert!(manager.active_runs().is_empty());
        assert_eq!(manager.list().len(), 1);
    }

    #[tokio::test]
    async fn test_synchronous_errors_not_registered() {
        let manager = RunManager::new();
        let mut bad = request();
        bad.params = bad.params.with_base_days_target(30);
        let err = manager.submit(bad).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(manager.list().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_solving() {
        let manager = RunManager::with_engine(RosterEngine::with_solver(UntilCancelled));
        let run_id = manager.submit(request()).unwrap();
        wait_for(&manager, run_id, RunStatus::Solving).await;
        assert_eq!(manager.active_runs(), vec![run_id]);

        assert_eq!(manager.cancel(run_id).unwrap(), RunStatus::Solving);
        let report = manager
            .wait(run_id, Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(report.assignments.is_empty());
        assert_eq!(report.diagnostics.solver_status, Some(SolverStatus::Cancelled));

        // Terminal states are write-once.
        let err = manager.cancel(run_id).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_cancel_unknown_run() {
        let manager = RunManager::new();
        let id = Uuid::new_v4();
        assert_eq!(manager.cancel(id).unwrap_err(), EngineError::RunNotFound(id));
        assert!(manager.snapshot(id).is_none());
        assert!(manager
            .wait(id, Duration::from_millis(1))
            .await
            .is_err());
    }

    #[test]
    fn test_late_result_discarded() {
        let handle = RunHandle::new(Uuid::new_v4(), RunStatus::Building);
        let mut state = handle.state.lock();
        state.status = RunStatus::Cancelled;
        drop(state);

        let report = RunReport {
            run_id: handle.run_id,
            status: RunStatus::Success,
            assignments: Vec::new(),
            metrics: None,
            diagnostics: RunDiagnostics::default(),
            error: None,
        };
        handle.advance(RunStatus::Solving);
        handle.finish(report);

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, RunStatus::Cancelled);
        assert!(snapshot.report.is_none());
    }

    #[tokio::test]
    async fn test_remove_cancels() {
        let manager = RunManager::with_engine(RosterEngine::with_solver(UntilCancelled));
        let run_id = manager.submit(request()).unwrap();
        let snapshot = manager.remove(run_id).unwrap();
        assert_eq!(snapshot.run_id, run_id);
        assert!(manager.status(run_id).is_none());
        assert!(manager.active_runs().is_empty());
    }
}
