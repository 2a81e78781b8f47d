use crate::planner::{Intent, PlannedAction};

use super::report::ExecutionReport;

/// How one action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatus {
    Succeeded,
    Failed,
    Skipped,
}

/// Events emitted by the executor while it runs a plan.
pub enum ExecutionEvent<'a> {
    Started {
        intent: Intent,
        total: usize,
    },
    ActionStarted {
        action: &'a PlannedAction,
    },
    ActionFinished {
        action: &'a PlannedAction,
        status: ActionStatus,
    },
    Finished {
        report: &'a ExecutionReport,
    },
}

/// Receives progress events from a running [`PlanExecutor`](super::PlanExecutor).
///
/// Called inline between actions, so implementations should return quickly.
pub trait ExecutionObserver: Send + Sync {
    fn report(&self, event: ExecutionEvent<'_>);
}

/// No-op observer for tests and non-interactive runs.
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {
    fn report(&self, _event: ExecutionEvent<'_>) {}
}
