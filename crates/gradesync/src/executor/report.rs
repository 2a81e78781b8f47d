//! What a run did, action by action, in a form the CLI can print or
//! serialise.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::planner::{ActionId, ActionKind, Intent, PlannedAction, UnresolvedNode};
use crate::resolver::ResolutionFailure;
use crate::tree::RemoteId;

/// Identity of an action in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    pub id: ActionId,
    pub kind: ActionKind,
    pub name: String,
    pub description: String,
    /// Identifier of the entity touched, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<RemoteId>,
}

impl ActionRecord {
    pub fn new(planned: &PlannedAction, remote_id: Option<RemoteId>) -> Self {
        Self {
            id: planned.id,
            kind: planned.action.kind(),
            name: planned.action.entity_name().to_string(),
            description: planned.action.to_string(),
            remote_id,
        }
    }
}

/// Why an action failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// The request went through but its result could not be identified.
    Resolution { failure: ResolutionFailure },
    /// The gradebook refused the request or answered with an error.
    RemoteOperation { message: String },
    /// Network or session failure.
    Transport { message: String },
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Resolution { failure } => write!(f, "{}", failure),
            FailureReason::RemoteOperation { message } => write!(f, "{}", message),
            FailureReason::Transport { message } => write!(f, "transport: {}", message),
        }
    }
}

/// Why an action never ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipReason {
    /// An action this one needs failed or was skipped.
    DependencyFailed { dependency: ActionId },
    /// The run stopped after repeated transport failures.
    Aborted,
    /// The operator interrupted the run.
    Interrupted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::DependencyFailed { dependency } => {
                write!(f, "dependency {} did not succeed", dependency)
            }
            SkipReason::Aborted => write!(f, "run aborted"),
            SkipReason::Interrupted => write!(f, "run interrupted"),
        }
    }
}

/// An action that ran and failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedAction {
    pub action: ActionRecord,
    pub reason: FailureReason,
}

/// An action that was not attempted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedAction {
    pub action: ActionRecord,
    pub reason: SkipReason,
}

/// Non-fatal problem attached to an action that otherwise succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionWarning {
    pub action: ActionId,
    pub message: String,
}

/// Per-kind tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Outcome of one run. Every planned action lands in exactly one of
/// `succeeded`, `failed` or `skipped`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub intent: Intent,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub succeeded: Vec<ActionRecord>,
    pub failed: Vec<FailedAction>,
    pub skipped: Vec<SkippedAction>,
    /// Declared nodes the planner could not map to remote entities.
    pub unresolved: Vec<UnresolvedNode>,
    pub warnings: Vec<ActionWarning>,
    pub aborted: bool,
    pub interrupted: bool,
}

impl ExecutionReport {
    pub fn new(run_id: Uuid, intent: Intent) -> Self {
        Self {
            run_id,
            intent,
            started_at: Utc::now(),
            finished_at: None,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            unresolved: Vec::new(),
            warnings: Vec::new(),
            aborted: false,
            interrupted: false,
        }
    }

    pub(crate) fn record_success(&mut self, planned: &PlannedAction, remote_id: Option<RemoteId>) {
        self.succeeded.push(ActionRecord::new(planned, remote_id));
    }

    pub(crate) fn record_failure(&mut self, planned: &PlannedAction, reason: FailureReason) {
        self.failed.push(FailedAction {
            action: ActionRecord::new(planned, None),
            reason,
        });
    }

    pub(crate) fn record_skip(&mut self, planned: &PlannedAction, reason: SkipReason) {
        self.skipped.push(SkippedAction {
            action: ActionRecord::new(planned, None),
            reason,
        });
    }

    pub(crate) fn record_warning(&mut self, action: ActionId, message: impl Into<String>) {
        self.warnings.push(ActionWarning {
            action,
            message: message.into(),
        });
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of actions accounted for, whatever their outcome.
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// True when everything planned was applied and nothing was left out.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
            && self.skipped.is_empty()
            && self.unresolved.is_empty()
            && !self.aborted
            && !self.interrupted
    }

    /// Outcome counts per action kind.
    pub fn summary(&self) -> BTreeMap<ActionKind, KindSummary> {
        let mut summary: BTreeMap<ActionKind, KindSummary> = BTreeMap::new();
        for record in &self.succeeded {
            summary.entry(record.kind).or_default().succeeded += 1;
        }
        for failed in &self.failed {
            summary.entry(failed.action.kind).or_default().failed += 1;
        }
        for skipped in &self.skipped {
            summary.entry(skipped.action.kind).or_default().skipped += 1;
        }
        summary
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{Action, Target};

    fn planned(id: usize, name: &str) -> PlannedAction {
        PlannedAction {
            id: ActionId(id),
            action: Action::CreateCategory {
                name: name.into(),
                parent: Target::CourseRoot,
                aggregation_coefficient: 0.0,
            },
            depends_on: None,
        }
    }

    #[test]
    fn test_summary_groups_by_kind() {
        let mut report = ExecutionReport::new(Uuid::new_v4(), Intent::Create);
        report.record_success(&planned(0, "a"), Some(RemoteId::category(1)));
        report.record_failure(
            &planned(1, "b"),
            FailureReason::RemoteOperation {
                message: "HTTP 500".into(),
            },
        );
        report.record_skip(
            &planned(2, "c"),
            SkipReason::DependencyFailed {
                dependency: ActionId(1),
            },
        );

        let summary = report.summary();
        assert_eq!(
            summary[&ActionKind::CreateCategory],
            KindSummary {
                succeeded: 1,
                failed: 1,
                skipped: 1
            }
        );
        assert_eq!(report.total(), 3);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_empty_report_is_complete() {
        let mut report = ExecutionReport::new(Uuid::new_v4(), Intent::Delete);
        report.finish();
        assert!(report.is_complete());
        assert!(report.duration().is_some());
    }

    #[test]
    fn test_report_serializes() {
        let mut report = ExecutionReport::new(Uuid::new_v4(), Intent::Create);
        report.record_skip(&planned(0, "a"), SkipReason::Interrupted);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["intent"], "create");
        assert_eq!(json["skipped"][0]["reason"]["type"], "interrupted");
        assert_eq!(json["skipped"][0]["action"]["kind"], "create_category");
    }
}
