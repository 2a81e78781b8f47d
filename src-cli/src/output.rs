//! Plain-text and JSON rendering of plans and reports.

use gradesync::{ActionPlan, ExecutionReport};
use serde::Serialize;

use crate::error::{CliError, CliResult};

pub fn print_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Input(format!("cannot render JSON: {}", e)))?;
    println!("{}", text);
    Ok(())
}

pub fn print_plan(plan: &ActionPlan) {
    println!("Plan ({}): {} actions", plan.intent(), plan.len());
    for planned in plan.actions() {
        match planned.depends_on {
            Some(dep) => println!("  {:>4}  {}  (after {})", planned.id, planned.action, dep),
            None => println!("  {:>4}  {}", planned.id, planned.action),
        }
    }
    if !plan.unresolved().is_empty() {
        println!();
        println!("Not planned:");
        for node in plan.unresolved() {
            println!("  {} '{}': {}", node.kind, node.name, node.reason);
        }
    }
}

pub fn print_report(report: &ExecutionReport) {
    println!();
    println!("{:<18} {:>9} {:>7} {:>8}", "ACTION", "SUCCEEDED", "FAILED", "SKIPPED");
    for (kind, counts) in report.summary() {
        println!(
            "{:<18} {:>9} {:>7} {:>8}",
            kind.to_string(),
            counts.succeeded,
            counts.failed,
            counts.skipped
        );
    }

    for failed in &report.failed {
        println!("✗ {}: {}", failed.action.description, failed.reason);
    }
    for warning in &report.warnings {
        println!("! {}: {}", warning.action, warning.message);
    }
    for node in &report.unresolved {
        println!("? {} '{}': {}", node.kind, node.name, node.reason);
    }

    if report.interrupted {
        println!("Interrupted; {} actions were not attempted.", report.skipped.len());
    } else if report.aborted {
        println!("Aborted after repeated connection failures.");
    }

    let seconds = report
        .duration()
        .map(|d| d.num_milliseconds() as f64 / 1000.0)
        .unwrap_or_default();
    println!(
        "{} of {} actions applied in {:.1}s (run {})",
        report.succeeded.len(),
        report.total(),
        seconds,
        report.run_id
    );
}

/// Maps a finished report onto the exit status.
pub fn outcome(report: &ExecutionReport) -> CliResult<()> {
    if report.is_complete() {
        return Ok(());
    }
    Err(CliError::Incomplete(format!(
        "{} failed, {} skipped, {} unresolved",
        report.failed.len(),
        report.skipped.len(),
        report.unresolved.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gradesync::planner::{Intent, UnresolvedNode, UnresolvedReason};
    use gradesync::tree::EntityKind;
    use uuid::Uuid;

    #[test]
    fn test_empty_report_is_success() {
        let report = ExecutionReport::new(Uuid::nil(), Intent::Update);
        assert!(outcome(&report).is_ok());
    }

    #[test]
    fn test_unresolved_nodes_make_the_run_partial() {
        let mut report = ExecutionReport::new(Uuid::nil(), Intent::Update);
        report.unresolved.push(UnresolvedNode {
            kind: EntityKind::Item,
            name: "CE9.9".into(),
            reason: UnresolvedReason::ParentUnresolved {
                parent: "RA9".into(),
            },
        });

        let err = outcome(&report).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("1 unresolved"));
    }
}
