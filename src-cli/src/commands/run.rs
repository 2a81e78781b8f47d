//! `gradesync create|update|delete`: build a plan and apply it.

use clap::Args;
use dialoguer::Confirm;
use gradesync::{GradebookConfig, PlanExecutor, RetryingResolver};

use super::plan::{build_plan, resolver_for, PlanKind};
use super::{interrupt_flag, Connection, GlobalOptions};
use crate::error::{CliError, CliResult};
use crate::output::{outcome, print_json, print_plan, print_report};
use crate::progress::ProgressObserver;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Category to delete along with everything below it (defaults to the
    /// parent category)
    #[arg(long)]
    pub category: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn create(global: &GlobalOptions) -> CliResult<()> {
    let config = global.load()?;
    apply(PlanKind::Create, &config, global, None, true).await
}

pub async fn update(global: &GlobalOptions) -> CliResult<()> {
    let config = global.load()?;
    apply(PlanKind::Update, &config, global, None, true).await
}

pub async fn delete(args: DeleteArgs, global: &GlobalOptions) -> CliResult<()> {
    let config = global.load()?;
    apply(
        PlanKind::Delete,
        &config,
        global,
        args.category.as_deref(),
        args.yes,
    )
    .await
}

async fn apply(
    kind: PlanKind,
    config: &GradebookConfig,
    global: &GlobalOptions,
    category: Option<&str>,
    confirmed: bool,
) -> CliResult<()> {
    let connection = Connection::open(config).await?;
    let plan = build_plan(kind, config, Some(&connection), category).await?;

    if kind == PlanKind::Delete && !confirmed {
        print_plan(&plan);
        let target = category.unwrap_or(config.parent_category.as_str());
        let proceed = Confirm::new()
            .with_prompt(format!(
                "Delete '{}' and the {} entries listed above?",
                target,
                plan.len()
            ))
            .default(false)
            .interact()?;
        if !proceed {
            return Err(CliError::Cancelled);
        }
    }

    let Connection {
        client,
        provider,
        session,
        course,
    } = connection;

    let progress = ProgressObserver::new(global.json);
    let resolver = RetryingResolver::new(resolver_for(config), config.sync.retry_policy());
    let mut executor = PlanExecutor::new(&client, session, course)
        .with_session_provider(&provider)
        .with_resolver(resolver)
        .with_pacing(config.sync.pacing())
        .with_observer(&progress)
        .with_interrupt_flag(interrupt_flag());

    let report = executor.execute(&plan).await;

    if global.json {
        print_json(&report)?;
    } else {
        print_report(&report);
    }
    outcome(&report)
}
