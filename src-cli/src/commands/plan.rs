//! `gradesync plan`: show what a run would do without touching anything.

use clap::{Args, ValueEnum};
use gradesync::scope::{find_deletion_scope, plan_delete};
use gradesync::{plan_create, plan_update, ActionPlan, ConfigError, GradebookConfig, Resolver};

use super::{Connection, GlobalOptions};
use crate::error::CliResult;
use crate::output::{print_json, print_plan};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlanKind {
    Create,
    Update,
    Delete,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Which plan to build
    #[arg(value_enum)]
    pub kind: PlanKind,

    /// Category to delete (delete plans only; defaults to the parent category)
    #[arg(long)]
    pub category: Option<String>,
}

pub fn resolver_for(config: &GradebookConfig) -> Resolver {
    Resolver::default().with_ambiguity(config.sync.ambiguity)
}

/// Builds the plan for `kind`. Update and delete plans need the live tree,
/// so `connection` must be open for them.
pub async fn build_plan(
    kind: PlanKind,
    config: &GradebookConfig,
    connection: Option<&Connection>,
    category: Option<&str>,
) -> CliResult<ActionPlan> {
    let tree = config.declared_tree();
    let resolver = resolver_for(config);

    let plan = match (kind, connection) {
        (PlanKind::Create, _) => plan_create(&tree).map_err(ConfigError::InvalidTree)?,
        (PlanKind::Update, Some(connection)) => {
            let snapshot = connection.snapshot().await?;
            plan_update(&tree, &snapshot, &resolver).map_err(ConfigError::InvalidTree)?
        }
        (PlanKind::Delete, Some(connection)) => {
            let snapshot = connection.snapshot().await?;
            let target = category.unwrap_or(config.parent_category.as_str());
            let scope = find_deletion_scope(&snapshot, target, &resolver)?;
            plan_delete(&scope)
        }
        (_, None) => {
            return Err(crate::error::CliError::Input(format!(
                "a {:?} plan needs a gradebook connection",
                kind
            )))
        }
    };
    Ok(plan)
}

pub async fn execute(args: PlanArgs, global: &GlobalOptions) -> CliResult<()> {
    let config = global.load()?;

    let connection = match args.kind {
        PlanKind::Create => None,
        PlanKind::Update | PlanKind::Delete => Some(Connection::open(&config).await?),
    };
    let plan = build_plan(args.kind, &config, connection.as_ref(), args.category.as_deref()).await?;

    if global.json {
        return print_json(&plan);
    }
    print_plan(&plan);
    Ok(())
}
