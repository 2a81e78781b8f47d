//! gradesync - keep a Moodle gradebook in line with a declared tree of
//! categories and grade items.

mod commands;
mod error;
mod logging;
mod output;
mod progress;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::init::InitArgs;
use commands::plan::PlanArgs;
use commands::run::DeleteArgs;
use commands::GlobalOptions;
use error::CliResult;

#[derive(Parser)]
#[command(name = "gradesync")]
#[command(author, version, about = "Reconcile a Moodle gradebook with a declared category tree")]
#[command(propagate_version = true)]
struct Cli {
    /// Gradebook file (defaults to datos_aules.json in the current or home directory)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Print plans and reports as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter gradebook file
    Init(InitArgs),

    /// Show the actions a run would take, without applying them
    Plan(PlanArgs),

    /// Create the declared categories and items
    Create,

    /// Push declared coefficients, formulas and grade settings onto existing entries
    Update,

    /// Delete a category and everything below it
    Delete(DeleteArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = run(cli).await;

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let global = GlobalOptions {
        config: cli.config,
        json: cli.json,
    };

    match cli.command {
        Commands::Init(args) => commands::init::execute(args, &global).await,
        Commands::Plan(args) => commands::plan::execute(args, &global).await,
        Commands::Create => commands::run::create(&global).await,
        Commands::Update => commands::run::update(&global).await,
        Commands::Delete(args) => commands::run::delete(args, &global).await,
    }
}
