use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use common::{Category, Check, CheckResult, Homework, Solution};
use depot::{Depot, Operator};
use tracing::{Level, info, warn};
use worker::{Checker, GraderAppConfig, Orchestrator, RecheckMode, RlimitSandbox};

#[derive(Parser)]
#[command(name = "grader", author, version, about = "Incremental homework checker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run checks for every actual solution
    Check {
        /// Re-run every (check, solution) pair regardless of staleness
        #[arg(long)]
        full: bool,
    },
    /// Print stored results for one student and task
    Results {
        #[arg(long)]
        user: String,
        #[arg(long)]
        task: String,
        /// Only results of this check category
        #[arg(long)]
        category: Option<Category>,
    },
    /// Delete every stored record of one kind
    Purge { kind: RecordKind },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RecordKind {
    Checks,
    Solutions,
    Results,
    Homeworks,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GraderAppConfig::load().context("Failed to load config")?;

    let level = config.logging.max_level();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(*level.as_ref().unwrap_or(&Level::INFO))
        .init();
    if let Err(e) = &level {
        warn!(level = %config.logging.level, error = %e, "Invalid logging.level, using info");
    }

    let depot = Depot::connect(&config.database)
        .await
        .context("Failed to open depot")?;

    match cli.command {
        Commands::Check { full } => {
            let mode = if full { RecheckMode::Full } else { RecheckMode::Incremental };
            let checker = Checker::new(RlimitSandbox, &config);
            let orchestrator = Orchestrator::new(depot, checker, config.worker.concurrency);

            // Dropping the sweep kills any running child.
            tokio::select! {
                report = orchestrator.sweep(mode) => {
                    let report = report.context("Sweep aborted")?;
                    info!(
                        solutions = report.solutions,
                        checked = report.checked,
                        fresh = report.fresh,
                        missing_checks = report.missing_checks,
                        no_result = report.no_result,
                        "Done"
                    );
                }
                _ = tokio::signal::ctrl_c() => warn!("Interrupted, sweep cancelled"),
            }
        }
        Commands::Results {
            user,
            task,
            category,
        } => {
            let mut search = depot
                .search::<CheckResult>()
                .filter("user_id", Operator::Eq, user)
                .filter("task_id", Operator::Eq, task);
            if let Some(category) = category {
                search = search.filter("category", Operator::Eq, category);
            }
            let results = search
                .fields(&["check_id", "category", "verdict", "rating", "timestamp"])
                .all()
                .await
                .context("Failed to query results")?;
            for result in results {
                println!(
                    "{}\t{}\t{}\t{:.3}",
                    result.check_id, result.category, result.verdict, result.rating
                );
            }
        }
        Commands::Purge { kind } => {
            let removed = match kind {
                RecordKind::Checks => depot.delete::<Check>(&[]).await,
                RecordKind::Solutions => depot.delete::<Solution>(&[]).await,
                RecordKind::Results => depot.delete::<CheckResult>(&[]).await,
                RecordKind::Homeworks => depot.delete::<Homework>(&[]).await,
            }
            .context("Failed to purge")?;
            info!(?kind, removed, "Purged");
        }
    }

    Ok(())
}
