use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use taskbudget::db::PgStore;
use taskbudget::estimation::{decode_time, encode_time};
use taskbudget::models::Budget;
use taskbudget::report::{filter_budgets, load_budgets};
use taskbudget::{Config, ErrorPolicy, Estimator, Planner};

#[derive(Parser, Debug)]
#[command(name = "taskbudget")]
#[command(about = "Hours estimation for task, item and use-case budgets")]
#[command(version)]
struct Cli {
    /// Fail on unknown complexities and malformed durations instead of
    /// counting them as zero
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a duration like 2:30 to decimal hours
    Decode {
        /// Duration as H, HH or HH:MM
        time: String,
    },

    /// Convert decimal hours to HH:MM
    Encode {
        hours: Decimal,
    },

    /// Estimate budgets from a JSON export
    Estimate {
        /// File holding a JSON array of budgets
        file: PathBuf,

        /// Only report budgets whose name contains this text
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Report a user's budgets from the database
    Report {
        /// User id (defaults to TASKBUDGET_USER)
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let policy = if cli.strict {
        ErrorPolicy::Strict
    } else {
        config.estimation.policy
    };
    tracing::debug!("Using {} error policy", policy);

    match cli.command {
        Command::Decode { time } => {
            let hours = match decode_time(Some(&time)) {
                Ok(hours) => hours,
                Err(e) if policy.is_strict() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!("Counting as zero hours: {}", e);
                    Decimal::ZERO
                }
            };
            println!("{}", hours.normalize());
        }
        Command::Encode { hours } => println!("{}", encode_time(hours)),
        Command::Estimate { file, search } => {
            let budgets = load_budgets(&file)?;
            let matching: Vec<Budget> = filter_budgets(&budgets, &search)
                .into_iter()
                .cloned()
                .collect();
            print_budgets(Estimator::new(policy), &matching)?;
        }
        Command::Report { user } => {
            let user = user
                .or_else(|| config.default_user.clone())
                .ok_or_else(|| anyhow::anyhow!("No user given, pass --user or set TASKBUDGET_USER"))?;
            let store = PgStore::new(config.require_database()?).await?;
            let planner = Planner::new(Arc::new(store), policy);

            for report in planner.budget_reports(&user).await? {
                println!("{}", report);
            }
            print!("{}", planner.dashboard(&user).await?);
        }
    }

    Ok(())
}

/// `RUST_LOG` directives when set and valid, `info` otherwise.
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn print_budgets(estimator: Estimator, budgets: &[Budget]) -> anyhow::Result<()> {
    for budget in budgets {
        println!("{}", estimator.budget_report(budget)?);
    }

    let (items, tasks) = referenced_counts(budgets);
    print!("{}", estimator.dashboard_stats(budgets, items, tasks)?);
    Ok(())
}

/// Distinct items and tasks reachable from the budgets.
fn referenced_counts(budgets: &[Budget]) -> (usize, usize) {
    let mut items = HashSet::new();
    let mut tasks = HashSet::new();
    for csu in budgets.iter().flat_map(|b| &b.csus) {
        for link in &csu.item_links {
            items.insert(link.item_id);
            if let Some(item) = &link.item {
                tasks.extend(item.tasks.iter().map(|t| t.id));
            }
        }
        tasks.extend(csu.task_links.iter().map(|l| l.task_id));
    }
    (items.len(), tasks.len())
}
