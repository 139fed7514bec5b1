use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use comfy_table::{Cell, Table};
use rand::rngs::StdRng;
use rand::SeedableRng;

use tally::fmt::money;
use tally::{AccountFilter, AccountReport, Outcome, Reconciler, RunSummary, SqliteStore};

#[derive(Parser)]
#[command(
    name = "tally",
    version,
    about = "Reconcile stated account balances against their transaction history."
)]
struct Cli {
    /// Only reconcile accounts owned by this user
    #[arg(long = "user-id", alias = "userId", value_name = "ID")]
    user_id: Option<String>,

    /// Only reconcile this account
    #[arg(long = "account-id", alias = "accountId", value_name = "ID")]
    account_id: Option<String>,

    /// Ledger database path (default: ~/.tally/ledger.db)
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Report drift without writing anything
    #[arg(long)]
    check: bool,

    /// Print the run summary as JSON instead of the progress log
    #[arg(long)]
    json: bool,

    /// Fixed seed for synthetic-history randomness (reproducible runs)
    #[arg(long, value_name = "N")]
    seed: Option<u64>,
}

fn main() {
    let cli = Cli::parse();
    // Individual account failures are reported in the summary and exit 0;
    // only a run that cannot start at all exits non-zero.
    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let db_path = cli.db.unwrap_or_else(tally::settings::default_db_path);
    let mut store = SqliteStore::open(&db_path)
        .with_context(|| format!("cannot open ledger store at {}", db_path.display()))?;

    let rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let filter = AccountFilter { user_id: cli.user_id, account_id: cli.account_id };

    let quiet = cli.json;
    let summary = Reconciler::new(&mut store, rng)
        .check_only(cli.check)
        .run_with(&filter, |report| {
            if !quiet {
                print_account(report);
            }
        })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, cli.check);
    }
    Ok(())
}

fn print_account(report: &AccountReport) {
    for warning in &report.warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
    let label = format!("{} (stated {})", report.account_id, money(report.stated_balance));
    match &report.outcome {
        Outcome::InSync { calculated } => {
            println!("{label}  {}", format!("in sync at {}", money(*calculated)).green());
        }
        Outcome::Adjusted { delta, written, .. } => {
            println!(
                "{label}  {}",
                format!("adjusted by {} ({written} new transactions)", money(*delta)).yellow()
            );
        }
        Outcome::Drift { calculated, delta } => {
            println!(
                "{label}  {}",
                format!("out of sync: ledger sums to {}, off by {}", money(*calculated), money(*delta))
                    .yellow()
            );
        }
        Outcome::Failed { stage, message } => {
            println!("{label}  {}", format!("failed while {stage}: {message}").red());
        }
    }
}

fn print_summary(summary: &RunSummary, check: bool) {
    let mut table = Table::new();
    table.set_header(vec!["", "Count"]);
    table.add_row(vec![Cell::new("Accounts processed"), Cell::new(summary.processed)]);
    table.add_row(vec![Cell::new("In sync"), Cell::new(summary.in_sync)]);
    table.add_row(vec![
        Cell::new(if check { "Out of sync" } else { "Adjusted" }),
        Cell::new(summary.adjusted),
    ]);
    table.add_row(vec![Cell::new("Failed"), Cell::new(summary.failed)]);
    table.add_row(vec![
        Cell::new("Transactions written"),
        Cell::new(summary.transactions_written),
    ]);
    println!("\nReconciliation summary\n{table}");

    if summary.failed > 0 {
        println!(
            "{}",
            format!("{} account(s) failed; re-running will retry them.", summary.failed).red()
        );
    }
}
