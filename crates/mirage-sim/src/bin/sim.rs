#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use mirage_sim::{CampaignConfig, FaultConfig, run_campaign};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Run reconciliation-convergence campaigns against seeded random
/// editing sessions.
#[derive(Parser, Debug)]
#[command(author, version, about = "mirage reconciliation simulator", long_about = None)]
struct Args {
    /// Number of seeds to run, starting at --first-seed.
    #[arg(long, default_value_t = 200)]
    seeds: u64,

    /// First seed of the range.
    #[arg(long, default_value_t = 0)]
    first_seed: u64,

    /// Rounds of user activity per seed.
    #[arg(long, default_value_t = 32)]
    rounds: u64,

    /// Percent chance of an edit per round.
    #[arg(long, default_value_t = 80)]
    edit_rate: u8,

    /// Percent of optimistic calls rejected as conflicts.
    #[arg(long, default_value_t = 10)]
    conflict_rate: u8,

    /// Percent chance per round of a foreign-session push.
    #[arg(long, default_value_t = 10)]
    foreign_push_rate: u8,

    /// Maximum response delay in rounds.
    #[arg(long, default_value_t = 3)]
    max_delay: u8,

    /// Percent of rejections duplicated on the wire.
    #[arg(long, default_value_t = 5)]
    duplicate_rate: u8,

    /// Percent chance of rejections overtaking ready deltas.
    #[arg(long, default_value_t = 10)]
    reorder_rate: u8,

    /// Print the effective config as JSON before running.
    #[arg(long)]
    show_config: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = CampaignConfig {
        seed_range: args.first_seed..args.first_seed + args.seeds,
        rounds: args.rounds,
        edit_rate_percent: args.edit_rate,
        conflict_rate_percent: args.conflict_rate,
        foreign_push_rate_percent: args.foreign_push_rate,
        fault: FaultConfig {
            max_delay_rounds: args.max_delay,
            duplicate_rate_percent: args.duplicate_rate,
            reorder_rate_percent: args.reorder_rate,
        },
    };

    if args.show_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }

    let result = run_campaign(&config).into_result()?;
    println!(
        "campaign complete: seeds={} failures={}",
        result.seeds_run,
        result.failures.len()
    );
    Ok(())
}
