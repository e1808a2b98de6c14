//! SEMA - Symbol Economy Modeling Architecture
//! Command-line runner for the closed-loop symbol transformation pipeline

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::*;
use serde_json::json;

use sema_core::alphabet::{ALPHABET, NC1_SYMBOLS, NC2_SYMBOLS, NC3_SYMBOLS};
use sema_pipeline::{PipelineConfig, StageId, SymbolPipeline};

#[derive(Parser)]
#[command(name = "sema")]
#[command(author = "SEMA Contributors")]
#[command(version = "2026.8.1")]
#[command(about = "SEMA - closed-loop symbol economy pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and print stage counters
    Run {
        /// Seconds to run the cooperative loop
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f64,

        /// JSON configuration file (defaults apply for missing fields)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Override the RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Print results as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON
    Config,

    /// Show information about the symbol alphabet and channels
    Info,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            seconds,
            config,
            seed,
            json,
        } => {
            if let Err(e) = run_command(seconds, config.as_deref(), seed, json) {
                eprintln!("{} {}", "error:".red().bold(), e);
                std::process::exit(1);
            }
        }

        Commands::Config => {
            if let Err(e) = config_command() {
                eprintln!("{} {}", "error:".red().bold(), e);
                std::process::exit(1);
            }
        }

        Commands::Info => {
            print_info();
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)?;
            let config: PipelineConfig = serde_json::from_str(&raw)?;
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run_command(
    seconds: f64,
    config_path: Option<&Path>,
    seed: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(seed) = seed {
        config.seed = seed;
    }

    let mut pipeline = SymbolPipeline::new(config)?;
    tracing::info!(seconds, "running pipeline");
    pipeline.run_for(Duration::from_secs_f64(seconds.max(0.0)));

    let snapshot = pipeline.snapshot()?;
    let ledger = pipeline.ledger()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "counters": snapshot,
                "ledger": ledger,
            }))?
        );
        return Ok(());
    }

    println!("{}", "stage counters".bold());
    println!(
        "{:<16} {:>6} {:>10} {:>8} {:>10} {:>10} {:>8}",
        "stage", "ticks", "processed", "moved", "converted", "rejected", "faults"
    );
    for entry in &snapshot.stages {
        let c = entry.counters;
        println!(
            "{:<16} {:>6} {:>10} {:>8} {:>10} {:>10} {:>8}",
            entry.stage.to_string().cyan(),
            c.ticks,
            c.processed,
            c.moved,
            c.converted,
            c.rejected,
            c.store_faults
        );
    }

    println!();
    println!("{}", "capacity ledger".bold());
    println!(
        "  total: {}/{:.1}   per channel: {:.1}",
        ledger.total_usage.to_string().green(),
        ledger.total_capacity,
        ledger.channel_capacity[0]
    );
    for (idx, name) in ["NC1", "NC2", "NC3"].iter().enumerate() {
        println!(
            "  {}: {}/{:.1}",
            name.cyan(),
            ledger.channel_usage[idx],
            ledger.channel_capacity[idx]
        );
    }

    Ok(())
}

fn config_command() -> anyhow::Result<()> {
    let config = PipelineConfig::default();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn print_info() {
    println!("{}", "SEMA - Symbol Economy Modeling Architecture".bold());
    println!();
    println!(
        "alphabet ({}): {}",
        ALPHABET.len(),
        ALPHABET.iter().collect::<String>().cyan()
    );
    println!(
        "  {} {}",
        "NC1:".green(),
        NC1_SYMBOLS.iter().collect::<String>()
    );
    println!(
        "  {} {}",
        "NC2:".green(),
        NC2_SYMBOLS.iter().collect::<String>()
    );
    println!(
        "  {} {}",
        "NC3:".green(),
        NC3_SYMBOLS.iter().collect::<String>()
    );
    println!();
    println!("stages:");
    for stage in StageId::all() {
        match stage.downstream() {
            Some(next) => println!("  {} -> {}", stage, next),
            None => println!("  {} -> environment (feedback)", stage),
        }
    }
}
