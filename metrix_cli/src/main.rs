mod commands;
mod ui;

use clap::{Parser, Subcommand};
use metrix_config::Preset;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "metrix")]
#[command(about = "In-process metrics toolkit: benchmarks, config validation and presets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Write logs to `metrix.log` in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Micro-benchmark sources, timers and aggregator reports
    Bench {
        /// Calls per measurement
        #[arg(short, long, default_value_t = 200_000)]
        iterations: u64,

        /// Discarded measurements before the recorded ones
        #[arg(short, long, default_value_t = 3)]
        warm_up: u32,

        /// Recorded measurements
        #[arg(short, long, default_value_t = 10)]
        tries: u32,

        /// Number of metrics populated before timing reports
        #[arg(short, long, default_value_t = 100)]
        metrics: usize,

        /// Timer samples per metric before timing reports
        #[arg(short, long, default_value_t = 1000)]
        points: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,

        /// Also save the JSON results to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a metrics configuration file
    Validate {
        /// Path to config file (YAML, TOML, or JSON)
        config_file: PathBuf,
    },

    /// List built-in presets
    Presets {
        /// Print the full configuration of one preset as YAML
        #[arg(short, long)]
        show: Option<Preset>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    // Held until exit so buffered file logs are flushed.
    let _guard = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "metrix.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    match cli.command {
        Commands::Bench {
            iterations,
            warm_up,
            tries,
            metrics,
            points,
            json,
            output,
        } => {
            let options = commands::bench::BenchOptions {
                iterations,
                warm_up,
                tries,
                metrics,
                points,
            };
            commands::bench::execute(options, json, output).await?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }

        Commands::Presets { show } => {
            commands::presets::execute(show).await?;
        }
    }

    Ok(())
}
