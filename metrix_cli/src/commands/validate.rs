use crate::ui;
use anyhow::Result;
use colored::Colorize;
use metrix_config::{load_config_from_file, CounterReducer, GaugeReducer, MetricsConfig};
use std::path::PathBuf;

pub async fn execute(config_file: PathBuf) -> Result<()> {
    println!("{}", "=== Validating Metrics Config ===".bold().cyan());
    println!("File: {}", config_file.display());

    match load_config_from_file(&config_file).await {
        Ok(config) => {
            println!("\n{}", "✓ Config is valid!".green().bold());
            print_details(&config);
            Ok(())
        }
        Err(e) => {
            println!("\n{}", "✗ Config is invalid!".red().bold());
            ui::print_error(&format!("Error: {:#}", e));
            Err(e)
        }
    }
}

fn print_details(config: &MetricsConfig) {
    let recorder = &config.recorder;
    println!("\nRecorder:");
    println!("  Separator: {:?}", recorder.separator);
    println!("  Counter: {:?}", recorder.counter);
    println!("  Timer: {:?}", recorder.timer);
    println!("  Gauge: {:?}", recorder.gauge);
    println!("  Histogram: {:?}", recorder.histogram);

    let aggregator = &config.aggregator;
    println!("\nAggregator:");
    println!(
        "  Counter: {}",
        match aggregator.counter {
            CounterReducer::Sum => "sum",
            CounterReducer::Discard => "discard",
        }
    );
    println!(
        "  Gauge: {}",
        match aggregator.gauge {
            GaugeReducer::Latest => "latest value",
            GaugeReducer::Discard => "discard",
        }
    );
    match aggregator.timer_spec() {
        Some(spec) => println!("  Timer: {}", ui::describe_spec(&spec)),
        None => println!("  Timer: discard"),
    }
    match aggregator.histogram_spec() {
        Some(spec) => println!("  Histogram: {}", ui::describe_spec(&spec)),
        None => println!("  Histogram: discard"),
    }

    if aggregator.counter == CounterReducer::Discard && aggregator.timer_spec().is_none() {
        ui::print_warning("Counters and timers are both discarded");
    }
}
