use crate::ui;
use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use metrix_core::{
    Counter, CounterStrategy, MetricEvent, Recorder, RecorderConfig, Tags, Timer, TimerStrategy,
    TimerToken,
};
use metrix_stats::{
    record_sample, Aggregator, AggregatorConfig, Counters, HistogramSpec, Histograms, Reducer,
    TimerToHistogram,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::hint::black_box;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Reports are far more expensive than source calls.
const REPORT_ITERATION_DIVISOR: u64 = 200;

#[derive(Debug, Clone, Copy)]
pub struct BenchOptions {
    pub iterations: u64,
    pub warm_up: u32,
    pub tries: u32,
    pub metrics: usize,
    pub points: usize,
}

/// Microseconds per call, net of the empty-closure baseline.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Timing {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub name: String,
    #[serde(flatten)]
    pub timing: Timing,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub timestamp: DateTime<Utc>,
    pub iterations: u64,
    pub warm_up: u32,
    pub tries: u32,
    pub unit: &'static str,
    pub results: Vec<BenchResult>,
}

/// Timer reducer giving `rs`-scoped timers a small, fine-grained histogram.
#[derive(Debug)]
struct ScopedTimerReducer {
    scoped: HistogramSpec,
    fallback: HistogramSpec,
}

impl Reducer for ScopedTimerReducer {
    fn reduce(&self, event: &MetricEvent, histograms: &mut Histograms, _counters: &mut Counters) {
        let Some(duration) = event.duration() else {
            return;
        };
        let spec = if event.name.starts_with("rs") {
            &self.scoped
        } else {
            &self.fallback
        };
        record_sample(histograms, &event.name, spec, duration);
    }

    fn validate(&self) -> metrix_core::Result<()> {
        self.scoped.validate()?;
        self.fallback.validate()
    }
}

struct Bench {
    options: BenchOptions,
    baseline: Timing,
    results: Vec<BenchResult>,
}

impl Bench {
    fn new(options: BenchOptions) -> Self {
        let baseline = measure(&mut || {}, options.iterations, options.warm_up, options.tries);
        Self {
            options,
            baseline,
            results: Vec::new(),
        }
    }

    fn time(&mut self, name: &str, f: &mut dyn FnMut()) {
        self.time_with(name, self.options.iterations, f);
    }

    fn time_with(&mut self, name: &str, iterations: u64, f: &mut dyn FnMut()) {
        let raw = measure(f, iterations, self.options.warm_up, self.options.tries);
        let timing = Timing {
            min: (raw.min - self.baseline.min).max(0.0),
            avg: (raw.avg - self.baseline.avg).max(0.0),
            max: (raw.max - self.baseline.max).max(0.0),
        };
        info!("{}: {:.3}µs avg", name, timing.avg);
        self.results.push(BenchResult {
            name: name.to_string(),
            timing,
        });
    }
}

fn measure(f: &mut dyn FnMut(), iterations: u64, warm_up: u32, tries: u32) -> Timing {
    let iterations = iterations.max(1);
    let tries = tries.max(1);
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for attempt in 0..warm_up + tries {
        let start = Instant::now();
        for _ in 0..iterations {
            f();
        }
        let elapsed = start.elapsed();

        if attempt >= warm_up {
            let per_call = elapsed.as_secs_f64() * 1_000_000.0 / iterations as f64;
            sum += per_call;
            min = min.min(per_call);
            max = max.max(per_call);
        }
    }

    Timing {
        min,
        avg: sum / tries as f64,
        max,
    }
}

fn tags(pairs: &[(&str, &str)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn run(options: BenchOptions) -> Result<BenchReport> {
    let mut bench = Bench::new(options);

    let recorder = Recorder::new();
    let aggregator = Aggregator::new(
        &recorder,
        AggregatorConfig::default().with_timer(ScopedTimerReducer {
            scoped: HistogramSpec::bucket(
                0.01,
                1000.0,
                vec![0.1, 0.5, 0.75, 0.9, 0.95, 0.99, 0.999, 0.9999],
            ),
            fallback: HistogramSpec::default(),
        }),
    )?;

    let disabled = Recorder::with_config(
        RecorderConfig::default()
            .with_counter(CounterStrategy::Disabled)
            .with_timer(TimerStrategy::Disabled),
    )?;
    let disabled_aggregator = Aggregator::with_defaults(&disabled);

    let streaming = Recorder::new();
    let streaming_aggregator = Aggregator::new(
        &streaming,
        AggregatorConfig::default().with_timer(TimerToHistogram::new(HistogramSpec::streaming(
            vec![0.5, 0.9, 0.99],
        ))?),
    )?;

    bench.time("create counter", &mut || {
        black_box(recorder.counter("toto", None, None));
    });
    let counter = recorder.counter("cccc", None, None);
    bench.time("increment counter", &mut || counter.incr(1.0));

    bench.time("create disabled counter", &mut || {
        black_box(disabled.counter("toto", None, None));
    });
    let disabled_counter = disabled.counter("cccc", None, None);
    bench.time("increment disabled counter", &mut || disabled_counter.incr(1.0));

    time_timers(&mut bench, &recorder, "bucket")?;
    time_timers(&mut bench, &streaming, "streaming")?;

    bench.time("create disabled timer", &mut || {
        black_box(disabled.timer("titi", None));
    });
    let disabled_timer = disabled.timer("tttt", None);
    let mut failures = 0;
    bench.time("start/stop disabled timer", &mut || {
        let token = disabled_timer.start(None);
        if black_box(disabled_timer.stop(token, None)).is_err() {
            failures += 1;
        }
    });
    let start_tags = tags(&[("tag0", "start")]);
    let stop_tags = tags(&[("tag1", "stop")]);
    bench.time("start/stop disabled tag timer", &mut || {
        let token = disabled_timer.start(Some(start_tags.clone()));
        if black_box(disabled_timer.stop(token, Some(stop_tags.clone()))).is_err() {
            failures += 1;
        }
    });
    check_stops("disabled timer", failures)?;

    populate(&[&recorder, &streaming, &disabled], options)?;

    let report_iterations = (options.iterations / REPORT_ITERATION_DIVISOR).max(1);
    bench.time_with("aggregator report (bucket histo)", report_iterations, &mut || {
        black_box(aggregator.report());
    });
    bench.time_with("aggregator report (streaming histo)", report_iterations, &mut || {
        black_box(streaming_aggregator.report());
    });
    bench.time_with("disabled-aggregator report", report_iterations, &mut || {
        black_box(disabled_aggregator.report());
    });

    Ok(BenchReport {
        timestamp: Utc::now(),
        iterations: options.iterations,
        warm_up: options.warm_up,
        tries: options.tries,
        unit: "µs",
        results: bench.results,
    })
}

fn time_timers(bench: &mut Bench, recorder: &Recorder, label: &str) -> Result<()> {
    bench.time(&format!("create timer ({})", label), &mut || {
        black_box(recorder.timer("titi", None));
    });

    let mut failures = 0;
    let timer = recorder.timer("tttt", None);
    bench.time(&format!("start/stop timer ({})", label), &mut || {
        let token = timer.start(None);
        if black_box(timer.stop(token, None)).is_err() {
            failures += 1;
        }
    });

    let tagged = recorder.timer("tag-timer", None);
    let start_tags = tags(&[("tag0", "start")]);
    let stop_tags = tags(&[("tag1", "stop")]);
    bench.time(&format!("start/stop tagged timer ({})", label), &mut || {
        let token = tagged.start(Some(start_tags.clone()));
        if black_box(tagged.stop(token, Some(stop_tags.clone()))).is_err() {
            failures += 1;
        }
    });

    check_stops(&format!("timer ({})", label), failures)
}

/// Fails the run if any timed `stop` was rejected.
fn check_stops(operation: &str, failures: usize) -> Result<()> {
    if failures > 0 {
        anyhow::bail!("{}: {} stops were rejected during timing", operation, failures);
    }
    Ok(())
}

/// Fills every recorder with counters and interleaved timer samples so the
/// report benchmarks run against realistic state.
fn populate(recorders: &[&Recorder], options: BenchOptions) -> Result<()> {
    let mut rng = rand::thread_rng();
    let mut timers: Vec<Box<dyn Timer>> = Vec::new();
    let mut pending: Vec<(usize, TimerToken)> = Vec::new();

    if let Some(first) = recorders.first() {
        timers.push(first.scope("rs").timer("rs", None));
    }

    for j in 0..options.metrics {
        for recorder in recorders {
            let initial = rng.gen_range(0..1000) as f64;
            recorder.counter(&format!("toto{}", j), Some(initial), None);
            timers.push(recorder.timer(&format!("histo{}", j), None));
        }
    }

    for _ in 0..options.points {
        for (index, timer) in timers.iter().enumerate() {
            pending.push((index, timer.start(None)));
        }
    }
    pending.shuffle(&mut rng);

    let progress = ProgressBar::new(pending.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
            .progress_chars("=>-"),
    );
    progress.set_message("stopping timers");

    for (count, (index, token)) in pending.into_iter().enumerate() {
        timers[index].stop(token, None)?;
        if count % 10_000 == 0 {
            progress.set_position(count as u64);
        }
    }
    progress.finish_and_clear();

    info!(
        "Populated {} timers with {} samples each",
        timers.len(),
        options.points
    );
    Ok(())
}

pub async fn execute(options: BenchOptions, json: bool, output: Option<PathBuf>) -> Result<()> {
    if !json {
        ui::print_header("Metrix Benchmark");
        println!(
            "Iterations: {}, warm-up: {}, tries: {}",
            options.iterations, options.warm_up, options.tries
        );
    }

    let report = run(options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&report);
    }

    if let Some(path) = output {
        let contents = serde_json::to_string_pretty(&report)?;
        tokio::fs::write(&path, contents).await?;
        if !json {
            ui::print_success(&format!("Results saved to {}", path.display()));
        }
    }

    Ok(())
}

fn print_table(report: &BenchReport) {
    let width = report
        .results
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);

    println!(
        "\n{:<width$}  {:>10}  {:>10}  {:>10}",
        "operation".bold(),
        "min (µs)".bold(),
        "avg (µs)".bold(),
        "max (µs)".bold(),
        width = width
    );
    for result in &report.results {
        println!(
            "{:<width$}  {:>10.3}  {:>10.3}  {:>10.3}",
            result.name.yellow(),
            result.timing.min,
            result.timing.avg,
            result.timing.max,
            width = width
        );
    }
}
