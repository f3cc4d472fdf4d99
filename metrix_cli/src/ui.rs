// Terminal output helpers
use colored::Colorize;
use metrix_stats::HistogramSpec;

pub fn print_header(text: &str) {
    println!("\n{}", text.bold().cyan());
    println!("{}", "=".repeat(text.chars().count()).cyan());
}

pub fn print_success(text: &str) {
    println!("{} {}", "✓".green().bold(), text.green());
}

pub fn print_error(text: &str) {
    println!("{} {}", "✗".red().bold(), text.red());
}

pub fn print_warning(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

pub fn describe_spec(spec: &HistogramSpec) -> String {
    let quantiles = spec
        .quantiles()
        .iter()
        .map(|q| metrix_stats::percentile_label(*q))
        .collect::<Vec<_>>()
        .join(", ");

    match spec {
        HistogramSpec::Bucket(options) => format!(
            "bucket, error {}%, max {}, quantiles [{}]",
            options.error * 100.0,
            options.max,
            quantiles
        ),
        HistogramSpec::Streaming { seed, .. } => match seed {
            Some(seed) => format!("streaming, seed {}, quantiles [{}]", seed, quantiles),
            None => format!("streaming, quantiles [{}]", quantiles),
        },
    }
}
