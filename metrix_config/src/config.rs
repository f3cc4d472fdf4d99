use metrix_core::{
    CounterStrategy, GaugeStrategy, HistogramStrategy, MetricsError, Recorder, RecorderConfig,
    Result, TimerStrategy, DEFAULT_SEPARATOR,
};
use metrix_stats::{
    default_histogram_spec, Aggregator, AggregatorConfig, HistogramOptions,
    HistogramSpec, LatestGauge, SampleToHistogram, SumCounter, TimerToHistogram,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete metrics setup: how sources are created and how events are
/// aggregated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub recorder: RecorderSettings,
    pub aggregator: AggregatorSettings,
}

/// Wrapper for TOML files, where the configuration lives under `[metrics]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsFile {
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderSettings {
    pub separator: String,
    pub counter: CounterStrategy,
    pub timer: TimerStrategy,
    pub gauge: GaugeStrategy,
    pub histogram: HistogramStrategy,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            counter: CounterStrategy::Default,
            timer: TimerStrategy::Default,
            gauge: GaugeStrategy::Default,
            histogram: HistogramStrategy::Default,
        }
    }
}

impl RecorderSettings {
    pub fn disabled() -> Self {
        Self {
            counter: CounterStrategy::Disabled,
            timer: TimerStrategy::Disabled,
            gauge: GaugeStrategy::Disabled,
            histogram: HistogramStrategy::Disabled,
            ..Self::default()
        }
    }

    pub fn to_recorder_config(&self) -> RecorderConfig {
        RecorderConfig::default()
            .with_separator(self.separator.clone())
            .with_counter(self.counter)
            .with_timer(self.timer)
            .with_gauge(self.gauge)
            .with_histogram(self.histogram)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterReducer {
    #[default]
    Sum,
    Discard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeReducer {
    #[default]
    Latest,
    Discard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramAlgorithm {
    #[default]
    Bucket,
    Streaming,
}

/// Histogram parameters for timer durations. The ceiling is a duration
/// (`"1h"`, `"500ms"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerHistogram {
    pub algorithm: HistogramAlgorithm,
    pub error: f64,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
    pub quantiles: Vec<f64>,
    pub seed: Option<u64>,
}

impl Default for TimerHistogram {
    fn default() -> Self {
        match default_histogram_spec() {
            HistogramSpec::Bucket(options) => Self {
                algorithm: HistogramAlgorithm::Bucket,
                error: options.error,
                max: Duration::from_secs_f64(options.max / 1000.0),
                quantiles: options.quantiles,
                seed: None,
            },
            HistogramSpec::Streaming { quantiles, seed } => Self {
                algorithm: HistogramAlgorithm::Streaming,
                error: HistogramOptions::default().error,
                max: Duration::from_secs(60 * 60),
                quantiles,
                seed,
            },
        }
    }
}

impl TimerHistogram {
    pub fn to_spec(&self) -> HistogramSpec {
        to_spec(
            self.algorithm,
            self.error,
            self.max.as_secs_f64() * 1000.0,
            &self.quantiles,
            self.seed,
        )
    }
}

/// Histogram parameters for raw samples. The ceiling is a plain number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleHistogram {
    pub algorithm: HistogramAlgorithm,
    pub error: f64,
    pub max: f64,
    pub quantiles: Vec<f64>,
    pub seed: Option<u64>,
}

impl Default for SampleHistogram {
    fn default() -> Self {
        let timer = TimerHistogram::default();
        Self {
            algorithm: timer.algorithm,
            error: timer.error,
            max: timer.max.as_secs_f64() * 1000.0,
            quantiles: timer.quantiles,
            seed: timer.seed,
        }
    }
}

impl SampleHistogram {
    pub fn to_spec(&self) -> HistogramSpec {
        to_spec(self.algorithm, self.error, self.max, &self.quantiles, self.seed)
    }
}

fn to_spec(
    algorithm: HistogramAlgorithm,
    error: f64,
    max: f64,
    quantiles: &[f64],
    seed: Option<u64>,
) -> HistogramSpec {
    match algorithm {
        HistogramAlgorithm::Bucket => {
            HistogramSpec::Bucket(HistogramOptions::new(error, max, quantiles.to_vec()))
        }
        HistogramAlgorithm::Streaming => HistogramSpec::Streaming {
            quantiles: quantiles.to_vec(),
            seed,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reducer", rename_all = "snake_case")]
pub enum TimerReducer {
    Histogram(TimerHistogram),
    Discard,
}

impl Default for TimerReducer {
    fn default() -> Self {
        TimerReducer::Histogram(TimerHistogram::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reducer", rename_all = "snake_case")]
pub enum SampleReducer {
    Histogram(SampleHistogram),
    Discard,
}

impl Default for SampleReducer {
    fn default() -> Self {
        SampleReducer::Histogram(SampleHistogram::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorSettings {
    pub counter: CounterReducer,
    pub timer: TimerReducer,
    pub gauge: GaugeReducer,
    pub histogram: SampleReducer,
}

impl AggregatorSettings {
    pub fn discard() -> Self {
        Self {
            counter: CounterReducer::Discard,
            timer: TimerReducer::Discard,
            gauge: GaugeReducer::Discard,
            histogram: SampleReducer::Discard,
        }
    }

    pub fn timer_spec(&self) -> Option<HistogramSpec> {
        match &self.timer {
            TimerReducer::Histogram(settings) => Some(settings.to_spec()),
            TimerReducer::Discard => None,
        }
    }

    pub fn histogram_spec(&self) -> Option<HistogramSpec> {
        match &self.histogram {
            SampleReducer::Histogram(settings) => Some(settings.to_spec()),
            SampleReducer::Discard => None,
        }
    }

    pub fn to_aggregator_config(&self) -> Result<AggregatorConfig> {
        let mut config = AggregatorConfig::discard();

        if self.counter == CounterReducer::Sum {
            config = config.with_counter(SumCounter);
        }
        if self.gauge == GaugeReducer::Latest {
            config = config.with_gauge(LatestGauge);
        }
        if let Some(spec) = self.timer_spec() {
            config = config.with_timer(TimerToHistogram::new(spec)?);
        }
        if let Some(spec) = self.histogram_spec() {
            config = config.with_histogram(SampleToHistogram::new(spec)?);
        }

        Ok(config)
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.recorder.separator.is_empty() {
            return Err(MetricsError::InvalidConfig(
                "recorder separator cannot be empty".to_string(),
            ));
        }

        if let Some(spec) = self.aggregator.timer_spec() {
            spec.validate()
                .map_err(|e| MetricsError::InvalidConfig(format!("aggregator.timer: {}", e)))?;
        }

        if let Some(spec) = self.aggregator.histogram_spec() {
            spec.validate().map_err(|e| {
                MetricsError::InvalidConfig(format!("aggregator.histogram: {}", e))
            })?;
        }

        Ok(())
    }

    /// Builds a recorder and an aggregator listening to it.
    pub fn build(&self) -> Result<(Recorder, Aggregator)> {
        self.validate()?;
        let recorder = Recorder::with_config(self.recorder.to_recorder_config())?;
        let aggregator = Aggregator::new(&recorder, self.aggregator.to_aggregator_config()?)?;
        Ok((recorder, aggregator))
    }
}

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
