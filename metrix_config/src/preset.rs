use crate::config::{
    AggregatorSettings, GaugeReducer, MetricsConfig, RecorderSettings, SampleHistogram,
    SampleReducer, TimerHistogram, TimerReducer,
};
use metrix_core::{GaugeStrategy, HistogramStrategy, MetricsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

const PRECISE_QUANTILES: [f64; 6] = [0.5, 0.9, 0.95, 0.99, 0.999, 0.9999];

/// Built-in configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Default,
    Precise,
    Custom,
    Disabled,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Default,
        Preset::Precise,
        Preset::Custom,
        Preset::Disabled,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::Precise => "precise",
            Preset::Custom => "custom",
            Preset::Disabled => "disabled",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Preset::Default => "Aggregate every event; 1% histograms up to one hour",
            Preset::Precise => "0.1% histograms up to 1000 minutes, gauges also feed histograms",
            Preset::Custom => "Counters and timers only; 0.2% timer histograms up to one hour",
            Preset::Disabled => "No-op sources, every event discarded",
        }
    }

    pub fn config(&self) -> MetricsConfig {
        match self {
            Preset::Default => MetricsConfig::default(),
            Preset::Precise => {
                let timer = TimerHistogram {
                    error: 0.001,
                    max: Duration::from_secs(1000 * 60),
                    quantiles: PRECISE_QUANTILES.to_vec(),
                    ..TimerHistogram::default()
                };
                let histogram = SampleHistogram {
                    error: timer.error,
                    max: timer.max.as_secs_f64() * 1000.0,
                    quantiles: timer.quantiles.clone(),
                    ..SampleHistogram::default()
                };
                MetricsConfig {
                    recorder: RecorderSettings {
                        gauge: GaugeStrategy::Precise,
                        ..RecorderSettings::default()
                    },
                    aggregator: AggregatorSettings {
                        timer: TimerReducer::Histogram(timer),
                        histogram: SampleReducer::Histogram(histogram),
                        ..AggregatorSettings::default()
                    },
                }
            }
            Preset::Custom => MetricsConfig {
                recorder: RecorderSettings {
                    gauge: GaugeStrategy::Disabled,
                    histogram: HistogramStrategy::Disabled,
                    ..RecorderSettings::default()
                },
                aggregator: AggregatorSettings {
                    timer: TimerReducer::Histogram(TimerHistogram {
                        error: 0.002,
                        ..TimerHistogram::default()
                    }),
                    gauge: GaugeReducer::Discard,
                    histogram: SampleReducer::Discard,
                    ..AggregatorSettings::default()
                },
            },
            Preset::Disabled => MetricsConfig {
                recorder: RecorderSettings::disabled(),
                aggregator: AggregatorSettings::discard(),
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| MetricsError::InvalidConfig(format!("Unknown preset: {}", s)))
    }
}
