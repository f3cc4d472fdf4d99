pub mod config;
pub mod parser;
pub mod preset;

pub use config::{
    AggregatorSettings, CounterReducer, GaugeReducer, HistogramAlgorithm, MetricsConfig,
    MetricsFile, RecorderSettings, SampleHistogram, SampleReducer, TimerHistogram, TimerReducer,
};
pub use parser::{load_config_from_file, parse_config_from_str};
pub use preset::Preset;
