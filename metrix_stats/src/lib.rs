pub mod aggregator;
pub mod histogram;
pub mod reducer;

pub use aggregator::{Aggregator, AggregatorConfig, Report};
pub use histogram::{
    percentile_label, BucketHistogram, Histogram, HistogramOptions, HistogramSpec, Snapshot,
    StreamingHistogram,
};
pub use reducer::{
    default_histogram_spec, record_sample, Composite, Counters, Discard, Histograms, LatestGauge,
    Reducer, SampleToHistogram, SumCounter, TimerToHistogram,
};
