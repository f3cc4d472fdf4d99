use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Timer '{0}' stopped without a start token")]
    MissingStartToken(String),

    #[error("Timer '{name}' has no pending start for handle {handle}")]
    UnknownTimerToken { name: String, handle: i64 },

    #[error("Invalid histogram options: {0}")]
    InvalidHistogram(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
