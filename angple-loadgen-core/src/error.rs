use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Base URL `{0}` must use http or https")]
    UnsupportedScheme(String),

    #[error("Unknown scenario `{0}` (expected one of smoke, ci, full)")]
    UnknownScenario(String),

    #[error(transparent)]
    Threshold(#[from] ThresholdError),
}

#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("Unknown metric `{0}`")]
    UnknownMetric(String),

    #[error("Threshold must be written as METRIC:EXPR, got `{0}`")]
    MissingMetric(String),

    #[error("Cannot parse threshold expression `{0}`")]
    Syntax(String),

    #[error("Aggregate `{aggregate}` does not apply to metric `{metric}`")]
    Incompatible { metric: String, aggregate: String },

    #[error("Percentile must be within 0..=100, got {0}")]
    PercentileRange(f64),
}
