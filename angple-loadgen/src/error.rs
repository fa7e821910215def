use angple_loadgen_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Action catalogue is empty")]
    EmptyCatalogue,

    #[error("Action `{0}` has a zero weight")]
    ZeroWeight(&'static str),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
