#![doc = include_str!("../README.md")]

pub mod catalogue;
pub mod error;
pub mod request;
pub mod scenario;
pub mod sink;

pub(crate) mod executor;
pub(crate) mod measurement;
pub(crate) mod transaction;

pub use angple_loadgen_core as core;

pub mod prelude {
    pub use crate::catalogue::{Catalogue, WeightedAction, DEFAULT_ACTIONS};
    pub use crate::error::LoadError;
    pub use crate::request::Request;
    pub use crate::scenario::{ConfigurableLoadTest, LoadTest};
    pub use angple_loadgen_core::{
        Entry, Profile, RampStage, RunConfig, RunSummary, ScenarioKind, Threshold,
        ThresholdOutcome, THRESHOLDS_FAILED_EXIT_CODE,
    };
}
