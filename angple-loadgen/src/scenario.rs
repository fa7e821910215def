//! Load test future and its builder methods
use crate::catalogue::Catalogue;
use crate::error::LoadError;
use crate::executor::execute;
use crate::sink::MetricsSink;
use crate::transaction::VuContext;
use angple_loadgen_core::{
    Entry, MetricsSnapshot, Profile, RunConfig, RunSummary, ScenarioKind, Series, Threshold,
};
use std::{
    future::Future,
    num::NonZeroU32,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// A load run against one target.
///
/// Nothing happens until the value is awaited. The run then drives its virtual users through the
/// configured profile, evaluates every threshold against the collected series and resolves to a
/// [`RunSummary`].
pub struct LoadTest {
    config: RunConfig,
    catalogue: Catalogue,
    runner_fut: Option<Pin<Box<dyn Future<Output = Result<RunSummary, LoadError>> + Send>>>,
}

impl LoadTest {
    /// A smoke run against `base_url` with the default thresholds.
    pub fn new(base_url: &str) -> Result<Self, LoadError> {
        Ok(Self::from_config(RunConfig::new(base_url)?))
    }

    pub fn from_config(config: RunConfig) -> Self {
        Self {
            config,
            catalogue: Catalogue::default(),
            runner_fut: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

impl Future for LoadTest {
    type Output = Result<RunSummary, LoadError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.runner_fut.is_none() {
            let config = self.config.clone();
            let catalogue = self.catalogue.clone();
            self.runner_fut = Some(Box::pin(async move {
                run_load_test(config, catalogue).await
            }));
        }

        match &mut self.runner_fut {
            Some(runner) => runner.as_mut().poll(cx),
            None => Poll::Pending,
        }
    }
}

pub trait ConfigurableLoadTest: Future<Output = Result<RunSummary, LoadError>> + Sized + Send {
    fn scenario(self, scenario: ScenarioKind) -> Self;
    fn profile(self, profile: Profile) -> Self;
    fn entry(self, entry: Entry) -> Self;
    fn catalogue(self, catalogue: Catalogue) -> Self;
    fn max_rps(self, rps: NonZeroU32) -> Self;
    fn threshold(self, threshold: Threshold) -> Self;
    fn thresholds(self, thresholds: Vec<Threshold>) -> Self;
    fn slow_request(self, slow_request: Duration) -> Self;
    fn user_agent(self, user_agent: &str) -> Self;
    fn request_timeout(self, timeout: Duration) -> Self;
}

impl ConfigurableLoadTest for LoadTest {
    /// Use one of the predefined load profiles.
    ///
    /// # Example
    /// ```no_run
    /// use angple_loadgen::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), LoadError> {
    ///     let summary = LoadTest::new("http://localhost:8081")?
    ///         .scenario(ScenarioKind::Ci)
    ///         .await?;
    ///     println!("{summary}");
    ///     Ok(())
    /// }
    /// ```
    fn scenario(mut self, scenario: ScenarioKind) -> Self {
        self.config.set_scenario(scenario);
        self
    }

    /// Replace the load profile. The run is then reported as `custom`.
    ///
    /// # Example
    /// ```no_run
    /// use angple_loadgen::prelude::*;
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), LoadError> {
    ///     LoadTest::new("http://localhost:8081")?
    ///         .profile(Profile::constant(2, Duration::from_secs(10)))
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    fn profile(mut self, profile: Profile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Choose what each VU iteration does.
    fn entry(mut self, entry: Entry) -> Self {
        self.config.entry = entry;
        self
    }

    /// Replace the weighted action mix used by the default entry.
    ///
    /// # Example
    /// ```no_run
    /// use angple_loadgen::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), LoadError> {
    ///     let reads_only = Catalogue::new(vec![
    ///         WeightedAction::new(Request::BrowsePosts, 3),
    ///         WeightedAction::new(Request::ViewPost, 1),
    ///     ])?;
    ///     LoadTest::new("http://localhost:8081")?
    ///         .catalogue(reads_only)
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    fn catalogue(mut self, catalogue: Catalogue) -> Self {
        self.catalogue = catalogue;
        self
    }

    /// Cap the request rate across all VUs.
    ///
    /// # Example
    /// ```no_run
    /// use angple_loadgen::prelude::*;
    /// use std::num::NonZeroU32;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), LoadError> {
    ///     LoadTest::new("http://localhost:8081")?
    ///         .scenario(ScenarioKind::Full)
    ///         .max_rps(NonZeroU32::new(200).unwrap())
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    fn max_rps(mut self, rps: NonZeroU32) -> Self {
        self.config.max_rps = Some(rps);
        self
    }

    /// Add a threshold on top of the current set.
    ///
    /// # Example
    /// ```no_run
    /// use angple_loadgen::prelude::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     LoadTest::new("http://localhost:8081")?
    ///         .threshold(Threshold::parse("http_req_duration", "avg<150")?)
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    fn threshold(mut self, threshold: Threshold) -> Self {
        self.config.thresholds.push(threshold);
        self
    }

    /// Replace every threshold, defaults included.
    fn thresholds(mut self, thresholds: Vec<Threshold>) -> Self {
        self.config.thresholds = thresholds;
        self
    }

    fn slow_request(mut self, slow_request: Duration) -> Self {
        self.config.slow_request = slow_request;
        self
    }

    fn user_agent(mut self, user_agent: &str) -> Self {
        self.config.user_agent = user_agent.to_string();
        self
    }

    fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }
}

const CUSTOM_SCENARIO: &str = "custom";

#[instrument(name = "load_test", skip_all, fields(scenario = config.scenario.name(), entry = %config.entry))]
pub(crate) async fn run_load_test(
    config: RunConfig,
    catalogue: Catalogue,
) -> Result<RunSummary, LoadError> {
    info!(
        "Running {} against {}: {}",
        config.scenario.name(),
        config.base_url,
        config.profile
    );

    let sink = Arc::new(MetricsSink::new());
    let context = Arc::new(VuContext::new(&config, catalogue, sink.clone())?);
    let entry = config.entry;
    let scenario = move || {
        let context = context.clone();
        async move { context.iteration(entry).await }
    };

    let stats = execute(&config.profile, scenario, &sink).await;
    let snapshot = sink.snapshot();

    let outcomes: Vec<_> = config
        .thresholds
        .iter()
        .map(|threshold| threshold.evaluate(&snapshot))
        .collect();
    for outcome in outcomes.iter().filter(|o| !o.passed) {
        warn!("Threshold crossed: {outcome}");
    }

    let summary = RunSummary {
        scenario: report_name(&config),
        entry: config.entry.to_string(),
        elapsed: stats.elapsed,
        iterations: stats.iterations,
        interrupted_iterations: stats.interrupted,
        max_vus: stats.max_vus,
        requests: snapshot.requests,
        trends: trend_summaries(&snapshot),
        errors: snapshot.errors,
        errors_by_request: snapshot.errors_by_request,
        checks: snapshot.checks,
        thresholds: outcomes,
    };

    info!("Load test complete, {} requests", summary.requests);
    Ok(summary)
}

/// The scenario's own name, or `custom` once its profile has been replaced.
fn report_name(config: &RunConfig) -> &'static str {
    if config.profile == config.scenario.profile() {
        config.scenario.name()
    } else {
        CUSTOM_SCENARIO
    }
}

fn trend_summaries(
    snapshot: &MetricsSnapshot,
) -> std::collections::BTreeMap<&'static str, angple_loadgen_core::TrendSummary> {
    Series::ALL
        .iter()
        .filter_map(|series| {
            snapshot
                .trend(*series)
                .filter(|trend| !trend.is_empty())
                .map(|trend| (series.name(), trend.summary()))
        })
        .collect()
}
