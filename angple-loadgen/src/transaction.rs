//! One virtual user's view of the target: the HTTP client, the optional shared rate limiter and
//! the sink every outcome is appended to.
use crate::catalogue::Catalogue;
use crate::error::LoadError;
use crate::request::{LoginRequest, Request};
use crate::sink::{MetricsSink, Sample};
use angple_loadgen_core::{Entry, RunConfig, THINK_TIME_MAX, THINK_TIME_MIN};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use rand::Rng;
use std::sync::Arc;
use std::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub(crate) struct VuContext {
    client: reqwest::Client,
    config: RunConfig,
    sink: Arc<MetricsSink>,
    limiter: Option<DefaultDirectRateLimiter>,
    catalogue: Catalogue,
}

impl VuContext {
    pub fn new(
        config: &RunConfig,
        catalogue: Catalogue,
        sink: Arc<MetricsSink>,
    ) -> Result<Self, LoadError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            config: config.clone(),
            sink,
            limiter: config
                .max_rps
                .map(|rps| RateLimiter::direct(Quota::per_second(rps))),
            catalogue,
        })
    }

    /// A single VU iteration for the given entry point.
    pub async fn iteration(&self, entry: Entry) {
        match entry {
            Entry::Default => {
                let request = self.catalogue.pick(&mut rand::thread_rng());
                self.send(request).await;
                let think = rand::thread_rng().gen_range(THINK_TIME_MIN..=THINK_TIME_MAX);
                tokio::time::sleep(think).await;
            }
            Entry::Auth => {
                self.send(Request::AuthLogin).await;
            }
        }
    }

    fn url(&self, request: Request) -> String {
        self.config.url(request.path())
    }

    /// Issues `request`, times it through to the end of the body and records the outcome.
    pub async fn send(&self, request: Request) -> Sample {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let url = self.url(request);
        let mut builder = self.client.request(request.method(), &url);
        if request == Request::AuthLogin {
            builder = builder.json(&LoginRequest::default());
        }

        let start = Instant::now();
        let res = match builder.send().await {
            Ok(res) => {
                let status = res.status();
                res.bytes().await.map(|_| status)
            }
            Err(err) => Err(err),
        };
        let elapsed = start.elapsed();

        let sample = match res {
            Ok(status) => {
                if elapsed > self.config.slow_request {
                    warn!(
                        "Slow request: {} {} took {}ms (status {})",
                        request.method(),
                        request.path(),
                        elapsed.as_millis(),
                        status.as_u16()
                    );
                }
                if !request.accepts(status) {
                    debug!("{request} failed its check with status {status}");
                }
                Sample {
                    request,
                    latency: Some(elapsed),
                    passed: request.accepts(status),
                }
            }
            Err(err) => {
                debug!("{request} did not complete: {err}");
                Sample {
                    request,
                    latency: None,
                    passed: false,
                }
            }
        };

        #[cfg(feature = "metrics")]
        publish(&sample);

        self.sink.record(&sample);
        sample
    }
}

#[cfg(feature = "metrics")]
fn publish(sample: &Sample) {
    let name = sample.request.name();
    if let Some(latency) = sample.latency {
        let millis = latency.as_secs_f64() * 1_000.;
        metrics::histogram!(angple_loadgen_core::Series::HttpReqDuration.name(), "request" => name)
            .record(millis);
        if let Some(series) = sample.request.series() {
            metrics::histogram!(series.name()).record(millis);
        }
    }

    let outcome = if sample.passed { "pass" } else { "fail" };
    metrics::counter!(
        angple_loadgen_core::CHECKS_METRIC,
        "check" => sample.request.check(),
        "outcome" => outcome
    )
    .increment(1);

    if sample.request.feeds_errors() && !sample.passed {
        metrics::counter!(angple_loadgen_core::ERRORS_METRIC, "request" => name).increment(1);
    }
}
