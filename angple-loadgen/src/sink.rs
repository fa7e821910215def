//! Append-only accumulation of request outcomes, shared by every VU of a run.
use crate::measurement::Measurement;
use crate::request::Request;
use angple_loadgen_core::{MetricsSnapshot, NamedRate, Rate, Series, Trend};
use metrics_util::AtomicBucket;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Outcome of a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub request: Request,
    /// Wall-clock time to the full response; `None` when the request never completed.
    pub latency: Option<Duration>,
    /// Whether the response passed the request's check.
    pub passed: bool,
}

/// Thread-safe sink handed to each VU. Samples are only ever appended; nothing is aggregated
/// until [`MetricsSink::snapshot`] is taken after the VUs have stopped.
pub struct MetricsSink {
    trends: [AtomicBucket<Duration>; Series::COUNT],
    checks: [Counter; Request::COUNT],
    errors: [Counter; Request::COUNT],
    requests: AtomicU64,
    window: Window,
}

#[derive(Default)]
struct Counter {
    hits: AtomicU64,
    total: AtomicU64,
}

impl Counter {
    fn add(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    fn load(&self) -> Rate {
        // A concurrent add may land between the two loads.
        let total = self.total.load(Ordering::Relaxed);
        let hits = self.hits.load(Ordering::Relaxed).min(total);
        Rate::new(hits, total)
    }
}

/// Progress-report counters, drained on every report tick.
struct Window {
    success: AtomicU64,
    error: AtomicU64,
    latency: AtomicBucket<Duration>,
}

impl Window {
    fn new() -> Self {
        Self {
            success: AtomicU64::new(0),
            error: AtomicU64::new(0),
            latency: AtomicBucket::new(),
        }
    }
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink {
    pub fn new() -> Self {
        Self {
            trends: std::array::from_fn(|_| AtomicBucket::new()),
            checks: std::array::from_fn(|_| Counter::default()),
            errors: std::array::from_fn(|_| Counter::default()),
            requests: AtomicU64::new(0),
            window: Window::new(),
        }
    }

    pub fn record(&self, sample: &Sample) {
        let Sample {
            request,
            latency,
            passed,
        } = *sample;

        self.requests.fetch_add(1, Ordering::Relaxed);

        if let Some(latency) = latency {
            self.trends[Series::HttpReqDuration.index()].push(latency);
            if let Some(series) = request.series() {
                self.trends[series.index()].push(latency);
            }
            self.window.latency.push(latency);
        }

        self.checks[request.index()].add(passed);
        if request.feeds_errors() {
            self.errors[request.index()].add(!passed);
        }

        if passed {
            self.window.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.window.error.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Drains the progress window. Full-run series are left untouched.
    pub(crate) fn collect(&self, elapsed: Duration) -> Measurement {
        let success = self.window.success.swap(0, Ordering::Relaxed);
        let error = self.window.error.swap(0, Ordering::Relaxed);
        let mut measurement = Measurement::new(success, error, elapsed);
        self.window
            .latency
            .clear_with(|dur| measurement.populate_latencies(dur));
        measurement
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let trends = Series::ALL
            .iter()
            .map(|series| {
                (
                    *series,
                    Trend::from_durations(&self.trends[series.index()].data()),
                )
            })
            .collect();

        let errors_by_request: Vec<_> = Request::ALL
            .iter()
            .filter(|request| request.feeds_errors())
            .map(|request| NamedRate {
                name: request.name(),
                rate: self.errors[request.index()].load(),
            })
            .collect();

        let errors = errors_by_request
            .iter()
            .fold(Rate::default(), |acc, named| {
                Rate::new(acc.hits + named.rate.hits, acc.total + named.rate.total)
            });

        let checks = Request::ALL
            .iter()
            .map(|request| NamedRate {
                name: request.check(),
                rate: self.checks[request.index()].load(),
            })
            .collect();

        MetricsSnapshot {
            trends,
            errors,
            errors_by_request,
            checks,
            requests: self.requests(),
        }
    }
}
