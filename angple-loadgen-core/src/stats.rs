use crate::{Series, ThresholdOutcome, CHECKS_METRIC, ERRORS_METRIC};
use humantime::format_duration;
use serde::Serialize;
use serde_with::{serde_as, DurationSecondsWithFrac};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// All samples of one latency series for a whole run, in milliseconds, sorted ascending.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trend {
    values: Vec<f64>,
}

impl Trend {
    pub fn from_millis(mut values: Vec<f64>) -> Self {
        values.retain(|v| v.is_finite());
        values.sort_by(f64::total_cmp);
        Self { values }
    }

    pub fn from_durations(durations: &[Duration]) -> Self {
        Self::from_millis(durations.iter().map(|d| d.as_secs_f64() * 1e3).collect())
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Percentile `p` (0..=100) with linear interpolation between the closest ranks.
    /// An empty trend aggregates to 0.
    pub fn percentile(&self, p: f64) -> f64 {
        let n = self.values.len();
        match n {
            0 => 0.,
            1 => self.values[0],
            _ => {
                let rank = (p / 100.).clamp(0., 1.) * (n - 1) as f64;
                let lower = rank.floor() as usize;
                if lower >= n - 1 {
                    self.values[n - 1]
                } else {
                    let (a, b) = (self.values[lower], self.values[lower + 1]);
                    a + (b - a) * (rank - lower as f64)
                }
            }
        }
    }

    pub fn avg(&self) -> f64 {
        if self.values.is_empty() {
            0.
        } else {
            statistical::mean(&self.values)
        }
    }

    pub fn med(&self) -> f64 {
        if self.values.is_empty() {
            0.
        } else {
            statistical::median(&self.values)
        }
    }

    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.)
    }

    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.)
    }

    pub fn summary(&self) -> TrendSummary {
        TrendSummary {
            count: self.count(),
            avg: self.avg(),
            min: self.min(),
            med: self.med(),
            max: self.max(),
            p90: self.percentile(90.),
            p95: self.percentile(95.),
            p99: self.percentile(99.),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TrendSummary {
    pub count: usize,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl fmt::Display for TrendSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "avg={} min={} med={} max={} p(90)={} p(95)={} p(99)={} count={}",
            Millis(self.avg),
            Millis(self.min),
            Millis(self.med),
            Millis(self.max),
            Millis(self.p90),
            Millis(self.p95),
            Millis(self.p99),
            self.count
        )
    }
}

struct Millis(f64);

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000. {
            write!(f, "{:.2}s", self.0 / 1_000.)
        } else {
            write!(f, "{:.2}ms", self.0)
        }
    }
}

/// Count of `true` samples out of all samples of a boolean series.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Rate {
    pub hits: u64,
    pub total: u64,
}

impl Rate {
    pub fn new(hits: u64, total: u64) -> Self {
        Self { hits, total }
    }

    /// Fraction of `true` samples; an empty series has rate 0.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            0.
        } else {
            self.hits as f64 / self.total as f64
        }
    }

    pub fn misses(&self) -> u64 {
        self.total - self.hits
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NamedRate {
    pub name: &'static str,
    #[serde(flatten)]
    pub rate: Rate,
}

/// Everything the accumulator holds once the run has stopped.
#[derive(Clone, Debug, Default)]
pub struct MetricsSnapshot {
    pub trends: BTreeMap<Series, Trend>,
    /// `hits` are failed checks.
    pub errors: Rate,
    /// Error series broken down by the request that produced each sample.
    pub errors_by_request: Vec<NamedRate>,
    /// `hits` are passed checks.
    pub checks: Vec<NamedRate>,
    pub requests: u64,
}

impl MetricsSnapshot {
    pub fn trend(&self, series: Series) -> Option<&Trend> {
        self.trends.get(&series)
    }

    pub fn errors_for(&self, request: &str) -> Rate {
        self.errors_by_request
            .iter()
            .find(|named| named.name == request)
            .map(|named| named.rate)
            .unwrap_or_default()
    }

    pub fn check(&self, name: &str) -> Rate {
        self.checks
            .iter()
            .find(|named| named.name == name)
            .map(|named| named.rate)
            .unwrap_or_default()
    }
}

/// End-of-run report.
#[serde_as]
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub scenario: &'static str,
    pub entry: String,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    pub iterations: u64,
    pub interrupted_iterations: u64,
    pub max_vus: usize,
    pub requests: u64,
    pub trends: BTreeMap<&'static str, TrendSummary>,
    pub errors: Rate,
    pub errors_by_request: Vec<NamedRate>,
    pub checks: Vec<NamedRate>,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunSummary {
    /// True when every threshold passed.
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario: {} (exec: {}), {} elapsed, max {} VUs",
            self.scenario,
            self.entry,
            format_duration(Duration::from_millis(self.elapsed.as_millis() as u64)),
            self.max_vus
        )?;
        writeln!(
            f,
            "iterations: {} complete, {} interrupted; requests: {}",
            self.iterations, self.interrupted_iterations, self.requests
        )?;

        let checks = self
            .checks
            .iter()
            .fold(Rate::default(), |acc, c| {
                Rate::new(acc.hits + c.rate.hits, acc.total + c.rate.total)
            });
        writeln!(
            f,
            "{CHECKS_METRIC}: {:.2}% ({} passed, {} failed)",
            checks.rate() * 100.,
            checks.hits,
            checks.misses()
        )?;
        for check in self.checks.iter().filter(|c| c.rate.total > 0) {
            let mark = if check.rate.misses() == 0 { '✓' } else { '✗' };
            writeln!(
                f,
                "  {mark} {} ({}/{})",
                check.name, check.rate.hits, check.rate.total
            )?;
        }

        writeln!(
            f,
            "{ERRORS_METRIC}: {:.2}% ({} out of {})",
            self.errors.rate() * 100.,
            self.errors.hits,
            self.errors.total
        )?;
        for request in self.errors_by_request.iter().filter(|r| r.rate.hits > 0) {
            writeln!(
                f,
                "  {}: {} out of {}",
                request.name, request.rate.hits, request.rate.total
            )?;
        }

        for (name, trend) in &self.trends {
            writeln!(f, "{name}: {trend}")?;
        }

        writeln!(f, "thresholds:")?;
        for outcome in &self.thresholds {
            writeln!(f, "  {outcome}")?;
        }

        if self.passed() {
            write!(f, "result: PASS")
        } else {
            write!(
                f,
                "result: FAIL ({} thresholds crossed)",
                self.failed_thresholds().count()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_between_ranks() {
        let trend = Trend::from_millis((1..=10).map(f64::from).collect());
        assert_eq!(trend.percentile(0.), 1.);
        assert_eq!(trend.percentile(100.), 10.);
        assert_eq!(trend.percentile(50.), 5.5);
        assert!((trend.percentile(95.) - 9.55).abs() < 1e-9);
        assert!((trend.percentile(99.) - 9.91).abs() < 1e-9);
    }

    #[test]
    fn empty_and_single_trends() {
        let empty = Trend::default();
        assert_eq!(empty.percentile(99.), 0.);
        assert_eq!(empty.avg(), 0.);
        assert_eq!(empty.med(), 0.);
        assert_eq!(empty.summary().count, 0);

        let single = Trend::from_durations(&[Duration::from_millis(42)]);
        assert_eq!(single.percentile(1.), 42.);
        assert_eq!(single.percentile(99.), 42.);
        assert_eq!(single.max(), 42.);
    }

    #[test]
    fn trend_sorts_input() {
        let trend = Trend::from_millis(vec![30., 10., f64::NAN, 20.]);
        assert_eq!(trend.count(), 3);
        assert_eq!(trend.min(), 10.);
        assert_eq!(trend.max(), 30.);
        assert_eq!(trend.med(), 20.);
        assert_eq!(trend.avg(), 20.);
    }

    #[test]
    fn rate_of_empty_series_is_zero() {
        assert_eq!(Rate::default().rate(), 0.);
        assert_eq!(Rate::new(1, 4).rate(), 0.25);
        assert_eq!(Rate::new(1, 4).misses(), 3);
    }

    #[test]
    fn snapshot_lookups_default_to_empty() {
        let snapshot = MetricsSnapshot {
            errors_by_request: vec![NamedRate {
                name: "list_boards",
                rate: Rate::new(3, 9),
            }],
            ..Default::default()
        };
        assert_eq!(snapshot.errors_for("list_boards"), Rate::new(3, 9));
        assert_eq!(snapshot.errors_for("list_users"), Rate::default());
        assert_eq!(snapshot.check("health ok"), Rate::default());
        assert!(snapshot.trend(Series::PostList).is_none());
    }

    #[test]
    fn summary_json_shape() {
        let summary = RunSummary {
            scenario: "ci_test",
            entry: "default".to_string(),
            elapsed: Duration::from_millis(61_250),
            iterations: 40,
            interrupted_iterations: 1,
            max_vus: 50,
            requests: 40,
            trends: BTreeMap::from([(
                Series::HttpReqDuration.name(),
                Trend::from_millis(vec![10., 20., 30.]).summary(),
            )]),
            errors: Rate::new(2, 38),
            errors_by_request: vec![NamedRate {
                name: "list_boards",
                rate: Rate::new(2, 4),
            }],
            checks: vec![NamedRate {
                name: "boards status 200",
                rate: Rate::new(2, 4),
            }],
            thresholds: vec![ThresholdOutcome {
                metric: ERRORS_METRIC,
                expression: "rate<0.01".to_string(),
                observed: 2. / 38.,
                passed: false,
            }],
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["elapsed"], serde_json::json!(61.25));
        assert_eq!(
            json["errors_by_request"][0],
            serde_json::json!({ "name": "list_boards", "hits": 2, "total": 4 })
        );
        assert_eq!(json["checks"][0]["name"], "boards status 200");
        assert_eq!(json["errors"], serde_json::json!({ "hits": 2, "total": 38 }));
        assert_eq!(json["trends"]["http_req_duration"]["med"], serde_json::json!(20.));
        assert_eq!(json["thresholds"][0]["passed"], serde_json::json!(false));
    }
}
