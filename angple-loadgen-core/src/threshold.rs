use crate::{Metric, MetricsSnapshot, Series, ThresholdError, Trend};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The statistic a threshold compares.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Aggregate {
    /// `p(N)`, N within 0..=100.
    Percentile(f64),
    Avg,
    Min,
    Med,
    Max,
    /// Fraction of `true` samples in a boolean series.
    Rate,
}

impl Aggregate {
    fn applies_to(&self, metric: Metric) -> bool {
        match self {
            Aggregate::Rate => metric == Metric::Errors,
            _ => matches!(metric, Metric::Trend(_)),
        }
    }

    fn of_trend(&self, trend: &Trend) -> f64 {
        match self {
            Aggregate::Percentile(p) => trend.percentile(*p),
            Aggregate::Avg => trend.avg(),
            Aggregate::Min => trend.min(),
            Aggregate::Med => trend.med(),
            Aggregate::Max => trend.max(),
            // Never produced by `Threshold::new`; a NaN fails every comparison.
            Aggregate::Rate => f64::NAN,
        }
    }
}

impl FromStr for Aggregate {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregate::Avg),
            "min" => Ok(Aggregate::Min),
            "med" => Ok(Aggregate::Med),
            "max" => Ok(Aggregate::Max),
            "rate" => Ok(Aggregate::Rate),
            _ => {
                let p = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|p| p.trim().parse::<f64>().ok())
                    .ok_or_else(|| ThresholdError::Syntax(s.to_string()))?;
                if (0. ..=100.).contains(&p) {
                    Ok(Aggregate::Percentile(p))
                } else {
                    Err(ThresholdError::PercentileRange(p))
                }
            }
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Percentile(p) => write!(f, "p({p})"),
            Aggregate::Avg => f.write_str("avg"),
            Aggregate::Min => f.write_str("min"),
            Aggregate::Med => f.write_str("med"),
            Aggregate::Max => f.write_str("max"),
            Aggregate::Rate => f.write_str("rate"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    // Two-character operators first so `<=` is not read as `<`.
    const OPERATORS: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        if observed.is_nan() {
            return false;
        }
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }

    fn symbol(&self) -> &'static str {
        Self::OPERATORS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or("?")
    }
}

/// A pass/fail bound on one aggregate of one metric, checked once the run is over.
#[derive(Clone, Debug, PartialEq)]
pub struct Threshold {
    metric: Metric,
    aggregate: Aggregate,
    comparison: Comparison,
    bound: f64,
}

impl Threshold {
    pub fn new(
        metric: Metric,
        aggregate: Aggregate,
        comparison: Comparison,
        bound: f64,
    ) -> Result<Self, ThresholdError> {
        if !aggregate.applies_to(metric) {
            return Err(ThresholdError::Incompatible {
                metric: metric.to_string(),
                aggregate: aggregate.to_string(),
            });
        }

        Ok(Self {
            metric,
            aggregate,
            comparison,
            bound,
        })
    }

    /// Parses a k6-style expression such as `p(95)<200` or `rate<0.01` for `metric`.
    pub fn parse(metric: &str, expr: &str) -> Result<Self, ThresholdError> {
        let metric: Metric = metric.trim().parse()?;
        let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();

        let (position, symbol, comparison) = Comparison::OPERATORS
            .iter()
            .filter_map(|(symbol, op)| compact.find(symbol).map(|pos| (pos, *symbol, *op)))
            .min_by_key(|(pos, symbol, _)| (*pos, usize::MAX - symbol.len()))
            .ok_or_else(|| ThresholdError::Syntax(expr.to_string()))?;

        let aggregate: Aggregate = compact[..position].parse()?;
        let bound: f64 = compact[position + symbol.len()..]
            .parse()
            .map_err(|_| ThresholdError::Syntax(expr.to_string()))?;

        Self::new(metric, aggregate, comparison, bound)
    }

    /// The thresholds every run is held to.
    pub fn defaults() -> Vec<Self> {
        let trend = |series, p, bound| Threshold {
            metric: Metric::Trend(series),
            aggregate: Aggregate::Percentile(p),
            comparison: Comparison::Lt,
            bound,
        };

        vec![
            trend(Series::HttpReqDuration, 95., 200.),
            trend(Series::HttpReqDuration, 99., 500.),
            trend(Series::PostList, 99., 100.),
            trend(Series::PostDetail, 99., 100.),
            trend(Series::Comments, 99., 100.),
            Threshold {
                metric: Metric::Errors,
                aggregate: Aggregate::Rate,
                comparison: Comparison::Lt,
                bound: 0.01,
            },
        ]
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn aggregate(&self) -> Aggregate {
        self.aggregate
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }

    pub fn expression(&self) -> String {
        format!(
            "{}{}{}",
            self.aggregate,
            self.comparison.symbol(),
            self.bound
        )
    }

    pub fn observe(&self, snapshot: &MetricsSnapshot) -> f64 {
        match self.metric {
            Metric::Errors => snapshot.errors.rate(),
            Metric::Trend(series) => snapshot
                .trend(series)
                .map(|trend| self.aggregate.of_trend(trend))
                .unwrap_or(0.),
        }
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ThresholdOutcome {
        let observed = self.observe(snapshot);
        ThresholdOutcome {
            metric: self.metric.name(),
            expression: self.expression(),
            observed,
            passed: self.comparison.holds(observed, self.bound),
        }
    }
}

/// `METRIC:EXPR`, e.g. `post_list_duration:p(99)<100`.
impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (metric, expr) = s
            .split_once(':')
            .ok_or_else(|| ThresholdError::MissingMetric(s.to_string()))?;
        Self::parse(metric, expr)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.metric, self.expression())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ThresholdOutcome {
    pub metric: &'static str,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

impl fmt::Display for ThresholdOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { '✓' } else { '✗' };
        write!(
            f,
            "{mark} {} {} (observed {:.4})",
            self.metric, self.expression, self.observed
        )
    }
}
