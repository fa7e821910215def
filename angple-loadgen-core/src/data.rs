use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Latency series, each sample in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Series {
    /// Every completed request, whatever the action.
    HttpReqDuration,
    PostList,
    PostDetail,
    Comments,
    AuthLogin,
}

impl Series {
    pub const COUNT: usize = 5;

    pub const ALL: [Series; Series::COUNT] = [
        Series::HttpReqDuration,
        Series::PostList,
        Series::PostDetail,
        Series::Comments,
        Series::AuthLogin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Series::HttpReqDuration => "http_req_duration",
            Series::PostList => "post_list_duration",
            Series::PostDetail => "post_detail_duration",
            Series::Comments => "comments_duration",
            Series::AuthLogin => "auth_login_duration",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Anything a threshold can be written against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    Trend(Series),
    /// The boolean error series.
    Errors,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Trend(series) => series.name(),
            Metric::Errors => ERRORS_METRIC,
        }
    }
}

pub const ERRORS_METRIC: &str = "errors";
pub const CHECKS_METRIC: &str = "checks";

impl FromStr for Metric {
    type Err = crate::ThresholdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ERRORS_METRIC {
            return Ok(Metric::Errors);
        }

        Series::ALL
            .iter()
            .find(|series| series.name() == s)
            .map(|series| Metric::Trend(*series))
            .ok_or_else(|| crate::ThresholdError::UnknownMetric(s.to_string()))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
