use std::time::Duration;

/// Target origin used when `BASE_URL` is not set.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";

/// Scenario selector used when `SCENARIO` is not set (or not recognized).
pub const DEFAULT_SCENARIO: &str = "smoke";

/// Sent on every request so the backend's rate limiter treats the load test like SSR traffic.
pub const DEFAULT_USER_AGENT: &str = "Angple-Web-SSR/LoadTest";

/// Lower bound of the per-iteration think time.
pub const THINK_TIME_MIN: Duration = Duration::from_millis(500);

/// Upper bound of the per-iteration think time.
pub const THINK_TIME_MAX: Duration = Duration::from_millis(2_500);

/// Graceful stop applied to constant-VU profiles.
pub const DEFAULT_GRACEFUL_STOP: Duration = Duration::from_secs(30);

/// Requests slower than this are logged at `warn`.
pub const DEFAULT_SLOW_REQUEST: Duration = Duration::from_secs(1);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How often the executor re-evaluates the VU target.
pub const CONTROL_INTERVAL: Duration = Duration::from_millis(100);

/// How often a progress line is logged.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Process exit code when one or more thresholds fail.
pub const THRESHOLDS_FAILED_EXIT_CODE: u8 = 99;
