use crate::{
    ConfigError, Threshold, DEFAULT_GRACEFUL_STOP, DEFAULT_REQUEST_TIMEOUT, DEFAULT_SLOW_REQUEST,
    DEFAULT_USER_AGENT,
};
use humantime::format_duration;
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// The named scenario selected by `SCENARIO`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScenarioKind {
    Smoke,
    Ci,
    Full,
}

impl ScenarioKind {
    /// Permissive lookup: anything unrecognized runs the smoke scenario.
    pub fn from_selector(selector: &str) -> Self {
        match selector.parse() {
            Ok(kind) => kind,
            Err(_) => {
                warn!("Unrecognized scenario `{selector}`, falling back to smoke.");
                ScenarioKind::Smoke
            }
        }
    }

    pub fn selector(&self) -> &'static str {
        match self {
            ScenarioKind::Smoke => "smoke",
            ScenarioKind::Ci => "ci",
            ScenarioKind::Full => "full",
        }
    }

    /// Name the profile is reported under.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioKind::Smoke => "smoke",
            ScenarioKind::Ci => "ci_test",
            ScenarioKind::Full => "ramp_up",
        }
    }

    pub fn profile(&self) -> Profile {
        match self {
            ScenarioKind::Smoke => Profile::constant(5, Duration::from_secs(30)),
            ScenarioKind::Ci => Profile::ramping(
                0,
                vec![
                    RampStage::new(Duration::from_secs(10), 20),
                    RampStage::new(Duration::from_secs(30), 50),
                    RampStage::new(Duration::from_secs(10), 0),
                ],
                Duration::from_secs(10),
            ),
            ScenarioKind::Full => Profile::ramping(
                0,
                vec![
                    RampStage::new(Duration::from_secs(30), 100),
                    RampStage::new(Duration::from_secs(60), 500),
                    RampStage::new(Duration::from_secs(120), 2_000),
                    RampStage::new(Duration::from_secs(300), 5_000),
                    RampStage::new(Duration::from_secs(120), 0),
                ],
                Duration::from_secs(30),
            ),
        }
    }
}

impl FromStr for ScenarioKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smoke" => Ok(ScenarioKind::Smoke),
            "ci" => Ok(ScenarioKind::Ci),
            "full" => Ok(ScenarioKind::Full),
            other => Err(ConfigError::UnknownScenario(other.to_string())),
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

/// A (duration, target VUs) pair. The VU count moves linearly towards `target` over `duration`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RampStage {
    pub duration: Duration,
    pub target: usize,
}

impl RampStage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Virtual-user concurrency over time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Profile {
    ConstantVus {
        vus: usize,
        duration: Duration,
        graceful_stop: Duration,
    },
    RampingVus {
        start_vus: usize,
        stages: Vec<RampStage>,
        graceful_ramp_down: Duration,
    },
}

impl Profile {
    pub fn constant(vus: usize, duration: Duration) -> Self {
        Profile::ConstantVus {
            vus,
            duration,
            graceful_stop: DEFAULT_GRACEFUL_STOP,
        }
    }

    pub fn ramping(start_vus: usize, stages: Vec<RampStage>, graceful_ramp_down: Duration) -> Self {
        Profile::RampingVus {
            start_vus,
            stages,
            graceful_ramp_down,
        }
    }

    /// Time during which new iterations may start.
    pub fn duration(&self) -> Duration {
        match self {
            Profile::ConstantVus { duration, .. } => *duration,
            Profile::RampingVus { stages, .. } => stages.iter().map(|s| s.duration).sum(),
        }
    }

    /// Grace period for VUs retired while the profile is still running.
    pub fn graceful_ramp_down(&self) -> Duration {
        match self {
            Profile::ConstantVus { graceful_stop, .. } => *graceful_stop,
            Profile::RampingVus {
                graceful_ramp_down,
                ..
            } => *graceful_ramp_down,
        }
    }

    /// Grace period for VUs still running once [`Profile::duration`] has elapsed.
    pub fn graceful_stop(&self) -> Duration {
        self.graceful_ramp_down()
    }

    /// Upper bound on wall-clock time, drain included.
    pub fn max_duration(&self) -> Duration {
        self.duration() + self.graceful_stop()
    }

    pub fn max_vus(&self) -> usize {
        match self {
            Profile::ConstantVus { vus, .. } => *vus,
            Profile::RampingVus {
                start_vus, stages, ..
            } => stages
                .iter()
                .map(|s| s.target)
                .fold(*start_vus, usize::max),
        }
    }

    /// Number of VUs that should be running `elapsed` into the profile.
    ///
    /// Ramps interpolate linearly from the previous target and only move once the line has fully
    /// crossed the next integer, so ramp-ups round down and ramp-downs round up.
    pub fn target_at(&self, elapsed: Duration) -> usize {
        match self {
            Profile::ConstantVus { vus, duration, .. } => {
                if elapsed < *duration {
                    *vus
                } else {
                    0
                }
            }
            Profile::RampingVus {
                start_vus, stages, ..
            } => {
                let mut from = *start_vus;
                let mut stage_start = Duration::ZERO;
                for stage in stages {
                    let stage_end = stage_start + stage.duration;
                    if elapsed < stage_end {
                        let progress =
                            (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                        let value = from as f64 + (stage.target as f64 - from as f64) * progress;
                        let value = if stage.target >= from {
                            value.floor()
                        } else {
                            value.ceil()
                        };
                        return value.max(0.) as usize;
                    }
                    from = stage.target;
                    stage_start = stage_end;
                }
                from
            }
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::ConstantVus {
                vus,
                duration,
                graceful_stop,
            } => write!(
                f,
                "{vus} looping VUs for {} ({} graceful stop)",
                format_duration(*duration),
                format_duration(*graceful_stop)
            ),
            Profile::RampingVus {
                stages,
                graceful_ramp_down,
                ..
            } => write!(
                f,
                "up to {} looping VUs for {} over {} stages ({} graceful ramp-down)",
                self.max_vus(),
                format_duration(self.duration()),
                stages.len(),
                format_duration(*graceful_ramp_down)
            ),
        }
    }
}

/// Which function each VU iteration runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Entry {
    /// The weighted action mix.
    #[default]
    Default,
    /// The login request on its own.
    Auth,
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::Default => f.write_str("default"),
            Entry::Auth => f.write_str("authScenario"),
        }
    }
}

#[doc(hidden)]
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub base_url: String,
    pub scenario: ScenarioKind,
    pub profile: Profile,
    pub entry: Entry,
    pub max_rps: Option<NonZeroU32>,
    pub slow_request: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub thresholds: Vec<Threshold>,
}

impl RunConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            scenario: ScenarioKind::Smoke,
            profile: ScenarioKind::Smoke.profile(),
            entry: Entry::Default,
            max_rps: None,
            slow_request: DEFAULT_SLOW_REQUEST,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            thresholds: Threshold::defaults(),
        })
    }

    pub fn set_scenario(&mut self, scenario: ScenarioKind) {
        self.scenario = scenario;
        self.profile = scenario.profile();
    }

    /// Joins a request path onto the base URL, keeping any path prefix the base carries.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|source| ConfigError::InvalidBaseUrl {
        url: trimmed.to_string(),
        source,
    })?;

    match url.scheme() {
        "http" | "https" => Ok(trimmed.trim_end_matches('/').to_string()),
        _ => Err(ConfigError::UnsupportedScheme(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke_is_constant_five_for_thirty_seconds() {
        let profile = ScenarioKind::Smoke.profile();
        assert_eq!(profile.duration(), Duration::from_secs(30));
        assert_eq!(profile.max_vus(), 5);
        assert_eq!(profile.target_at(Duration::ZERO), 5);
        assert_eq!(profile.target_at(Duration::from_millis(29_999)), 5);
        assert_eq!(profile.target_at(Duration::from_secs(30)), 0);
    }

    #[test]
    fn ci_stages_and_drain() {
        let profile = ScenarioKind::Ci.profile();
        assert_eq!(profile.duration(), Duration::from_secs(50));
        assert_eq!(profile.graceful_stop(), Duration::from_secs(10));
        assert_eq!(profile.max_duration(), Duration::from_secs(60));
        assert_eq!(profile.max_vus(), 50);
    }

    #[test]
    fn full_stages_and_drain() {
        let profile = ScenarioKind::Full.profile();
        assert_eq!(profile.duration(), Duration::from_secs(10 * 60 + 30));
        assert_eq!(profile.graceful_stop(), Duration::from_secs(30));
        assert_eq!(profile.max_vus(), 5_000);
    }

    #[test]
    fn ramp_interpolates_linearly() {
        let profile = ScenarioKind::Ci.profile();
        assert_eq!(profile.target_at(Duration::ZERO), 0);
        assert_eq!(profile.target_at(Duration::from_millis(499)), 0);
        assert_eq!(profile.target_at(Duration::from_millis(500)), 1);
        assert_eq!(profile.target_at(Duration::from_secs(5)), 10);
        assert_eq!(profile.target_at(Duration::from_secs(10)), 20);
        assert_eq!(profile.target_at(Duration::from_secs(25)), 35);
        assert_eq!(profile.target_at(Duration::from_secs(40)), 50);
        // Ramp-down rounds up so VUs leave only once the line has passed them.
        assert_eq!(profile.target_at(Duration::from_millis(40_100)), 50);
        assert_eq!(profile.target_at(Duration::from_secs(45)), 25);
        assert_eq!(profile.target_at(Duration::from_secs(50)), 0);
        assert_eq!(profile.target_at(Duration::from_secs(500)), 0);
    }

    #[test]
    fn zero_length_stage_jumps() {
        let profile = Profile::ramping(
            2,
            vec![
                RampStage::new(Duration::ZERO, 10),
                RampStage::new(Duration::from_secs(1), 10),
            ],
            Duration::from_secs(1),
        );
        assert_eq!(profile.target_at(Duration::ZERO), 10);
        assert_eq!(profile.max_vus(), 10);
    }

    #[test]
    fn unknown_selector_falls_back_to_smoke() {
        assert_eq!(ScenarioKind::from_selector("full"), ScenarioKind::Full);
        assert_eq!(ScenarioKind::from_selector("ci"), ScenarioKind::Ci);
        assert_eq!(ScenarioKind::from_selector("soak"), ScenarioKind::Smoke);
        assert_eq!(ScenarioKind::from_selector(""), ScenarioKind::Smoke);
        assert!("soak".parse::<ScenarioKind>().is_err());
    }

    #[test]
    fn base_url_is_validated_and_joined() {
        let config = RunConfig::new("http://localhost:8081/").unwrap();
        assert_eq!(config.url("/health"), "http://localhost:8081/health");

        let prefixed = RunConfig::new("https://example.com/backend").unwrap();
        assert_eq!(
            prefixed.url("/api/v2/boards"),
            "https://example.com/backend/api/v2/boards"
        );

        assert!(matches!(
            RunConfig::new("localhost:8081"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            RunConfig::new("not a url"),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));
    }
}
