use angple_loadgen::prelude::*;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_LOG_FILTER: &str = "angple_loadgen=info";

#[derive(Parser, Debug)]
#[command(version, about = "Load test and SLA check for the angple backend")]
struct Cli {
    /// Target origin; request paths are appended to it verbatim.
    #[arg(long, env = "BASE_URL", default_value = angple_loadgen::core::DEFAULT_BASE_URL)]
    base_url: String,

    /// `smoke`, `ci` or `full`. Anything else runs `smoke`.
    #[arg(long, env = "SCENARIO", default_value = angple_loadgen::core::DEFAULT_SCENARIO)]
    scenario: String,

    #[arg(long, env = "EXEC", value_enum, default_value_t = Exec::Default)]
    exec: Exec,

    /// Requests-per-second cap shared by all VUs.
    #[arg(long, env = "MAX_RPS")]
    max_rps: Option<NonZeroU32>,

    #[arg(long, env = "SLOW_REQUEST_MS", default_value_t = 1_000)]
    slow_request_ms: u64,

    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "60s", value_parser = humantime::parse_duration)]
    request_timeout: Duration,

    #[arg(long, env = "USER_AGENT", default_value = angple_loadgen::core::DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Extra threshold in `METRIC:EXPR` form, e.g. `post_list_duration:p(99)<80`.
    #[arg(long = "threshold", value_name = "METRIC:EXPR")]
    thresholds: Vec<Threshold>,

    /// Write the run summary as JSON.
    #[arg(long, value_name = "PATH")]
    summary_export: Option<PathBuf>,

    /// Serve a Prometheus scrape endpoint on this address for the duration of the run.
    #[arg(long, value_name = "ADDR")]
    prometheus: Option<SocketAddr>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Exec {
    /// Weighted action mix with think time.
    Default,
    /// Login request only.
    Auth,
}

impl From<Exec> for Entry {
    fn from(exec: Exec) -> Self {
        match exec {
            Exec::Default => Entry::Default,
            Exec::Auth => Entry::Auth,
        }
    }
}

impl Cli {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = RunConfig::new(&self.base_url)
            .with_context(|| format!("invalid BASE_URL `{}`", self.base_url))?;
        config.set_scenario(ScenarioKind::from_selector(&self.scenario));
        config.entry = self.exec.into();
        config.max_rps = self.max_rps;
        config.slow_request = Duration::from_millis(self.slow_request_ms);
        config.request_timeout = self.request_timeout;
        config.user_agent = self.user_agent;
        config.thresholds.extend(self.thresholds);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    FmtSubscriber::builder().with_env_filter(filter).init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(addr) = cli.prometheus {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .with_context(|| format!("failed to start Prometheus exporter on {addr}"))?;
        info!("Prometheus metrics on http://{addr}/metrics");
    }

    let summary_export = cli.summary_export.clone();
    let config = cli.into_config()?;
    let summary = LoadTest::from_config(config).await?;

    println!("{summary}");

    if let Some(path) = summary_export {
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        info!("Summary written to {}", path.display());
    }

    if summary.passed() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(THRESHOLDS_FAILED_EXIT_CODE))
    }
}
