use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::MockConfig;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::FmtSubscriber;

const LISTEN_ADDR: &str = "0.0.0.0:8081";
const METRICS_ADDR: &str = "0.0.0.0:8002";

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter("mock_service=info,tower_http=warn")
        .init();

    let metrics_addr: SocketAddr = METRICS_ADDR.parse()?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to start Prometheus exporter")?;

    let config = MockConfig::default()
        .latency(Duration::from_millis(20))
        .jitter(Duration::from_millis(5));

    mock_service::run(LISTEN_ADDR.parse()?, config).await
}
