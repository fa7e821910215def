use metrics_exporter_prometheus::PrometheusBuilder;
use mock_service::{MockConfig, MockService};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
            std::process::exit(1);
        }));

        FmtSubscriber::builder()
            .with_env_filter("angple_loadgen=debug,mock_service=info")
            .init();

        // Exercises the metrics publishing path without binding a scrape port.
        PrometheusBuilder::new().install_recorder().unwrap();
    });
}

/// Mock backend answering every route after `latency`.
#[allow(unused)]
pub async fn mock(latency: Duration) -> MockService {
    mock_with(MockConfig::default().latency(latency)).await
}

#[allow(unused)]
pub async fn mock_with(config: MockConfig) -> MockService {
    init();
    mock_service::spawn(config).await.unwrap()
}
