mod utils;
#[allow(unused)]
use utils::*;

#[cfg(feature = "integration")]
mod tests {
    use super::*;
    use angple_loadgen::prelude::*;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(60_000)]
    async fn smoke_against_healthy_backend() {
        let mock = mock(Duration::from_millis(50)).await;

        let summary = LoadTest::new(&mock.url())
            .unwrap()
            .scenario(ScenarioKind::from_selector("smoke"))
            .await
            .unwrap();

        assert!(summary.passed(), "{summary}");
        assert_eq!(summary.scenario, "smoke");
        assert_eq!(summary.max_vus, 5);
        assert_eq!(summary.errors.rate(), 0.);
        assert!(summary.elapsed >= Duration::from_secs(30));
        assert!(summary.elapsed < Duration::from_secs(35));
        assert_eq!(summary.interrupted_iterations, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ntest::timeout(60_000)]
    async fn unknown_selector_runs_smoke() {
        let mock = mock(Duration::from_millis(10)).await;

        let summary = LoadTest::new(&mock.url())
            .unwrap()
            .scenario(ScenarioKind::from_selector("soak"))
            .await
            .unwrap();

        assert_eq!(summary.scenario, "smoke");
        assert!(summary.passed(), "{summary}");
    }
}
