mod utils;
use utils::*;

use angple_loadgen::prelude::*;
use mock_service::{MockConfig, StatusCode, BOARDS, COMMENTS, HEALTH, LOGIN, POST};
use std::num::NonZeroU32;
use std::time::Duration;

fn short(vus: usize, secs: u64) -> Profile {
    Profile::ConstantVus {
        vus,
        duration: Duration::from_secs(secs),
        graceful_stop: Duration::from_secs(5),
    }
}

fn only(requests: &[Request]) -> Catalogue {
    Catalogue::new(
        requests
            .iter()
            .map(|r| WeightedAction::new(*r, 1))
            .collect(),
    )
    .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn healthy_backend_passes_every_threshold() {
    let mock = mock(Duration::from_millis(50)).await;

    let summary = LoadTest::new(&mock.url())
        .unwrap()
        .profile(short(10, 3))
        .await
        .unwrap();

    assert!(summary.passed(), "{summary}");
    assert_eq!(summary.errors.rate(), 0.);
    assert_eq!(summary.thresholds.len(), 6);
    assert_eq!(summary.interrupted_iterations, 0);
    assert_eq!(summary.max_vus, 10);
    assert!(summary.requests >= 10);
    assert_eq!(summary.requests, mock.total_hits());

    let http = &summary.trends["http_req_duration"];
    assert!(http.min >= 50.);
    assert_eq!(http.count as u64, summary.requests);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["scenario"], "custom");
    assert_eq!(json["thresholds"].as_array().map(Vec::len), Some(6));
    assert!(json["trends"]["http_req_duration"]["p95"].is_number());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn failing_boards_only_blame_list_boards() {
    let mock = mock_with(
        MockConfig::default()
            .latency(Duration::from_millis(10))
            .status(BOARDS, StatusCode::INTERNAL_SERVER_ERROR),
    )
    .await;

    let summary = LoadTest::new(&mock.url())
        .unwrap()
        .profile(short(40, 3))
        .await
        .unwrap();

    assert!(mock.hits(BOARDS) > 0);
    for named in &summary.errors_by_request {
        if named.name == "list_boards" {
            assert_eq!(named.rate.hits, named.rate.total);
            assert!(named.rate.total > 0);
        } else {
            assert_eq!(named.rate.hits, 0, "{}", named.name);
        }
    }
    for named in &summary.checks {
        if named.name != "boards status 200" {
            assert_eq!(named.rate.misses(), 0, "{}", named.name);
        }
    }

    assert!(summary.errors.rate() > 0.);
    assert!(!summary.passed());
    let failed: Vec<_> = summary.failed_thresholds().map(|t| t.metric).collect();
    assert_eq!(failed, vec!["errors"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn missing_post_is_not_an_error() {
    let mock = mock_with(
        MockConfig::default()
            .status(POST, StatusCode::NOT_FOUND)
            .status(COMMENTS, StatusCode::NOT_FOUND),
    )
    .await;

    let summary = LoadTest::new(&mock.url())
        .unwrap()
        .catalogue(only(&[Request::ViewPost, Request::ViewComments]))
        .profile(short(4, 2))
        .await
        .unwrap();

    assert!(mock.hits(POST) + mock.hits(COMMENTS) > 0);
    assert_eq!(summary.errors.hits, 0);
    assert!(summary.errors.total > 0);
    assert!(summary.passed(), "{summary}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn failing_health_check_stays_out_of_errors() {
    let mock = mock_with(MockConfig::default().status(HEALTH, StatusCode::INTERNAL_SERVER_ERROR)).await;

    let summary = LoadTest::new(&mock.url())
        .unwrap()
        .catalogue(only(&[Request::HealthCheck, Request::BrowsePosts]))
        .profile(short(10, 2))
        .await
        .unwrap();

    let health = summary
        .checks
        .iter()
        .find(|c| c.name == "health ok")
        .map(|c| c.rate)
        .unwrap_or_default();
    assert_eq!(health.hits, 0);
    assert_eq!(health.total, mock.hits(HEALTH));

    assert_eq!(summary.errors.hits, 0);
    assert_eq!(summary.errors.total, mock.hits(mock_service::POSTS));
    assert!(summary
        .errors_by_request
        .iter()
        .all(|named| named.name != "health_check"));
}

async fn run_auth(login_status: Option<StatusCode>) -> RunSummary {
    let mut config = MockConfig::default().latency(Duration::from_millis(5));
    if let Some(status) = login_status {
        config = config.status(LOGIN, status);
    }
    let mock = mock_with(config).await;

    let summary = LoadTest::new(&mock.url())
        .unwrap()
        .entry(Entry::Auth)
        .profile(short(2, 1))
        .await
        .unwrap();

    assert_eq!(mock.hits(LOGIN), summary.requests);
    assert_eq!(mock.total_hits(), mock.hits(LOGIN));
    if login_status.is_none() {
        // Every login must get past the credential check, not just answer 401.
        assert!(summary.requests > 0);
        assert_eq!(mock.successful_logins(), summary.requests);
    } else {
        assert_eq!(mock.successful_logins(), 0);
    }
    summary
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn auth_entry_accepts_ok_and_unauthorized() {
    let ok = run_auth(None).await;
    assert_eq!(ok.entry, "authScenario");
    assert_eq!(ok.errors.hits, 0);
    assert!(ok.trends.contains_key("auth_login_duration"));

    let unauthorized = run_auth(Some(StatusCode::UNAUTHORIZED)).await;
    assert_eq!(unauthorized.errors.hits, 0);
    assert!(unauthorized.errors.total > 0);

    let broken = run_auth(Some(StatusCode::INTERNAL_SERVER_ERROR)).await;
    assert_eq!(broken.errors.rate(), 1.);
    assert!(!broken.passed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn requests_carry_the_load_test_user_agent() {
    let mock = mock(Duration::ZERO).await;

    LoadTest::new(&mock.url())
        .unwrap()
        .entry(Entry::Auth)
        .profile(short(1, 1))
        .await
        .unwrap();

    assert_eq!(mock.user_agents(), vec!["Angple-Web-SSR/LoadTest".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn max_rps_caps_the_request_rate() {
    let mock = mock(Duration::ZERO).await;

    let summary = LoadTest::new(&mock.url())
        .unwrap()
        .entry(Entry::Auth)
        .max_rps(NonZeroU32::new(20).unwrap())
        .profile(short(4, 2))
        .await
        .unwrap();

    // One second's burst plus two seconds at the steady rate, with slack for timing.
    assert!(summary.requests >= 20, "{}", summary.requests);
    assert!(summary.requests <= 70, "{}", summary.requests);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ntest::timeout(20_000)]
async fn custom_threshold_is_reported() {
    let mock = mock(Duration::from_millis(30)).await;

    let summary = LoadTest::new(&mock.url())
        .unwrap()
        .entry(Entry::Auth)
        .profile(short(2, 1))
        .threshold("auth_login_duration:p(95)<10".parse().unwrap())
        .await
        .unwrap();

    let failed: Vec<_> = summary
        .failed_thresholds()
        .map(|t| (t.metric, t.expression.as_str()))
        .collect();
    assert_eq!(failed, vec![("auth_login_duration", "p(95)<10")]);
    assert!(summary.to_string().contains("FAIL"));
}
