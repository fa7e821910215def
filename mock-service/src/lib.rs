//! Stand-in for the angple backend: the routes the load test hits, with configurable latency,
//! per-route status overrides and an optional request-rate cap.
use anyhow::Result;
use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
#[allow(unused)]
use tracing::{debug, info, warn};

pub use axum::http::StatusCode;

pub const POSTS: &str = "/api/v2/boards/free/posts";
pub const POST: &str = "/api/v2/boards/free/posts/1";
pub const COMMENTS: &str = "/api/v2/boards/free/posts/1/comments";
pub const BOARDS: &str = "/api/v2/boards";
pub const USERS: &str = "/api/v2/users";
pub const HEALTH: &str = "/health";
pub const LOGIN: &str = "/api/v2/auth/login";

pub const ROUTES: [&str; 7] = [POSTS, POST, COMMENTS, BOARDS, USERS, HEALTH, LOGIN];

const VALID_USERNAME: &str = "testuser";
const VALID_PASSWORD: &str = "testpassword";

#[derive(Clone, Debug, Default)]
pub struct MockConfig {
    /// Base delay before every response.
    pub latency: Duration,
    /// Standard deviation of a normal jitter added to `latency`.
    pub jitter: Option<Duration>,
    /// Fixed status per route path, bypassing the normal handler.
    pub overrides: HashMap<&'static str, StatusCode>,
    /// Responses beyond this rate get `429 Too Many Requests`.
    pub max_rps: Option<NonZeroU32>,
}

impl MockConfig {
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn jitter(mut self, std_dev: Duration) -> Self {
        self.jitter = Some(std_dev);
        self
    }

    pub fn status(mut self, route: &'static str, status: StatusCode) -> Self {
        self.overrides.insert(route, status);
        self
    }

    pub fn max_rps(mut self, rps: NonZeroU32) -> Self {
        self.max_rps = Some(rps);
        self
    }
}

struct MockState {
    config: MockConfig,
    delay: Option<Normal<f64>>,
    limiter: Option<DefaultDirectRateLimiter>,
    hits: HashMap<&'static str, AtomicU64>,
    user_agents: Mutex<Vec<String>>,
    total: AtomicU64,
    logins: AtomicU64,
}

impl MockState {
    fn new(config: MockConfig) -> Self {
        let delay = config.jitter.and_then(|std_dev| {
            Normal::new(
                config.latency.as_secs_f64() * 1_000.,
                std_dev.as_secs_f64() * 1_000.,
            )
            .map_err(|err| warn!("Ignoring jitter: {err}"))
            .ok()
        });
        let limiter = config
            .max_rps
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));
        let hits = ROUTES.iter().map(|r| (*r, AtomicU64::new(0))).collect();

        Self {
            config,
            delay,
            limiter,
            hits,
            user_agents: Mutex::new(vec![]),
            total: AtomicU64::new(0),
            logins: AtomicU64::new(0),
        }
    }

    fn delay(&self) -> Duration {
        match &self.delay {
            Some(normal) => {
                let ms = normal.sample(&mut rand::thread_rng()).max(0.);
                Duration::from_secs_f64(ms / 1_000.)
            }
            None => self.config.latency,
        }
    }

    /// Bookkeeping shared by every route. Returns the status to short-circuit with, if any.
    async fn enter(&self, route: &'static str, headers: &HeaderMap) -> Option<StatusCode> {
        counter!("mock_service.requests", "route" => route).increment(1);
        self.total.fetch_add(1, Ordering::Relaxed);
        if let Some(hits) = self.hits.get(route) {
            hits.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(ua) = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
        {
            if let Ok(mut seen) = self.user_agents.lock() {
                if !seen.iter().any(|s| s == ua) {
                    seen.push(ua.to_string());
                }
            }
        }

        let delay = self.delay();
        tokio::time::sleep(delay).await;

        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!("Rate limited {route}");
                return Some(StatusCode::TOO_MANY_REQUESTS);
            }
        }

        self.config.overrides.get(route).copied()
    }
}

/// Handle on a mock server running in the background. The server stops when this is dropped.
pub struct MockService {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockService {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL to point the load generator at.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self, route: &str) -> u64 {
        self.state
            .hits
            .get(route)
            .map(|h| h.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    pub fn total_hits(&self) -> u64 {
        self.state.total.load(Ordering::Relaxed)
    }

    /// Logins answered with 200 after the credentials matched.
    pub fn successful_logins(&self) -> u64 {
        self.state.logins.load(Ordering::Relaxed)
    }

    pub fn user_agents(&self) -> Vec<String> {
        self.state
            .user_agents
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Serves the mock on an ephemeral loopback port.
pub async fn spawn(config: MockConfig) -> Result<MockService> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = Arc::new(MockState::new(config));

    let app = router(state.clone());
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            warn!("Mock service stopped: {err}");
        }
    });

    debug!("Mock service listening on {addr}");
    Ok(MockService {
        addr,
        state,
        handle,
    })
}

/// Serves the mock on `addr` until the process exits.
pub async fn run(addr: SocketAddr, config: MockConfig) -> Result<()> {
    let state = Arc::new(MockState::new(config));
    tokio::spawn(rps_report_task(state.clone()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Mock service listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route(POSTS, get(posts))
        .route(POST, get(post_detail))
        .route(COMMENTS, get(comments))
        .route(BOARDS, get(boards))
        .route(USERS, get(users))
        .route(HEALTH, get(health))
        .route(LOGIN, post(login))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type Shared = State<Arc<MockState>>;

async fn respond(
    state: &MockState,
    route: &'static str,
    headers: &HeaderMap,
    body: serde_json::Value,
) -> Response {
    match state.enter(route, headers).await {
        Some(status) => (status, Json(json!({ "error": status.as_u16() }))).into_response(),
        None => Json(body).into_response(),
    }
}

async fn posts(State(state): Shared, headers: HeaderMap) -> Response {
    let body = json!({
        "items": (1..=20).map(|id| json!({ "id": id, "title": format!("post {id}") })).collect::<Vec<_>>(),
        "page": 1,
        "per_page": 20,
    });
    respond(&state, POSTS, &headers, body).await
}

async fn post_detail(State(state): Shared, headers: HeaderMap) -> Response {
    respond(&state, POST, &headers, json!({ "id": 1, "title": "post 1", "content": "hello" })).await
}

async fn comments(State(state): Shared, headers: HeaderMap) -> Response {
    respond(&state, COMMENTS, &headers, json!({ "items": [{ "id": 1, "content": "first" }] })).await
}

async fn boards(State(state): Shared, headers: HeaderMap) -> Response {
    respond(&state, BOARDS, &headers, json!({ "items": [{ "slug": "free" }] })).await
}

async fn users(State(state): Shared, headers: HeaderMap) -> Response {
    respond(&state, USERS, &headers, json!({ "items": [{ "username": VALID_USERNAME }] })).await
}

async fn health(State(state): Shared, headers: HeaderMap) -> Response {
    respond(&state, HEALTH, &headers, json!({ "status": "ok" })).await
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn login(
    State(state): Shared,
    headers: HeaderMap,
    Json(credentials): Json<Credentials>,
) -> Response {
    if let Some(status) = state.enter(LOGIN, &headers).await {
        return (status, Json(json!({ "error": status.as_u16() }))).into_response();
    }

    if credentials.username == VALID_USERNAME && credentials.password == VALID_PASSWORD {
        state.logins.fetch_add(1, Ordering::Relaxed);
        Json(json!({ "access_token": "mock-token" })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid credentials" })),
        )
            .into_response()
    }
}

async fn rps_report_task(state: Arc<MockState>) {
    let mut last = 0;
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let total = state.total.load(Ordering::Relaxed);
        let rps = total - last;
        last = total;
        gauge!("mock_service.rps").set(rps as f64);
        if rps > 0 {
            info!("{rps} RPS");
        }
    }
}
