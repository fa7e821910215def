//! Drives the VU pool along a load profile.
use crate::sink::MetricsSink;
use angple_loadgen_core::{Profile, CONTROL_INTERVAL, REPORT_INTERVAL};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, trace, warn};

mod pool;
mod timer;

use pool::VuPool;
use timer::Timer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExecutionStats {
    pub elapsed: Duration,
    pub iterations: u64,
    pub interrupted: u64,
    pub max_vus: usize,
}

/// Runs `scenario` in a loop on as many VUs as the profile asks for, re-evaluating the target on
/// every control tick. Returns once the profile has ended and every VU has either finished its
/// iteration or been cut off by the graceful-stop window.
#[instrument(name = "executor", skip_all, fields(profile = %profile))]
pub(crate) async fn execute<T, F>(profile: &Profile, scenario: T, sink: &MetricsSink) -> ExecutionStats
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    info!("Starting load profile");

    let start = Instant::now();
    let end = start + profile.duration();
    let mut pool = VuPool::new(scenario);
    let mut max_vus = 0;

    let mut control = Timer::new(CONTROL_INTERVAL).await;
    let mut report = Timer::new(REPORT_INTERVAL).await;

    // NOTE: This loop is time-sensitive. Nothing in here may block.
    loop {
        let target = profile.target_at(start.elapsed());
        if target != pool.concurrency() {
            debug!("Adjusting VUs from {} to {target}", pool.concurrency());
        }
        pool.set_concurrency(target, profile.graceful_ramp_down());
        pool.reap();
        max_vus = max_vus.max(pool.running());

        tokio::select! {
            _ = control.tick() => {}
            elapsed = report.tick() => {
                let measurement = sink.collect(elapsed);
                info!(
                    "[{}] VUs={}, {measurement}",
                    humantime::format_duration(Duration::from_secs(start.elapsed().as_secs())),
                    pool.concurrency(),
                );
            }
            _ = tokio::time::sleep_until(end) => break,
        }
    }

    info!("Load profile finished, stopping VUs");
    let stats = pool.shutdown(profile.graceful_stop()).await;
    if stats.interrupted > 0 {
        warn!(
            "{} iterations interrupted after the {} graceful stop",
            stats.interrupted,
            humantime::format_duration(profile.graceful_stop())
        );
    }

    ExecutionStats {
        elapsed: start.elapsed(),
        iterations: stats.iterations,
        interrupted: stats.interrupted,
        max_vus,
    }
}
