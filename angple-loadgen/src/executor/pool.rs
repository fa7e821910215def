use std::future::Future;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn, Instrument};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One tokio task per virtual user, each looping over `scenario` until asked to stop.
pub(crate) struct VuPool<T> {
    scenario: T,
    active: Vec<VirtualUser>,
    retiring: Vec<Retiring>,
    next_id: usize,
    iterations: Arc<AtomicU64>,
    interrupted: u64,
}

struct VirtualUser {
    id: usize,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A VU finishing its last iteration. Aborted if still running at `deadline`.
struct Retiring {
    id: usize,
    handle: JoinHandle<()>,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolStats {
    pub iterations: u64,
    pub interrupted: u64,
}

impl<T, F> VuPool<T>
where
    T: Fn() -> F + Send + Sync + 'static + Clone,
    F: Future<Output = ()> + Send + 'static,
{
    pub fn new(scenario: T) -> Self {
        Self {
            scenario,
            active: vec![],
            retiring: vec![],
            next_id: 1,
            iterations: Arc::new(AtomicU64::new(0)),
            interrupted: 0,
        }
    }

    /// Grows the pool with fresh VUs or retires the newest ones. Retired VUs finish their current
    /// iteration and get `grace` to do so.
    pub fn set_concurrency(&mut self, concurrency: usize, grace: Duration) {
        if self.active.len() == concurrency {
            return;
        } else if self.active.len() > concurrency {
            let deadline = Instant::now() + grace;
            for vu in self.active.drain(concurrency..) {
                trace!("Retiring VU {}", vu.id);
                vu.stop.store(true, Ordering::Relaxed);
                self.retiring.push(Retiring {
                    id: vu.id,
                    handle: vu.handle,
                    deadline,
                });
            }
        } else {
            while self.active.len() < concurrency {
                let vu = self.spawn();
                self.active.push(vu);
            }
        }
    }

    fn spawn(&mut self) -> VirtualUser {
        let id = self.next_id;
        self.next_id += 1;

        let scenario = self.scenario.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let iterations = self.iterations.clone();

        let handle = tokio::spawn({
            let stop = stop.clone();
            async move {
                while !stop.load(Ordering::Relaxed) {
                    scenario().await;
                    iterations.fetch_add(1, Ordering::Relaxed);
                }
            }
            .instrument(tracing::debug_span!("vu", id))
        });

        VirtualUser { id, stop, handle }
    }

    /// Forgets retired VUs that have finished and aborts those past their deadline.
    pub fn reap(&mut self) {
        let now = Instant::now();
        let mut interrupted = 0;
        self.retiring.retain(|vu| {
            if vu.handle.is_finished() {
                false
            } else if now >= vu.deadline {
                debug!("VU {} interrupted after its graceful window", vu.id);
                vu.handle.abort();
                interrupted += 1;
                false
            } else {
                true
            }
        });
        self.interrupted += interrupted;
    }

    pub fn concurrency(&self) -> usize {
        self.active.len()
    }

    /// VUs that are still running, whether active or finishing their last iteration.
    pub fn running(&self) -> usize {
        self.active.len() + self.retiring.len()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    /// Stops every VU and waits for them, aborting whatever is left after `grace`.
    pub async fn shutdown(mut self, grace: Duration) -> PoolStats {
        self.set_concurrency(0, grace);
        loop {
            self.reap();
            if self.retiring.is_empty() {
                break;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        PoolStats {
            iterations: self.iterations(),
            interrupted: self.interrupted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sleeper(
        iteration: Duration,
        live: Arc<AtomicUsize>,
    ) -> impl Fn() -> std::pin::Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + Clone + 'static
    {
        move || {
            let live = live.clone();
            Box::pin(async move {
                live.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(iteration).await;
                live.fetch_sub(1, Ordering::SeqCst);
            })
        }
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    async fn grows_and_retires_gracefully() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut pool = VuPool::new(sleeper(Duration::from_millis(100), live.clone()));

        pool.set_concurrency(4, Duration::from_secs(1));
        assert_eq!(pool.concurrency(), 4);
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(live.load(Ordering::SeqCst), 4);

        pool.set_concurrency(1, Duration::from_secs(1));
        assert_eq!(pool.concurrency(), 1);
        assert_eq!(pool.running(), 4);

        tokio::time::sleep(Duration::from_millis(200)).await;
        pool.reap();
        assert_eq!(pool.running(), 1);

        let stats = pool.shutdown(Duration::from_secs(1)).await;
        assert_eq!(stats.interrupted, 0);
        assert!(stats.iterations >= 12);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    #[tracing_test::traced_test]
    #[tokio::test(start_paused = true)]
    async fn aborts_vus_that_overrun_their_grace() {
        let live = Arc::new(AtomicUsize::new(0));
        let mut pool = VuPool::new(sleeper(Duration::from_secs(60), live));

        pool.set_concurrency(3, Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let start = Instant::now();
        let stats = pool.shutdown(Duration::from_secs(2)).await;
        let waited = start.elapsed();

        assert_eq!(stats.interrupted, 3);
        assert_eq!(stats.iterations, 0);
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }
}
