use pdatastructs::tdigest::{TDigest, K1};
use std::fmt;
use std::time::Duration;
use tracing::error;

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Rolling view over one report window; never used for threshold evaluation.
#[derive(Debug, Clone)]
pub(crate) struct Measurement {
    pub rps: f64,
    pub error_rate: f64,
    pub elapsed: Duration,
    latency: TDigest<K1>,
    samples: usize,
}

impl Measurement {
    pub fn new(success: u64, error: u64, elapsed: Duration) -> Self {
        let total = success + error;
        let rps = total as f64 / elapsed.as_secs_f64();
        let error_rate = if total == 0 {
            0.
        } else {
            error as f64 / total as f64
        };
        Self {
            rps: if rps.is_finite() { rps } else { 0. },
            error_rate,
            elapsed,
            latency: default_tdigest(),
            samples: 0,
        }
    }

    pub fn populate_latencies(&mut self, dur: &[Duration]) {
        for latency in dur {
            self.latency.insert(latency.as_secs_f64());
        }
        self.samples += dur.len();
    }

    pub fn latency(&self, quantile: f64) -> Duration {
        if self.samples == 0 {
            return Duration::ZERO;
        }

        let secs = self.latency.quantile(quantile);

        // TDigest occasionally yields NaN on sparse input.
        let secs = if secs.is_finite() {
            secs.max(0.)
        } else {
            error!("NaN latency estimate in progress window.");
            0.
        };

        Duration::from_secs_f64(secs)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RPS={:.2}, ErrorRate={:.2}, p50={:?}, p90={:?}, p99={:?}",
            self.rps,
            self.error_rate,
            self.latency(0.5),
            self.latency(0.90),
            self.latency(0.99),
        )
    }
}

fn default_tdigest() -> TDigest<K1> {
    TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_is_quiet() {
        let m = Measurement::new(0, 0, Duration::from_secs(5));
        assert_eq!(m.rps, 0.);
        assert_eq!(m.error_rate, 0.);
        assert_eq!(m.latency(0.99), Duration::ZERO);
    }

    #[test]
    fn rates_over_window() {
        let mut m = Measurement::new(45, 5, Duration::from_secs(5));
        assert_eq!(m.rps, 10.);
        assert_eq!(m.error_rate, 0.1);

        m.populate_latencies(&[Duration::from_millis(20); 50]);
        let p50 = m.latency(0.5);
        assert!(p50 > Duration::from_millis(15) && p50 < Duration::from_millis(25));
    }
}
