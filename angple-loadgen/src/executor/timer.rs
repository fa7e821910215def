use std::time::Duration;
use tokio::time::{interval, Instant, Interval, MissedTickBehavior};

pub(crate) struct Timer {
    interval: Interval,
    last_tick: Instant,
    interval_dur: Duration,
}

impl Timer {
    pub async fn new(interval_dur: Duration) -> Self {
        let mut interval = interval(interval_dur);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // NOTE: First tick completes instantly
        let last_tick = interval.tick().await;
        Self {
            interval,
            last_tick,
            interval_dur,
        }
    }

    /// Waits for the next tick and returns the time since the previous one.
    pub async fn tick(&mut self) -> Duration {
        self.interval.tick().await;
        // Measured from the actual wake-up, not the scheduled deadline.
        let now = Instant::now();
        let elapsed = now - self.last_tick;
        self.last_tick = now;
        elapsed
    }
}

impl std::fmt::Display for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}", humantime::format_duration(self.interval_dur))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn reports_elapsed_between_ticks() {
        let mut timer = Timer::new(Duration::from_millis(100)).await;
        assert_eq!(timer.to_string(), "100ms");

        let elapsed = timer.tick().await;
        assert_eq!(elapsed, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(250)).await;
        // Missed ticks are delayed rather than bunched up.
        let elapsed = timer.tick().await;
        assert_eq!(elapsed, Duration::from_millis(250));
        let elapsed = timer.tick().await;
        assert_eq!(elapsed, Duration::from_millis(100));
    }
}
