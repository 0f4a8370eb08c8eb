use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Periodic trigger for inventory sweeps.
///
/// The first tick completes immediately. Late ticks are delivered in a burst
/// rather than skipped.
pub struct Scheduler {
    interval: Interval,
    period: Duration,
}

impl Scheduler {
    pub fn start(period: Duration) -> Self {
        Self::with_interval(time::interval(period), period)
    }

    fn with_interval(mut interval: Interval, period: Duration) -> Self {
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        Self { interval, period }
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Switches to `period`, the next tick firing one full period from now.
    /// Returns `false` if the period is unchanged.
    pub fn reschedule(&mut self, period: Duration) -> bool {
        if period == self.period {
            return false;
        }
        *self = Self::with_interval(time::interval_at(Instant::now() + period, period), period);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate() {
        let mut scheduler = Scheduler::start(Duration::from_secs(300));
        let start = Instant::now();

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_waits_a_full_new_period() {
        let mut scheduler = Scheduler::start(Duration::from_secs(300));
        scheduler.tick().await;

        assert!(!scheduler.reschedule(Duration::from_secs(300)));
        assert!(scheduler.reschedule(Duration::from_secs(60)));
        assert_eq!(scheduler.period(), Duration::from_secs(60));

        let start = Instant::now();
        scheduler.tick().await;
        assert_eq!(start.elapsed(), Duration::from_secs(60));
    }
}
