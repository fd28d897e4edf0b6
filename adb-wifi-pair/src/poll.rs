use std::time::Duration;

/// A fixed number of fixed-length sleeps.
///
/// Built on `tokio::time`, so paused-clock tests advance it without
/// sleeping for real.
#[derive(Debug)]
pub struct PollDeadline {
    interval: Duration,
    remaining: u64,
}

impl PollDeadline {
    /// Enough ticks of `interval` to cover `window`, rounded up.
    pub fn new(window: Duration, interval: Duration) -> Self {
        let interval = interval.max(Duration::from_millis(1));
        let step = interval.as_nanos();
        let ticks = window.as_nanos().div_ceil(step);

        Self {
            interval,
            remaining: u64::try_from(ticks).unwrap_or(u64::MAX),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleeps one interval. Returns false without sleeping once the window
    /// is used up.
    pub async fn tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        tokio::time::sleep(self.interval).await;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_after_window() {
        let start = Instant::now();
        let mut deadline = PollDeadline::new(Duration::from_secs(5), Duration::from_secs(1));

        let mut ticks = 0;
        while deadline.tick().await {
            ticks += 1;
        }

        assert_eq!(ticks, 5);
        assert!(!deadline.tick().await);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_interval_rounds_up() {
        let mut deadline = PollDeadline::new(Duration::from_millis(2500), Duration::from_secs(1));

        let mut ticks = 0;
        while deadline.tick().await {
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_window_never_sleeps() {
        let start = Instant::now();
        let mut deadline = PollDeadline::new(Duration::ZERO, Duration::from_secs(1));

        assert!(!deadline.tick().await);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let deadline = PollDeadline::new(Duration::from_millis(3), Duration::ZERO);
        assert_eq!(deadline.interval(), Duration::from_millis(1));
    }
}
