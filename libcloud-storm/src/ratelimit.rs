use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{
    num::NonZeroU32,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};
use tracing::warn;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const PAUSE_POLL: Duration = Duration::from_millis(100);

/// Process-wide HTTP throttle shared by every batch of a run.
///
/// Every `threshold` admitted requests, the worker that crossed the line
/// sleeps for `pause` while the others spin on the paused flag. The
/// coordination is poll-based: a worker that passed the flag check just
/// before it was raised may still send one request.
pub struct RateGovernor {
    threshold: u64,
    pause: Duration,
    count: AtomicU64,
    paused: AtomicBool,
    pauses: AtomicU64,
    limiter: Option<Limiter>,
}

impl RateGovernor {
    pub fn new(threshold: u64, pause: Duration) -> Self {
        Self {
            threshold,
            pause,
            count: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            pauses: AtomicU64::new(0),
            limiter: None,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Additionally smooth traffic to at most `per_second` requests.
    pub fn with_rate_cap(mut self, per_second: Option<NonZeroU32>) -> Self {
        self.limiter = per_second.map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.threshold > 0
    }

    /// Block while another worker sleeps out a pause. Does not count.
    pub async fn wait_while_paused(&self) {
        if !self.is_enabled() {
            return;
        }
        while self.paused.load(Ordering::Acquire) {
            tokio::time::sleep(PAUSE_POLL).await;
        }
    }

    /// Called by a worker right before it issues an HTTP request.
    pub async fn admit(&self) {
        if self.is_enabled() {
            self.wait_while_paused().await;

            let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
            if count % self.threshold == 0 {
                self.paused.store(true, Ordering::Release);
                self.pauses.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Rate limit: {} requests done, sleeping {:?}...",
                    count, self.pause
                );
                tokio::time::sleep(self.pause).await;
                self.paused.store(false, Ordering::Release);
            }
        }

        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Start counting from zero again.
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
        self.paused.store(false, Ordering::Release);
    }

    pub fn requests(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn pauses(&self) -> u64 {
        self.pauses.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::disabled()
    }
}

impl std::fmt::Debug for RateGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateGovernor")
            .field("threshold", &self.threshold)
            .field("pause", &self.pause)
            .field("requests", &self.requests())
            .field("pauses", &self.pauses())
            .field("rate_cap", &self.limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn disabled_governor_never_pauses() {
        let governor = RateGovernor::disabled();
        let start = Instant::now();
        for _ in 0..1000 {
            governor.admit().await;
        }
        assert_eq!(governor.pauses(), 0);
        assert_eq!(governor.requests(), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_after_every_threshold_crossing() {
        let governor = RateGovernor::new(5, Duration::from_secs(240));
        let start = Instant::now();
        for _ in 0..12 {
            governor.admit().await;
        }
        assert_eq!(governor.requests(), 12);
        assert_eq!(governor.pauses(), 2);
        assert!(start.elapsed() >= Duration::from_secs(480));
        assert!(!governor.is_paused());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_pauses_do_not_overlap() {
        let governor = Arc::new(RateGovernor::new(10, Duration::from_secs(60)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let governor = Arc::clone(&governor);
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    governor.admit().await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(governor.requests(), 40);
        assert_eq!(governor.pauses(), 4);
        // Sequential pauses: the clock must cover all four sleeps.
        assert!(start.elapsed() >= Duration::from_secs(240));
    }

    // The per-second cap runs on governor's own clock, not tokio's.
    #[tokio::test]
    async fn rate_cap_spreads_requests_past_the_burst() {
        let governor = RateGovernor::disabled().with_rate_cap(NonZeroU32::new(10));
        let start = std::time::Instant::now();
        for _ in 0..15 {
            governor.admit().await;
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
        assert_eq!(governor.pauses(), 0);
    }

    #[tokio::test]
    async fn rate_cap_applies_alongside_the_threshold() {
        let governor = RateGovernor::new(100, Duration::from_secs(1))
            .with_rate_cap(NonZeroU32::new(10));
        assert!(governor.is_enabled());
        let start = std::time::Instant::now();
        for _ in 0..12 {
            governor.admit().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(150));
        assert_eq!(governor.requests(), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restarts_the_count() {
        let governor = RateGovernor::new(3, Duration::from_secs(1));
        governor.admit().await;
        governor.admit().await;
        governor.reset();
        governor.admit().await;
        governor.admit().await;
        assert_eq!(governor.requests(), 2);
        assert_eq!(governor.pauses(), 0);
        governor.admit().await;
        assert_eq!(governor.pauses(), 1);
    }
}
