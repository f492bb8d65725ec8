//! Exponential backoff for repeated pipe-endpoint setup failures.

use std::time::Duration;

/// Doubling delay bounded by a ceiling.
///
/// After `n` consecutive failures the delay handed out is
/// `min(start * 2^(n-1), max)`.  [`reset`](Backoff::reset) after any
/// success brings the next delay back to `start`.
#[derive(Debug, Clone)]
pub struct Backoff {
    start: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(start: Duration, max: Duration) -> Self {
        Self {
            start,
            max: max.max(start),
            failures: 0,
        }
    }

    /// Record one more failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.current()
    }

    /// Forget all previous failures.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Number of consecutive failures recorded since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn current(&self) -> Duration {
        if self.failures == 0 {
            return Duration::ZERO;
        }
        // 2^31 already dwarfs any sane ceiling; cap the shift to stay in range.
        let shift = (self.failures - 1).min(31);
        self.start
            .checked_mul(1u32 << shift)
            .map_or(self.max, |d| d.min(self.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn doubles_up_to_ceiling() {
        let mut b = Backoff::new(ms(1000), ms(30000));
        let delays: Vec<u64> = (0..8).map(|_| b.next_delay().as_millis() as u64).collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000]
        );
    }

    #[test]
    fn matches_closed_form() {
        let mut b = Backoff::new(ms(1000), ms(30000));
        for n in 1..=40u32 {
            let expected = if n > 6 {
                30000
            } else {
                (1000u64 * 2u64.pow(n - 1)).min(30000)
            };
            assert_eq!(b.next_delay(), ms(expected), "failure #{}", n);
        }
    }

    #[test]
    fn reset_returns_to_floor() {
        let mut b = Backoff::new(ms(1000), ms(30000));
        b.next_delay();
        b.next_delay();
        b.next_delay();
        assert_eq!(b.failures(), 3);
        b.reset();
        assert_eq!(b.failures(), 0);
        assert_eq!(b.next_delay(), ms(1000));
    }

    #[test]
    fn survives_many_failures() {
        let mut b = Backoff::new(ms(1000), ms(30000));
        for _ in 0..10_000 {
            b.next_delay();
        }
        assert_eq!(b.next_delay(), ms(30000));
    }

    #[test]
    fn ceiling_below_start_is_raised() {
        let mut b = Backoff::new(ms(500), ms(100));
        assert_eq!(b.next_delay(), ms(500));
        assert_eq!(b.next_delay(), ms(500));
    }
}
