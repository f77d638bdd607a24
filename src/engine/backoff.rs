use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Exponent cap: beyond six consecutive errors the delay stops growing.
const MAX_EXPONENT: u32 = 6;
/// Upper bound of the uniform jitter added to every delay.
const JITTER_MAX_MS: u64 = 300;

/// Streak-scaled exponential backoff with uniform jitter.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ErrorBackoff {
    base: Duration,
    max: Duration,
}

impl ErrorBackoff {
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay for the given consecutive-error streak (1-based):
    /// `min(max, base * 2^min(6, streak))` plus jitter so workers hitting the
    /// same upstream hiccup do not retry in lockstep.
    pub(crate) fn delay_for(&self, streak: u32) -> Duration {
        let exponent = streak.min(MAX_EXPONENT);
        let scaled = self
            .base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max);
        let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_MS);
        scaled + Duration::from_millis(jitter)
    }
}

/// Sleeps for `delay` unless the token fires first. Returns `false` when the
/// sleep was cut short by cancellation.
pub(crate) async fn sleep_with_cancellation(delay: Duration, token: &CancellationToken) -> bool {
    if delay.is_zero() {
        return !token.is_cancelled();
    }

    tokio::select! {
        _ = token.cancelled() => false,
        _ = sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_streak_and_is_capped() {
        let backoff = ErrorBackoff::new(Duration::from_millis(100), Duration::from_secs(5));
        let jitter = Duration::from_millis(JITTER_MAX_MS);

        let first = backoff.delay_for(1);
        assert!(first >= Duration::from_millis(200));
        assert!(first <= Duration::from_millis(200) + jitter);

        let third = backoff.delay_for(3);
        assert!(third >= Duration::from_millis(800));

        // Streaks beyond the exponent cap and the max delay stop growing.
        let capped = backoff.delay_for(40);
        assert!(capped <= Duration::from_secs(5) + jitter);
        let at_cap = backoff.delay_for(MAX_EXPONENT);
        let past_cap = backoff.delay_for(MAX_EXPONENT + 10);
        assert!(past_cap <= at_cap + jitter);
    }

    #[tokio::test]
    async fn cancelled_token_cuts_the_sleep_short() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!sleep_with_cancellation(Duration::from_secs(60), &token).await);
        assert!(!sleep_with_cancellation(Duration::ZERO, &token).await);
    }

    #[tokio::test]
    async fn uncancelled_sleep_completes() {
        let token = CancellationToken::new();
        assert!(sleep_with_cancellation(Duration::from_millis(1), &token).await);
        assert!(sleep_with_cancellation(Duration::ZERO, &token).await);
    }
}
