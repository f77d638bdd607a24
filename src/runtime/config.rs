use anyhow::{bail, Result};
use std::time::Duration;

const DEFAULT_WORKER_COUNT: usize = 6;
const DEFAULT_SUCCESS_DELAY_MS: u64 = 200;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
const DEFAULT_BACKOFF_MAX_MS: u64 = 5_000;
const DEFAULT_AUTH_RETRIES: usize = 3;
const DEFAULT_AUTH_RETRY_DELAY_MS: u64 = 1_000;
const DEFAULT_HEALTH_CHECK_EVERY: usize = 10;
const DEFAULT_RESTART_THRESHOLD: usize = 5;
const DEFAULT_CHECKPOINT_FLUSH_EVERY: usize = 10;
const DEFAULT_SESSION_CLOSE_GRACE_SECS: u64 = 5;
const DEFAULT_CANCEL_GRACE_SECS: u64 = 10;
const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 5;

/// Runtime configuration for the scrape engine.
///
/// All instances must be constructed via [`EngineConfig::builder`] or
/// [`EngineConfig::new`] so invariants are validated before any consumer
/// observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    worker_count: usize,
    success_delay: Duration,
    backoff_base: Duration,
    backoff_max: Duration,
    auth_retries: usize,
    auth_retry_delay: Duration,
    health_check_every: usize,
    restart_threshold: usize,
    checkpoint_flush_every: usize,
    session_close_grace: Duration,
    cancel_grace: Duration,
    progress_interval: Duration,
    propagate_cached_assumption: bool,
}

pub struct EngineConfigParams {
    pub worker_count: usize,
    pub success_delay: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub auth_retries: usize,
    pub auth_retry_delay: Duration,
    pub health_check_every: usize,
    pub restart_threshold: usize,
    pub checkpoint_flush_every: usize,
    pub session_close_grace: Duration,
    pub cancel_grace: Duration,
    pub progress_interval: Duration,
    pub propagate_cached_assumption: bool,
}

impl EngineConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`EngineConfig::builder`] when most values use defaults.
    pub fn new(params: EngineConfigParams) -> Result<Self> {
        let EngineConfigParams {
            worker_count,
            success_delay,
            backoff_base,
            backoff_max,
            auth_retries,
            auth_retry_delay,
            health_check_every,
            restart_threshold,
            checkpoint_flush_every,
            session_close_grace,
            cancel_grace,
            progress_interval,
            propagate_cached_assumption,
        } = params;

        let config = Self {
            worker_count,
            success_delay,
            backoff_base,
            backoff_max,
            auth_retries,
            auth_retry_delay,
            health_check_every,
            restart_threshold,
            checkpoint_flush_every,
            session_close_grace,
            cancel_grace,
            progress_interval,
            propagate_cached_assumption,
        };

        config.validate()?;
        Ok(config)
    }

    /// Maximum concurrent workers; the catalog size further caps the pool.
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Pacing delay applied after each successful series.
    pub fn success_delay(&self) -> Duration {
        self.success_delay
    }

    /// First step of the jittered exponential error backoff.
    pub fn backoff_base(&self) -> Duration {
        self.backoff_base
    }

    /// Ceiling of the error backoff (before jitter).
    pub fn backoff_max(&self) -> Duration {
        self.backoff_max
    }

    /// Login attempts per worker before that worker aborts.
    pub fn auth_retries(&self) -> usize {
        self.auth_retries
    }

    /// Delay between failed login attempts.
    pub fn auth_retry_delay(&self) -> Duration {
        self.auth_retry_delay
    }

    /// Number of processed series between periodic session health checks.
    pub fn health_check_every(&self) -> usize {
        self.health_check_every
    }

    /// Consecutive errors after which a worker discards its session and
    /// starts a fresh one.
    pub fn restart_threshold(&self) -> usize {
        self.restart_threshold
    }

    /// Successes between checkpoint flushes; bounds work lost to interrupts.
    pub fn checkpoint_flush_every(&self) -> usize {
        self.checkpoint_flush_every
    }

    /// Time budget for releasing a session before it is treated as leaked.
    pub fn session_close_grace(&self) -> Duration {
        self.session_close_grace
    }

    /// How long cancelled workers are awaited before being abandoned.
    pub fn cancel_grace(&self) -> Duration {
        self.cancel_grace
    }

    /// Interval used by the background progress reporter.
    pub fn progress_interval(&self) -> Duration {
        self.progress_interval
    }

    /// Whether a first season satisfied from cache may arm the
    /// assume-unwatched shortcut for the rest of the series.
    pub fn propagate_cached_assumption(&self) -> bool {
        self.propagate_cached_assumption
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            bail!("worker_count must be greater than 0");
        }

        if self.backoff_base.is_zero() {
            bail!("backoff_base must be greater than 0");
        }

        if self.backoff_max < self.backoff_base {
            bail!("backoff_max must be at least backoff_base");
        }

        if self.auth_retries == 0 {
            bail!("auth_retries must be greater than 0");
        }

        if self.health_check_every == 0 {
            bail!("health_check_every must be greater than 0");
        }

        if self.restart_threshold < 2 {
            bail!("restart_threshold must be at least 2 so the health check fires first");
        }

        if self.checkpoint_flush_every == 0 {
            bail!("checkpoint_flush_every must be greater than 0");
        }

        if self.session_close_grace.is_zero() {
            bail!("session_close_grace must be greater than 0");
        }

        if self.cancel_grace.is_zero() {
            bail!("cancel_grace must be greater than 0");
        }

        if self.progress_interval.is_zero() {
            bail!("progress_interval must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct EngineConfigBuilder {
    worker_count: Option<usize>,
    success_delay: Option<Duration>,
    backoff_base: Option<Duration>,
    backoff_max: Option<Duration>,
    auth_retries: Option<usize>,
    auth_retry_delay: Option<Duration>,
    health_check_every: Option<usize>,
    restart_threshold: Option<usize>,
    checkpoint_flush_every: Option<usize>,
    session_close_grace: Option<Duration>,
    cancel_grace: Option<Duration>,
    progress_interval: Option<Duration>,
    propagate_cached_assumption: Option<bool>,
}

impl EngineConfigBuilder {
    pub fn worker_count(mut self, count: usize) -> Self {
        self.worker_count = Some(count);
        self
    }

    pub fn success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = Some(delay);
        self
    }

    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = Some(base);
        self
    }

    pub fn backoff_max(mut self, max: Duration) -> Self {
        self.backoff_max = Some(max);
        self
    }

    pub fn auth_retries(mut self, retries: usize) -> Self {
        self.auth_retries = Some(retries);
        self
    }

    pub fn auth_retry_delay(mut self, delay: Duration) -> Self {
        self.auth_retry_delay = Some(delay);
        self
    }

    pub fn health_check_every(mut self, every: usize) -> Self {
        self.health_check_every = Some(every);
        self
    }

    pub fn restart_threshold(mut self, threshold: usize) -> Self {
        self.restart_threshold = Some(threshold);
        self
    }

    pub fn checkpoint_flush_every(mut self, every: usize) -> Self {
        self.checkpoint_flush_every = Some(every);
        self
    }

    pub fn session_close_grace(mut self, grace: Duration) -> Self {
        self.session_close_grace = Some(grace);
        self
    }

    pub fn cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = Some(grace);
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = Some(interval);
        self
    }

    pub fn propagate_cached_assumption(mut self, allow: bool) -> Self {
        self.propagate_cached_assumption = Some(allow);
        self
    }

    pub fn build(self) -> Result<EngineConfig> {
        let params = EngineConfigParams {
            worker_count: self.worker_count.unwrap_or(DEFAULT_WORKER_COUNT),
            success_delay: self
                .success_delay
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_SUCCESS_DELAY_MS)),
            backoff_base: self
                .backoff_base
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_BACKOFF_BASE_MS)),
            backoff_max: self
                .backoff_max
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_BACKOFF_MAX_MS)),
            auth_retries: self.auth_retries.unwrap_or(DEFAULT_AUTH_RETRIES),
            auth_retry_delay: self
                .auth_retry_delay
                .unwrap_or_else(|| Duration::from_millis(DEFAULT_AUTH_RETRY_DELAY_MS)),
            health_check_every: self.health_check_every.unwrap_or(DEFAULT_HEALTH_CHECK_EVERY),
            restart_threshold: self.restart_threshold.unwrap_or(DEFAULT_RESTART_THRESHOLD),
            checkpoint_flush_every: self
                .checkpoint_flush_every
                .unwrap_or(DEFAULT_CHECKPOINT_FLUSH_EVERY),
            session_close_grace: self
                .session_close_grace
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_SESSION_CLOSE_GRACE_SECS)),
            cancel_grace: self
                .cancel_grace
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_CANCEL_GRACE_SECS)),
            progress_interval: self
                .progress_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS)),
            propagate_cached_assumption: self.propagate_cached_assumption.unwrap_or(true),
        };

        EngineConfig::new(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_valid_defaults() {
        let config = EngineConfig::builder().build().unwrap();
        assert_eq!(config.worker_count(), DEFAULT_WORKER_COUNT);
        assert_eq!(config.auth_retries(), DEFAULT_AUTH_RETRIES);
        assert_eq!(config.health_check_every(), DEFAULT_HEALTH_CHECK_EVERY);
        assert_eq!(config.restart_threshold(), DEFAULT_RESTART_THRESHOLD);
        assert_eq!(
            config.checkpoint_flush_every(),
            DEFAULT_CHECKPOINT_FLUSH_EVERY
        );
        assert_eq!(
            config.success_delay(),
            Duration::from_millis(DEFAULT_SUCCESS_DELAY_MS)
        );
        assert_eq!(
            config.backoff_base(),
            Duration::from_millis(DEFAULT_BACKOFF_BASE_MS)
        );
        assert_eq!(
            config.backoff_max(),
            Duration::from_millis(DEFAULT_BACKOFF_MAX_MS)
        );
        assert_eq!(
            config.progress_interval(),
            Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS)
        );
        assert!(config.propagate_cached_assumption());
    }

    #[test]
    fn overrides_are_honored() {
        let config = EngineConfig::builder()
            .worker_count(2)
            .success_delay(Duration::ZERO)
            .backoff_base(Duration::from_millis(10))
            .backoff_max(Duration::from_millis(50))
            .restart_threshold(3)
            .propagate_cached_assumption(false)
            .build()
            .expect("config should build");
        assert_eq!(config.worker_count(), 2);
        assert_eq!(config.success_delay(), Duration::ZERO);
        assert_eq!(config.backoff_base(), Duration::from_millis(10));
        assert_eq!(config.restart_threshold(), 3);
        assert!(!config.propagate_cached_assumption());
    }

    #[test]
    fn validation_catches_invalid_values() {
        let err = EngineConfig::builder().worker_count(0).build().unwrap_err();
        assert!(
            format!("{err}").contains("worker_count"),
            "error should mention worker_count"
        );

        let err = EngineConfig::builder()
            .backoff_base(Duration::from_secs(10))
            .backoff_max(Duration::from_secs(1))
            .build()
            .unwrap_err();
        assert!(
            format!("{err}").contains("backoff_max"),
            "error should mention backoff_max"
        );

        let err = EngineConfig::builder().auth_retries(0).build().unwrap_err();
        assert!(
            format!("{err}").contains("auth_retries"),
            "error should mention auth_retries"
        );

        let err = EngineConfig::builder()
            .health_check_every(0)
            .build()
            .unwrap_err();
        assert!(
            format!("{err}").contains("health_check_every"),
            "error should mention health_check_every"
        );

        let err = EngineConfig::builder()
            .restart_threshold(1)
            .build()
            .unwrap_err();
        assert!(
            format!("{err}").contains("restart_threshold"),
            "error should mention restart_threshold"
        );

        let err = EngineConfig::builder()
            .checkpoint_flush_every(0)
            .build()
            .unwrap_err();
        assert!(
            format!("{err}").contains("checkpoint_flush_every"),
            "error should mention checkpoint_flush_every"
        );

        let err = EngineConfig::builder()
            .session_close_grace(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(
            format!("{err}").contains("session_close_grace"),
            "error should mention session_close_grace"
        );

        let err = EngineConfig::builder()
            .cancel_grace(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(
            format!("{err}").contains("cancel_grace"),
            "error should mention cancel_grace"
        );

        let err = EngineConfig::builder()
            .progress_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(
            format!("{err}").contains("progress_interval"),
            "error should mention progress_interval"
        );
    }

    #[test]
    fn direct_constructor_runs_validation() {
        let err = EngineConfig::new(EngineConfigParams {
            worker_count: 0,
            success_delay: Duration::from_millis(DEFAULT_SUCCESS_DELAY_MS),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_max: Duration::from_millis(DEFAULT_BACKOFF_MAX_MS),
            auth_retries: DEFAULT_AUTH_RETRIES,
            auth_retry_delay: Duration::from_millis(DEFAULT_AUTH_RETRY_DELAY_MS),
            health_check_every: DEFAULT_HEALTH_CHECK_EVERY,
            restart_threshold: DEFAULT_RESTART_THRESHOLD,
            checkpoint_flush_every: DEFAULT_CHECKPOINT_FLUSH_EVERY,
            session_close_grace: Duration::from_secs(DEFAULT_SESSION_CLOSE_GRACE_SECS),
            cancel_grace: Duration::from_secs(DEFAULT_CANCEL_GRACE_SECS),
            progress_interval: Duration::from_secs(DEFAULT_PROGRESS_INTERVAL_SECS),
            propagate_cached_assumption: true,
        })
        .unwrap_err();

        assert!(
            format!("{err}").contains("worker_count"),
            "error should mention invalid worker_count"
        );
    }
}
