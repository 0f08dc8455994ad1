use std::fmt;
use std::time::Duration;

/// Calculate the delay before a retry attempt using exponential backoff.
///
/// The delay formula is: `base * 2^retry_count`
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use fetchkit::core::retry_delay;
///
/// assert_eq!(retry_delay(0, Duration::from_millis(100)), Duration::from_millis(100));
/// assert_eq!(retry_delay(1, Duration::from_millis(100)), Duration::from_millis(200));
/// assert_eq!(retry_delay(2, Duration::from_millis(100)), Duration::from_millis(400));
/// ```
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Transient condition that triggered a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryCause {
    /// The transport timed out.
    Timeout,
    /// The server answered 401 or 403.
    Auth,
    /// The server answered 301 or 302.
    Redirect,
}

impl RetryCause {
    pub fn tag(&self) -> &'static str {
        match self {
            RetryCause::Timeout => "socket",
            RetryCause::Auth => "auth",
            RetryCause::Redirect => "redirect",
        }
    }
}

/// Mutable retry bookkeeping for a single fetch.
///
/// Created fresh by [`RetryPolicy::start`] for every fetch and only changed
/// by [`RetryPolicy::retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Retries taken so far (0 on the first attempt).
    pub attempt: u32,
    /// Retries allowed after the first attempt.
    pub max_attempts: u32,
    /// Timeout handed to the transport for the next attempt.
    pub timeout: Duration,
}

/// Diagnostic record of one retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryMarker {
    pub cause: RetryCause,
    /// Retry count after the decision.
    pub attempt: u32,
    /// Timeout in effect for the attempt that failed.
    pub timeout: Duration,
    pub gave_up: bool,
}

impl fmt::Display for RetryMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.gave_up { "timeout-giveup" } else { "retry" };
        write!(
            f,
            "{}-{} [attempt={}, timeout={}ms]",
            self.cause.tag(),
            verdict,
            self.attempt,
            self.timeout.as_millis()
        )
    }
}

/// Decides whether a transient failure is retried and how the timeout
/// evolves between attempts.
pub trait RetryPolicy: fmt::Debug + Send + Sync {
    /// State for the first attempt of a new fetch.
    fn start(&self) -> RetryState;

    /// Record a failed attempt. Returns `false` once retries are exhausted.
    fn retry(&self, state: &mut RetryState, cause: RetryCause) -> bool;

    /// Pause before the next attempt.
    fn backoff(&self, _state: &RetryState) -> Duration {
        Duration::ZERO
    }
}

/// Retry policy with a bounded retry count and a growing timeout.
///
/// Each retry adds `timeout * backoff_multiplier` to the timeout. With the
/// defaults (2.5 s, one retry, multiplier 1.0) a transient failure is
/// retried exactly once, with a 5 s timeout.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultRetryPolicy {
    pub initial_timeout: Duration,
    pub max_retries: u32,
    pub backoff_multiplier: f32,
    /// Base for exponential sleeps between attempts; zero disables them.
    pub retry_backoff: Duration,
}

impl DefaultRetryPolicy {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2500);
    pub const DEFAULT_MAX_RETRIES: u32 = 1;
    pub const DEFAULT_BACKOFF_MULTIPLIER: f32 = 1.0;

    pub fn new(initial_timeout: Duration, max_retries: u32, backoff_multiplier: f32) -> Self {
        Self {
            initial_timeout,
            max_retries,
            backoff_multiplier,
            retry_backoff: Duration::ZERO,
        }
    }

    /// A policy that surfaces the first failure.
    pub fn never() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn retry_backoff(mut self, base: Duration) -> Self {
        self.retry_backoff = base;
        self
    }
}

impl Default for DefaultRetryPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_TIMEOUT,
            Self::DEFAULT_MAX_RETRIES,
            Self::DEFAULT_BACKOFF_MULTIPLIER,
        )
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn start(&self) -> RetryState {
        RetryState {
            attempt: 0,
            max_attempts: self.max_retries,
            timeout: self.initial_timeout,
        }
    }

    fn retry(&self, state: &mut RetryState, _cause: RetryCause) -> bool {
        state.attempt += 1;
        let factor = self.backoff_multiplier.max(0.0);
        let growth = Duration::try_from_secs_f32(state.timeout.as_secs_f32() * factor)
            .unwrap_or(Duration::MAX);
        state.timeout = state.timeout.saturating_add(growth);
        state.attempt <= state.max_attempts
    }

    fn backoff(&self, state: &RetryState) -> Duration {
        if self.retry_backoff.is_zero() {
            return Duration::ZERO;
        }
        retry_delay(state.attempt.saturating_sub(1), self.retry_backoff)
    }
}
