//! Wait/poll controller for the transcription status loop.
//!
//! The state machine enters `Wait` after submitting a job and after every
//! status check that is neither `COMPLETED` nor `FAILED`. Each wait sleeps for
//! the policy's current interval; the controller counts waits and trips a
//! guard once the ceiling is reached so a stuck job fails with its own cause
//! instead of running into the overall execution timeout.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::EngineError;

/// Default fixed delay between transcription status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
/// Default ceiling on waits per execution; 8 x 30s stays under the default 300s execution timeout.
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 8;
/// Upper bound on a single backed-off delay.
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(300);

/// How often, and how many times, to wait between status checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PollPolicy {
    /// Delay before the first status check.
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    pub max_attempts: u32,
    /// Growth factor applied per wait; `1.0` keeps the interval fixed.
    pub backoff_multiplier: f64,
    #[serde(with = "duration_secs")]
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            backoff_multiplier: 1.0,
            max_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    /// Fixed-interval policy with the given ceiling.
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff_multiplier: 1.0,
            max_interval: interval.max(DEFAULT_MAX_POLL_INTERVAL),
        }
    }

    /// Delay before the `attempt`-th wait (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        let scaled = self.interval.as_secs_f64() * factor;
        if !scaled.is_finite() || scaled >= self.max_interval.as_secs_f64() {
            return self.max_interval.max(self.interval);
        }
        Duration::from_secs_f64(scaled)
    }
}

/// Counts waits for one execution and sleeps between status checks.
#[derive(Debug)]
pub struct WaitController {
    policy: PollPolicy,
    attempts: u32,
}

impl WaitController {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    /// Waits performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Sleep for the next interval.
    ///
    /// Fails with [`EngineError::PollLimitExceeded`] once the ceiling is reached
    /// and with [`EngineError::Cancelled`] if `cancel` fires mid-sleep.
    pub async fn wait(&mut self, job_name: &str, cancel: &CancellationToken) -> Result<Duration, EngineError> {
        if self.attempts >= self.policy.max_attempts {
            warn!(job_name, attempts = self.attempts, "poll guard tripped");
            return Err(EngineError::PollLimitExceeded {
                job_name: job_name.to_string(),
                attempts: self.attempts,
            });
        }

        self.attempts += 1;
        let delay = self.policy.delay_for(self.attempts);
        debug!(job_name, attempt = self.attempts, delay_secs = delay.as_secs_f64(), "waiting for transcription");

        tokio::select! {
            _ = cancel.cancelled() => Err(EngineError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(delay),
        }
    }
}

/// Parse a human interval such as `30`, `30s` or `5m`.
pub fn parse_interval(raw_interval: &str) -> Option<Duration> {
    let trimmed = raw_interval.trim();
    if trimmed.is_empty() {
        return None;
    }
    let last_character = trimmed.chars().last()?;
    if last_character.is_ascii_alphabetic() {
        let number = &trimmed[..trimmed.len() - 1];
        let value: u64 = number.trim().parse().ok()?;
        return match last_character {
            's' | 'S' => Some(Duration::from_secs(value)),
            'm' | 'M' => value.checked_mul(60).map(Duration::from_secs),
            _ => None,
        };
    }
    let value: u64 = trimmed.parse().ok()?;
    Some(Duration::from_secs(value))
}

/// Serialize durations as whole seconds, accepting `30`, `"30s"` or `"5m"` on input.
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawInterval {
        Seconds(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match RawInterval::deserialize(deserializer)? {
            RawInterval::Seconds(seconds) => Ok(Duration::from_secs(seconds)),
            RawInterval::Text(text) => {
                super::parse_interval(&text).ok_or_else(|| D::Error::custom(format!("invalid interval '{text}'")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_never_grows() {
        let policy = PollPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(30));
        assert_eq!(policy.delay_for(7), Duration::from_secs(30));
    }

    #[test]
    fn backoff_is_capped_at_max_interval() {
        let policy = PollPolicy {
            interval: Duration::from_secs(10),
            max_attempts: 10,
            backoff_multiplier: 2.0,
            max_interval: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for(2), Duration::from_secs(20));
        assert_eq!(policy.delay_for(3), Duration::from_secs(40));
        assert_eq!(policy.delay_for(4), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    #[test]
    fn parses_interval_suffixes() {
        assert_eq!(parse_interval("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_interval("45s"), Some(Duration::from_secs(45)));
        assert_eq!(parse_interval("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_interval("5h"), None);
        assert_eq!(parse_interval(""), None);
    }

    #[test]
    fn overflowing_minutes_are_rejected() {
        assert_eq!(parse_interval("307445734561825861m"), None);
        assert_eq!(parse_interval(&format!("{}m", u64::MAX / 60)), Some(Duration::from_secs(u64::MAX / 60 * 60)));
    }

    #[test]
    fn policy_deserializes_from_seconds_or_text() {
        let policy: PollPolicy = serde_json::from_str(r#"{ "interval": "1m", "maxAttempts": 3 }"#).expect("parse");
        assert_eq!(policy.interval, Duration::from_secs(60));
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff_multiplier, 1.0);

        let policy: PollPolicy = serde_json::from_str(r#"{ "interval": 5 }"#).expect("parse");
        assert_eq!(policy.interval, Duration::from_secs(5));
        assert_eq!(policy.max_attempts, DEFAULT_MAX_POLL_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_then_trips_the_guard() {
        let mut controller = WaitController::new(PollPolicy::fixed(Duration::from_secs(30), 2));
        let cancel = CancellationToken::new();
        let started = tokio::time::Instant::now();

        assert_eq!(controller.wait("visit-1", &cancel).await, Ok(Duration::from_secs(30)));
        assert_eq!(controller.wait("visit-1", &cancel).await, Ok(Duration::from_secs(30)));
        assert_eq!(started.elapsed(), Duration::from_secs(60));

        let error = controller.wait("visit-1", &cancel).await.unwrap_err();
        assert_eq!(
            error,
            EngineError::PollLimitExceeded {
                job_name: "visit-1".into(),
                attempts: 2
            }
        );
        assert_eq!(controller.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_wait() {
        let mut controller = WaitController::new(PollPolicy::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(controller.wait("visit-1", &cancel).await, Err(EngineError::Cancelled));
    }
}
