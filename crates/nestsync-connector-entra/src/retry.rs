//! Retry budget for Graph reads.
//!
//! Graph throttles per tenant and app with 429 and a `Retry-After` header, and its gateways
//! return 5xx during incidents. Reads are retried on those and on transport failures;
//! everything else fails at once.

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

use crate::{EntraError, EntraResult};

/// Delays and attempt budget for one read.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_delay: Duration,
    /// Cap on computed delays.
    pub max_delay: Duration,
    /// Cap on waits requested through `Retry-After`.
    pub max_retry_after: Duration,
    /// Random extra delay as a fraction of the computed delay, in `0.0..=1.0`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_retry_after: Duration::from_secs(300),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// Three retries with millisecond delays and no jitter.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            max_retry_after: Duration::from_millis(10),
            jitter_factor: 0.0,
        }
    }

    /// Rejects configurations that would never back off or could not compute a delay.
    pub fn validate(&self) -> EntraResult<()> {
        if self.base_delay > self.max_delay {
            return Err(EntraError::Config(
                "retry base_delay must not exceed max_delay".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(EntraError::Config(format!(
                "retry jitter_factor must be within 0.0..=1.0, got {}",
                self.jitter_factor
            )));
        }
        Ok(())
    }

    /// Wait before retry number `retry` (0-based).
    ///
    /// A server-requested wait wins over the computed backoff but is capped.
    #[must_use]
    pub fn delay(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(wait) = retry_after {
            return wait.min(self.max_retry_after);
        }
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << retry.min(16))
            .min(self.max_delay);
        self.with_jitter(backoff)
    }

    fn with_jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::thread_rng().gen_range(0.0..=self.jitter_factor);
        delay.mul_f64(1.0 + extra)
    }
}

/// Why a failed read may be attempted again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Transient {
    Throttled { retry_after: Option<Duration> },
    Server(StatusCode),
    Transport(String),
}

impl Transient {
    pub(crate) fn from_status(status: StatusCode, headers: &HeaderMap) -> Option<Self> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            Some(Self::Throttled {
                retry_after: parse_retry_after(headers),
            })
        } else if status.is_server_error() {
            Some(Self::Server(status))
        } else {
            None
        }
    }

    pub(crate) fn from_transport(err: &reqwest::Error) -> Option<Self> {
        (err.is_timeout() || err.is_connect() || err.is_request())
            .then(|| Self::Transport(err.to_string()))
    }

    pub(crate) fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl fmt::Display for Transient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttled { .. } => f.write_str("throttled (429)"),
            Self::Server(status) => write!(f, "server error {status}"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
        }
    }
}

/// Delta-seconds form only; Graph does not send HTTP dates.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn no_jitter() -> RetryConfig {
        RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(5),
            ..no_jitter()
        };
        assert_eq!(config.delay(0, None), Duration::from_secs(1));
        assert_eq!(config.delay(1, None), Duration::from_secs(2));
        assert_eq!(config.delay(2, None), Duration::from_secs(4));
        assert_eq!(config.delay(3, None), Duration::from_secs(5));
        assert_eq!(config.delay(40, None), Duration::from_secs(5));
    }

    #[test]
    fn test_retry_after_wins_but_is_capped() {
        let config = no_jitter();
        assert_eq!(
            config.delay(4, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            config.delay(0, Some(Duration::from_secs(3600))),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_jitter_only_adds() {
        let config = RetryConfig::default();
        for _ in 0..100 {
            let delay = config.delay(0, None);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_millis(1250));
        }
    }

    #[test]
    fn test_validate() {
        assert!(RetryConfig::default().validate().is_ok());
        assert!(RetryConfig::immediate().validate().is_ok());
        assert!(RetryConfig {
            jitter_factor: 1.5,
            ..RetryConfig::default()
        }
        .validate()
        .is_err());
        assert!(RetryConfig {
            base_delay: Duration::from_secs(120),
            ..RetryConfig::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_status_classification() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 12 "));

        assert_eq!(
            Transient::from_status(StatusCode::TOO_MANY_REQUESTS, &headers),
            Some(Transient::Throttled {
                retry_after: Some(Duration::from_secs(12))
            })
        );
        assert_eq!(
            Transient::from_status(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new()),
            Some(Transient::Server(StatusCode::INTERNAL_SERVER_ERROR))
        );
        assert_eq!(
            Transient::from_status(StatusCode::GATEWAY_TIMEOUT, &HeaderMap::new()),
            Some(Transient::Server(StatusCode::GATEWAY_TIMEOUT))
        );
        assert_eq!(
            Transient::from_status(StatusCode::NOT_FOUND, &headers),
            None
        );
        assert_eq!(Transient::from_status(StatusCode::FORBIDDEN, &headers), None);
    }

    #[test]
    fn test_http_date_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(
            Transient::from_status(StatusCode::TOO_MANY_REQUESTS, &headers),
            Some(Transient::Throttled { retry_after: None })
        );
    }
}
