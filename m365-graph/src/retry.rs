//! Retries for throttled and transiently failing requests.

use crate::config::RetryConfig;
use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Statuses Graph and Azure Storage use for throttling and transient faults.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

pub(crate) fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

impl RetryConfig {
    /// Delay before retry number `attempt` (zero-based).
    ///
    /// A server-advertised delay wins but never drops below the floor, so a
    /// `Retry-After: 0` cannot turn into a busy loop. Otherwise the delay is
    /// drawn uniformly from `[0, min(max, base * 2^attempt)]`.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(advertised) = retry_after {
            return advertised.max(Duration::from_millis(self.retry_after_floor_ms));
        }
        let exponential = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(20));
        let cap = exponential.min(self.max_delay_ms);
        Duration::from_millis(rand::thread_rng().gen_range(0..=cap))
    }
}

/// Sends the request built by `build`, rebuilding and resending it while the
/// outcome is retryable and retries remain. The last outcome is returned
/// as-is, including non-success responses.
pub(crate) async fn send_with_retry<F>(
    config: &RetryConfig,
    target: &str,
    mut build: F,
) -> Result<Response, reqwest::Error>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        let result = build().send().await;
        let advertised = match &result {
            Ok(response) if is_retryable_status(response.status()) => Some(retry_after(response)),
            Err(e) if e.is_connect() || e.is_timeout() => Some(None),
            _ => None,
        };
        let Some(advertised) = advertised else {
            return result;
        };
        if attempt >= config.max_retries {
            return result;
        }

        let delay = config.delay(attempt, advertised);
        attempt += 1;
        warn!(
            target_uri = target,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying request"
        );
        tokio::time::sleep(delay).await;
    }
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
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

    #[test]
    fn retry_after_is_floored() {
        let config = RetryConfig::default();
        assert_eq!(
            config.delay(0, Some(Duration::ZERO)),
            Duration::from_millis(1_000)
        );
        assert_eq!(
            config.delay(3, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn backoff_is_capped() {
        let config = RetryConfig {
            base_delay_ms: 500,
            max_delay_ms: 2_000,
            ..RetryConfig::default()
        };
        for attempt in 0..40 {
            assert!(config.delay(attempt, None) <= Duration::from_millis(2_000));
        }
        assert!(config.delay(0, None) <= Duration::from_millis(500));
    }

    #[test]
    fn throttling_and_gateway_errors_are_retryable() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_retryable_status(StatusCode::from_u16(status).unwrap()));
        }
        for status in [400, 401, 403, 404, 409, 501] {
            assert!(!is_retryable_status(StatusCode::from_u16(status).unwrap()));
        }
    }
}
