use std::time::Duration;

use chrono::Utc;
use lazy_static::lazy_static;
use rand::Rng;
use reqwest::ClientBuilder;
use reqwest_middleware::{ClientBuilder as ClientWithMiddlewareBuilder, ClientWithMiddleware};
use reqwest_retry::RetryTransientMiddleware;
use retry_policies::{RetryDecision, RetryPolicy};

pub const UPLOAD_RETRY_COUNT: u32 = 4;
pub const RETRY_WAIT_MIN: Duration = Duration::from_millis(800);
pub const RETRY_WAIT_MAX: Duration = Duration::from_millis(1200);

const USER_AGENT: &str = "testrelay-reporter";

// Per-attempt ceiling so a stalled collector cannot hang the reporter.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Waits a uniformly random duration between the two bounds, scaled linearly
/// by the attempt number: attempt n (0-based) waits `jitter * (n + 1)`.
#[derive(Debug, Clone, Copy)]
pub struct LinearJitterBackoff {
    pub min: Duration,
    pub max: Duration,
    pub max_retries: u32,
}

impl Default for LinearJitterBackoff {
    fn default() -> Self {
        Self {
            min: RETRY_WAIT_MIN,
            max: RETRY_WAIT_MAX,
            max_retries: UPLOAD_RETRY_COUNT,
        }
    }
}

impl RetryPolicy for LinearJitterBackoff {
    fn should_retry(&self, n_past_retries: u32) -> RetryDecision {
        if n_past_retries >= self.max_retries {
            return RetryDecision::DoNotRetry;
        }
        let min_ms = self.min.as_millis() as u64;
        let max_ms = self.max.as_millis() as u64;
        let jitter_ms = if max_ms > min_ms {
            rand::thread_rng().gen_range(min_ms..=max_ms)
        } else {
            min_ms
        };
        let wait_ms = jitter_ms * (u64::from(n_past_retries) + 1);
        RetryDecision::Retry {
            execute_after: Utc::now() + chrono::Duration::milliseconds(wait_ms as i64),
        }
    }
}

pub fn build_request_client(backoff: LinearJitterBackoff) -> ClientWithMiddleware {
    ClientWithMiddlewareBuilder::new(
        ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap(),
    )
    .with(RetryTransientMiddleware::new_with_policy(backoff))
    .build()
}

lazy_static! {
    pub static ref REQUEST_CLIENT: ClientWithMiddleware =
        build_request_client(LinearJitterBackoff::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_ms(decision: RetryDecision) -> i64 {
        match decision {
            RetryDecision::Retry { execute_after } => {
                (execute_after - Utc::now()).num_milliseconds()
            }
            RetryDecision::DoNotRetry => panic!("expected a retry decision"),
        }
    }

    #[test]
    fn test_wait_grows_linearly_with_jitter() {
        let backoff = LinearJitterBackoff::default();
        for past_retries in 0..UPLOAD_RETRY_COUNT {
            let scale = i64::from(past_retries) + 1;
            let wait = wait_ms(backoff.should_retry(past_retries));
            assert!(
                wait > 800 * scale - 100 && wait <= 1200 * scale,
                "attempt {past_retries}: waited {wait}ms"
            );
        }
    }

    #[test]
    fn test_stops_after_max_retries() {
        let backoff = LinearJitterBackoff::default();
        assert!(matches!(
            backoff.should_retry(UPLOAD_RETRY_COUNT),
            RetryDecision::DoNotRetry
        ));
    }

    #[test]
    fn test_degenerate_bounds_still_wait() {
        let backoff = LinearJitterBackoff {
            min: Duration::from_millis(5),
            max: Duration::from_millis(5),
            max_retries: 1,
        };
        let wait = wait_ms(backoff.should_retry(0));
        assert!(wait <= 5);
    }
}
