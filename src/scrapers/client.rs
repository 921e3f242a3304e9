//! HTTP page fetching with retry and backoff.
//!
//! Every listing page is fetched with a browser-like header set. Transport
//! failures and a small set of transient statuses are retried with
//! exponential backoff (`base * 2^(attempt-1)`), honoring integer
//! `Retry-After` headers; any other error status fails immediately.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Settings;

/// Browser-like user agent sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Statuses worth retrying: rate limiting and transient server failures.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// A failed page fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} persisted after {attempts} attempt(s)")]
    TransientStatus { status: u16, attempts: u32 },
    #[error("fatal HTTP {status}")]
    FatalStatus { status: u16 },
    #[error("rendered-page fallback failed ({render}); original failure: {source}")]
    RenderFallback {
        render: String,
        #[source]
        source: Box<FetchError>,
    },
}

/// Retry parameters, decoupled from the client for testability.
#[derive(Debug, Clone, Copy)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl FetchPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_attempts: settings.fetch_max_attempts.max(1),
            base_backoff: Duration::from_secs(settings.fetch_base_backoff_secs),
        }
    }

    /// Backoff before the attempt after `attempt`.
    ///
    /// An integer `Retry-After` header overrides the exponential schedule.
    pub fn backoff_delay(&self, attempt: u32, retry_after: Option<&str>) -> Duration {
        if let Some(value) = retry_after {
            if let Ok(secs) = value.trim().parse::<u64>() {
                return Duration::from_secs(secs);
            }
        }
        self.base_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// What to do with one attempt's outcome.
#[derive(Debug)]
pub(crate) enum Disposition {
    Success,
    Retry(Duration),
    Fail(FetchError),
}

/// Decide the disposition of a response status on a given attempt.
pub(crate) fn classify(
    policy: &FetchPolicy,
    attempt: u32,
    status: u16,
    retry_after: Option<&str>,
) -> Disposition {
    if status < 400 {
        return Disposition::Success;
    }
    if RETRYABLE_STATUSES.contains(&status) {
        if attempt >= policy.max_attempts {
            return Disposition::Fail(FetchError::TransientStatus {
                status,
                attempts: attempt,
            });
        }
        return Disposition::Retry(policy.backoff_delay(attempt, retry_after));
    }
    Disposition::Fail(FetchError::FatalStatus { status })
}

/// HTTP client for listing pages.
pub struct PageFetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
}

impl PageFetcher {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(Duration::from_secs(settings.fetch_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            policy: FetchPolicy::from_settings(settings),
        })
    }

    /// Fetch a page body, retrying per the policy. The per-source referer
    /// makes the request look like in-site navigation.
    pub async fn fetch(&self, url: &str, referer: &str) -> Result<String, FetchError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .client
                .get(url)
                .header(header::REFERER, referer)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(source) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(FetchError::Transport {
                            attempts: attempt,
                            source,
                        });
                    }
                    let delay = self.policy.backoff_delay(attempt, None);
                    debug!(url, attempt, ?delay, "transport error, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            match classify(&self.policy, attempt, status, retry_after.as_deref()) {
                Disposition::Success => {
                    return response.text().await.map_err(|source| FetchError::Transport {
                        attempts: attempt,
                        source,
                    });
                }
                Disposition::Retry(delay) => {
                    warn!(url, status, attempt, ?delay, "transient status, retrying");
                    tokio::time::sleep(delay).await;
                }
                Disposition::Fail(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FetchPolicy {
        FetchPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(1, None), Duration::from_secs(2));
        assert_eq!(policy.backoff_delay(2, None), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(3, None), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_after_overrides_backoff() {
        let policy = policy();
        assert_eq!(policy.backoff_delay(1, Some("7")), Duration::from_secs(7));
        // Non-integer values fall back to the schedule
        assert_eq!(
            policy.backoff_delay(2, Some("Wed, 21 Oct 2026 07:28:00 GMT")),
            Duration::from_secs(4)
        );
    }

    #[test]
    fn test_transient_sequence_sleeps_then_succeeds() {
        // 503, 503, 200 sleeps base then base*2 and then succeeds.
        let policy = policy();
        match classify(&policy, 1, 503, None) {
            Disposition::Retry(delay) => assert_eq!(delay, Duration::from_secs(2)),
            other => panic!("expected retry, got {other:?}"),
        }
        match classify(&policy, 2, 503, None) {
            Disposition::Retry(delay) => assert_eq!(delay, Duration::from_secs(4)),
            other => panic!("expected retry, got {other:?}"),
        }
        assert!(matches!(classify(&policy, 3, 200, None), Disposition::Success));
    }

    #[test]
    fn test_transient_exhaustion() {
        let policy = policy();
        match classify(&policy, 3, 429, None) {
            Disposition::Fail(FetchError::TransientStatus { status, attempts }) => {
                assert_eq!(status, 429);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_fatal_status_never_retries() {
        let policy = policy();
        assert!(matches!(
            classify(&policy, 1, 404, None),
            Disposition::Fail(FetchError::FatalStatus { status: 404 })
        ));
        assert!(matches!(
            classify(&policy, 1, 403, None),
            Disposition::Fail(FetchError::FatalStatus { status: 403 })
        ));
    }
}
