//! HTTP fetching with a fixed-backoff retry policy.
//!
//! Network errors, HTTP 429 and 5xx responses are transient and retried
//! after each delay of the configured sequence; anything else fails at once.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }

    /// The remote API refused the call because its quota is spent.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::Status { status, .. } if *status == 403 || *status == 429)
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Network { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, accept: &str) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })
    }

    /// GET a page body; any non-success status is an error.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .send(url, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })
    }

    /// GET a body where 404 means "not there" rather than failure.
    pub async fn get_optional_text(&self, url: &str) -> Result<Option<String>, FetchError> {
        match self.get_text(url).await {
            Ok(body) => Ok(Some(body)),
            Err(FetchError::Status { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// GET and decode a JSON document; 404 yields `None`.
    pub async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, FetchError> {
        let response = self.send(url, "application/vnd.github+json").await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })
    }
}

/// Run `op`, retrying transient failures once per entry of `delays`.
pub async fn with_retry<T, F, Fut>(label: &str, delays: &[Duration], mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < delays.len() => {
                let delay = delays[attempt];
                attempt += 1;
                warn!(
                    "{}: {} (retry {}/{} in {}s)",
                    label,
                    e,
                    attempt,
                    delays.len(),
                    delay.as_secs_f64()
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!("{}: giving up after {} attempt(s)", label, attempt + 1);
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            url: "http://x".to_string(),
            status: code,
        }
    }

    #[test]
    fn transient_classification() {
        assert!(status(429).is_transient());
        assert!(status(503).is_transient());
        assert!(!status(404).is_transient());
        assert!(!status(403).is_transient());
        assert!(status(403).is_rate_limited());
        assert!(!status(500).is_rate_limited());
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let delays = [Duration::ZERO, Duration::ZERO, Duration::ZERO];
        let result = with_retry("test", &delays, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(status(502))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_delay_sequence() {
        let calls = AtomicUsize::new(0);
        let delays = [Duration::ZERO, Duration::ZERO];
        let result: Result<(), _> = with_retry("test", &delays, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(500)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let delays = [Duration::ZERO; 3];
        let result: Result<(), _> = with_retry("test", &delays, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(status(404)) }
        })
        .await;
        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
