//! HTTP access and element polling.
//!
//! # Architecture
//!
//! - [`Fetch`]: the seam every source talks to (GET text/bytes, POST JSON)
//! - [`HttpFetcher`]: `reqwest` implementation used at runtime
//! - [`Poller`]: exponential backoff loop for pages whose content appears
//!   late (PAHO download links)
//!
//! Nothing here retries a failed request. Only [`Poller`] repeats, and only
//! while the probe reports "not there yet".

use crate::error::{IngestError, Result};
use rand::{Rng, rng};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Network access used by the scrapers.
pub trait Fetch {
    /// GET `url` and decode the body as UTF-8.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// GET `url` and return the raw body.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// POST `body` as JSON to `url` and decode the JSON response.
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value>;
}

/// `reqwest`-backed [`Fetch`] implementation.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|source| IngestError::Fetch {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    async fn send(&self, url: &str, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let t0 = Instant::now();
        let resp = req.send().await.map_err(|source| {
            error!(%url, error = %source, "Request failed");
            IngestError::Fetch {
                url: url.to_string(),
                source,
            }
        })?;
        let status = resp.status();
        debug!(%url, %status, elapsed_ms = t0.elapsed().as_millis() as u64, "Response received");
        if !status.is_success() {
            error!(%url, %status, "Unexpected HTTP status");
            return Err(IngestError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(resp)
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "info", skip(self))]
    async fn get_text(&self, url: &str) -> Result<String> {
        let bytes = self.get_bytes(url).await?;
        String::from_utf8(bytes).map_err(|_| {
            error!(%url, "Response body is not UTF-8");
            IngestError::Decode {
                url: url.to_string(),
            }
        })
    }

    #[instrument(level = "info", skip(self))]
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.send(url, self.client.get(url)).await?;
        let body = resp.bytes().await.map_err(|source| {
            error!(%url, error = %source, "Failed reading response body");
            IngestError::Fetch {
                url: url.to_string(),
                source,
            }
        })?;
        info!(%url, bytes = body.len(), "Fetched");
        Ok(body.to_vec())
    }

    #[instrument(level = "info", skip(self, body))]
    async fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        let resp = self.send(url, self.client.post(url).json(body)).await?;
        resp.json::<Value>().await.map_err(|source| {
            error!(%url, error = %source, "Response is not JSON");
            IngestError::Fetch {
                url: url.to_string(),
                source,
            }
        })
    }
}

/// Repeats a probe until it yields a value, backing off between attempts.
///
/// The delay before attempt `n` (1-based, after a miss) is:
/// ```text
/// delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
#[derive(Clone)]
pub struct Poller {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
    max_jitter: Duration,
}

impl Default for Poller {
    /// Four attempts, one second doubling, capped at thirty seconds.
    fn default() -> Self {
        Self::new(4, Duration::from_secs(1))
    }
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl Poller {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(250),
        }
    }

    pub fn with_max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=jitter_ms)
        };
        delay + Duration::from_millis(jitter)
    }

    /// Run `probe` until it returns `Ok(Some(_))`.
    ///
    /// `Ok(None)` means "not available yet" and triggers a backoff. Errors
    /// from the probe are returned immediately. Exhausting the attempts
    /// yields [`IngestError::ElementNotFound`] for `element_id`.
    #[instrument(level = "info", skip(self, probe))]
    pub async fn poll<T, F, Fut>(&self, element_id: &str, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let t0 = Instant::now();
        for attempt in 1..=self.max_attempts {
            if let Some(value) = probe().await? {
                debug!(attempt, element_id, "Element available");
                return Ok(value);
            }
            if attempt == self.max_attempts {
                break;
            }
            let delay = self.delay_for(attempt);
            warn!(
                attempt,
                max = self.max_attempts,
                elapsed_ms_total = t0.elapsed().as_millis() as u64,
                ?delay,
                element_id,
                "Element not available yet; backing off"
            );
            sleep(delay).await;
        }
        error!(
            element_id,
            attempts = self.max_attempts,
            elapsed_ms_total = t0.elapsed().as_millis() as u64,
            "Polling exhausted"
        );
        Err(IngestError::ElementNotFound {
            id: element_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant_poller(attempts: usize) -> Poller {
        Poller::new(attempts, Duration::ZERO).with_max_jitter(Duration::ZERO)
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let poller = Poller::new(10, Duration::from_secs(1)).with_max_jitter(Duration::ZERO);
        assert_eq!(poller.delay_for(1), Duration::from_secs(1));
        assert_eq!(poller.delay_for(2), Duration::from_secs(2));
        assert_eq!(poller.delay_for(3), Duration::from_secs(4));
        assert_eq!(poller.delay_for(9), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_bounded() {
        let poller = Poller::new(3, Duration::from_secs(1));
        for _ in 0..20 {
            let d = poller.delay_for(1);
            assert!(d >= Duration::from_secs(1));
            assert!(d <= Duration::from_millis(1250));
        }
    }

    #[tokio::test]
    async fn test_poll_returns_once_available() {
        let calls = Cell::new(0);
        let poller = instant_poller(4);
        let value = poller
            .poll("data1", || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Ok(if n == 3 { Some("href") } else { None }) }
            })
            .await
            .unwrap();
        assert_eq!(value, "href");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_poll_exhausts_attempts() {
        let calls = Cell::new(0);
        let poller = instant_poller(4);
        let err = poller
            .poll("data2", || {
                calls.set(calls.get() + 1);
                async { Ok::<Option<()>, IngestError>(None) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.get(), 4);
        assert!(matches!(
            err,
            IngestError::ElementNotFound { ref id, attempts: 4 } if id == "data2"
        ));
    }

    #[tokio::test]
    async fn test_poll_propagates_probe_error_without_retry() {
        let calls = Cell::new(0);
        let poller = instant_poller(4);
        let err = poller
            .poll("data1", || {
                calls.set(calls.get() + 1);
                async {
                    Err::<Option<()>, _>(IngestError::Status {
                        url: "https://example.org".into(),
                        status: 503,
                    })
                }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(matches!(err, IngestError::Status { status: 503, .. }));
    }
}
