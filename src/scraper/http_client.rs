use crate::config::ScraperConfig;
use crate::scraper::session::SessionState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{
    ACCEPT, ACCEPT_LANGUAGE, CONNECTION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue,
};
use scraper::Html;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
}

// ── Transport trait ───────────────────────────────────────────────────────────

/// A single GET/POST round trip, no retries.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, TransportError>;
    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<String, TransportError>;
}

pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html, application/xhtml+xml, */*"),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).context("Invalid Accept-Language")?,
        );
        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));

        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Login state lives in cookies
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { inner })
    }

    async fn read_body(url: &str, resp: reqwest::Response) -> Result<String, TransportError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<String, TransportError> {
        let resp = self
            .inner
            .get(url)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        Self::read_body(url, resp).await
    }

    async fn post_form(&self, url: &str, form: &[(&str, String)]) -> Result<String, TransportError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();

        let resp = self
            .inner
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded; charset=UTF-8")
            .body(body)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        Self::read_body(url, resp).await
    }
}

// ── Retrying client ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Duration::from_secs(config.retry_backoff_secs),
        }
    }
}

/// Network access shared by every request of a run.
///
/// Backoff is keyed on the session-wide failure flag rather than on the
/// current call's history: any failed request delays the next attempt,
/// whichever call makes it. That coupling is only sound while requests run
/// one at a time, which `&mut SessionState` enforces.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self::with_transport(
            Arc::new(ReqwestTransport::new(config)?),
            RetryPolicy::from_config(config),
        ))
    }

    pub fn with_transport(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// GET a page and parse it as an HTML document.
    pub async fn fetch(
        &self,
        session: &mut SessionState,
        url: &str,
    ) -> Result<(String, Html), TransportError> {
        let body = self
            .with_retry(session, "get", url, || self.transport.get(url))
            .await?;
        let doc = Html::parse_document(&body);
        Ok((body, doc))
    }

    /// POST a url-encoded form and return the raw response body.
    pub async fn submit(
        &self,
        session: &mut SessionState,
        url: &str,
        form: &[(&str, String)],
    ) -> Result<String, TransportError> {
        self.with_retry(session, "post", url, || self.transport.post_form(url, form))
            .await
    }

    async fn with_retry<F, Fut>(
        &self,
        session: &mut SessionState,
        verb: &str,
        url: &str,
        mut op: F,
    ) -> Result<String, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<String, TransportError>>,
    {
        let mut attempt = 0u32;
        loop {
            if session.last_request_failed() {
                debug!("Previous request failed, sleeping {:?}", self.policy.backoff);
                sleep(self.policy.backoff).await;
            }

            attempt += 1;
            debug!("{} {} (attempt {})", verb.to_uppercase(), url, attempt);

            match op().await {
                Ok(body) => {
                    session.clear_failure();
                    return Ok(body);
                }
                Err(e) => {
                    warn!(
                        "fail to {} {} on attempt {}/{}: {}",
                        verb, url, attempt, self.policy.max_attempts, e
                    );
                    session.mark_failed();
                    if attempt >= self.policy.max_attempts {
                        return Err(e);
                    }
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
