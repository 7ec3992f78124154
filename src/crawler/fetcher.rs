//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with a descriptive user agent and cookie store
//! - Spacing request starts by the configured download delay
//! - Retrying 5xx responses and timeouts
//! - Converting header/form maps into reqwest requests

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::state::FormMap;
use crate::{FaraError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

/// HTTP method of a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request produced by a crawl transition, not yet sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub url: Url,
    pub method: Method,
    pub headers: FormMap,
    pub form: FormMap,
}

impl PendingRequest {
    /// Plain page load
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            headers: FormMap::new(),
            form: FormMap::new(),
        }
    }

    /// Form-encoded widget postback
    pub fn post(url: Url, headers: FormMap, form: FormMap) -> Self {
        Self {
            url,
            method: Method::Post,
            headers,
            form,
        }
    }
}

/// A fetched page
#[derive(Debug, Clone)]
pub struct Page {
    /// URL the request was sent to
    pub request_url: Url,

    /// Final URL after redirects
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Page body content
    pub body: String,
}

impl Page {
    pub fn new(request_url: Url, url: Url, status: u16, body: impl Into<String>) -> Self {
        Self {
            request_url,
            url,
            status,
            body: body.into(),
        }
    }

    /// Builds a page whose request and final URL are the same
    pub fn from_body(url: Url, body: impl Into<String>) -> Self {
        Self::new(url.clone(), url, 200, body)
    }

    /// Parses the body for markup queries
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```
/// use fara_principals::config::{CrawlerConfig, UserAgentConfig};
/// use fara_principals::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default());
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> std::result::Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        user_agent.crawler_name,
        user_agent.crawler_version,
        user_agent.contact_url,
        user_agent.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(crawler.request_timeout))
        .connect_timeout(Duration::from_secs(10))
        .cookie_store(true)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Converts a header map into reqwest headers
pub fn to_header_map(headers: &FormMap) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| FaraError::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| FaraError::InvalidHeader {
            name: name.clone(),
            message: e.to_string(),
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Transport for crawl requests
///
/// Retry and politeness live here so the crawl logic only ever sees a final
/// page or a final error.
pub struct Fetcher {
    client: Client,
    download_delay: Duration,
    max_retries: u32,
    retry_delay: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Fetcher {
    /// Creates a fetcher from the crawler and user agent configuration
    pub fn new(user_agent: &UserAgentConfig, crawler: &CrawlerConfig) -> Result<Self> {
        let client = build_http_client(user_agent, crawler)?;
        Ok(Self::with_client(client, crawler))
    }

    /// Creates a fetcher around an existing client
    pub fn with_client(client: Client, crawler: &CrawlerConfig) -> Self {
        Self {
            client,
            download_delay: Duration::from_millis(crawler.download_delay),
            max_retries: crawler.max_retries,
            retry_delay: Duration::from_millis(crawler.retry_delay),
            last_request: Mutex::new(None),
        }
    }

    /// Sends a request, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return page |
    /// | HTTP 5xx | Retry up to `max_retries`, `retry_delay` apart |
    /// | Timeout / connect error | Retry up to `max_retries` |
    /// | Other status | Immediate `HttpStatus` error |
    pub async fn fetch(&self, request: &PendingRequest) -> Result<Page> {
        let mut attempt = 0;
        loop {
            self.wait_for_slot().await;

            match self.send_once(request).await {
                Ok(page) => return Ok(page),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        "Retrying {} ({}/{}): {}",
                        request.url,
                        attempt,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Waits until `download_delay` has passed since the previous request start
    async fn wait_for_slot(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.download_delay;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn send_once(&self, request: &PendingRequest) -> Result<Page> {
        let url = request.url.as_str();
        tracing::debug!("{:?} {}", request.method, url);

        let builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Post => self.client.post(request.url.clone()),
        };
        let builder = builder.headers(to_header_map(&request.headers)?);
        let builder = match request.method {
            Method::Get => builder,
            Method::Post => builder.form(&request.form),
        };

        let response = builder.send().await.map_err(|source| FaraError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        let final_url = response.url().clone();

        if !status.is_success() {
            return Err(FaraError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|source| FaraError::Http {
            url: url.to_string(),
            source,
        })?;

        Ok(Page::new(request.url.clone(), final_url, status.as_u16(), body))
    }
}

fn is_retryable(error: &FaraError) -> bool {
    match error {
        FaraError::HttpStatus { status, .. } => *status >= 500,
        FaraError::Http { source, .. } => source.is_timeout() || source.is_connect(),
        _ => false,
    }
}
