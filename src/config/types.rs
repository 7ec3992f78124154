use serde::Deserialize;

use crate::crawler::POSTBACK_URL;

/// Main configuration structure
///
/// Every section is optional; the defaults point at the live registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Registry endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Page embedding the report iframe
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Widget postback endpoint
    #[serde(rename = "postback-url")]
    pub postback_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            start_url: "https://www.fara.gov/quick-search.html".to_string(),
            postback_url: POSTBACK_URL.to_string(),
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Minimum time between request starts (milliseconds)
    #[serde(rename = "download-delay")]
    pub download_delay: u64,

    /// Maximum number of exhibit pages fetched at once
    #[serde(rename = "max-concurrent-exhibits")]
    pub max_concurrent_exhibits: u32,

    /// Retries for 5xx responses and timeouts
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Delay before a retry (milliseconds)
    #[serde(rename = "retry-delay")]
    pub retry_delay: u64,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            download_delay: 1000,
            max_concurrent_exhibits: 4,
            max_retries: 2,
            retry_delay: 5000,
            request_timeout: 30,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "fara-principals".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/fara-principals".to_string(),
            contact_email: "crawler@example.com".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the item feed
    #[serde(rename = "items-path")]
    pub items_path: String,

    /// Feed layout
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            items_path: "items.json".to_string(),
            format: OutputFormat::Json,
        }
    }
}

/// Item feed layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// A single JSON array
    #[default]
    Json,
    /// One JSON object per line
    Jsonl,
}
