//! Crawler module for the registry's report widget
//!
//! This module contains the crawl logic, including:
//! - HTTP fetching with politeness delay and retries
//! - Postback header/form construction
//! - The widget protocol transitions and pagination
//! - Record and exhibit extraction
//! - Overall crawl coordination

mod coordinator;
mod exhibits;
mod fetcher;
mod pagination;
mod postback;
mod records;

pub use coordinator::Coordinator;
pub use exhibits::{exhibit_request, fetch_exhibits, resolve_exhibits};
pub use fetcher::{build_http_client, Fetcher, Method, Page, PendingRequest};
pub use pagination::{
    effective_base_url, has_next_page, locate_iframe, locate_toggle_link, next_listing_request,
    parse_total_label, process_listing, toggle_country_column, total_pages, ListingOutcome,
    TOGGLE_LABEL,
};
pub use postback::{pager_window, reload_formdata, reload_headers, PAGE_SIZE, POSTBACK_URL};
pub use records::{extract_record, extract_records, parse_address, parse_column, parse_date, Record};

use crate::config::Config;
use crate::output::{open_feed, CrawlStats};
use crate::Result;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the item feed
/// 2. Build the HTTP client
/// 3. Walk the widget from the start page through every listing page
/// 4. Attach exhibit links and write each completed record
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(CrawlStats)` - Crawl completed successfully
/// * `Err(FaraError)` - Crawl stopped early; completed records are on disk
pub async fn crawl(config: Config) -> Result<CrawlStats> {
    let sink = open_feed(&config.output)?;
    let mut coordinator = Coordinator::new(config, sink)?;
    coordinator.run().await
}
