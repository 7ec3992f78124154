//! Exhibit document resolution
//!
//! Every registration has a detail page listing its exhibit documents in the
//! report's data panel. Listings longer than one widget page are not
//! supported and stop the crawl.

use std::sync::Arc;

use url::Url;

use crate::crawler::fetcher::{Fetcher, Page, PendingRequest};
use crate::crawler::pagination::has_next_page;
use crate::crawler::records::Record;
use crate::markup::{absolute_url, select, MarkupPath};
use crate::state::ExhibitState;
use crate::Result;

const EXHIBIT_LINKS: &str = "div#apexir_DATA_PANEL a";

/// Request for a record's detail page
pub fn exhibit_request(record: &Record) -> Result<PendingRequest> {
    Ok(PendingRequest::get(Url::parse(&record.url)?))
}

/// Attaches the exhibit links found on `page` to `record`
///
/// # Returns
///
/// * `ExhibitState::Resolved` - The detail page fit on one widget page
/// * `ExhibitState::Aborted` - The detail page has its own "Next" control;
///   the record carries the links of the first page and the crawl must stop
///   once it is written
pub fn resolve_exhibits(mut record: Record, page: &Page) -> Result<(Record, ExhibitState)> {
    let document = page.document();
    let links = MarkupPath::attr(EXHIBIT_LINKS, "href")?;

    record.exhibit_urls = select(&document, &links)
        .iter()
        .filter_map(|href| absolute_url(&page.url, href))
        .collect();
    tracing::debug!(
        "Found {} exhibit urls for {}",
        record.exhibit_urls.len(),
        record.url
    );

    if has_next_page(&document)? {
        tracing::warn!("Exhibit listing at {} spans more than one page", page.url);
        return Ok((record, ExhibitState::Aborted));
    }

    Ok((record, ExhibitState::Resolved))
}

/// Fetches a record's detail page and completes the record
///
/// Transport failures keep the record with an empty exhibit list and report
/// [`ExhibitState::Failed`].
pub async fn fetch_exhibits(fetcher: Arc<Fetcher>, record: Record) -> Result<(Record, ExhibitState)> {
    let request = exhibit_request(&record)?;

    let page = match fetcher.fetch(&request).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!("Exhibit page {} unavailable: {}", record.url, e);
            return Ok((record, ExhibitState::Failed));
        }
    };

    resolve_exhibits(record, &page)
}
