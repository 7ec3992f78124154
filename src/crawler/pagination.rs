//! Widget protocol transitions
//!
//! Each function here takes the page a step produced (plus the carried
//! [`CrawlContext`] where one exists) and returns the next request to send.
//! Nothing in this module performs I/O, so every step can be exercised
//! against saved pages.
//!
//! # Request Flow
//!
//! 1. Start page → `<iframe src>` (report frame)
//! 2. Report frame → link labelled "Active Foreign Principals"
//! 3. Principals listing → `BREAK_TOGGLE` postback adding the country column
//! 4. Listing page N → `PAGE` postback for page N + 1 while a "Next" control
//!    is shown

use scraper::{ElementRef, Html};
use url::Url;

use crate::crawler::fetcher::{Page, PendingRequest};
use crate::crawler::postback::{pager_window, reload_formdata, reload_headers, PAGE_SIZE};
use crate::crawler::records::{extract_records, Record};
use crate::markup::{
    absolute_url, ancestor, exists, find_labelled, input_value, select_first, MarkupPath, Scope,
};
use crate::state::{form_map, CrawlContext};
use crate::{FaraError, Result};

/// Label of the link to the active principals report
pub const TOGGLE_LABEL: &str = "Active Foreign Principals";

const NEXT_CONTROL: &str = r#"td.pagination img[title="Next"]"#;
const PAGE_LABEL: &str = "td.pagination span.fielddata";

const SESSION_FIELD: &str = "pInstance";
const WORKSHEET_FIELD: &str = "apexir_WORKSHEET_ID";
const REPORT_FIELD: &str = "apexir_REPORT_ID";

/// Returns true if the page's pagination region offers a "Next" control
pub fn has_next_page<S: Scope + ?Sized>(scope: &S) -> Result<bool> {
    let next = MarkupPath::text(NEXT_CONTROL)?;
    let has = exists(scope, &next);
    tracing::debug!("Has next page: {}", has);
    Ok(has)
}

/// Reads the total row count from a `"1 - 15 of 524"` style label
pub fn parse_total_label(label: &str) -> Option<u32> {
    label.rsplit("of").next()?.trim().parse().ok()
}

/// Number of listing pages after the first, from the pagination label
///
/// Only used for progress reporting; the crawl itself stops when the "Next"
/// control disappears.
pub fn total_pages(document: &Html, url: &Url) -> Result<u32> {
    let label = MarkupPath::text(PAGE_LABEL)?;
    let total = select_first(document, &label)
        .as_deref()
        .and_then(parse_total_label)
        .ok_or_else(|| FaraError::ProtocolDrift {
            expectation: "pagination total label",
            url: url.to_string(),
        })?;

    let pages = total / PAGE_SIZE;
    tracing::debug!("Total pages: {}", pages);
    Ok(pages)
}

/// Start page → report iframe
pub fn locate_iframe(page: &Page) -> Result<PendingRequest> {
    let document = page.document();
    let src = MarkupPath::attr("iframe", "src")?;

    let url = select_first(&document, &src)
        .and_then(|href| absolute_url(&page.url, &href))
        .ok_or_else(|| FaraError::ProtocolDrift {
            expectation: "report iframe",
            url: page.url.to_string(),
        })?;

    tracing::debug!("Found iframe url {}", url);
    Ok(PendingRequest::get(Url::parse(&url)?))
}

/// Report iframe → active principals listing
///
/// The label sits in a `<font>` two levels below the element holding the
/// link. Only anchors that are direct children of that element count.
pub fn locate_toggle_link(page: &Page) -> Result<PendingRequest> {
    let document = page.document();
    let drift = || FaraError::ProtocolDrift {
        expectation: "active foreign principals link",
        url: page.url.to_string(),
    };

    let font = MarkupPath::text("font")?;
    let label = find_labelled(&document, &font, TOGGLE_LABEL).ok_or_else(drift)?;
    let holder = ancestor(label, 2).ok_or_else(drift)?;

    let href = if holder.value().name() == "a" {
        holder.value().attr("href").map(str::to_string)
    } else {
        holder
            .children()
            .filter_map(ElementRef::wrap)
            .find(|child| child.value().name() == "a")
            .and_then(|anchor| anchor.value().attr("href"))
            .map(str::to_string)
    };

    let url = href
        .and_then(|href| absolute_url(&page.url, &href))
        .ok_or_else(drift)?;

    tracing::debug!("Found active foreign principal url {}", url);
    Ok(PendingRequest::get(Url::parse(&url)?))
}

/// URL to use as referer for the next postback
///
/// Postback responses come from the shared endpoint, so the remembered
/// listing URL stands in for them.
pub fn effective_base_url(page: &Page, postback_url: &Url, remembered: &str) -> String {
    if page.request_url == *postback_url {
        remembered.to_string()
    } else {
        page.request_url.to_string()
    }
}

fn required_field(document: &Html, page: &Page, id: &str, expectation: &'static str) -> Result<String> {
    input_value(document, id)?.ok_or_else(|| FaraError::ProtocolDrift {
        expectation,
        url: page.url.to_string(),
    })
}

/// Principals listing → column toggle postback
///
/// Scrapes the session instance and widget ids from the listing's hidden
/// fields and starts the crawl context at page 1.
pub fn toggle_country_column(page: &Page, postback_url: &Url) -> Result<(PendingRequest, CrawlContext)> {
    let document = page.document();
    let base_url = effective_base_url(page, postback_url, page.url.as_str());

    let session = required_field(&document, page, SESSION_FIELD, "pInstance hidden field")?;
    let worksheet = required_field(&document, page, WORKSHEET_FIELD, "worksheet id hidden field")?;
    let report = required_field(&document, page, REPORT_FIELD, "report id hidden field")?;

    let headers = reload_headers(&form_map([("Referer", base_url.as_str())]));
    let form = reload_formdata(&form_map([
        ("p_instance", session.as_str()),
        ("x01", worksheet.as_str()),
        ("x02", report.as_str()),
        ("x03", "COUNTRY_NAME"),
        ("x04", "N"),
        ("p_widget_action", "BREAK_TOGGLE"),
    ]));

    let context = CrawlContext::new(base_url, session, worksheet, report);
    Ok((PendingRequest::post(postback_url.clone(), headers, form), context))
}

/// Builds the postback for the page after `page`, if there is one
///
/// The widget ids are read again from the current page; when a response
/// omits them the carried values are reused.
pub fn next_listing_request(
    document: &Html,
    page: &Page,
    context: &CrawlContext,
    postback_url: &Url,
) -> Result<Option<(PendingRequest, CrawlContext)>> {
    if !has_next_page(document)? {
        return Ok(None);
    }

    let base_url = effective_base_url(page, postback_url, &context.base_url);

    let worksheet = input_value(document, WORKSHEET_FIELD)?.unwrap_or_else(|| {
        tracing::warn!("No worksheet id on {}, reusing {}", page.url, context.worksheet_id);
        context.worksheet_id.clone()
    });
    let report = input_value(document, REPORT_FIELD)?.unwrap_or_else(|| {
        tracing::warn!("No report id on {}, reusing {}", page.url, context.report_id);
        context.report_id.clone()
    });

    let headers = reload_headers(&form_map([("Referer", base_url.as_str())]));
    let window = pager_window(context.page_index);
    let form = reload_formdata(&form_map([
        ("p_instance", context.session_instance.as_str()),
        ("x01", worksheet.as_str()),
        ("x02", report.as_str()),
        ("p_widget_action_mod", window.as_str()),
    ]));

    let next = context.advance(&base_url, &worksheet, &report);
    Ok(Some((
        PendingRequest::post(postback_url.clone(), headers, form),
        next,
    )))
}

/// Everything one listing page yields
#[derive(Debug)]
pub struct ListingOutcome {
    /// Rows in table order; failed rows carry their own error
    pub records: Vec<Result<Record>>,

    /// Postback for the following page and its context
    pub next: Option<(PendingRequest, CrawlContext)>,

    /// Additional pages reported by the pagination label, if shown
    pub total_pages: Option<u32>,
}

/// Listing page → records plus the next postback
pub fn process_listing(page: &Page, context: &CrawlContext, postback_url: &Url) -> Result<ListingOutcome> {
    let document = page.document();
    let records = extract_records(&document, &page.url)?;
    let total_pages = total_pages(&document, &page.url).ok();
    let next = next_listing_request(&document, page, context, postback_url)?;

    Ok(ListingOutcome {
        records,
        next,
        total_pages,
    })
}
