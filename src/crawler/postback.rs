//! Postback request builders for the interactive report widget
//!
//! The widget pages and reconfigures itself by POSTing a fixed set of
//! `p_*`/`x0N` fields to the APEX `wwv_flow.show` endpoint. These builders
//! produce those headers and fields; callers override the session tokens
//! scraped from the current page.

use crate::state::{form_map, merge, FormMap};

/// Default postback endpoint of the widget
pub const POSTBACK_URL: &str = "https://efile.fara.gov/pls/apex/wwv_flow.show";

/// Rows per listing page
pub const PAGE_SIZE: u32 = 15;

/// Builds the headers for a widget postback
///
/// # Arguments
///
/// * `overrides` - Headers replacing or extending the defaults (usually
///   just `Referer`)
///
/// # Example
///
/// ```
/// use fara_principals::crawler::reload_headers;
/// use fara_principals::state::FormMap;
///
/// let headers = reload_headers(&FormMap::new());
/// assert_eq!(headers["Host"], "efile.fara.gov");
/// ```
pub fn reload_headers(overrides: &FormMap) -> FormMap {
    merge(
        overrides,
        &form_map([
            ("Content-Type", "application/x-www-form-urlencoded"),
            ("Host", "efile.fara.gov"),
            ("Origin", "https://efile.fara.gov"),
        ]),
    )
}

/// Builds the form body for a widget postback
///
/// The `x01`, `x02` and `p_instance` defaults are placeholders for when no
/// live session has been scraped yet; real requests always override them.
pub fn reload_formdata(overrides: &FormMap) -> FormMap {
    merge(
        overrides,
        &form_map([
            ("p_request", "APXWGT"),
            ("p_flow_id", "171"),
            ("p_flow_step_id", "130"),
            ("p_widget_num_return", "15"),
            ("p_widget_name", "worksheet"),
            ("p_widget_mod", "ACTION"),
            ("p_widget_action", "PAGE"),
            ("x01", "80340213897823017"),
            ("x02", "80341508791823021"),
            ("p_instance", "9939816130573"),
        ]),
    )
}

/// Row window the widget sends when paging to zero-based page `page`
///
/// # Example
///
/// ```
/// use fara_principals::crawler::pager_window;
///
/// assert_eq!(pager_window(1), "pgR_min_row=16max_rows=15rows_fetched=15");
/// ```
pub fn pager_window(page: u32) -> String {
    let window = format!(
        "pgR_min_row={}max_rows={}rows_fetched={}",
        page * PAGE_SIZE + 1,
        PAGE_SIZE,
        PAGE_SIZE
    );
    tracing::debug!("Pager window for page {}: {}", page, window);
    window
}
