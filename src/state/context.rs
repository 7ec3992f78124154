//! Form-state carrier threaded between widget requests
//!
//! A [`CrawlContext`] is never mutated in place: each transition produces the
//! next context by copying the current one and overriding the fields it changes.

use std::collections::BTreeMap;

/// Ordered string mapping used for both request headers and form bodies
pub type FormMap = BTreeMap<String, String>;

/// Merges `overrides` over `defaults`
///
/// Keys present in `overrides` win; every other default passes through
/// unchanged.
///
/// # Example
///
/// ```
/// use fara_principals::state::{merge, FormMap};
///
/// let defaults = FormMap::from([("Host".to_string(), "efile.fara.gov".to_string())]);
/// let overrides = FormMap::from([("Host".to_string(), "X".to_string())]);
/// assert_eq!(merge(&overrides, &defaults)["Host"], "X");
/// ```
pub fn merge(overrides: &FormMap, defaults: &FormMap) -> FormMap {
    let mut merged = defaults.clone();
    merged.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Builds a [`FormMap`] from borrowed pairs
pub fn form_map<'a, I>(pairs: I) -> FormMap
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Widget session state carried from one listing page to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlContext {
    /// Non-postback URL used as referer when the response came from the
    /// postback endpoint
    pub base_url: String,

    /// Session instance (`p_instance`), scraped once when the toggle is issued
    pub session_instance: String,

    /// Last seen worksheet id (`x01`)
    pub worksheet_id: String,

    /// Last seen report id (`x02`)
    pub report_id: String,

    /// Completed listing page fetches
    pub page_index: u32,
}

impl CrawlContext {
    /// Creates the context for the column-toggle postback
    pub fn new(
        base_url: impl Into<String>,
        session_instance: impl Into<String>,
        worksheet_id: impl Into<String>,
        report_id: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            session_instance: session_instance.into(),
            worksheet_id: worksheet_id.into(),
            report_id: report_id.into(),
            page_index: 1,
        }
    }

    /// Copies the context forward for the next listing page
    ///
    /// The session instance is carried; the referer base and the widget tokens
    /// are replaced with the values seen on the current page.
    pub fn advance(&self, base_url: &str, worksheet_id: &str, report_id: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            worksheet_id: worksheet_id.to_string(),
            report_id: report_id.to_string(),
            page_index: self.page_index + 1,
            ..self.clone()
        }
    }
}
