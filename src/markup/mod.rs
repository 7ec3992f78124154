//! Markup selection primitives
//!
//! Everything the crawler knows about the registry's page structure is read
//! through this module. Lookups never fail on "not found": they return an empty
//! sequence (or `None`) and the caller decides whether absence is an error.

mod path;

pub use path::{MarkupPath, Target};

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::MarkupResult;

/// Something that can be searched with a CSS selector
///
/// Implemented for whole documents and for single elements so the same paths
/// work on a page and on one table row.
pub trait Scope {
    /// Returns every element under this scope matching `selector`
    fn select_all<'a>(&'a self, selector: &'a Selector) -> Vec<ElementRef<'a>>;
}

impl Scope for Html {
    fn select_all<'a>(&'a self, selector: &'a Selector) -> Vec<ElementRef<'a>> {
        self.select(selector).collect()
    }
}

impl<'b> Scope for ElementRef<'b> {
    fn select_all<'a>(&'a self, selector: &'a Selector) -> Vec<ElementRef<'a>> {
        self.select(selector).collect()
    }
}

/// Selects all values addressed by `path` under `scope`
///
/// # Arguments
///
/// * `scope` - A parsed document or element
/// * `path` - The compiled selector path
///
/// # Returns
///
/// The matched text or attribute values in document order. Elements lacking
/// the requested attribute are skipped.
///
/// # Example
///
/// ```
/// use fara_principals::markup::{select, MarkupPath};
/// use scraper::Html;
///
/// let doc = Html::parse_document(r#"<iframe src="/report"></iframe>"#);
/// let path = MarkupPath::attr("iframe", "src").unwrap();
/// assert_eq!(select(&doc, &path), vec!["/report".to_string()]);
/// ```
pub fn select<S: Scope + ?Sized>(scope: &S, path: &MarkupPath) -> Vec<String> {
    scope
        .select_all(path.selector())
        .into_iter()
        .filter_map(|element| path.extract(element))
        .collect()
}

/// Returns the first value addressed by `path`, or `None`
pub fn select_first<S: Scope + ?Sized>(scope: &S, path: &MarkupPath) -> Option<String> {
    scope
        .select_all(path.selector())
        .into_iter()
        .find_map(|element| path.extract(element))
}

/// Returns true if at least one element matches the path's selector
pub fn exists<S: Scope + ?Sized>(scope: &S, path: &MarkupPath) -> bool {
    !scope.select_all(path.selector()).is_empty()
}

/// Reads the `value` attribute of the `<input>` with the given id
///
/// The widget keeps its session tokens in hidden inputs such as
/// `<input type="hidden" id="pInstance" value="355896116786" />`.
pub fn input_value<S: Scope + ?Sized>(scope: &S, element_id: &str) -> MarkupResult<Option<String>> {
    let path = MarkupPath::attr(&format!(r#"input[id="{}"]"#, element_id), "value")?;
    Ok(select_first(scope, &path))
}

/// Returns the element's own text nodes, skipping text inside child elements
pub fn direct_text(element: ElementRef<'_>) -> Vec<String> {
    element
        .children()
        .filter_map(|node| node.value().as_text().map(|text| text.to_string()))
        .collect()
}

/// Normalizes cell text: non-breaking spaces become spaces, surrounding
/// whitespace is trimmed and an empty result is treated as absent
pub fn normalize_text(raw: &str) -> Option<String> {
    let text = raw.replace('\u{a0}', " ");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Finds the first element matched by `path` whose own text equals `label`
pub fn find_labelled<'a, S: Scope + ?Sized>(
    scope: &'a S,
    path: &'a MarkupPath,
    label: &str,
) -> Option<ElementRef<'a>> {
    scope
        .select_all(path.selector())
        .into_iter()
        .find(|element| normalize_text(&direct_text(*element).concat()).as_deref() == Some(label))
}

/// Walks `levels` parents up from `element`
pub fn ancestor(element: ElementRef<'_>, levels: usize) -> Option<ElementRef<'_>> {
    let mut current = element;
    for _ in 0..levels {
        current = current.parent().and_then(ElementRef::wrap)?;
    }
    Some(current)
}

/// Resolves a link href to an absolute URL
///
/// Returns None if the link should be ignored:
/// - empty or fragment-only hrefs
/// - javascript:, mailto:, tel: and data: links
/// - anything that is not HTTP(S) after resolution
pub fn absolute_url(base_url: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute) if absolute.scheme() == "http" || absolute.scheme() == "https" => {
            Some(absolute.to_string())
        }
        _ => None,
    }
}
