//! Crawl state definitions for the widget protocol
//!
//! The listing crawl is a strict sequence of dependent requests; these states
//! name where in that sequence the coordinator is.

use std::fmt;

/// Represents the current step of the listing crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    /// Nothing fetched yet
    Init,

    /// The start page was fetched and its report iframe located
    IframeFound,

    /// The principals listing was fetched and the country column toggle built
    ColumnToggled,

    /// A listing page (1-based) has been received
    ListingPage(u32),

    // ===== Terminal States =====
    /// The last listing page has been processed
    Done,

    /// The crawl was stopped by a fatal condition
    Aborted,
}

impl CrawlState {
    /// Returns true if no further listing requests will be issued
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Checks whether moving to `next` follows the protocol order
    ///
    /// Any non-terminal state may abort. Listing pages only advance one at a
    /// time.
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        match (self, next) {
            (s, Self::Aborted) => !s.is_terminal(),
            (Self::Init, Self::IframeFound) => true,
            (Self::IframeFound, Self::ColumnToggled) => true,
            (Self::ColumnToggled, Self::ListingPage(1)) => true,
            (Self::ListingPage(n), Self::ListingPage(m)) => m == n + 1,
            (Self::ListingPage(_), Self::Done) => true,
            _ => false,
        }
    }

    /// Short label used in log lines
    pub fn label(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::IframeFound => "iframe_found",
            Self::ColumnToggled => "column_toggled",
            Self::ListingPage(_) => "listing_page",
            Self::Done => "done",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListingPage(n) => write!(f, "listing_page({})", n),
            other => f.write_str(other.label()),
        }
    }
}

/// Outcome of one record's exhibit lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExhibitState {
    /// Exhibit links collected; the record is final
    Resolved,

    /// The detail page was unusable and the record kept no exhibits
    Failed,

    /// The exhibit listing spans several pages; the record holds the first
    /// page's links and the crawl stops after writing it
    Aborted,
}
