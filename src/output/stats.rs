//! Crawl statistics
//!
//! Counters kept by the coordinator and logged when a run ends.

use crate::state::ExhibitState;
use std::fmt;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Listing pages received
    pub listing_pages: u32,

    /// Additional pages announced by the first listing page
    pub reported_pages: Option<u32>,

    /// Table rows seen
    pub rows: u64,

    /// Rows dropped because a column could not be parsed
    pub row_failures: u64,

    /// Records written to the sink
    pub records: u64,

    /// Exhibit links attached across all records
    pub exhibit_urls: u64,

    /// Records written without exhibits because the detail page failed
    pub exhibit_failures: u64,
}

impl CrawlStats {
    /// Counts one finished exhibit lookup
    pub fn record_exhibit(&mut self, state: ExhibitState, urls: usize) {
        match state {
            ExhibitState::Resolved | ExhibitState::Aborted => self.exhibit_urls += urls as u64,
            ExhibitState::Failed => self.exhibit_failures += 1,
        }
    }

    /// Share of rows that produced a record, as a percentage
    pub fn row_success_rate(&self) -> f64 {
        if self.rows == 0 {
            return 0.0;
        }
        (self.rows - self.row_failures) as f64 / self.rows as f64 * 100.0
    }
}

impl fmt::Display for CrawlStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} listing pages, {} rows ({} failed), {} records, {} exhibit urls, {} exhibit failures",
            self.listing_pages,
            self.rows,
            self.row_failures,
            self.records,
            self.exhibit_urls,
            self.exhibit_failures
        )
    }
}

/// Logs the statistics summary
pub fn log_statistics(stats: &CrawlStats) {
    tracing::info!("Crawl statistics: {}", stats);
    if let Some(reported) = stats.reported_pages {
        if stats.listing_pages != reported + 1 {
            tracing::warn!(
                "Listing announced {} additional pages but {} were fetched",
                reported,
                stats.listing_pages.saturating_sub(1)
            );
        }
    }
    tracing::info!("Row success rate: {:.2}%", stats.row_success_rate());
}
