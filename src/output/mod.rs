//! Output module for persisting records and reporting crawl results
//!
//! This module provides:
//! - The `RecordSink` trait consumed by the coordinator
//! - A JSON / JSON Lines item feed
//! - Crawl statistics

mod json;
mod stats;
mod traits;

pub use json::JsonFeed;
pub use stats::{log_statistics, CrawlStats};
pub use traits::{MemorySink, OutputError, OutputResult, RecordSink};

use crate::config::OutputConfig;
use std::path::Path;

/// Opens the item feed described by the output configuration
pub fn open_feed(config: &OutputConfig) -> OutputResult<Box<dyn RecordSink>> {
    let feed = JsonFeed::create(Path::new(&config.items_path), config.format)?;
    Ok(Box::new(feed))
}
