//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: where the listing crawl is in the widget protocol
//! - `ExhibitState`: outcome of one record's exhibit lookup
//! - `CrawlContext`: the session tokens carried from page to page

mod context;
mod crawl_state;

// Re-export main types
pub use context::{form_map, merge, CrawlContext, FormMap};
pub use crawl_state::{CrawlState, ExhibitState};
