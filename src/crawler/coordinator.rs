//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives the widget protocol from the start page to the last
//! listing page:
//! - Fetching each step and handing the page to its transition
//! - Threading the crawl context from one listing page to the next
//! - Spawning an exhibit lookup per record
//! - Writing completed records to the sink
//! - Stopping the whole run on fatal conditions

use crate::config::Config;
use crate::crawler::exhibits::fetch_exhibits;
use crate::crawler::fetcher::{Fetcher, PendingRequest};
use crate::crawler::pagination::{
    locate_iframe, locate_toggle_link, process_listing, toggle_country_column,
};
use crate::crawler::records::Record;
use crate::output::{log_statistics, CrawlStats, RecordSink};
use crate::state::{CrawlState, ExhibitState};
use crate::{FaraError, Result};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

type ExhibitResult = Result<(Record, ExhibitState)>;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<Fetcher>,
    sink: Box<dyn RecordSink>,
    postback_url: Url,
    state: CrawlState,
    stats: CrawlStats,
    exhibits: JoinSet<ExhibitResult>,
    exhibit_permits: Arc<Semaphore>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `sink` - Destination for completed records
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(FaraError)` - Invalid endpoint or HTTP client setup failure
    pub fn new(config: Config, mut sink: Box<dyn RecordSink>) -> Result<Self> {
        let setup = Fetcher::new(&config.user_agent, &config.crawler)
            .and_then(|fetcher| Ok((fetcher, Url::parse(&config.site.postback_url)?)));
        let (fetcher, postback_url) = match setup {
            Ok(parts) => parts,
            Err(e) => {
                // Leave a well-formed, empty feed behind
                if let Err(finish) = sink.finish() {
                    tracing::error!("Failed to finish output: {}", finish);
                }
                return Err(e);
            }
        };
        let exhibit_permits = Arc::new(Semaphore::new(
            config.crawler.max_concurrent_exhibits.max(1) as usize,
        ));

        Ok(Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            sink,
            postback_url,
            state: CrawlState::Init,
            stats: CrawlStats::default(),
            exhibits: JoinSet::new(),
            exhibit_permits,
        })
    }

    /// Current protocol state
    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Runs the crawl to completion
    ///
    /// The sink is finished whether or not the run succeeds, so records
    /// completed before a fatal error stay persisted. When the listing stops
    /// early, exhibit lookups already in flight are still completed and
    /// written unless the failure came from an exhibit page or the sink.
    pub async fn run(&mut self) -> Result<CrawlStats> {
        tracing::info!("Starting crawl at {}", self.config.site.start_url);
        let start_time = std::time::Instant::now();

        let mut outcome = self.crawl_listing().await;
        if outcome.is_ok() {
            outcome = self.drain_exhibits().await;
        } else if let Err(e) = &outcome {
            if keeps_pending_exhibits(e) {
                tracing::warn!(
                    "Listing stopped ({}), completing {} pending exhibit lookups",
                    e.reason(),
                    self.exhibits.len()
                );
                if let Err(drain) = self.drain_exhibits().await {
                    tracing::error!("Exhibit lookups stopped early: {}", drain);
                }
            }
        }
        if outcome.is_ok() {
            outcome = self.transition(CrawlState::Done);
        }

        if let Err(e) = &outcome {
            tracing::error!("Crawl aborted in state {} ({}): {}", self.state, e.reason(), e);
            self.exhibits.abort_all();
            self.state = CrawlState::Aborted;
        }

        if let Err(e) = self.sink.finish() {
            if outcome.is_ok() {
                return Err(e.into());
            }
            tracing::error!("Failed to finish output: {}", e);
        }

        log_statistics(&self.stats);
        tracing::info!("Crawl finished in {:?}", start_time.elapsed());

        outcome.map(|()| self.stats.clone())
    }

    fn transition(&mut self, next: CrawlState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(FaraError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("State {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Walks start page, iframe, toggle and every listing page in order
    async fn crawl_listing(&mut self) -> Result<()> {
        let start = PendingRequest::get(Url::parse(&self.config.site.start_url)?);
        let page = self.fetcher.fetch(&start).await?;
        let iframe = locate_iframe(&page)?;
        self.transition(CrawlState::IframeFound)?;

        let page = self.fetcher.fetch(&iframe).await?;
        let listing = locate_toggle_link(&page)?;

        let page = self.fetcher.fetch(&listing).await?;
        let (mut request, mut context) = toggle_country_column(&page, &self.postback_url)?;
        self.transition(CrawlState::ColumnToggled)?;

        loop {
            let page = self.fetcher.fetch(&request).await?;
            self.transition(CrawlState::ListingPage(context.page_index))?;
            self.stats.listing_pages += 1;

            let outcome = process_listing(&page, &context, &self.postback_url)?;
            if self.stats.reported_pages.is_none() {
                if let Some(pages) = outcome.total_pages {
                    tracing::info!("Listing reports {} additional pages", pages);
                    self.stats.reported_pages = Some(pages);
                }
            }

            for row in outcome.records {
                self.stats.rows += 1;
                match row {
                    Ok(record) => self.spawn_exhibit(record),
                    Err(e) if e.is_row_local() => {
                        self.stats.row_failures += 1;
                        tracing::warn!("Skipping row on listing page {}: {}", context.page_index, e);
                    }
                    Err(e) => return Err(e),
                }
            }

            self.collect_finished()?;

            match outcome.next {
                Some((next_request, next_context)) => {
                    tracing::debug!("Has link to the next page");
                    request = next_request;
                    context = next_context;
                }
                None => {
                    tracing::info!("Last listing page reached after {} pages", self.stats.listing_pages);
                    return Ok(());
                }
            }
        }
    }

    fn spawn_exhibit(&mut self, record: Record) {
        let fetcher = Arc::clone(&self.fetcher);
        let permits = Arc::clone(&self.exhibit_permits);
        self.exhibits.spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            fetch_exhibits(fetcher, record).await
        });
    }

    /// Writes records whose exhibit lookup already finished, without waiting
    fn collect_finished(&mut self) -> Result<()> {
        while let Some(joined) = self.exhibits.try_join_next() {
            self.complete(joined?)?;
        }
        Ok(())
    }

    /// Waits for every outstanding exhibit lookup
    async fn drain_exhibits(&mut self) -> Result<()> {
        while let Some(joined) = self.exhibits.join_next().await {
            self.complete(joined?)?;
        }
        Ok(())
    }

    /// Writes a finished record; a multi-page exhibit listing stops the
    /// crawl after its record is written
    fn complete(&mut self, result: ExhibitResult) -> Result<()> {
        let (record, exhibit_state) = result?;
        self.stats.record_exhibit(exhibit_state, record.exhibit_urls.len());
        self.sink.accept(&record)?;
        self.stats.records += 1;

        if exhibit_state == ExhibitState::Aborted {
            return Err(FaraError::UnsupportedMultiPageExhibits { url: record.url });
        }
        Ok(())
    }
}

/// Whether exhibit lookups in flight should still be written after `error`
fn keeps_pending_exhibits(error: &FaraError) -> bool {
    !matches!(
        error,
        FaraError::UnsupportedMultiPageExhibits { .. } | FaraError::Output(_) | FaraError::Task(_)
    )
}
