//! Crawl orchestrator: session → listing pages → profiles → output log.
//!
//! A run is strictly sequential:
//!   1. Scrape the anti-forgery token and log in. Any login failure ends the
//!      run before the first listing request.
//!   2. Post the listing request for the current cursor, extract every linked
//!      profile in listing order, append the valid ones, then advance the cursor.
//!   3. Stop once the offset reaches the configured ceiling or the listing
//!      comes back empty.
//!
//! Profile failures are counted and skipped; listing failures abort the crawl.

pub mod cursor;

use crate::config::{AppConfig, Credentials};
use crate::scraper::session::{LoginOutcome, SessionManager, SessionState};
use crate::scraper::{Extraction, ZhihuScraper};
use crate::storage::JsonLinesSink;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

pub use self::cursor::Cursor;

pub struct Harvester {
    config: AppConfig,
    credentials: Credentials,
    scraper: ZhihuScraper,
    sessions: SessionManager,
    session: SessionState,
    cursor: Cursor,
    /// Profile URLs visited this run. Only consulted when `skip_seen_profiles` is set.
    seen: HashSet<String>,
}

impl Harvester {
    pub fn new(config: AppConfig, credentials: Credentials) -> Result<Self> {
        let scraper = ZhihuScraper::new(&config.scraper).context("Failed to build scraper")?;
        Ok(Self::with_scraper(config, credentials, scraper))
    }

    pub fn with_scraper(
        config: AppConfig,
        credentials: Credentials,
        scraper: ZhihuScraper,
    ) -> Self {
        let sessions = SessionManager::new(scraper.base_url());
        let cursor = Cursor::new(config.crawl.start_offset, config.crawl.start_anchor_id);
        Self {
            config,
            credentials,
            scraper,
            sessions,
            session: SessionState::default(),
            cursor,
            seen: HashSet::new(),
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Fetch the anti-forgery token, then log in.
    pub async fn authenticate(&mut self) -> Result<LoginOutcome> {
        self.sessions
            .initialize_token(self.scraper.client(), &mut self.session)
            .await;
        self.sessions
            .login(self.scraper.client(), &mut self.session, &self.credentials)
            .await
    }

    /// Walk the listing until the offset ceiling, appending valid profiles to `sink`.
    pub async fn crawl(&mut self, sink: &mut JsonLinesSink) -> Result<HarvestStats> {
        let started = Instant::now();
        let ceiling = self.config.crawl.offset_ceiling;
        let skip_seen = self.config.crawl.skip_seen_profiles;
        let mut stats = HarvestStats::default();

        while self.cursor.below(ceiling) {
            let Cursor { offset, anchor_id } = self.cursor;
            info!("Fetching listing page (offset {}, start {})", offset, anchor_id);

            let page = self
                .scraper
                .fetch_listing(&mut self.session, offset, anchor_id)
                .await?;
            stats.pages += 1;

            if page.is_empty() {
                info!("Listing exhausted at offset {}", offset);
                break;
            }

            for url in &page.profile_urls {
                let first_visit = self.seen.insert(url.clone());
                if skip_seen && !first_visit {
                    stats.skipped += 1;
                    continue;
                }

                match self.scraper.extract(&mut self.session, url).await {
                    Extraction::Valid(record) => {
                        sink.append(&record)?;
                        stats.records_written += 1;
                    }
                    Extraction::Invalid(_) => stats.invalid += 1,
                }
            }

            self.cursor.advance(&page);
            info!(
                "  Page done: {} entries, offset now {} | {} records, {} invalid so far",
                page.len(),
                self.cursor.offset,
                stats.records_written,
                stats.invalid
            );
        }

        stats.elapsed = started.elapsed();
        Ok(stats)
    }
}

#[derive(Debug, Default)]
pub struct HarvestStats {
    pub pages: usize,
    pub records_written: usize,
    pub invalid: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

#[derive(Debug)]
pub enum RunOutcome {
    LoginFailed(LoginOutcome),
    Completed(HarvestStats),
}

/// Authenticate, then crawl into the configured output log.
/// The log is only opened once login has succeeded.
pub async fn run(config: AppConfig, credentials: Credentials) -> Result<RunOutcome> {
    let output_path = config.storage.output_path.clone();
    let mut harvester = Harvester::new(config, credentials)?;
    run_with(&mut harvester, &output_path).await
}

pub async fn run_with(
    harvester: &mut Harvester,
    output_path: &Path,
) -> Result<RunOutcome> {
    let outcome = harvester.authenticate().await?;
    if !outcome.is_success() {
        return Ok(RunOutcome::LoginFailed(outcome));
    }

    let mut sink = JsonLinesSink::open(output_path)?;
    let stats = harvester.crawl(&mut sink).await?;
    info!(
        "=== Done: {} pages | {} records | {} invalid | {} skipped | {:.2?} ===",
        stats.pages, stats.records_written, stats.invalid, stats.skipped, stats.elapsed
    );
    Ok(RunOutcome::Completed(stats))
}
