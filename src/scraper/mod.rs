pub mod http_client;
pub mod parsers;
pub mod session;

use crate::config::ScraperConfig;
use crate::models::{ListingPage, ProfileRecord};
use anyhow::{Context, Result};
use tracing::{debug, warn};

use self::http_client::{HttpClient, TransportError};
use self::parsers::{ExtractError, parse_listing_response, parse_profile};
use self::session::SessionState;

// ── Extraction outcome ────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum Extraction {
    Valid(ProfileRecord),
    Invalid(InvalidProfile),
}

/// Why a profile yielded no record.
#[derive(Debug, thiserror::Error)]
pub enum InvalidProfile {
    #[error("page unavailable: {0}")]
    Fetch(#[from] TransportError),

    #[error("unusable markup: {0}")]
    Markup(#[from] ExtractError),
}

// ── zhihu scraper ─────────────────────────────────────────────────────────────

pub struct ZhihuScraper {
    client: HttpClient,
    base_url: String,
    listing_path: String,
}

impl ZhihuScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        Ok(Self::with_client(HttpClient::new(config)?, config))
    }

    pub fn with_client(client: HttpClient, config: &ScraperConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            listing_path: config.listing_path.clone(),
        }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the paginated follower listing, e.g. /topic/19551052/followers
    fn listing_url(&self) -> String {
        format!("{}{}", self.base_url, self.listing_path)
    }

    /// Request the listing page that starts after `anchor_id`.
    pub async fn fetch_listing(
        &self,
        session: &mut SessionState,
        offset: u64,
        anchor_id: u64,
    ) -> Result<ListingPage> {
        let url = self.listing_url();
        let form = [
            ("offset", offset.to_string()),
            ("start", anchor_id.to_string()),
            ("_xsrf", session.token_field()),
        ];

        let body = self
            .client
            .submit(session, &url, &form)
            .await
            .with_context(|| format!("Failed to fetch listing page at offset {}", offset))?;

        parse_listing_response(&body, &self.base_url)
            .with_context(|| format!("Unusable listing page at offset {}", offset))
    }

    /// Fetch and parse one profile. Never fails the crawl: every problem is
    /// reported as `Extraction::Invalid`.
    pub async fn extract(&self, session: &mut SessionState, url: &str) -> Extraction {
        let outcome = match self.client.fetch(session, url).await {
            Ok((_, doc)) => parse_profile(&doc, url).map_err(InvalidProfile::from),
            Err(e) => Err(InvalidProfile::from(e)),
        };

        match outcome {
            Ok(record) => {
                debug!(
                    "{}: {} (agree {}, thanks {})",
                    url, record.display_name, record.upvote_count, record.thanks_count
                );
                Extraction::Valid(record)
            }
            Err(reason) => {
                warn!("some exception raised by parsing {}: {}", url, reason);
                Extraction::Invalid(reason)
            }
        }
    }
}
