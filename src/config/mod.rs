pub mod credentials;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use self::credentials::Credentials;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Network access configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Listing endpoint, relative to `base_url`.
    #[serde(default = "default_listing_path")]
    pub listing_path: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause taken before an attempt whenever the previous request failed.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_accept_language")]
    pub accept_language: String,
}

/// Pagination configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    #[serde(default = "default_start_offset")]
    pub start_offset: u64,

    #[serde(default = "default_start_anchor_id")]
    pub start_anchor_id: u64,

    /// Soft stopping point: no new page is requested once the offset reaches it.
    #[serde(default = "default_offset_ceiling")]
    pub offset_ceiling: u64,

    #[serde(default)]
    pub skip_seen_profiles: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.zhihu.com".to_string()
}
fn default_listing_path() -> String {
    "/topic/19551052/followers".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    5
}
fn default_retry_backoff_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 6.3; WOW64; Trident/7.0; rv:11.0) like Gecko".to_string()
}
fn default_accept_language() -> String {
    "zh-CN,zh;q=0.8".to_string()
}
fn default_start_offset() -> u64 {
    40
}
fn default_start_anchor_id() -> u64 {
    1458573819
}
fn default_offset_ceiling() -> u64 {
    100_000
}
fn default_output_path() -> PathBuf {
    PathBuf::from("user.json")
}
fn default_credentials_path() -> PathBuf {
    PathBuf::from("config.json")
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            listing_path: default_listing_path(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_offset: default_start_offset(),
            start_anchor_id: default_start_anchor_id(),
            offset_ceiling: default_offset_ceiling(),
            skip_seen_profiles: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            credentials_path: default_credentials_path(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("HARVEST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration sources")?;

        cfg.try_deserialize()
            .context("Invalid harvester configuration")
    }
}
