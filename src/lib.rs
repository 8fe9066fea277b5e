//! Session-based follower harvester for zhihu.com.
//!
//! Logs in, walks a topic's paginated follower listing and appends one JSON
//! record per parsable profile to an output log.

pub mod config;
pub mod models;
pub mod pipeline;
pub mod scraper;
pub mod storage;
