//! Persistence capability
//!
//! The crawl engine consumes storage through the `PageStore` trait: session
//! lifecycle records, page upserts keyed by the hash of the normalized URL,
//! and link rows that feed the resume path. The default backend is SQLite.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{PageStore, StorageError, StorageResult};

use serde::Serialize;

/// Lifecycle state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Paused => "paused",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(SessionStatus::Running),
            "paused" => Some(SessionStatus::Paused),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// A persisted crawl session
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub id: i64,
    pub base_url: String,
    pub status: SessionStatus,
    pub start_time: String,
    pub end_time: Option<String>,
    pub pages_crawled: u64,
    pub config: Option<String>,
}

/// A page row ready for upsert
#[derive(Debug, Clone, Default)]
pub struct PageRecord {
    pub url: String,
    pub url_hash: String,
    pub title: Option<String>,
    pub content_type: Option<String>,
    pub full_text: Option<String>,
    pub main_content: Option<String>,
    pub secondary_content: Option<String>,
    pub status_code: Option<u16>,
    pub depth: u32,
    pub response_time: Option<f64>,
    pub error: Option<String>,
}

/// A link row discovered on a page
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub url: String,
    pub url_hash: String,
    pub is_internal: bool,
    pub is_crawled: bool,
}

/// Aggregate counts from storage plus the session row
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_pages: u64,
    pub total_links: u64,
    pub crawled_links: u64,
    pub session: Option<SessionRecord>,
}
