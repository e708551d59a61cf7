use crate::storage::{LinkRecord, PageRecord, SessionRecord, SessionStatus, StoreStats};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for crawl persistence backends
///
/// Implementations are driven from async workers through a mutex, so every
/// method is synchronous and should return quickly.
pub trait PageStore: Send {
    /// Creates tables and indexes; idempotent
    fn init_schema(&mut self) -> StorageResult<()>;

    // ===== Session lifecycle =====

    /// Opens a session for `base_url`
    ///
    /// When a running or paused session already exists for the same base
    /// URL it is flipped back to running and its id returned; otherwise a
    /// new session row is created with the given config snapshot (JSON).
    fn start_session(&mut self, base_url: &str, config_json: &str) -> StorageResult<i64>;

    /// Closes a session with a terminal (or paused) status, recording the
    /// end time and the number of pages crawled since the session started
    fn end_session(&mut self, session_id: i64, status: SessionStatus) -> StorageResult<()>;

    /// Flips a session to paused without recording an end time
    fn pause_session(&mut self, session_id: i64) -> StorageResult<()>;

    /// Fetches a session row
    fn get_session(&self, session_id: i64) -> StorageResult<Option<SessionRecord>>;

    // ===== Pages and links =====

    /// Upserts a page keyed by `url_hash`; returns the page id
    fn save_page(&mut self, page: &PageRecord) -> StorageResult<i64>;

    /// Inserts the links discovered on a page, in one transaction
    fn save_links(&mut self, page_id: i64, links: &[LinkRecord]) -> StorageResult<()>;

    /// Marks every link row pointing at `url_hash` as crawled
    fn mark_link_crawled(&mut self, url_hash: &str) -> StorageResult<()>;

    /// Returns up to `limit` internal link targets that have not been
    /// crawled yet and have no page row, restricted to `base_url`'s host
    fn get_uncrawled_links(&self, base_url: &str, limit: usize) -> StorageResult<Vec<String>>;

    // ===== Statistics =====

    /// Aggregate page/link counts plus the session row, when one is given
    fn get_stats(&self, session_id: Option<i64>) -> StorageResult<StoreStats>;
}
