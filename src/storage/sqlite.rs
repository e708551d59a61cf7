//! SQLite implementation of the `PageStore` trait

use crate::storage::traits::{PageStore, StorageResult};
use crate::storage::{LinkRecord, PageRecord, SessionRecord, SessionStatus, StoreStats};
use crate::url::host_of;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    fn read_session(&self, session_id: i64) -> StorageResult<Option<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, base_url, status, start_time, end_time, pages_crawled, config
             FROM sessions WHERE id = ?1",
        )?;

        let session = stmt
            .query_row(params![session_id], |row| {
                Ok(SessionRecord {
                    id: row.get(0)?,
                    base_url: row.get(1)?,
                    status: SessionStatus::from_db_str(&row.get::<_, String>(2)?)
                        .unwrap_or(SessionStatus::Running),
                    start_time: row.get(3)?,
                    end_time: row.get(4)?,
                    pages_crawled: row.get(5)?,
                    config: row.get(6)?,
                })
            })
            .optional()?;

        Ok(session)
    }
}

impl PageStore for SqliteStore {
    fn init_schema(&mut self) -> StorageResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS sessions (
                id            INTEGER PRIMARY KEY,
                base_url      TEXT NOT NULL,
                status        TEXT NOT NULL DEFAULT 'running',
                start_time    TEXT NOT NULL,
                end_time      TEXT,
                pages_crawled INTEGER NOT NULL DEFAULT 0,
                config        TEXT
            );

            CREATE TABLE IF NOT EXISTS pages (
                id            INTEGER PRIMARY KEY,
                url           TEXT NOT NULL UNIQUE,
                url_hash      TEXT NOT NULL UNIQUE,
                title         TEXT,
                content_type  TEXT,
                full_text     TEXT,
                main_content  TEXT,
                secondary_content TEXT,
                status_code   INTEGER,
                depth         INTEGER NOT NULL DEFAULT 0,
                response_time REAL,
                error         TEXT,
                crawled_at    TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_pages_url_hash ON pages(url_hash);
            CREATE INDEX IF NOT EXISTS idx_pages_crawled_at ON pages(crawled_at);

            CREATE TABLE IF NOT EXISTS links (
                id              INTEGER PRIMARY KEY,
                source_id       INTEGER NOT NULL REFERENCES pages(id),
                target_url      TEXT NOT NULL,
                target_url_hash TEXT NOT NULL,
                is_internal     INTEGER NOT NULL DEFAULT 1,
                is_crawled      INTEGER NOT NULL DEFAULT 0,
                discovered_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_links_target_hash ON links(target_url_hash);
            CREATE INDEX IF NOT EXISTS idx_links_uncrawled ON links(is_crawled);
        ",
        )?;
        Ok(())
    }

    fn start_session(&mut self, base_url: &str, config_json: &str) -> StorageResult<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM sessions
                 WHERE base_url = ?1 AND status IN ('running', 'paused')
                 ORDER BY id DESC LIMIT 1",
                params![base_url],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            self.conn.execute(
                "UPDATE sessions SET status = 'running' WHERE id = ?1",
                params![id],
            )?;
            tracing::info!("Resuming existing crawl session {}", id);
            return Ok(id);
        }

        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (base_url, status, start_time, config)
             VALUES (?1, 'running', ?2, ?3)",
            params![base_url, now, config_json],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::info!("Started new crawl session {}", id);
        Ok(id)
    }

    fn end_session(&mut self, session_id: i64, status: SessionStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        // RFC 3339 UTC timestamps compare lexicographically, so the page
        // count can be derived from crawled_at against the session start
        let updated = self.conn.execute(
            "UPDATE sessions
             SET status = ?1,
                 end_time = ?2,
                 pages_crawled = (
                     SELECT COUNT(*) FROM pages
                     WHERE pages.crawled_at >= sessions.start_time
                 )
             WHERE id = ?3",
            params![status.as_db_str(), now, session_id],
        )?;

        if updated == 0 {
            tracing::warn!("No session {} to end", session_id);
        } else {
            tracing::info!("Ended session {} with status {:?}", session_id, status);
        }
        Ok(())
    }

    fn pause_session(&mut self, session_id: i64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE sessions SET status = 'paused' WHERE id = ?1",
            params![session_id],
        )?;
        if updated == 0 {
            tracing::warn!("No session {} to pause", session_id);
        }
        Ok(())
    }

    fn get_session(&self, session_id: i64) -> StorageResult<Option<SessionRecord>> {
        self.read_session(session_id)
    }

    fn save_page(&mut self, page: &PageRecord) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO pages
                 (url, url_hash, title, content_type, full_text, main_content,
                  secondary_content, status_code, depth, response_time, error, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(url_hash) DO UPDATE SET
                 title = excluded.title,
                 content_type = excluded.content_type,
                 full_text = excluded.full_text,
                 main_content = excluded.main_content,
                 secondary_content = excluded.secondary_content,
                 status_code = excluded.status_code,
                 depth = excluded.depth,
                 response_time = excluded.response_time,
                 error = excluded.error,
                 crawled_at = excluded.crawled_at",
            params![
                page.url,
                page.url_hash,
                page.title,
                page.content_type,
                page.full_text,
                page.main_content,
                page.secondary_content,
                page.status_code,
                page.depth,
                page.response_time,
                page.error,
                now,
            ],
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM pages WHERE url_hash = ?1",
            params![page.url_hash],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn save_links(&mut self, page_id: i64, links: &[LinkRecord]) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO links
                     (source_id, target_url, target_url_hash, is_internal, is_crawled, discovered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for link in links {
                stmt.execute(params![
                    page_id,
                    link.url,
                    link.url_hash,
                    link.is_internal,
                    link.is_crawled,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!("Saved {} links for page {}", links.len(), page_id);
        Ok(())
    }

    fn mark_link_crawled(&mut self, url_hash: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE links SET is_crawled = 1 WHERE target_url_hash = ?1",
            params![url_hash],
        )?;
        Ok(())
    }

    fn get_uncrawled_links(&self, base_url: &str, limit: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT target_url FROM links
             WHERE is_internal = 1
               AND is_crawled = 0
               AND target_url_hash NOT IN (SELECT url_hash FROM pages)
             LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;

        let base_host = host_of(base_url);
        let mut links = Vec::new();
        for row in rows {
            let url = row?;
            if host_of(&url) == base_host {
                links.push(url);
            }
        }
        Ok(links)
    }

    fn get_stats(&self, session_id: Option<i64>) -> StorageResult<StoreStats> {
        let total_pages: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
        let total_links: u64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        let crawled_links: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM links WHERE is_crawled = 1",
            [],
            |row| row.get(0),
        )?;

        let session = match session_id {
            Some(id) => self.read_session(id)?,
            None => None,
        };

        Ok(StoreStats {
            total_pages,
            total_links,
            crawled_links,
            session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url::url_hash;

    fn store() -> SqliteStore {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    fn page(url: &str, depth: u32) -> PageRecord {
        PageRecord {
            url: url.to_string(),
            url_hash: url_hash(url),
            title: Some("Title".to_string()),
            content_type: Some("text/html".to_string()),
            status_code: Some(200),
            depth,
            response_time: Some(0.1),
            ..PageRecord::default()
        }
    }

    #[test]
    fn test_init_schema_idempotent() {
        let mut store = store();
        store.init_schema().unwrap();
    }

    #[test]
    fn test_start_session_creates_and_resumes() {
        let mut store = store();

        let id = store.start_session("http://example.com/", "{}").unwrap();
        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.base_url, "http://example.com/");

        // Pausing and restarting reuses the same session
        store.pause_session(id).unwrap();
        let resumed = store.start_session("http://example.com/", "{}").unwrap();
        assert_eq!(resumed, id);
        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Running);
    }

    #[test]
    fn test_completed_session_not_resumed() {
        let mut store = store();

        let first = store.start_session("http://example.com/", "{}").unwrap();
        store
            .end_session(first, SessionStatus::Completed)
            .unwrap();

        let second = store.start_session("http://example.com/", "{}").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_sessions_scoped_by_base_url() {
        let mut store = store();
        let a = store.start_session("http://a.com/", "{}").unwrap();
        let b = store.start_session("http://b.com/", "{}").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_save_page_upserts_by_hash() {
        let mut store = store();

        let first = store.save_page(&page("http://example.com/a", 0)).unwrap();

        let mut updated = page("http://example.com/a", 2);
        updated.title = Some("New title".to_string());
        let second = store.save_page(&updated).unwrap();

        assert_eq!(first, second);
        let stats = store.get_stats(None).unwrap();
        assert_eq!(stats.total_pages, 1);
    }

    #[test]
    fn test_end_session_counts_pages() {
        let mut store = store();
        let id = store.start_session("http://example.com/", "{}").unwrap();

        store.save_page(&page("http://example.com/a", 0)).unwrap();
        store.save_page(&page("http://example.com/b", 1)).unwrap();

        store.end_session(id, SessionStatus::Completed).unwrap();
        let session = store.get_session(id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.pages_crawled, 2);
        assert!(session.end_time.is_some());
    }

    #[test]
    fn test_uncrawled_links_feed() {
        let mut store = store();
        let page_id = store.save_page(&page("http://example.com/", 0)).unwrap();

        let links = vec![
            LinkRecord {
                url: "http://example.com/next".to_string(),
                url_hash: url_hash("http://example.com/next"),
                is_internal: true,
                is_crawled: false,
            },
            LinkRecord {
                url: "http://other.com/x".to_string(),
                url_hash: url_hash("http://other.com/x"),
                is_internal: false,
                is_crawled: false,
            },
        ];
        store.save_links(page_id, &links).unwrap();

        // External links and crawled links are excluded
        let uncrawled = store
            .get_uncrawled_links("http://example.com/", 100)
            .unwrap();
        assert_eq!(uncrawled, vec!["http://example.com/next".to_string()]);

        store
            .mark_link_crawled(&url_hash("http://example.com/next"))
            .unwrap();
        let uncrawled = store
            .get_uncrawled_links("http://example.com/", 100)
            .unwrap();
        assert!(uncrawled.is_empty());
    }

    #[test]
    fn test_uncrawled_links_exclude_already_saved_pages() {
        let mut store = store();
        let page_id = store.save_page(&page("http://example.com/", 0)).unwrap();

        store
            .save_links(
                page_id,
                &[LinkRecord {
                    url: "http://example.com/seen".to_string(),
                    url_hash: url_hash("http://example.com/seen"),
                    is_internal: true,
                    is_crawled: false,
                }],
            )
            .unwrap();

        // Once a page row exists for the target, it is no longer "uncrawled"
        store.save_page(&page("http://example.com/seen", 1)).unwrap();
        let uncrawled = store
            .get_uncrawled_links("http://example.com/", 100)
            .unwrap();
        assert!(uncrawled.is_empty());
    }

    #[test]
    fn test_stats_counts() {
        let mut store = store();
        let id = store.start_session("http://example.com/", "{}").unwrap();
        let page_id = store.save_page(&page("http://example.com/", 0)).unwrap();
        store
            .save_links(
                page_id,
                &[LinkRecord {
                    url: "http://example.com/a".to_string(),
                    url_hash: url_hash("http://example.com/a"),
                    is_internal: true,
                    is_crawled: false,
                }],
            )
            .unwrap();

        let stats = store.get_stats(Some(id)).unwrap();
        assert_eq!(stats.total_pages, 1);
        assert_eq!(stats.total_links, 1);
        assert_eq!(stats.crawled_links, 0);
        assert!(stats.session.is_some());
    }
}
