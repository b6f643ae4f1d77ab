use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{FeedRecord, NewFeedRecord, NewNewsItem, NewSentimentResult, NewsItem};

use super::schema::SCHEMA;

/// The single connection a run works through. Each stage wraps its writes in
/// [`Repository::begin`] / [`Repository::commit`]; dropping the repository
/// with a stage still open rolls that stage back.
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Checkpoints

    pub async fn begin(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("BEGIN")?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn commit(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch("COMMIT")?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn rollback(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                if !conn.is_autocommit() {
                    conn.execute_batch("ROLLBACK")?;
                }
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Source sites

    pub async fn active_news_urls(&self) -> Result<Vec<String>> {
        let urls = self
            .conn
            .call(|conn| {
                let mut stmt =
                    conn.prepare("SELECT news_url FROM client_table WHERE active_flag = 1 ORDER BY id")?;
                let urls = stmt
                    .query_map([], |row| row.get::<_, Option<String>>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(urls)
            })
            .await?;

        Ok(urls
            .into_iter()
            .flatten()
            .filter(|url| !url.trim().is_empty())
            .collect())
    }

    // Feed operations

    /// Inserts the feed unless its `rss_feed_url` is already known.
    /// Returns whether a row was written.
    pub async fn insert_feed_if_absent(&self, feed: NewFeedRecord) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM rss_info WHERE rss_feed_url = ?1",
                        params![feed.rss_feed_url],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_some() {
                    return Ok(false);
                }

                conn.execute(
                    r#"INSERT INTO rss_info (news_url, rss_feed, rss_category, rss_feed_url, updated_time_stamp)
                       VALUES (?1, ?2, ?3, ?4, datetime('now'))"#,
                    params![feed.news_url, feed.rss_feed, feed.rss_category, feed.rss_feed_url],
                )?;
                Ok(true)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn feeds_in_category(&self, category: &str) -> Result<Vec<FeedRecord>> {
        let category = category.to_string();
        let feeds = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, news_url, rss_feed, rss_category, rss_feed_url, updated_time_stamp
                       FROM rss_info
                       WHERE rss_category = ?1 AND rss_feed_url IS NOT NULL AND rss_feed_url != ''
                       ORDER BY id"#,
                )?;
                let feeds = stmt
                    .query_map(params![category], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    // News item operations

    /// Inserts the item unless its `title_url` is already known.
    /// Returns whether a row was written.
    pub async fn insert_news_item_if_absent(&self, item: NewNewsItem) -> Result<bool> {
        let inserted = self
            .conn
            .call(move |conn| {
                let existing: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM news_info WHERE title_url = ?1",
                        params![item.title_url],
                        |row| row.get(0),
                    )
                    .optional()?;
                if existing.is_some() {
                    return Ok(false);
                }

                conn.execute(
                    r#"INSERT INTO news_info (rss_feed_url, title_url, published_date, active_flag)
                       VALUES (?1, ?2, ?3, 1)"#,
                    params![item.rss_feed_url, item.title_url, item.published_date],
                )?;
                Ok(true)
            })
            .await?;
        Ok(inserted)
    }

    /// News items that have no sentiment row yet, oldest first.
    pub async fn unanalyzed_news_items(&self) -> Result<Vec<NewsItem>> {
        let items = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT n.id, n.rss_feed_url, n.title_url, n.published_date, n.active_flag
                       FROM news_info n
                       WHERE n.title_url IS NOT NULL AND n.title_url != ''
                         AND n.title_url NOT IN (
                             SELECT s.title_url FROM sentiment_results s WHERE s.title_url IS NOT NULL
                         )
                       ORDER BY n.id"#,
                )?;
                let items = stmt
                    .query_map([], news_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    // Sentiment results

    pub async fn insert_sentiment_result(&self, result: NewSentimentResult) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO sentiment_results (title_url, title, description, body, sentiment, sentiment_score)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![
                        result.title_url,
                        result.title,
                        result.description,
                        result.body,
                        result.sentiment.map(|s| s.label.as_str()),
                        result.sentiment.map(|s| f64::from(s.score)),
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }
}

#[cfg(test)]
impl Repository {
    pub async fn add_client_site(&self, news_url: &str, active: bool) -> Result<()> {
        let news_url = news_url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO client_table (news_url, active_flag) VALUES (?1, ?2)",
                    params![news_url, active as i64],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn execute_batch(&self, sql: &'static str) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute_batch(sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn count_rows(&self, table: &'static str) -> Result<i64> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }

    pub async fn all_feeds(&self) -> Result<Vec<FeedRecord>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, news_url, rss_feed, rss_category, rss_feed_url, updated_time_stamp FROM rss_info ORDER BY id",
                )?;
                let feeds = stmt
                    .query_map([], feed_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    pub async fn all_news_items(&self) -> Result<Vec<NewsItem>> {
        let items = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, rss_feed_url, title_url, published_date, active_flag FROM news_info ORDER BY id",
                )?;
                let items = stmt
                    .query_map([], news_item_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    pub async fn sentiment_results(&self) -> Result<Vec<crate::models::SentimentResult>> {
        let results = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT title_url, title, description, body, sentiment, sentiment_score FROM sentiment_results ORDER BY id",
                )?;
                let results = stmt
                    .query_map([], |row| {
                        Ok(crate::models::SentimentResult {
                            title_url: row.get(0)?,
                            title: row.get(1)?,
                            description: row.get(2)?,
                            body: row.get(3)?,
                            sentiment: row.get(4)?,
                            sentiment_score: row.get(5)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(results)
            })
            .await?;
        Ok(results)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // SQLite datetime('now') format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn feed_from_row(row: &Row) -> rusqlite::Result<FeedRecord> {
    Ok(FeedRecord {
        id: row.get(0)?,
        news_url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        rss_feed: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        rss_category: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        rss_feed_url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        updated_timestamp: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    })
}

fn news_item_from_row(row: &Row) -> rusqlite::Result<NewsItem> {
    Ok(NewsItem {
        id: row.get(0)?,
        rss_feed_url: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        title_url: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        published_date: row.get(3)?,
        active: row.get::<_, Option<i64>>(4)?.unwrap_or(0) != 0,
    })
}
