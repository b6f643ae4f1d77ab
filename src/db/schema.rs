pub const SCHEMA: &str = r#"
-- client_table: sites to monitor, maintained outside this tool
CREATE TABLE IF NOT EXISTS client_table (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    news_url TEXT,
    active_flag INTEGER NOT NULL DEFAULT 1
);

-- rss_info: one row per (site, category) feed
CREATE TABLE IF NOT EXISTS rss_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    news_url TEXT,
    rss_feed TEXT,
    rss_category TEXT,
    rss_feed_url TEXT,
    updated_time_stamp TEXT,
    UNIQUE(rss_feed_url)
);

CREATE INDEX IF NOT EXISTS idx_rss_info_category ON rss_info(rss_category);

-- news_info: article links harvested from category feeds
CREATE TABLE IF NOT EXISTS news_info (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rss_feed_url TEXT,
    title_url TEXT,
    published_date TEXT,
    active_flag INTEGER,
    UNIQUE(title_url)
);

-- sentiment_results: a row marks the article as processed
CREATE TABLE IF NOT EXISTS sentiment_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title_url TEXT,
    title TEXT,
    description TEXT,
    body TEXT,
    sentiment TEXT,
    sentiment_score REAL
);

CREATE INDEX IF NOT EXISTS idx_sentiment_results_title_url ON sentiment_results(title_url);
"#;
