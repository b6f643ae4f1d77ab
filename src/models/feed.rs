use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discovered (site, category) feed, as stored in `rss_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedRecord {
    pub id: i64,
    pub news_url: String,
    pub rss_feed: String,
    pub rss_category: String,
    pub rss_feed_url: String,
    pub updated_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedRecord {
    pub news_url: String,
    pub rss_feed: String,
    pub rss_category: String,
    pub rss_feed_url: String,
}

/// One article link harvested from a feed, as stored in `news_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub rss_feed_url: String,
    pub title_url: String,
    pub published_date: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct NewNewsItem {
    pub rss_feed_url: String,
    pub title_url: String,
    pub published_date: String,
}

/// Category labels and their feed URLs, kept as two parallel sequences.
///
/// Labels are unique. Inserting an existing label replaces its URL but keeps
/// the label's original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFeeds {
    pub categories: Vec<String>,
    pub feed_urls: Vec<String>,
    positions: HashMap<String, usize>,
}

impl CategoryFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category: String, feed_url: String) {
        match self.positions.get(&category) {
            Some(&idx) => self.feed_urls[idx] = feed_url,
            None => {
                self.positions.insert(category.clone(), self.categories.len());
                self.categories.push(category);
                self.feed_urls.push(feed_url);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.categories
            .iter()
            .map(String::as_str)
            .zip(self.feed_urls.iter().map(String::as_str))
    }
}

/// Item links and publish dates from one feed document, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItems {
    pub links: Vec<String>,
    pub dates: Vec<String>,
}

impl FeedItems {
    pub fn push(&mut self, link: String, date: String) {
        self.links.push(link);
        self.dates.push(date);
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links
            .iter()
            .map(String::as_str)
            .zip(self.dates.iter().map(String::as_str))
    }
}
