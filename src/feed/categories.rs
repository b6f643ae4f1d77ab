use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::CategoryFeeds;

use super::fetcher::PageFetcher;

/// Fetch a feed index page and map each category label to its feed URL.
pub async fn resolve_categories<F>(fetcher: &F, url: &str) -> Result<CategoryFeeds>
where
    F: PageFetcher + ?Sized,
{
    let html = fetcher.fetch_text(url).await?;
    extract_category_feeds(&html)
}

/// Collect anchors whose href contains "rss" or whose text mentions it
/// (case-insensitively), keyed by trimmed anchor text.
///
/// An RSS anchor with no href makes the whole page unusable.
pub fn extract_category_feeds(html: &str) -> Result<CategoryFeeds> {
    let document = Html::parse_document(html);
    let mut feeds = CategoryFeeds::new();

    let Ok(selector) = Selector::parse("a") else {
        return Ok(feeds);
    };

    for anchor in document.select(&selector) {
        let text = anchor.text().collect::<String>();
        let href = anchor.value().attr("href");

        let mentions_rss = href.is_some_and(|h| h.contains("rss"))
            || text.to_lowercase().contains("rss");
        if !mentions_rss {
            continue;
        }

        let href = href.ok_or_else(|| {
            AppError::Feed(format!("RSS anchor {:?} has no href", text.trim()))
        })?;
        feeds.insert(text.trim().to_string(), href.to_string());
    }

    Ok(feeds)
}
