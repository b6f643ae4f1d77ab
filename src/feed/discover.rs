use scraper::{Html, Selector};

use crate::error::AppError;

use super::fetcher::PageFetcher;

/// Outcome of looking for a feed link on a site's homepage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(String),
    NotFound,
    TransportError(String),
}

/// Fetch `site_url` and return its feed link, if any.
///
/// A site that answers with an error status has no feed to offer; only a
/// failure to get any answer is a transport error.
pub async fn discover_feed<F>(fetcher: &F, site_url: &str) -> Discovery
where
    F: PageFetcher + ?Sized,
{
    match fetcher.fetch_text(site_url).await {
        Ok(html) => match find_rss_link(&html) {
            Some(href) => Discovery::Found(href),
            None => Discovery::NotFound,
        },
        Err(AppError::Status { status, .. }) => {
            tracing::warn!("{} answered HTTP {}, treating as no feed", site_url, status);
            Discovery::NotFound
        }
        Err(e) => Discovery::TransportError(e.to_string()),
    }
}

/// Scan every element with an `href` in document order and keep the last
/// one whose target contains "rss".
pub fn find_rss_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("[href]").ok()?;

    let mut rss_link = None;
    for element in document.select(&selector) {
        if let Some(href) = element.value().attr("href") {
            if href.contains("rss") {
                rss_link = Some(href.to_string());
            }
        }
    }
    rss_link
}
