use crate::ai::{analyze_sentiment, SentimentAnalyzer};
use crate::config::{ErrorPolicy, PipelineConfig};
use crate::db::Repository;
use crate::error::Result;
use crate::feed::{discover_feed, list_items, resolve_categories, resolve_url, Discovery, PageFetcher};
use crate::models::{NewFeedRecord, NewNewsItem, NewSentimentResult};
use crate::services::fetch_article;

/// Row counts and per-item failures from one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub feeds_inserted: usize,
    pub items_inserted: usize,
    pub results_inserted: usize,
    pub articles_skipped: usize,
    pub sentiment_failures: usize,
    pub item_errors: usize,
}

/// Discover feeds, list Top Stories items and score new articles, in that
/// order. Each stage commits before the next one reads its output.
pub struct Pipeline<F, S> {
    repository: Repository,
    fetcher: F,
    analyzer: S,
    config: PipelineConfig,
}

impl<F, S> Pipeline<F, S>
where
    F: PageFetcher,
    S: SentimentAnalyzer,
{
    pub fn new(repository: Repository, fetcher: F, analyzer: S, config: PipelineConfig) -> Self {
        Self {
            repository,
            fetcher,
            analyzer,
            config,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        self.repository.begin().await?;
        let outcome = self.discover_feeds(&mut summary).await;
        self.checkpoint(outcome).await?;
        tracing::info!("Table rss_info updated: {} new feeds", summary.feeds_inserted);

        self.repository.begin().await?;
        let outcome = self.list_news_items(&mut summary).await;
        self.checkpoint(outcome).await?;
        tracing::info!("Table news_info updated: {} new items", summary.items_inserted);

        self.repository.begin().await?;
        let outcome = self.analyze_articles(&mut summary).await;
        self.checkpoint(outcome).await?;
        tracing::info!(
            "Table sentiment_results updated: {} new results, {} skipped without description",
            summary.results_inserted,
            summary.articles_skipped
        );

        Ok(summary)
    }

    /// Close a stage's transaction: commit on success, roll back on error.
    async fn checkpoint(&self, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => {
                let committed = self.repository.commit().await;
                if committed.is_err() {
                    if let Err(rollback_err) = self.repository.rollback().await {
                        tracing::error!("Rollback after failed commit failed: {}", rollback_err);
                    }
                }
                committed
            }
            Err(e) => {
                if let Err(rollback_err) = self.repository.rollback().await {
                    tracing::error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    async fn discover_feeds(&self, summary: &mut RunSummary) -> Result<()> {
        for news_url in self.repository.active_news_urls().await? {
            let rss_feed = match discover_feed(&self.fetcher, &news_url).await {
                Discovery::Found(link) => link,
                Discovery::NotFound => {
                    tracing::info!("No RSS link found on {}", news_url);
                    continue;
                }
                Discovery::TransportError(e) => {
                    tracing::warn!("Could not fetch {}: {}", news_url, e);
                    continue;
                }
            };

            let index_url = resolve_url(&rss_feed, &news_url);
            let categories = match resolve_categories(&self.fetcher, &index_url).await {
                Ok(categories) => categories,
                Err(e) => {
                    tracing::error!("An error occurred resolving {}: {}", index_url, e);
                    continue;
                }
            };
            if categories.is_empty() {
                tracing::info!("No RSS categories listed at {}", index_url);
                continue;
            }
            tracing::debug!("{} categories listed at {}", categories.len(), index_url);

            for (category, feed_url) in categories.iter() {
                let record = NewFeedRecord {
                    news_url: news_url.clone(),
                    rss_feed: rss_feed.clone(),
                    rss_category: category.to_string(),
                    rss_feed_url: resolve_url(feed_url, &index_url),
                };
                if self.repository.insert_feed_if_absent(record).await? {
                    summary.feeds_inserted += 1;
                }
            }
        }
        Ok(())
    }

    async fn list_news_items(&self, summary: &mut RunSummary) -> Result<()> {
        for feed in self.repository.feeds_in_category(&self.config.category).await? {
            let items = match list_items(&self.fetcher, &feed.rss_feed_url).await {
                Ok(items) => items,
                Err(e) => match self.config.on_listing_error {
                    ErrorPolicy::Abort => {
                        tracing::error!("Listing {} failed, aborting: {}", feed.rss_feed_url, e);
                        return Err(e);
                    }
                    ErrorPolicy::Continue => {
                        tracing::warn!("Listing {} failed, skipping: {}", feed.rss_feed_url, e);
                        summary.item_errors += 1;
                        continue;
                    }
                },
            };
            if items.is_empty() {
                tracing::info!("Feed {} lists no items", feed.rss_feed_url);
                continue;
            }
            tracing::debug!(
                "{} items in feed #{} {} (from {}, discovered {})",
                items.len(),
                feed.id,
                feed.rss_feed_url,
                feed.news_url,
                feed.updated_timestamp
            );

            for (link, published) in items.iter() {
                let item = NewNewsItem {
                    rss_feed_url: feed.rss_feed_url.clone(),
                    title_url: link.to_string(),
                    published_date: published.to_string(),
                };
                if self.repository.insert_news_item_if_absent(item).await? {
                    summary.items_inserted += 1;
                }
            }
        }
        Ok(())
    }

    async fn analyze_articles(&self, summary: &mut RunSummary) -> Result<()> {
        for item in self.repository.unanalyzed_news_items().await? {
            tracing::debug!(
                "Analyzing item #{} {} (published {}, active: {})",
                item.id,
                item.title_url,
                item.published_date.as_deref().unwrap_or("unknown"),
                item.active
            );
            let article = match fetch_article(&self.fetcher, &item.title_url).await {
                Ok(article) => article,
                Err(e) => match self.config.on_article_error {
                    ErrorPolicy::Abort => {
                        tracing::error!("Fetching {} failed, aborting: {}", item.title_url, e);
                        return Err(e);
                    }
                    ErrorPolicy::Continue => {
                        tracing::warn!("Fetching {} failed, skipping: {}", item.title_url, e);
                        summary.item_errors += 1;
                        continue;
                    }
                },
            };

            let Some(description) = article.description() else {
                tracing::debug!("No description for {}, skipping", item.title_url);
                summary.articles_skipped += 1;
                continue;
            };

            let sentiment = analyze_sentiment(&self.analyzer, description).await;
            if sentiment.is_none() {
                summary.sentiment_failures += 1;
            }

            self.repository
                .insert_sentiment_result(NewSentimentResult {
                    title_url: item.title_url.clone(),
                    title: article.title.clone(),
                    description: description.to_string(),
                    body: article.cleaned_body.clone(),
                    sentiment,
                })
                .await?;
            summary.results_inserted += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockAnalyzer, MockFetcher};
    use crate::models::SentimentLabel;

    const SITE: &str = "https://news.example";

    const HOMEPAGE: &str = r#"<html><body>
        <a href="/x">Home</a>
        <a href="/rss/tech">Tech</a>
        <a href="/rss/world">World</a>
        <a href="/rss">All feeds</a>
    </body></html>"#;

    const FEED_INDEX: &str = r#"<html><body>
        <a href="/rss/top.xml">Top Stories</a>
        <a href="https://news.example/rss/sport.xml">Sport</a>
    </body></html>"#;

    const TOP_FEED: &str = r#"<rss><channel>
        <item><guid>https://news.example/a</guid><pubDate>Mon</pubDate></item>
        <item><guid>https://news.example/b</guid><pubDate>Tue</pubDate></item>
        <item><guid>https://news.example/c</guid><pubDate>Wed</pubDate></item>
    </channel></rss>"#;

    fn article(description: Option<&str>) -> String {
        let meta = description
            .map(|d| format!(r#"<meta name="description" content="{d}">"#))
            .unwrap_or_default();
        format!(
            "<html><head><title>Story</title>{meta}</head><body><article><p>Body text</p></article></body></html>"
        )
    }

    fn site_fetcher() -> MockFetcher {
        let fetcher = MockFetcher::new();
        fetcher.add_page(SITE, HOMEPAGE);
        fetcher.add_page("https://news.example/rss", FEED_INDEX);
        fetcher.add_page("https://news.example/rss/top.xml", TOP_FEED);
        fetcher.add_page("https://news.example/a", &article(Some("Good news")));
        fetcher.add_page("https://news.example/b", &article(None));
        fetcher.add_page("https://news.example/c", &article(Some("More news")));
        fetcher
    }

    async fn seeded_repository() -> Repository {
        let repository = Repository::open_in_memory().await.unwrap();
        repository.add_client_site(SITE, true).await.unwrap();
        repository
    }

    #[tokio::test]
    async fn full_run_populates_all_tables() {
        let pipeline = Pipeline::new(
            seeded_repository().await,
            site_fetcher(),
            MockAnalyzer::returning(SentimentLabel::Positive, 0.91),
            PipelineConfig::default(),
        );

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.feeds_inserted, 2);
        assert_eq!(summary.items_inserted, 3);
        assert_eq!(summary.results_inserted, 2);
        assert_eq!(summary.articles_skipped, 1);

        let feeds = pipeline.repository.all_feeds().await.unwrap();
        assert_eq!(feeds[0].rss_feed, "/rss");
        assert_eq!(feeds[0].rss_category, "Top Stories");
        assert_eq!(feeds[0].rss_feed_url, "https://news.example/rss/top.xml");

        let items = pipeline.repository.all_news_items().await.unwrap();
        assert_eq!(items[0].published_date.as_deref(), Some("Mon"));

        let results = pipeline.repository.sentiment_results().await.unwrap();
        let urls: Vec<_> = results.iter().map(|r| r.title_url.as_str()).collect();
        assert_eq!(urls, vec!["https://news.example/a", "https://news.example/c"]);
        assert_eq!(results[0].description.as_deref(), Some("Good news"));
        assert_eq!(results[0].sentiment.as_deref(), Some("POSITIVE"));
        assert!(results[0].body.as_deref().unwrap().contains("Body text"));
    }

    #[tokio::test]
    async fn second_run_inserts_nothing() {
        let pipeline = Pipeline::new(
            seeded_repository().await,
            site_fetcher(),
            MockAnalyzer::returning(SentimentLabel::Neutral, 0.6),
            PipelineConfig::default(),
        );

        pipeline.run().await.unwrap();
        let again = pipeline.run().await.unwrap();

        assert_eq!(again.feeds_inserted, 0);
        assert_eq!(again.items_inserted, 0);
        assert_eq!(again.results_inserted, 0);
        assert_eq!(pipeline.repository.count_rows("rss_info").await.unwrap(), 2);
        assert_eq!(pipeline.repository.count_rows("news_info").await.unwrap(), 3);
        assert_eq!(pipeline.repository.count_rows("sentiment_results").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sentiment_failure_still_stores_article() {
        let analyzer = MockAnalyzer::failing("transport error");
        let pipeline = Pipeline::new(
            seeded_repository().await,
            site_fetcher(),
            analyzer,
            PipelineConfig::default(),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.results_inserted, 2);
        assert_eq!(summary.sentiment_failures, 2);

        let results = pipeline.repository.sentiment_results().await.unwrap();
        assert!(results
            .iter()
            .all(|r| r.sentiment.is_none() && r.sentiment_score.is_none()));
        assert_eq!(results[0].title.as_deref(), Some("Story"));
    }

    #[tokio::test]
    async fn articles_without_description_are_never_scored() {
        let fetcher = site_fetcher();
        let pipeline = Pipeline::new(
            seeded_repository().await,
            fetcher.clone(),
            MockAnalyzer::returning(SentimentLabel::Mixed, 0.5),
            PipelineConfig::default(),
        );

        pipeline.run().await.unwrap();

        assert_eq!(pipeline.analyzer.calls(), 2);
        let requests = fetcher.requests();
        assert!(requests.contains(&"https://news.example/b".to_string()));
    }

    #[tokio::test]
    async fn broken_feed_aborts_by_default_and_rolls_back() {
        let fetcher = site_fetcher();
        fetcher.add_page("https://news.example/rss/top.xml", "<rss><channel><item><pubDate>Mon</pubDate></item></channel></rss>");
        let pipeline = Pipeline::new(
            seeded_repository().await,
            fetcher,
            MockAnalyzer::returning(SentimentLabel::Positive, 0.9),
            PipelineConfig::default(),
        );

        assert!(pipeline.run().await.is_err());
        // Discovery committed before listing started.
        assert_eq!(pipeline.repository.count_rows("rss_info").await.unwrap(), 2);
        assert_eq!(pipeline.repository.count_rows("news_info").await.unwrap(), 0);
        assert_eq!(pipeline.repository.count_rows("sentiment_results").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn broken_feed_is_skipped_when_configured() {
        let fetcher = site_fetcher();
        fetcher.add_unreachable("https://news.example/rss/top.xml");
        let config = PipelineConfig {
            on_listing_error: ErrorPolicy::Continue,
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(
            seeded_repository().await,
            fetcher,
            MockAnalyzer::returning(SentimentLabel::Positive, 0.9),
            config,
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.item_errors, 1);
        assert_eq!(summary.items_inserted, 0);
    }

    #[tokio::test]
    async fn unreachable_article_is_skipped_and_retried_next_run() {
        let fetcher = site_fetcher();
        fetcher.remove_page("https://news.example/c");
        let pipeline = Pipeline::new(
            seeded_repository().await,
            fetcher.clone(),
            MockAnalyzer::returning(SentimentLabel::Positive, 0.9),
            PipelineConfig::default(),
        );

        let first = pipeline.run().await.unwrap();
        assert_eq!(first.results_inserted, 1);
        assert_eq!(first.item_errors, 1);

        fetcher.add_page("https://news.example/c", &article(Some("Back online")));
        let second = pipeline.run().await.unwrap();
        assert_eq!(second.results_inserted, 1);
    }

    #[tokio::test]
    async fn unreachable_site_is_logged_and_skipped() {
        let repository = seeded_repository().await;
        repository.add_client_site("https://down.example", true).await.unwrap();
        repository.add_client_site("https://inactive.example", false).await.unwrap();
        let fetcher = site_fetcher();
        let pipeline = Pipeline::new(
            repository,
            fetcher.clone(),
            MockAnalyzer::returning(SentimentLabel::Positive, 0.9),
            PipelineConfig::default(),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.feeds_inserted, 2);
        assert!(!fetcher
            .requests()
            .contains(&"https://inactive.example".to_string()));
    }

    #[tokio::test]
    async fn only_configured_category_is_listed() {
        let fetcher = site_fetcher();
        let config = PipelineConfig {
            category: "Sport".to_string(),
            ..PipelineConfig::default()
        };
        let pipeline = Pipeline::new(
            seeded_repository().await,
            fetcher.clone(),
            MockAnalyzer::returning(SentimentLabel::Positive, 0.9),
            config,
        );

        // The sport feed answers 404, which lists nothing without aborting.
        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.items_inserted, 0);
        assert_eq!(summary.item_errors, 0);
        let requests = fetcher.requests();
        assert!(requests.contains(&"https://news.example/rss/sport.xml".to_string()));
        assert!(!requests.contains(&"https://news.example/rss/top.xml".to_string()));
    }

    #[tokio::test]
    async fn dead_feed_does_not_stop_healthy_feeds() {
        let repository = Repository::open_in_memory().await.unwrap();
        repository.add_client_site("https://a.example", true).await.unwrap();
        repository.add_client_site("https://b.example", true).await.unwrap();

        let fetcher = MockFetcher::new();
        // a.example lists a Top Stories feed that answers 404.
        fetcher.add_page("https://a.example", r#"<a href="/rss">RSS</a>"#);
        fetcher.add_page(
            "https://a.example/rss",
            r#"<a href="/rss/top.xml">Top Stories</a>"#,
        );
        fetcher.add_page("https://b.example", r#"<a href="/rss">RSS</a>"#);
        fetcher.add_page(
            "https://b.example/rss",
            r#"<a href="/rss/top.xml">Top Stories</a>"#,
        );
        fetcher.add_page(
            "https://b.example/rss/top.xml",
            "<rss><channel><item><guid>https://b.example/story</guid><pubDate>Thu</pubDate></item></channel></rss>",
        );
        fetcher.add_page("https://b.example/story", &article(Some("Fine")));

        let pipeline = Pipeline::new(
            repository,
            fetcher.clone(),
            MockAnalyzer::returning(SentimentLabel::Positive, 0.8),
            PipelineConfig::default(),
        );

        let summary = pipeline.run().await.unwrap();

        assert_eq!(summary.feeds_inserted, 2);
        assert_eq!(summary.items_inserted, 1);
        assert_eq!(summary.results_inserted, 1);
        assert!(fetcher
            .requests()
            .contains(&"https://a.example/rss/top.xml".to_string()));
        let items = pipeline.repository.all_news_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title_url, "https://b.example/story");
        let results = pipeline.repository.sentiment_results().await.unwrap();
        assert_eq!(results[0].title_url, "https://b.example/story");
    }

    #[tokio::test]
    async fn index_with_bare_rss_anchor_is_skipped() {
        let fetcher = site_fetcher();
        fetcher.add_page(
            "https://news.example/rss",
            r#"<a href="/rss/top.xml">Top Stories</a><a>RSS help</a>"#,
        );
        let pipeline = Pipeline::new(
            seeded_repository().await,
            fetcher,
            MockAnalyzer::returning(SentimentLabel::Positive, 0.9),
            PipelineConfig::default(),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.feeds_inserted, 0);
        assert_eq!(pipeline.repository.count_rows("rss_info").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_commit_leaves_no_open_transaction() {
        let pipeline = Pipeline::new(
            seeded_repository().await,
            site_fetcher(),
            MockAnalyzer::returning(SentimentLabel::Positive, 0.9),
            PipelineConfig::default(),
        );
        // A deferred foreign key is only checked at COMMIT, so the commit fails
        // and leaves the transaction active.
        pipeline
            .repository
            .execute_batch(
                "PRAGMA foreign_keys = ON;
                 CREATE TEMP TABLE parent (id INTEGER PRIMARY KEY);
                 CREATE TEMP TABLE child (
                     parent_id INTEGER REFERENCES parent (id) DEFERRABLE INITIALLY DEFERRED
                 );",
            )
            .await
            .unwrap();
        pipeline.repository.begin().await.unwrap();
        pipeline
            .repository
            .execute_batch("INSERT INTO child (parent_id) VALUES (1)")
            .await
            .unwrap();

        assert!(pipeline.checkpoint(Ok(())).await.is_err());

        // The next stage can open its own transaction.
        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.feeds_inserted, 2);
        assert_eq!(pipeline.repository.count_rows("child").await.unwrap(), 0);
    }
}
