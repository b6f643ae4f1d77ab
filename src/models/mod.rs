mod feed;
mod sentiment;

pub use feed::{CategoryFeeds, FeedItems, FeedRecord, NewFeedRecord, NewNewsItem, NewsItem};
pub use sentiment::{ExtractedArticle, NewSentimentResult, Sentiment, SentimentLabel};
#[cfg(test)]
pub use sentiment::SentimentResult;
