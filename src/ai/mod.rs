mod sentiment;

pub use sentiment::{analyze_sentiment, ComprehendAnalyzer, SentimentAnalyzer};
