use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_comprehend::config::{Credentials, Region};
use aws_sdk_comprehend::error::DisplayErrorContext;
use aws_sdk_comprehend::types::{LanguageCode, SentimentType};
use aws_sdk_comprehend::Client;

use crate::config::AwsConfig;
use crate::error::{AppError, Result};
use crate::models::{Sentiment, SentimentLabel};

/// DetectSentiment rejects documents over 5000 bytes of UTF-8.
const MAX_TEXT_BYTES: usize = 5000;

/// Classifies a piece of English text.
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn detect_sentiment(&self, text: &str) -> Result<Sentiment>;
}

pub struct ComprehendAnalyzer {
    client: Client,
}

impl ComprehendAnalyzer {
    pub async fn new(config: &AwsConfig) -> Self {
        let region = Region::new(config.region.clone());

        let client = if config.has_static_credentials() {
            let creds = Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None,
                None,
                "news-sentiment",
            );
            let comprehend_config = aws_sdk_comprehend::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(creds)
                .build();
            Client::from_conf(comprehend_config)
        } else {
            tracing::info!("No AWS keys configured, using the default credential chain");
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            Client::new(&shared)
        };

        Self { client }
    }
}

#[async_trait]
impl SentimentAnalyzer for ComprehendAnalyzer {
    async fn detect_sentiment(&self, text: &str) -> Result<Sentiment> {
        let output = self
            .client
            .detect_sentiment()
            .text(truncate_to_bytes(text, MAX_TEXT_BYTES))
            .language_code(LanguageCode::En)
            .send()
            .await
            .map_err(|e| AppError::Sentiment(DisplayErrorContext(&e).to_string()))?;

        let sentiment = output
            .sentiment()
            .ok_or_else(|| AppError::Sentiment("response has no sentiment".to_string()))?;
        let scores = output
            .sentiment_score()
            .ok_or_else(|| AppError::Sentiment("response has no sentiment scores".to_string()))?;

        let (label, score) = match sentiment {
            SentimentType::Positive => (SentimentLabel::Positive, scores.positive()),
            SentimentType::Negative => (SentimentLabel::Negative, scores.negative()),
            SentimentType::Neutral => (SentimentLabel::Neutral, scores.neutral()),
            SentimentType::Mixed => (SentimentLabel::Mixed, scores.mixed()),
            other => {
                return Err(AppError::Sentiment(format!(
                    "unrecognised sentiment {}",
                    other.as_str()
                )))
            }
        };

        let score = score
            .ok_or_else(|| AppError::Sentiment(format!("no score for {label}")))?;

        Ok(Sentiment { label, score })
    }
}

/// Score `description`, or `None` when there is nothing to score or the
/// service call fails.
pub async fn analyze_sentiment<S>(analyzer: &S, description: &str) -> Option<Sentiment>
where
    S: SentimentAnalyzer + ?Sized,
{
    if description.trim().is_empty() {
        return None;
    }

    match analyzer.detect_sentiment(description).await {
        Ok(sentiment) => Some(sentiment),
        Err(e) => {
            tracing::error!("Error analyzing sentiment: {}", e);
            None
        }
    }
}

fn truncate_to_bytes(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
