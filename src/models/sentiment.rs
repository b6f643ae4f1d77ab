use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
            SentimentLabel::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The winning label and the classifier's confidence in it, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f32,
}

/// Readable parts of an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub cleaned_body: String,
}

impl ExtractedArticle {
    /// The description, if there is one worth analysing.
    pub fn description(&self) -> Option<&str> {
        self.meta_description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewSentimentResult {
    pub title_url: String,
    pub title: Option<String>,
    pub description: String,
    pub body: String,
    pub sentiment: Option<Sentiment>,
}

/// A stored row of `sentiment_results`; only read back by tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct SentimentResult {
    pub title_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub sentiment: Option<String>,
    pub sentiment_score: Option<f64>,
}
