//! Test doubles for the network-facing traits.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ai::SentimentAnalyzer;
use crate::error::{AppError, Result};
use crate::feed::PageFetcher;
use crate::models::{Sentiment, SentimentLabel};

/// Serves canned pages. URLs marked unreachable fail as a transport error;
/// any other URL answers 404.
#[derive(Clone, Default)]
pub struct MockFetcher {
    pages: Arc<Mutex<HashMap<String, String>>>,
    unreachable: Arc<Mutex<HashSet<String>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_string());
    }

    pub fn remove_page(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    pub fn add_unreachable(&self, url: &str) {
        self.unreachable.lock().unwrap().insert(url.to_string());
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.unreachable.lock().unwrap().contains(url) {
            return Err(anyhow::anyhow!("connection refused: {url}").into());
        }
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Returns a fixed sentiment, or a fixed error, and counts calls.
pub struct MockAnalyzer {
    outcome: std::result::Result<Sentiment, String>,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn returning(label: SentimentLabel, score: f32) -> Self {
        Self {
            outcome: Ok(Sentiment { label, score }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentimentAnalyzer for MockAnalyzer {
    async fn detect_sentiment(&self, _text: &str) -> Result<Sentiment> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone().map_err(AppError::Sentiment)
    }
}
