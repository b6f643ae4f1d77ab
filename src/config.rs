use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

const APP_DIR: &str = "news-sentiment";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub aws: AwsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Credentials for the Comprehend session. Empty keys fall back to the
/// standard AWS credential chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub secret_access_key: String,

    #[serde(default = "default_region")]
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Only feeds filed under this category are listed.
    #[serde(default = "default_category")]
    pub category: String,

    #[serde(default = "default_listing_policy")]
    pub on_listing_error: ErrorPolicy,

    #[serde(default = "default_article_policy")]
    pub on_article_error: ErrorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// No timeout when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

/// What a stage does when a single feed or article fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    Abort,
    Continue,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir
        .join("sentiment_analysis.db")
        .to_string_lossy()
        .to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_category() -> String {
    "Top Stories".to_string()
}

fn default_listing_policy() -> ErrorPolicy {
    ErrorPolicy::Abort
}

fn default_article_policy() -> ErrorPolicy {
    ErrorPolicy::Continue
}

fn default_user_agent() -> String {
    concat!("news-sentiment/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: default_region(),
        }
    }
}

impl AwsConfig {
    pub fn has_static_credentials(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.is_empty()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            category: default_category(),
            on_listing_error: default_listing_policy(),
            on_article_error: default_article_policy(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: None,
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

impl Config {
    /// Loads the config at `path` (or the default location), writing a
    /// default file first if none exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::config_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default configuration to {:?}", config_path);
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    fn validate(&self) -> Result<()> {
        if self.http.max_attempts == 0 {
            return Err(AppError::Config(
                "http.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.pipeline.category.trim().is_empty() {
            return Err(AppError::Config(
                "pipeline.category must not be empty".to_string(),
            ));
        }
        if self.aws.access_key_id.is_empty() != self.aws.secret_access_key.is_empty() {
            return Err(AppError::Config(
                "aws.access_key_id and aws.secret_access_key must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
