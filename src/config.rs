use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CLASSIFICATION_PROMPT: &str = r#"You are a keyword analyzer. Analyze the keyword and determine BOTH its relevance to the topic AND its category.

Topic: {topic}
Keyword: "{keyword}"

Available Categories:
{categories}

Task:
1. Determine if the keyword is relevant to the topic (consider direct matches, synonyms, context)
2. If relevant, classify it into the most appropriate category
3. Provide confidence scores (0-100) for both decisions

Respond ONLY with a JSON object in this EXACT format (no other text):
{{"relevant": true/false, "relevance_confidence": 0-100, "category": "category-name", "category_confidence": 0-100}}

If not relevant, set category to "none" and category_confidence to 0."#;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub polling: Polling,
    #[serde(default)]
    pub upload: Upload,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub console: Console,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Backend {
    pub base_url: String,
    pub request_timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
}
impl Default for Backend {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".into(),
            request_timeout_seconds: 30,
            connect_timeout_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Polling {
    pub interval_ms: u64,
    pub retry_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_retry_delay_ms: u64,
    /// 0 retries forever.
    pub max_consecutive_errors: u32,
}
impl Default for Polling {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            retry_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_retry_delay_ms: 30_000,
            max_consecutive_errors: 20,
        }
    }
}

impl Polling {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.max(1))
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Upload {
    pub max_file_bytes: u64,
    pub allowed_extension: String,
    pub required_columns: Vec<String>,
}
impl Default for Upload {
    fn default() -> Self {
        Self {
            max_file_bytes: 50 * 1024 * 1024,
            allowed_extension: "csv".into(),
            required_columns: vec!["title".into(), "views".into(), "views_per_year".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub confidence_threshold: u32,
    pub categories: Vec<String>,
    pub classification_prompt: String,
}
impl Default for Defaults {
    fn default() -> Self {
        Self {
            confidence_threshold: 75,
            categories: vec![
                "how-to".into(),
                "comparison".into(),
                "walkthrough".into(),
                "informational".into(),
                "transactional".into(),
            ],
            classification_prompt: DEFAULT_CLASSIFICATION_PROMPT.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Console {
    pub enhanced: bool,
    pub max_lines: usize,
}
impl Default for Console {
    fn default() -> Self {
        Self {
            enhanced: true,
            max_lines: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub download_dir: String,
    pub download_artifacts: bool,
    pub write_summary_json: bool,
    pub summary_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            download_dir: "out".into(),
            download_artifacts: true,
            write_summary_json: true,
            summary_filename: "summary.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
