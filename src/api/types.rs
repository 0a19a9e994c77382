use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ollama_available: bool,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub confidence_threshold: Option<u32>,
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub classification_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadOut {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub keyword_count: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOut {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub total_keywords: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "pending")]
    Submitted,
    #[serde(alias = "processing")]
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub keyword: String,
    #[serde(default)]
    pub accepted: bool,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: u64,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub percentage: Option<f64>,
    #[serde(default)]
    pub time_remaining: Option<f64>,
    #[serde(default)]
    pub current_result: Option<ItemSummary>,
    #[serde(default)]
    pub current_keyword: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn percent(&self) -> f64 {
        if let Some(p) = self.percentage {
            return p;
        }
        if self.total == 0 {
            0.0
        } else {
            self.progress as f64 * 100.0 / self.total as f64
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub accepted: u64,
    #[serde(default)]
    pub rejected: u64,
    #[serde(default)]
    pub acceptance_rate: f64,
    #[serde(default)]
    pub category_breakdown: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub status: Option<String>,
    pub statistics: Statistics,
    pub accepted_file: String,
    pub rejected_file: String,
}
