#![allow(dead_code)]

use async_trait::async_trait;
use keyword_client::{
    api::{
        Backend, ClassificationResult, Health, JobSnapshot, JobStatus, Settings, Statistics,
        SubmitOut, UploadOut,
    },
    categories::CategorySet,
    error::TransportError,
    poll_policy::PollPolicy,
    request::{ClassificationRequest, InputSource, ProcessBody},
};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Backend double with scripted progress responses and a call log.
#[derive(Default)]
pub struct FakeBackend {
    pub progress_script: Mutex<VecDeque<Result<JobSnapshot, TransportError>>>,
    pub submit_reply: Mutex<Option<Result<SubmitOut, TransportError>>>,
    pub settings_reply: Mutex<Option<Result<Settings, TransportError>>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn with_progress(script: Vec<Result<JobSnapshot, TransportError>>) -> Self {
        let fake = Self::default();
        *fake.progress_script.lock().unwrap() = script.into();
        fake
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn health(&self) -> Result<Health, TransportError> {
        self.log("health".into());
        Ok(Health {
            status: Some("ok".into()),
            ollama_available: true,
            models: vec!["llama3.1:8b".into()],
        })
    }

    async fn settings(&self) -> Result<Settings, TransportError> {
        self.log("settings".into());
        self.settings_reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| Err(unavailable()))
    }

    async fn upload(&self, path: &Path) -> Result<UploadOut, TransportError> {
        self.log(format!("upload {}", path.display()));
        Ok(UploadOut {
            success: true,
            filepath: Some("../uploads/abc_keywords.csv".into()),
            filename: Some("abc_keywords.csv".into()),
            keyword_count: Some(2),
            message: None,
            error: None,
        })
    }

    async fn submit(&self, body: &ProcessBody<'_>) -> Result<SubmitOut, TransportError> {
        self.log(format!("submit {}", body.topic));
        self.submit_reply.lock().unwrap().take().unwrap_or_else(|| {
            Ok(SubmitOut {
                success: true,
                job_id: Some("job-1".into()),
                total_keywords: Some(10),
                error: None,
            })
        })
    }

    async fn progress(&self, job_id: &str) -> Result<JobSnapshot, TransportError> {
        self.log(format!("progress {job_id}"));
        self.progress_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot(JobStatus::Running, 0, 10)))
    }

    async fn results(&self, job_id: &str) -> Result<ClassificationResult, TransportError> {
        self.log(format!("results {job_id}"));
        Ok(sample_result())
    }

    async fn download(&self, filename: &str) -> Result<Vec<u8>, TransportError> {
        self.log(format!("download {filename}"));
        Ok(b"title,views\n".to_vec())
    }
}

pub fn unavailable() -> TransportError {
    TransportError::Status {
        status: 503,
        message: "unavailable".into(),
    }
}

pub fn snapshot(status: JobStatus, progress: u64, total: u64) -> JobSnapshot {
    JobSnapshot {
        status,
        progress,
        total,
        percentage: None,
        time_remaining: None,
        current_result: None,
        current_keyword: None,
        error: None,
    }
}

pub fn sample_result() -> ClassificationResult {
    let mut breakdown = BTreeMap::new();
    breakdown.insert("how-to".to_string(), 50);
    breakdown.insert("comparison".to_string(), 30);
    ClassificationResult {
        status: Some("completed".into()),
        statistics: Statistics {
            total: 100,
            accepted: 80,
            rejected: 20,
            acceptance_rate: 80.0,
            category_breakdown: breakdown,
        },
        accepted_file: "..\\outputs\\accepted_keywords_20240101_120000.csv".into(),
        rejected_file: "../outputs/rejected_keywords_20240101_120000.csv".into(),
    }
}

pub fn request() -> ClassificationRequest {
    ClassificationRequest {
        topic: "Ys video game series".into(),
        confidence_threshold: 75,
        categories: CategorySet::from_labels(["how-to", "comparison"]).unwrap(),
        classification_prompt: "classify {keyword}".into(),
        input: Some(InputSource::Inline {
            keywords: "ys origin walkthrough\nys 8 vs ys 9".into(),
        }),
    }
}

pub fn fast_policy(max_errors: u32) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(1),
        retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(4),
        multiplier: 2.0,
        max_consecutive_errors: max_errors,
    }
}
