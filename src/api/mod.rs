pub mod http;
pub mod types;

use crate::{error::TransportError, request::ProcessBody};
use async_trait::async_trait;
use std::path::Path;

pub use http::HttpBackend;
pub use types::{
    ClassificationResult, Health, ItemSummary, JobSnapshot, JobStatus, Settings, Statistics,
    SubmitOut, UploadOut,
};

#[async_trait]
pub trait Backend: Send + Sync {
    async fn health(&self) -> Result<Health, TransportError>;
    async fn settings(&self) -> Result<Settings, TransportError>;
    async fn upload(&self, path: &Path) -> Result<UploadOut, TransportError>;
    async fn submit(&self, body: &ProcessBody<'_>) -> Result<SubmitOut, TransportError>;
    async fn progress(&self, job_id: &str) -> Result<JobSnapshot, TransportError>;
    async fn results(&self, job_id: &str) -> Result<ClassificationResult, TransportError>;
    async fn download(&self, filename: &str) -> Result<Vec<u8>, TransportError>;
}
