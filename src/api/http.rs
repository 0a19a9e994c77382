use super::{types::*, Backend};
use crate::{config::Config, error::TransportError, request::ProcessBody};
use async_trait::async_trait;
use reqwest::{multipart, Url};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(cfg: &Config) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.backend.request_timeout_seconds))
            .connect_timeout(Duration::from_secs(cfg.backend.connect_timeout_seconds))
            .build()?;
        Self::with_client(client, &cfg.backend.base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, TransportError> {
        let base_url = parse_base_url(base_url)?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, TransportError> {
        let url = self.endpoint(segments)?;
        debug!("GET {url}");
        let response = self.client.get(url).send().await?;
        parse_response(response).await
    }
}

/// Accepts `host:port/api` as well as full URLs.
pub fn parse_base_url(raw: &str) -> Result<Url, TransportError> {
    let raw = raw.trim();
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };
    let url = Url::parse(&with_scheme).map_err(|e| TransportError::InvalidUrl(format!("{raw}: {e}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(TransportError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<Health, TransportError> {
        self.get_json(&["health"]).await
    }

    async fn settings(&self) -> Result<Settings, TransportError> {
        self.get_json(&["settings"]).await
    }

    async fn upload(&self, path: &Path) -> Result<UploadOut, TransportError> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| TransportError::Rejected(format!("read {}: {e}", path.display())))?;
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);

        let url = self.endpoint(&["upload"])?;
        debug!("POST {url} (multipart)");
        let response = self.client.post(url).multipart(form).send().await?;
        let out: UploadOut = parse_response(response).await?;
        if !out.success {
            return Err(TransportError::Rejected(
                out.error.unwrap_or_else(|| "upload failed".to_string()),
            ));
        }
        Ok(out)
    }

    async fn submit(&self, body: &ProcessBody<'_>) -> Result<SubmitOut, TransportError> {
        let url = self.endpoint(&["process"])?;
        debug!("POST {url}");
        let response = self.client.post(url).json(body).send().await?;
        parse_response(response).await
    }

    async fn progress(&self, job_id: &str) -> Result<JobSnapshot, TransportError> {
        self.get_json(&["progress", job_id]).await
    }

    async fn results(&self, job_id: &str) -> Result<ClassificationResult, TransportError> {
        self.get_json(&["results", job_id]).await
    }

    async fn download(&self, filename: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.endpoint(&["download", filename])?;
        debug!("GET {url}");
        let response = ensure_success(self.client.get(url).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, TransportError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
