use crate::{
    api::Backend,
    config::Config,
    error::{ClientError, ValidationError},
    request::InputSource,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvCheck {
    pub path: String,
    pub file_bytes: u64,
    pub columns: Vec<String>,
    pub data_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filepath: String,
    pub keyword_count: Option<u64>,
}

impl UploadedFile {
    pub fn input_source(&self) -> InputSource {
        InputSource::UploadedFile {
            filepath: self.filepath.clone(),
        }
    }
}

pub fn check_csv(cfg: &Config, path: &Path) -> Result<CsvCheck, ClientError> {
    let display = path.display().to_string();
    let ext_ok = path
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(&cfg.upload.allowed_extension));
    if !ext_ok {
        return Err(ValidationError::NotCsv(display).into());
    }

    let file_bytes = std::fs::metadata(path)?.len();
    if file_bytes > cfg.upload.max_file_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file_bytes,
            limit: cfg.upload.max_file_bytes,
        }
        .into());
    }

    let mut lines = BufReader::new(File::open(path)?).lines();
    let header = lines.next().transpose()?.unwrap_or_default();
    let columns = parse_header(&header);

    let missing: Vec<String> = cfg
        .upload
        .required_columns
        .iter()
        .filter(|req| !columns.iter().any(|c| c == &req.to_ascii_lowercase()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingColumns(missing).into());
    }

    let mut data_rows = 0u64;
    for line in lines {
        if !line?.trim().is_empty() {
            data_rows += 1;
        }
    }

    Ok(CsvCheck {
        path: display,
        file_bytes,
        columns,
        data_rows,
    })
}

// Runs on the blocking pool; a file can be up to the upload limit.
pub async fn inspect_csv(cfg: &Config, path: &Path) -> Result<CsvCheck, ClientError> {
    let cfg = cfg.clone();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || check_csv(&cfg, &path))
        .await
        .map_err(|e| ClientError::Io(std::io::Error::other(e)))?
}

pub fn parse_header(line: &str) -> Vec<String> {
    line.trim_start_matches('\u{feff}')
        .split(',')
        .map(|c| c.trim().trim_matches('"').trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

pub async fn upload_csv<B: Backend + ?Sized>(
    cfg: &Config,
    backend: &B,
    path: &Path,
) -> Result<UploadedFile, ClientError> {
    let check = inspect_csv(cfg, path).await?;
    info!(
        "uploading {} ({} bytes, {} rows)",
        check.path, check.file_bytes, check.data_rows
    );

    let out = backend.upload(path).await?;
    let Some(filepath) = out.filepath.filter(|p| !p.is_empty()) else {
        return Err(crate::error::TransportError::Rejected(
            out.error.unwrap_or_else(|| "upload response has no filepath".into()),
        )
        .into());
    };

    if let Some(n) = out.keyword_count {
        if n != check.data_rows {
            warn!("backend counted {n} keywords, local file has {} rows", check.data_rows);
        }
    }

    Ok(UploadedFile {
        filepath,
        keyword_count: out.keyword_count,
    })
}
