use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("topic is required")]
    EmptyTopic,

    #[error("at least one category is required")]
    EmptyCategories,

    #[error("no keywords provided: upload a CSV file or pass inline keywords")]
    MissingInput,

    #[error("confidence threshold must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(u32),

    #[error("category label is empty")]
    EmptyCategoryLabel,

    #[error("category already exists: {0}")]
    DuplicateCategory(String),

    #[error("category not found: {0}")]
    UnknownCategory(String),

    #[error("cannot remove the last category")]
    LastCategory,

    #[error("invalid file type, expected a .csv file: {0}")]
    NotCsv(String),

    #[error("file too large: {size} bytes (limit {limit} bytes)")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("job {0} is still active; wait for it to finish or cancel it")]
    JobAlreadyActive(String),

    #[error("invalid job transition {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend answered 2xx but flagged the call as unsuccessful.
    #[error("backend rejected request: {0}")]
    Rejected(String),

    #[error("invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("gave up polling job {job_id} after {attempts} consecutive errors: {last}")]
    RetriesExhausted {
        job_id: String,
        attempts: u32,
        last: String,
    },
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
