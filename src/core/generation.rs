use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

/// Lifecycle of a translation job. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// Coarse four-bucket percentage for simple status displays.
    pub fn progress_bucket(&self) -> u8 {
        match self {
            GenerationStatus::Pending => 10,
            GenerationStatus::Processing => 50,
            GenerationStatus::Completed | GenerationStatus::Failed => 100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Processing => "processing",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reported for a failed generation that carries no message of its own.
pub const GENERATION_FAILED_MESSAGE: &str = "Generation failed";

/// Bucket percentage for an optional record, 0 when nothing is being tracked.
pub fn display_progress(generation: Option<&GenerationRecord>) -> u8 {
    generation.map_or(0, |g| g.status.progress_bucket())
}

/// A generation as reported by the backend. Read-only on this side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: String,
    pub status: GenerationStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, alias = "input_image_url")]
    pub input_url: Option<String>,
    #[serde(default, alias = "output_image_url")]
    pub output_url: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl GenerationRecord {
    /// The backend's error message, or the generic one when it is missing or blank.
    pub fn failure_message(&self) -> String {
        self.error_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(GENERATION_FAILED_MESSAGE)
            .to_string()
    }

    pub fn new(id: impl Into<String>, status: GenerationStatus) -> Self {
        Self {
            id: id.into(),
            status,
            error_message: None,
            input_url: None,
            output_url: None,
            project_id: None,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Push payload: the row as it looks after the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationEvent {
    pub new: GenerationRecord,
}

/// Anything that can report the current state of a generation by id.
#[async_trait::async_trait]
pub trait GenerationSource: Send + Sync {
    async fn fetch_generation_status(&self, id: &str) -> Result<GenerationRecord, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchError {
    ConnectionError(String),
    NotFound(String),
    ApiError { status: u16, message: String },
    DataParseError(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::ConnectionError(msg) => write!(f, "Connection error: {msg}"),
            FetchError::NotFound(id) => write!(f, "Generation not found: {id}"),
            FetchError::ApiError { status, message } => write!(f, "API error {status}: {message}"),
            FetchError::DataParseError(msg) => write!(f, "Data parse error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<FetchError> for io::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err.to_string()),
            FetchError::DataParseError(_) => {
                io::Error::new(io::ErrorKind::InvalidData, err.to_string())
            }
            _ => io::Error::other(err.to_string()),
        }
    }
}
