//! Generation client error types.

use thiserror::Error;

pub type GenResult<T> = Result<T, GenerationError>;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Submit failed with HTTP {status}: {body}")]
    SubmitFailed { status: u16, body: String },

    #[error("Status check failed with HTTP {status}")]
    PollFailed { status: u16 },

    #[error("Generation failed remotely: {0}")]
    JobFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether a fresh attempt could plausibly succeed.
    ///
    /// Configuration problems are the only errors a retry cannot fix.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, GenerationError::Config(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::SubmitFailed { .. } => "submit",
            GenerationError::PollFailed { .. } => "poll",
            GenerationError::JobFailed(_) => "remote_failed",
            GenerationError::DownloadFailed(_) => "download",
            GenerationError::InvalidResponse(_) | GenerationError::Json(_) => "invalid_response",
            GenerationError::Timeout(_) => "timeout",
            GenerationError::Config(_) => "config",
            GenerationError::Network(_) => "network",
            GenerationError::Io(_) => "io",
        }
    }
}
