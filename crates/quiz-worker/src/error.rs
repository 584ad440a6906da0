//! Worker error types.

use quiz_media::{MediaError, TimelineError};
use quiz_models::QuizValidationError;
use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Encoder stderr lines kept in error messages and logs.
pub const ENCODER_STDERR_LINES: usize = 8;

/// Errors that end a pipeline run.
///
/// Failed generations are not among them: they surface as placeholder counts
/// in the report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid quiz input: {0}")]
    InvalidInput(#[from] QuizValidationError),

    #[error("Scheduler rejected batch: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Timeline assembly failed: {0}")]
    Timeline(#[from] TimelineError),

    #[error(
        "Encoding failed ({generated}/{total} clips generated): {source}{stderr}",
        stderr = stderr_suffix(.source)
    )]
    EncodeFailed {
        generated: usize,
        total: usize,
        #[source]
        source: MediaError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(source: &MediaError) -> String {
    source
        .stderr_tail(ENCODER_STDERR_LINES)
        .map(|tail| format!(" [stderr: {}]", tail))
        .unwrap_or_default()
}

/// Invalid batch input. The only way a batch run fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Batch is empty")]
    EmptyBatch,

    #[error("Slot numbers start at 1, got {0}")]
    InvalidSlot(u32),

    #[error("Slot {0} appears more than once")]
    DuplicateSlot(u32),

    #[error("Could not prepare output directory: {0}")]
    OutputDir(String),
}

/// Translation failures. Never escape `translate_or_fallback`.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("Translation request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Translation service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid translation response: {0}")]
    InvalidResponse(String),

    #[error("Translation JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TranslateError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslateError::Request(_) | TranslateError::Status { .. }
        )
    }
}
