//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing, copying or encoding media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("npx not found in PATH")]
    NpxNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Render failed: {message}")]
    RenderFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a renderer failure error.
    pub fn render_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::RenderFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn invalid_timeline(message: impl Into<String>) -> Self {
        Self::InvalidTimeline(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Captured stderr, if the failing tool produced any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::FfmpegFailed { stderr, .. }
            | Self::FfprobeFailed { stderr, .. }
            | Self::RenderFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// The last `lines` non-blank stderr lines, joined with " | ".
    pub fn stderr_tail(&self, lines: usize) -> Option<String> {
        let stderr = self.stderr()?;
        let kept: Vec<&str> = stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if kept.is_empty() {
            return None;
        }
        Some(kept[kept.len().saturating_sub(lines)..].join(" | "))
    }
}

/// Result type for timeline assembly.
pub type TimelineResult<T> = Result<T, TimelineError>;

/// Invalid assembler input. Per-segment faults never surface here.
#[derive(Debug, Error, PartialEq)]
pub enum TimelineError {
    #[error("Choice numbers {choices:?} do not match resolved slots {slots:?}")]
    SlotMismatch { choices: Vec<u32>, slots: Vec<u32> },

    #[error("Segment duration for {segment} must be positive, got {value}")]
    InvalidDuration { segment: &'static str, value: f64 },

    #[error("Invalid frame geometry: {0}")]
    InvalidGeometry(String),
}

/// Reason a single segment was replaced by a plain card.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SegmentFault {
    #[error("overlay text is empty")]
    EmptyText,

    #[error("overlay text contains control characters")]
    ControlCharacters,

    #[error("font file not found: {0}")]
    MissingFont(PathBuf),

    #[error("visual source not found: {0}")]
    MissingVisual(PathBuf),

    #[error("overlay '{0}' falls outside the segment")]
    OverlayOutOfBounds(String),
}
