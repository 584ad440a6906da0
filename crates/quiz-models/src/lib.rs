//! Shared data models for the quiz video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Generation requests, jobs and batch results
//! - Timelines, segments and text overlays
//! - Quiz scripts and translations
//! - Render payloads and encoding configuration
//! - Weekday color themes

pub mod encoding;
pub mod generation;
pub mod quiz;
pub mod render;
pub mod theme;
pub mod timeline;

// Re-export common types
pub use encoding::EncodingConfig;
pub use generation::{
    BatchResult, ClipReference, GenerationJob, GenerationRequest, JobState, SlotOutcome,
};
pub use quiz::{
    ChoiceScript, QuizScript, QuizValidationError, Translation, TranslationChoice,
    TranslationRequest, DEFAULT_CHOICE_COUNT, DEFAULT_END_MESSAGE, DEFAULT_END_MESSAGE_EN,
};
pub use render::{RenderChoice, RenderPayload};
pub use theme::DailyTheme;
pub use timeline::{
    Anchor, ClipFit, FrameGeometry, Position, Rgba, SegmentKind, TextOverlay, Timeline,
    TimelineSegment, VisualSource,
};
