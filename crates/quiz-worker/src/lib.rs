//! Quiz video worker.
//!
//! This crate provides:
//! - Bounded-parallel clip generation with per-slot outcomes
//! - Translation for bilingual videos with source-text fallback
//! - The pipeline driver tying generation, assembly and encoding together
//! - Environment configuration and structured run logging

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod scheduler;
pub mod translate;

pub use config::{EncoderKind, PipelineConfig};
pub use error::{PipelineError, PipelineResult, SchedulerError, TranslateError};
pub use logging::RunLogger;
pub use pipeline::{PipelineReport, QuizPipeline};
pub use scheduler::BatchScheduler;
pub use translate::{translate_or_fallback, GeminiConfig, GeminiTranslator, Translator};
