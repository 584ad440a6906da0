//! Media side of the quiz pipeline.
//!
//! This crate provides:
//! - Asset resolution with placeholder substitution
//! - Timeline assembly with per-segment degradation
//! - FFmpeg filter graph building and a command runner with progress parsing
//! - The encoder boundary, with FFmpeg and Remotion implementations
//! - FFprobe clip inspection

pub mod assembler;
pub mod command;
pub mod encoder;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod resolver;

pub use assembler::{
    build_payload, Assembly, BilingualMode, DegradedSegment, TimelineAssembler, TimelineConfig,
};
pub use command::{check_ffmpeg, check_ffprobe, check_npx, FfmpegCommand, FfmpegRunner};
pub use encoder::{FfmpegEncoder, RemotionRenderer, RenderRequest, VideoEncoder};
pub use error::{MediaError, MediaResult, SegmentFault, TimelineError, TimelineResult};
pub use probe::{probe_clip, probe_durations, ClipInfo};
pub use progress::FfmpegProgress;
pub use resolver::{AssetOrigin, AssetResolver, ResolvedAsset, ResolvedAssets};
