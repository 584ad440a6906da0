//! Pipeline configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use quiz_genclient::GenerationPolicy;
use quiz_media::TimelineConfig;
use quiz_models::{EncodingConfig, DEFAULT_CHOICE_COUNT};

/// Which encoder renders the final video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncoderKind {
    /// Single FFmpeg invocation built from the timeline
    #[default]
    Ffmpeg,
    /// Remotion project rendering the structured payload
    Remotion,
}

impl FromStr for EncoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(EncoderKind::Ffmpeg),
            "remotion" => Ok(EncoderKind::Remotion),
            other => Err(format!("unknown encoder: {}", other)),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Concurrent generation jobs
    pub max_workers: usize,
    /// Choices every quiz must have
    pub choice_count: usize,
    /// Clip length requested from the generator
    pub target_duration_secs: u32,
    /// Parent of per-run staging directories
    pub work_dir: PathBuf,
    /// Where finished videos are written
    pub output_dir: PathBuf,
    /// Remotion project root
    pub remotion_dir: PathBuf,
    /// Render tree root; clips go to `<render_root>/videos`
    pub render_root: PathBuf,
    /// Source of `placeholder_{slot}.mp4` files
    pub placeholder_dir: PathBuf,
    /// Use placeholders for every slot without calling the generator
    pub skip_generation: bool,
    /// Abort generation still running after this long
    pub batch_deadline: Option<Duration>,
    pub encoder: EncoderKind,
    /// Timeout for one FFmpeg encode
    pub encode_timeout_secs: u64,
    pub encoding: EncodingConfig,
    pub generation: GenerationPolicy,
    pub timeline: TimelineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let remotion_dir = PathBuf::from("remotion");
        let render_root = remotion_dir.join("public");
        Self {
            max_workers: 4,
            choice_count: DEFAULT_CHOICE_COUNT,
            target_duration_secs: 8,
            work_dir: std::env::temp_dir().join("quizshorts"),
            output_dir: PathBuf::from("output"),
            placeholder_dir: render_root.join("videos"),
            render_root,
            remotion_dir,
            skip_generation: false,
            batch_deadline: None,
            encoder: EncoderKind::Ffmpeg,
            encode_timeout_secs: 600,
            encoding: EncodingConfig::default(),
            generation: GenerationPolicy::default(),
            timeline: TimelineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let remotion_dir = std::env::var("QUIZ_REMOTION_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.remotion_dir);
        let render_root = std::env::var("QUIZ_RENDER_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| remotion_dir.join("public"));
        let placeholder_dir = std::env::var("QUIZ_PLACEHOLDER_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| render_root.join("videos"));

        let mut encoding = EncodingConfig::default();
        if let Some(crf) = env_parse::<u8>("VIDEO_CRF") {
            encoding = encoding.with_crf(crf);
        }
        if env_flag("VIDEO_USE_NVENC") {
            encoding = encoding.with_nvenc();
        }

        Self {
            max_workers: env_parse("QUIZ_MAX_WORKERS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_workers),
            choice_count: env_parse("QUIZ_CHOICE_COUNT")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.choice_count),
            target_duration_secs: env_parse("QUIZ_CLIP_DURATION_SECS")
                .unwrap_or(defaults.target_duration_secs),
            work_dir: std::env::var("QUIZ_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("QUIZ_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            remotion_dir,
            render_root,
            placeholder_dir,
            skip_generation: env_flag("QUIZ_SKIP_GENERATION"),
            batch_deadline: env_parse::<u64>("QUIZ_BATCH_DEADLINE_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            encoder: std::env::var("QUIZ_ENCODER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.encoder),
            encode_timeout_secs: env_parse("QUIZ_ENCODE_TIMEOUT_SECS")
                .unwrap_or(defaults.encode_timeout_secs),
            encoding,
            generation: GenerationPolicy::from_env(),
            timeline: TimelineConfig::from_env(),
        }
    }

    /// Per-run staging directory for downloads.
    pub fn staging_dir(&self, run_id: &str) -> PathBuf {
        self.work_dir.join("staging").join(run_id)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
