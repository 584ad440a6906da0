//! Encoder boundary: turns an assembled timeline into a video file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use quiz_models::{EncodingConfig, RenderPayload, Timeline, VisualSource};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::command::{check_npx, FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::filters::{color_source, timeline_graph, OUTPUT_LABEL};

/// Everything an encoder needs for one render.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub timeline: Timeline,
    /// Same content in the structured form template renderers consume
    pub payload: RenderPayload,
    pub output: PathBuf,
}

/// Produces the final video. Called once per run; failure is fatal.
#[async_trait]
pub trait VideoEncoder: Send + Sync {
    async fn encode(&self, request: &RenderRequest) -> MediaResult<()>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Renders the timeline with a single FFmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    encoding: EncodingConfig,
    font_path: Option<PathBuf>,
    timeout_secs: u64,
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self {
            encoding: EncodingConfig::default(),
            font_path: None,
            timeout_secs: 600,
        }
    }
}

impl FfmpegEncoder {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            ..Default::default()
        }
    }

    pub fn with_font(mut self, font_path: Option<PathBuf>) -> Self {
        self.font_path = font_path;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build the FFmpeg command for a timeline.
    pub fn build_command(&self, timeline: &Timeline, output: &Path) -> MediaResult<FfmpegCommand> {
        if timeline.is_empty() {
            return Err(MediaError::invalid_timeline("timeline has no segments"));
        }

        let mut cmd = FfmpegCommand::new(output);
        for segment in timeline.segments() {
            cmd = match &segment.visual {
                VisualSource::Clip { clip, .. } => {
                    cmd.looped_input(&clip.source_path, segment.duration_secs)
                }
                VisualSource::Color { .. } => {
                    let source = color_source(segment, &timeline.geometry).ok_or_else(|| {
                        MediaError::internal("color segment without color source")
                    })?;
                    cmd.lavfi_input(source, segment.duration_secs)
                }
            };
        }

        Ok(cmd
            .filter_complex(timeline_graph(timeline, self.font_path.as_deref()))
            .map(OUTPUT_LABEL)
            .output_args(["-r".to_string(), timeline.geometry.fps.to_string()])
            .output_args(self.encoding.to_ffmpeg_args()))
    }
}

#[async_trait]
impl VideoEncoder for FfmpegEncoder {
    async fn encode(&self, request: &RenderRequest) -> MediaResult<()> {
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let cmd = self.build_command(&request.timeline, &request.output)?;
        let total = request.timeline.total_duration();
        info!(
            segments = request.timeline.len(),
            total_duration = total,
            output = %request.output.display(),
            "Encoding timeline with FFmpeg"
        );

        FfmpegRunner::new()
            .with_timeout(self.timeout_secs)
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    percent = (progress.fraction_of(total) * 100.0).round(),
                    speed = progress.speed,
                    "Encode progress"
                );
            })
            .await?;

        if !request.output.is_file() {
            return Err(MediaError::FileNotFound(request.output.clone()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Composition id registered by the Remotion project.
pub const REMOTION_COMPOSITION: &str = "QuizWithVideos";

/// Renders the payload through a Remotion project.
#[derive(Debug, Clone)]
pub struct RemotionRenderer {
    project_dir: PathBuf,
    timeout: Duration,
}

impl RemotionRenderer {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments after `npx`.
    pub fn build_args(&self, payload: &RenderPayload, output: &Path) -> MediaResult<Vec<String>> {
        Ok(vec![
            "remotion".to_string(),
            "render".to_string(),
            REMOTION_COMPOSITION.to_string(),
            output.to_string_lossy().to_string(),
            "--props".to_string(),
            payload.to_props_json()?,
        ])
    }
}

#[async_trait]
impl VideoEncoder for RemotionRenderer {
    async fn encode(&self, request: &RenderRequest) -> MediaResult<()> {
        let npx = check_npx()?;
        if !self.project_dir.is_dir() {
            return Err(MediaError::FileNotFound(self.project_dir.clone()));
        }
        if let Some(parent) = request.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = self.build_args(&request.payload, &request.output)?;
        info!(
            composition = REMOTION_COMPOSITION,
            output = %request.output.display(),
            "Rendering with Remotion"
        );

        let child = Command::new(npx)
            .args(&args)
            .current_dir(&self.project_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "Remotion render timed out");
                return Err(MediaError::Timeout(self.timeout.as_secs()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(MediaError::render_failed(
                "Remotion exited with non-zero status",
                (!stderr.is_empty()).then_some(stderr),
                output.status.code(),
            ));
        }

        if !request.output.is_file() {
            return Err(MediaError::FileNotFound(request.output.clone()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "remotion"
    }
}
