//! Final video encoding settings.

use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 20;
/// Pixel format accepted by every short-video platform
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";

/// Encoding configuration for the assembled quiz video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Use hardware acceleration (NVENC)
    #[serde(default)]
    pub use_nvenc: bool,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            crf: DEFAULT_CRF,
            pixel_format: default_pixel_format(),
            use_nvenc: false,
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Enable NVENC hardware acceleration.
    pub fn with_nvenc(mut self) -> Self {
        self.use_nvenc = true;
        self.codec = "h264_nvenc".to_string();
        self
    }

    /// Output arguments for a silent H.264 MP4.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];

        // CRF is not used with NVENC, use -cq instead
        let quality_flag = if self.use_nvenc { "-cq" } else { "-crf" };
        args.extend([quality_flag.to_string(), self.crf.to_string()]);

        args.extend([
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-an".to_string(),
        ]);

        args.extend(self.extra_args.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EncodingConfig::default();
        assert_eq!(config.codec, "libx264");
        assert_eq!(config.crf, 20);
        assert_eq!(config.pixel_format, "yuv420p");
    }

    #[test]
    fn test_ffmpeg_args_are_silent_mp4() {
        let args = EncodingConfig::default().to_ffmpeg_args();
        assert!(args.contains(&"-crf".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_nvenc_config() {
        let args = EncodingConfig::default().with_nvenc().to_ffmpeg_args();
        assert!(args.contains(&"h264_nvenc".to_string()));
        assert!(args.contains(&"-cq".to_string()));
        assert!(!args.contains(&"-crf".to_string()));
    }
}
