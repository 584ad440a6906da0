//! FFprobe clip information.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use quiz_models::ClipReference;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// What the assembler needs to know about a clip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipInfo {
    /// Duration in seconds, if the container reports one
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
}

/// Probe a clip.
pub async fn probe_clip(path: impl AsRef<Path>) -> MediaResult<ClipInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(json: &[u8]) -> MediaResult<ClipInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    if !probe.streams.iter().any(|s| s.codec_type == "video") {
        return Err(MediaError::InvalidVideo("No video stream found".to_string()));
    }

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    Ok(ClipInfo { duration })
}

/// Durations of the given clips, keyed by slot.
///
/// Best effort: clips that cannot be probed are left out.
pub async fn probe_durations<'a>(
    clips: impl IntoIterator<Item = &'a ClipReference>,
) -> BTreeMap<u32, f64> {
    let mut durations = BTreeMap::new();

    if check_ffprobe().is_err() {
        debug!("ffprobe unavailable, clip lengths left unknown");
        return durations;
    }

    for clip in clips {
        match probe_clip(&clip.source_path).await {
            Ok(ClipInfo {
                duration: Some(secs),
            }) => {
                durations.insert(clip.slot_index, secs);
            }
            Ok(_) => debug!(slot = clip.slot_index, "Clip reports no duration"),
            Err(e) => warn!(slot = clip.slot_index, error = %e, "Failed to probe clip"),
        }
    }

    durations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "format": {"duration": "5.041667"},
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 720, "height": 1280,
                 "avg_frame_rate": "24/1", "r_frame_rate": "24/1"}
            ]
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!((info.duration.unwrap() - 5.041667).abs() < 1e-6);
    }

    #[test]
    fn test_missing_duration_is_none() {
        let json = br#"{"format": {}, "streams": [{"codec_type": "video"}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert!(info.duration.is_none());
    }

    #[test]
    fn test_no_video_stream() {
        let json = br#"{"format": {"duration": "3.0"}, "streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::InvalidVideo(_))
        ));
    }
}
